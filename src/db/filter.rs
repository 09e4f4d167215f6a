//! Query filter utilities for building parameterized SQL queries.

use duckdb::ToSql;

use crate::types::ItemId;

/// Restricts tracks to those linked to a set of genre or artist ids.
///
/// Sentinel ids are ignored; a filter without any real id adds nothing.
#[derive(Debug, Clone, Copy)]
pub struct IdFilter<'a> {
    link_table: &'static str,
    link_column: &'static str,
    ids: &'a [ItemId],
}

impl<'a> IdFilter<'a> {
    /// Filter on `track_genres.genre_id`.
    pub fn genres(ids: &'a [ItemId]) -> Self {
        Self {
            link_table: "track_genres",
            link_column: "genre_id",
            ids,
        }
    }

    /// Filter on `track_artists.artist_id`.
    pub fn artists(ids: &'a [ItemId]) -> Self {
        Self {
            link_table: "track_artists",
            link_column: "artist_id",
            ids,
        }
    }

    /// Append the filter clause to a query string.
    pub fn apply(&self, query: &mut String, params: &mut Vec<i64>) {
        let ids: Vec<i64> = self
            .ids
            .iter()
            .filter(|id| !id.is_virtual())
            .map(|id| id.get())
            .collect();
        if ids.is_empty() {
            return;
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        query.push_str(&format!(
            " AND tracks.id IN (SELECT track_id FROM {} WHERE {} IN ({placeholders}))",
            self.link_table, self.link_column
        ));
        params.extend(ids);
    }

    /// Borrow collected parameters as `ToSql` trait objects.
    pub fn params_as_refs(params: &[i64]) -> Vec<&dyn ToSql> {
        params.iter().map(|p| p as &dyn ToSql).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_empty_ids() {
        let mut query = "SELECT id FROM tracks WHERE 1=1".to_string();
        let mut params = Vec::new();
        IdFilter::genres(&[]).apply(&mut query, &mut params);

        assert_eq!(query, "SELECT id FROM tracks WHERE 1=1");
        assert!(params.is_empty());
    }

    #[test]
    fn test_filter_ignores_sentinels() {
        let mut query = String::new();
        let mut params = Vec::new();
        IdFilter::genres(&[ItemId::POPULARS, ItemId::RANDOMS]).apply(&mut query, &mut params);

        assert!(query.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn test_filter_artists() {
        let mut query = "SELECT id FROM tracks WHERE 1=1".to_string();
        let mut params = Vec::new();
        IdFilter::artists(&[ItemId::new(4), ItemId::NONE, ItemId::new(9)])
            .apply(&mut query, &mut params);

        assert_eq!(
            query,
            "SELECT id FROM tracks WHERE 1=1 AND tracks.id IN \
             (SELECT track_id FROM track_artists WHERE artist_id IN (?, ?))"
        );
        assert_eq!(params, vec![4, 9]);
        assert_eq!(IdFilter::params_as_refs(&params).len(), 2);
    }
}
