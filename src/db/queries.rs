//! Query implementations for the collection database

use duckdb::types::FromSql;
use duckdb::{params, Connection};

use crate::error::Result;
use crate::types::{ItemId, StorageType};

use super::filter::IdFilter;
use super::{AlbumRecord, CollectionCounts, Table, TrackRecord};

/// Number of most popular rows averaged when normalizing popularity.
const POPULARITY_SAMPLE: i64 = 1000;

/// Fetch the first column of the single row matching `id`.
///
/// A missing row and a NULL column both come back as `None`.
pub fn scalar<T: FromSql>(conn: &Connection, sql: &str, id: ItemId) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => Ok(row.get::<_, Option<T>>(0)?),
        None => Ok(None),
    }
}

/// Fetch the first column of every row matching `id`.
pub fn column<T: FromSql>(conn: &Connection, sql: &str, id: ItemId) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![id], |row| row.get::<_, T>(0))?;

    let mut values = Vec::new();
    for row in rows {
        values.push(row?);
    }
    Ok(values)
}

/// Run the query with collected `i64` parameters and return the first column as ids.
fn ids_for(conn: &Connection, query: &str, param_values: &[i64]) -> Result<Vec<ItemId>> {
    let params = IdFilter::params_as_refs(param_values);
    let mut stmt = conn.prepare(query)?;
    let rows = stmt.query_map(params.as_slice(), |row| row.get::<_, i64>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(ItemId::new(row?));
    }
    Ok(ids)
}

// ============================================================================
// Album relations
// ============================================================================

/// Distinct disc numbers of an album, ascending
pub fn album_discs(conn: &Connection, album_id: ItemId) -> Result<Vec<i64>> {
    column(
        conn,
        "SELECT DISTINCT discnumber FROM tracks WHERE album_id = ? ORDER BY discnumber",
        album_id,
    )
}

/// Non-empty disc names used by an album disc
pub fn disc_names(conn: &Connection, album_id: ItemId, disc: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        r"
        SELECT DISTINCT discname FROM tracks
        WHERE album_id = ? AND discnumber = ? AND discname IS NOT NULL AND discname != ''
        ORDER BY discname
        ",
    )?;
    let rows = stmt.query_map(params![album_id, disc], |row| row.get::<_, String>(0))?;

    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}

/// Track ids of an album disc, ordered by track number then name
pub fn disc_track_ids(
    conn: &Connection,
    album_id: ItemId,
    genre_ids: &[ItemId],
    artist_ids: &[ItemId],
    disc: i64,
    storage_type: StorageType,
    skip_disliked: bool,
) -> Result<Vec<ItemId>> {
    let mut query = r"
        SELECT tracks.id FROM tracks
        WHERE tracks.album_id = ? AND tracks.discnumber = ?
          AND (tracks.storage_type & ?) != 0
    "
    .to_string();
    let mut param_values = vec![album_id.get(), disc, storage_type.bits()];

    if skip_disliked {
        query.push_str(" AND tracks.loved != -1");
    }
    IdFilter::genres(genre_ids).apply(&mut query, &mut param_values);
    IdFilter::artists(artist_ids).apply(&mut query, &mut param_values);
    query.push_str(" ORDER BY tracks.tracknumber, tracks.name, tracks.id");

    ids_for(conn, &query, &param_values)
}

/// Track ids of an album across all discs
pub fn album_track_ids(
    conn: &Connection,
    album_id: ItemId,
    genre_ids: &[ItemId],
    artist_ids: &[ItemId],
) -> Result<Vec<ItemId>> {
    let mut query = "SELECT tracks.id FROM tracks WHERE tracks.album_id = ?".to_string();
    let mut param_values = vec![album_id.get()];

    IdFilter::genres(genre_ids).apply(&mut query, &mut param_values);
    IdFilter::artists(artist_ids).apply(&mut query, &mut param_values);
    query.push_str(" ORDER BY tracks.discnumber, tracks.tracknumber, tracks.name, tracks.id");

    ids_for(conn, &query, &param_values)
}

/// Number of tracks of an album matching the filters
pub fn album_tracks_count(
    conn: &Connection,
    album_id: ItemId,
    genre_ids: &[ItemId],
    artist_ids: &[ItemId],
) -> Result<i64> {
    let mut query = "SELECT COUNT(*) FROM tracks WHERE tracks.album_id = ?".to_string();
    let mut param_values = vec![album_id.get()];

    IdFilter::genres(genre_ids).apply(&mut query, &mut param_values);
    IdFilter::artists(artist_ids).apply(&mut query, &mut param_values);

    let params = IdFilter::params_as_refs(&param_values);
    let mut stmt = conn.prepare(&query)?;
    let count: i64 = stmt.query_row(params.as_slice(), |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// Scores
// ============================================================================

/// Average popularity of the most popular rows of a table
pub fn avg_popularity(conn: &Connection, table: Table) -> Result<f64> {
    let query = format!(
        "SELECT AVG(popularity) FROM \
         (SELECT popularity FROM {} ORDER BY popularity DESC LIMIT {POPULARITY_SAMPLE})",
        table.name()
    );
    let avg: Option<f64> = conn.query_row(&query, [], |row| row.get(0))?;
    Ok(avg.unwrap_or(0.0))
}

/// Highest popularity of a table
pub fn higher_popularity(conn: &Connection, table: Table) -> Result<i64> {
    let query = format!("SELECT MAX(popularity) FROM {}", table.name());
    let best: Option<i64> = conn.query_row(&query, [], |row| row.get(0))?;
    Ok(best.unwrap_or(0))
}

/// Raw popularity of a row
pub fn popularity(conn: &Connection, table: Table, id: ItemId) -> Result<i64> {
    let query = format!("SELECT popularity FROM {} WHERE id = ?", table.name());
    Ok(scalar(conn, &query, id)?.unwrap_or(0))
}

/// Store the raw popularity of a row
pub fn set_popularity(conn: &Connection, table: Table, id: ItemId, value: i64) -> Result<()> {
    let query = format!("UPDATE {} SET popularity = ? WHERE id = ?", table.name());
    conn.execute(&query, params![value, id])?;
    Ok(())
}

/// User rate of a row
pub fn rate(conn: &Connection, table: Table, id: ItemId) -> Result<i64> {
    let query = format!("SELECT rate FROM {} WHERE id = ?", table.name());
    Ok(scalar(conn, &query, id)?.unwrap_or(0))
}

/// Store the user rate of a row
pub fn set_rate(conn: &Connection, table: Table, id: ItemId, value: i64) -> Result<()> {
    let query = format!("UPDATE {} SET rate = ? WHERE id = ?", table.name());
    conn.execute(&query, params![value, id])?;
    Ok(())
}

// ============================================================================
// Radios
// ============================================================================

/// Insert or replace a radio station
pub fn add_radio(conn: &Connection, name: &str, uri: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO radios (name, uri) VALUES (?, ?)",
        params![name, uri],
    )?;
    Ok(())
}

/// Stream uri of a radio
pub fn radio_uri(conn: &Connection, name: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT uri FROM radios WHERE name = ?")?;
    let mut rows = stmt.query(params![name])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

/// Read an integer column of a radio, 0 when unknown
pub fn radio_score(conn: &Connection, name: &str, column: RadioScore) -> Result<i64> {
    let query = format!("SELECT {} FROM radios WHERE name = ?", column.name());
    let mut stmt = conn.prepare(&query)?;
    let mut rows = stmt.query(params![name])?;
    match rows.next()? {
        Some(row) => Ok(row.get::<_, Option<i64>>(0)?.unwrap_or(0)),
        None => Ok(0),
    }
}

/// Update an integer column of a radio
pub fn set_radio_score(conn: &Connection, name: &str, column: RadioScore, value: i64) -> Result<()> {
    let query = format!("UPDATE radios SET {} = ? WHERE name = ?", column.name());
    conn.execute(&query, params![value, name])?;
    Ok(())
}

/// Average popularity of the most popular radios
pub fn radio_avg_popularity(conn: &Connection) -> Result<f64> {
    let avg: Option<f64> = conn.query_row(
        &format!(
            "SELECT AVG(popularity) FROM \
             (SELECT popularity FROM radios ORDER BY popularity DESC LIMIT {POPULARITY_SAMPLE})"
        ),
        [],
        |row| row.get(0),
    )?;
    Ok(avg.unwrap_or(0.0))
}

/// Highest radio popularity
pub fn radio_higher_popularity(conn: &Connection) -> Result<i64> {
    let best: Option<i64> =
        conn.query_row("SELECT MAX(popularity) FROM radios", [], |row| row.get(0))?;
    Ok(best.unwrap_or(0))
}

/// Integer columns of the radios table
#[derive(Debug, Clone, Copy)]
pub enum RadioScore {
    Popularity,
    Rate,
}

impl RadioScore {
    const fn name(self) -> &'static str {
        match self {
            Self::Popularity => "popularity",
            Self::Rate => "rate",
        }
    }
}

// ============================================================================
// Writers
// ============================================================================

/// Update a single column of an album or track row
pub fn update_column<T: duckdb::ToSql>(
    conn: &Connection,
    table: Table,
    column: &str,
    id: ItemId,
    value: T,
) -> Result<()> {
    let query = format!("UPDATE {} SET {column} = ? WHERE id = ?", table.name());
    conn.execute(&query, params![value, id])?;
    Ok(())
}

// ============================================================================
// Import
// ============================================================================

/// Find an artist by name or insert it
pub fn artist_id_or_insert(conn: &Connection, name: &str) -> Result<ItemId> {
    name_id_or_insert(conn, "artists", name)
}

/// Find a genre by name or insert it
pub fn genre_id_or_insert(conn: &Connection, name: &str) -> Result<ItemId> {
    name_id_or_insert(conn, "genres", name)
}

fn name_id_or_insert(conn: &Connection, table: &str, name: &str) -> Result<ItemId> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id FROM {table} WHERE LOWER(name) = LOWER(?) ORDER BY id LIMIT 1"
    ))?;
    let mut rows = stmt.query(params![name])?;
    if let Some(row) = rows.next()? {
        return Ok(ItemId::new(row.get(0)?));
    }

    let id: i64 = conn.query_row(
        &format!("INSERT INTO {table} (name) VALUES (?) RETURNING id"),
        params![name],
        |row| row.get(0),
    )?;
    Ok(ItemId::new(id))
}

fn link(conn: &Connection, table: &str, columns: (&str, &str), owner: ItemId, ids: &[ItemId]) -> Result<()> {
    let query = format!(
        "INSERT INTO {table} ({}, {}, position) VALUES (?, ?, ?)",
        columns.0, columns.1
    );
    for (position, id) in ids.iter().enumerate() {
        conn.execute(&query, params![owner, id, position as i64])?;
    }
    Ok(())
}

/// Insert an album row with its artist and genre links
pub fn insert_album(conn: &Connection, album: &AlbumRecord, mtime: i64) -> Result<ItemId> {
    let id: i64 = conn.query_row(
        r"
        INSERT INTO albums (name, uri, year, timestamp, mtime, synced, storage_type, mb_album_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        ",
        params![
            album.name.as_str(),
            album.uri.as_deref(),
            album.year,
            album.timestamp,
            mtime,
            album.synced,
            album.storage_type.bits(),
            album.mb_album_id.as_deref(),
        ],
        |row| row.get(0),
    )?;
    let album_id = ItemId::new(id);

    let artist_ids = album
        .artists
        .iter()
        .map(|name| artist_id_or_insert(conn, name))
        .collect::<Result<Vec<_>>>()?;
    link(conn, "album_artists", ("album_id", "artist_id"), album_id, &artist_ids)?;

    let genre_ids = album
        .genres
        .iter()
        .map(|name| genre_id_or_insert(conn, name))
        .collect::<Result<Vec<_>>>()?;
    link(conn, "album_genres", ("album_id", "genre_id"), album_id, &genre_ids)?;

    Ok(album_id)
}

/// Insert a track row with its artist and genre links.
///
/// Tracks without explicit artists or genres inherit the album's.
pub fn insert_track(
    conn: &Connection,
    album_id: ItemId,
    album: &AlbumRecord,
    track: &TrackRecord,
    mtime: i64,
) -> Result<ItemId> {
    let id: i64 = conn.query_row(
        r"
        INSERT INTO tracks (
            name, uri, album_id, tracknumber, discnumber, discname,
            duration, year, timestamp, loved, mtime, storage_type, mb_track_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        ",
        params![
            track.name.as_str(),
            track.uri.as_str(),
            album_id,
            track.number,
            track.discnumber,
            track.discname.as_deref(),
            track.duration_ms,
            track.year.or(album.year),
            album.timestamp,
            track.loved.as_db(),
            mtime,
            album.storage_type.bits(),
            track.mb_track_id.as_deref(),
        ],
        |row| row.get(0),
    )?;
    let track_id = ItemId::new(id);

    let artists = if track.artists.is_empty() {
        &album.artists
    } else {
        &track.artists
    };
    let artist_ids = artists
        .iter()
        .map(|name| artist_id_or_insert(conn, name))
        .collect::<Result<Vec<_>>>()?;
    link(conn, "track_artists", ("track_id", "artist_id"), track_id, &artist_ids)?;

    let genres = if track.genres.is_empty() {
        &album.genres
    } else {
        &track.genres
    };
    let genre_ids = genres
        .iter()
        .map(|name| genre_id_or_insert(conn, name))
        .collect::<Result<Vec<_>>>()?;
    link(conn, "track_genres", ("track_id", "genre_id"), track_id, &genre_ids)?;

    Ok(track_id)
}

/// Row counts of the main tables
pub fn counts(conn: &Connection) -> Result<CollectionCounts> {
    let count = |table: &str| -> Result<i64> {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
    };

    Ok(CollectionCounts {
        albums: count("albums")?,
        tracks: count("tracks")?,
        artists: count("artists")?,
        genres: count("genres")?,
        radios: count("radios")?,
    })
}
