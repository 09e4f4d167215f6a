//! MPRIS metadata mapping

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat};
use zbus::zvariant::{ObjectPath, OwnedValue, Value};

use crate::error::Result;
use crate::objects::{Scored, Track};
use crate::types::ItemId;

use super::{NO_TRACK, TRACK_ID_PREFIX};

const RADIO_TRACK: &str = "Radio";
const EXTERNAL_TRACK: &str = "External";

/// Object path naming a track in `mpris:trackid`.
pub fn track_id_path(track: Option<&Track>) -> String {
    match track.and_then(Track::id) {
        None => NO_TRACK.to_string(),
        Some(ItemId::RADIOS) => format!("{TRACK_ID_PREFIX}{RADIO_TRACK}"),
        Some(id) if id.is_virtual() => format!("{TRACK_ID_PREFIX}{EXTERNAL_TRACK}"),
        Some(id) => format!("{TRACK_ID_PREFIX}{id}"),
    }
}

/// Inverse of [`track_id_path`].
pub fn parse_track_id(path: &str) -> Option<ItemId> {
    match path.strip_prefix(TRACK_ID_PREFIX)? {
        RADIO_TRACK => Some(ItemId::RADIOS),
        EXTERNAL_TRACK => Some(ItemId::EXTERNALS),
        id => id.parse().ok().map(ItemId::new),
    }
}

fn insert<'a>(
    metadata: &mut HashMap<String, OwnedValue>,
    key: &str,
    value: impl Into<Value<'a>>,
) -> Result<()> {
    let value = OwnedValue::try_from(value.into()).map_err(zbus::Error::from)?;
    metadata.insert(key.to_string(), value);
    Ok(())
}

/// Title shown for a track: its name, else the radio name, else the file name.
fn display_title(track: &Track) -> Result<String> {
    let name = track.name()?;
    if !name.is_empty() {
        return Ok(name);
    }
    if track.id() == Some(ItemId::RADIOS) {
        if let Some(radio) = track.album_artists()?.into_iter().next() {
            return Ok(radio);
        }
    }
    Ok(track
        .path()?
        .and_then(|path| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .unwrap_or(name))
}

/// Creation date in ISO 8601, from the timestamp or else the year.
fn content_created(track: &Track) -> Result<Option<String>> {
    let timestamp = track.timestamp()?;
    if timestamp > 0 {
        if let Some(date) = DateTime::from_timestamp(timestamp, 0) {
            return Ok(Some(date.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
    }
    Ok(track.year()?.map(|year| format!("{year:04}-01-01T00:00:00Z")))
}

/// Build the `Metadata` property for the current track.
pub fn track_metadata(track: Option<&Track>) -> Result<HashMap<String, OwnedValue>> {
    let mut metadata = HashMap::new();

    let trackid = ObjectPath::try_from(track_id_path(track)).map_err(zbus::Error::from)?;
    insert(&mut metadata, "mpris:trackid", trackid)?;

    let Some(track) = track else {
        return Ok(metadata);
    };

    insert(&mut metadata, "xesam:title", display_title(track)?)?;
    insert(&mut metadata, "xesam:url", track.uri()?)?;

    let album = track.album_name()?;
    if !album.is_empty() {
        insert(&mut metadata, "xesam:album", album)?;
    }
    let artists = track.artists()?;
    if !artists.is_empty() {
        insert(&mut metadata, "xesam:artist", artists)?;
    }
    let album_artists = track.album_artists()?;
    if !album_artists.is_empty() {
        insert(&mut metadata, "xesam:albumArtist", album_artists)?;
    }
    let genres = track.genres()?;
    if !genres.is_empty() {
        insert(&mut metadata, "xesam:genre", genres)?;
    }

    let number = track.number()?;
    if number > 0 {
        insert(&mut metadata, "xesam:trackNumber", i32::try_from(number).unwrap_or(i32::MAX))?;
    }
    let disc = track.discnumber()?;
    if disc > 0 {
        insert(&mut metadata, "xesam:discNumber", i32::try_from(disc).unwrap_or(i32::MAX))?;
    }

    let duration = track.duration()?;
    if duration.0 > 0 {
        insert(&mut metadata, "mpris:length", duration.to_microseconds().0)?;
    }
    if let Some(created) = content_created(track)? {
        insert(&mut metadata, "xesam:contentCreated", created)?;
    }

    let rate = track.rate()?.max(0);
    insert(&mut metadata, "xesam:userRating", rate as f64 / 5.0)?;
    insert(&mut metadata, "xesam:useCount", i32::from(track.popularity_stars()?))?;

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::sample_collection;
    use crate::objects::Album;
    use zbus::zvariant::OwnedObjectPath;

    fn string(metadata: &HashMap<String, OwnedValue>, key: &str) -> String {
        String::try_from(metadata[key].try_clone().unwrap()).unwrap()
    }

    fn strings(metadata: &HashMap<String, OwnedValue>, key: &str) -> Vec<String> {
        Vec::<String>::try_from(metadata[key].try_clone().unwrap()).unwrap()
    }

    #[test]
    fn test_no_track() {
        let metadata = track_metadata(None).unwrap();
        assert_eq!(metadata.len(), 1);
        let path = OwnedObjectPath::try_from(metadata["mpris:trackid"].try_clone().unwrap()).unwrap();
        assert_eq!(path.as_str(), NO_TRACK);
    }

    #[test]
    fn test_collection_track() {
        let (collection, album_id) = sample_collection();
        let mut album = Album::new(collection, Some(album_id), Vec::new(), Vec::new());
        let track = album.tracks().unwrap()[1].clone();
        track.set_rate(4).unwrap();

        let metadata = track_metadata(Some(&track)).unwrap();
        let path = OwnedObjectPath::try_from(metadata["mpris:trackid"].try_clone().unwrap()).unwrap();
        assert_eq!(parse_track_id(path.as_str()), track.id());

        assert_eq!(string(&metadata, "xesam:title"), "Noon");
        assert_eq!(string(&metadata, "xesam:album"), "Field Recordings");
        assert_eq!(strings(&metadata, "xesam:artist"), vec!["Ada Lane", "Guest Voice"]);
        assert_eq!(strings(&metadata, "xesam:albumArtist"), vec!["Ada Lane", "The Ferns"]);
        assert_eq!(strings(&metadata, "xesam:genre"), vec!["Folk"]);
        assert_eq!(i32::try_from(&metadata["xesam:trackNumber"]).unwrap(), 2);
        assert_eq!(i32::try_from(&metadata["xesam:discNumber"]).unwrap(), 1);
        assert_eq!(i64::try_from(&metadata["mpris:length"]).unwrap(), 180_000_000);
        assert_eq!(f64::try_from(&metadata["xesam:userRating"]).unwrap(), 0.8);
        assert_eq!(
            string(&metadata, "xesam:url"),
            "file:///music/field/02%20Noon.flac"
        );
    }

    #[test]
    fn test_external_track() {
        let (collection, _) = sample_collection();
        let mut track = Track::new(collection, Some(ItemId::EXTERNALS));
        track.set_uri("file:///tmp/Live%20Set.ogg");

        let metadata = track_metadata(Some(&track)).unwrap();
        assert_eq!(string(&metadata, "xesam:title"), "Live Set");
        assert!(!metadata.contains_key("mpris:length"));
        assert!(!metadata.contains_key("xesam:album"));
        assert_eq!(track_id_path(Some(&track)), "/org/cadenza/TrackId/External");
    }

    #[test]
    fn test_radio_title() {
        let (collection, _) = sample_collection();
        let mut track = Track::new(collection, None);
        track.set_radio("Jazz FM", "http://jazz.example/stream");

        let metadata = track_metadata(Some(&track)).unwrap();
        assert_eq!(string(&metadata, "xesam:title"), "Jazz FM");
        assert_eq!(parse_track_id("/org/cadenza/TrackId/Radio"), Some(ItemId::RADIOS));
    }

    #[test]
    fn test_parse_track_id() {
        assert_eq!(parse_track_id("/org/cadenza/TrackId/42"), Some(ItemId::new(42)));
        assert_eq!(parse_track_id(NO_TRACK), None);
        assert_eq!(parse_track_id("/org/cadenza/TrackId/abc"), None);
    }
}
