//! Collection schema initialization

use duckdb::Connection;

use crate::error::Result;

/// Initialize the collection schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        CREATE SEQUENCE IF NOT EXISTS seq_artists START 1;
        CREATE SEQUENCE IF NOT EXISTS seq_genres START 1;
        CREATE SEQUENCE IF NOT EXISTS seq_albums START 1;
        CREATE SEQUENCE IF NOT EXISTS seq_tracks START 1;

        CREATE TABLE IF NOT EXISTS artists (
            id BIGINT PRIMARY KEY DEFAULT nextval('seq_artists'),
            name TEXT NOT NULL,
            sortname TEXT
        );

        CREATE TABLE IF NOT EXISTS genres (
            id BIGINT PRIMARY KEY DEFAULT nextval('seq_genres'),
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS albums (
            id BIGINT PRIMARY KEY DEFAULT nextval('seq_albums'),
            name TEXT NOT NULL,
            uri TEXT,
            year BIGINT,
            timestamp BIGINT,
            popularity BIGINT NOT NULL DEFAULT 0,
            rate BIGINT NOT NULL DEFAULT 0,
            mtime BIGINT NOT NULL DEFAULT 0,
            synced BIGINT NOT NULL DEFAULT 0,
            loved BOOLEAN NOT NULL DEFAULT FALSE,
            storage_type BIGINT NOT NULL DEFAULT 2,
            mb_album_id TEXT
        );

        CREATE TABLE IF NOT EXISTS tracks (
            id BIGINT PRIMARY KEY DEFAULT nextval('seq_tracks'),
            name TEXT NOT NULL,
            uri TEXT NOT NULL,
            album_id BIGINT NOT NULL,
            tracknumber BIGINT,
            discnumber BIGINT NOT NULL DEFAULT 0,
            discname TEXT,
            duration BIGINT,
            year BIGINT,
            timestamp BIGINT,
            popularity BIGINT NOT NULL DEFAULT 0,
            rate BIGINT NOT NULL DEFAULT 0,
            loved BIGINT NOT NULL DEFAULT 0,
            mtime BIGINT NOT NULL DEFAULT 0,
            storage_type BIGINT NOT NULL DEFAULT 2,
            mb_track_id TEXT
        );

        -- Join tables keep tag order through an explicit position
        CREATE TABLE IF NOT EXISTS album_artists (
            album_id BIGINT NOT NULL,
            artist_id BIGINT NOT NULL,
            position BIGINT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS album_genres (
            album_id BIGINT NOT NULL,
            genre_id BIGINT NOT NULL,
            position BIGINT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS track_artists (
            track_id BIGINT NOT NULL,
            artist_id BIGINT NOT NULL,
            position BIGINT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS track_genres (
            track_id BIGINT NOT NULL,
            genre_id BIGINT NOT NULL,
            position BIGINT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS radios (
            name TEXT PRIMARY KEY,
            uri TEXT NOT NULL,
            popularity BIGINT NOT NULL DEFAULT 0,
            rate BIGINT NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks(album_id);
        CREATE INDEX IF NOT EXISTS idx_album_artists_album ON album_artists(album_id);
        CREATE INDEX IF NOT EXISTS idx_track_artists_track ON track_artists(track_id);
        CREATE INDEX IF NOT EXISTS idx_track_genres_track ON track_genres(track_id);
        ",
    )?;

    Ok(())
}
