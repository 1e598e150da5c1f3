//! Tracked / completed song list operations
//!
//! A song sits in at most one of a user's two lists. Moves between lists run
//! in a single transaction so the invariant holds under concurrent requests.

use songtracker_common::db::{ListKind, ListedSong, SongEntry};
use songtracker_common::time::now_millis;
use songtracker_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Outcome of adding a song to a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListChange {
    /// Newly added
    Added,
    /// Was already in the requested list
    AlreadyPresent,
    /// Taken out of the other list and added to this one
    Moved,
}

impl ListChange {
    /// User-facing confirmation text
    pub fn message(&self, kind: ListKind) -> String {
        match (self, kind) {
            (ListChange::Added, ListKind::Tracked) => "Song added to your tracked list".to_string(),
            (ListChange::Added, ListKind::Completed) => "Song marked as completed!".to_string(),
            (ListChange::AlreadyPresent, kind) => format!("Song is already in your {} list", kind),
            (ListChange::Moved, kind) => format!("Song moved to your {} list", kind),
        }
    }
}

/// Songs in one list, oldest first
pub async fn list_songs(pool: &SqlitePool, user_id: i64, kind: ListKind) -> Result<Vec<ListedSong>> {
    let sql = format!(
        "SELECT song_id, song_name, artist_name, added_at FROM {} WHERE user_id = ? ORDER BY added_at, id",
        kind.table()
    );
    let rows = sqlx::query(&sql).bind(user_id).fetch_all(pool).await?;

    Ok(rows
        .iter()
        .map(|row| ListedSong {
            song: SongEntry {
                song_id: row.get("song_id"),
                song_name: row.get("song_name"),
                artist_name: row.get("artist_name"),
            },
            added_at: row.get("added_at"),
        })
        .collect())
}

/// Put `song` into the `kind` list, moving it out of the other list if needed
///
/// Every statement in the transaction is a write, starting with the insert,
/// so it holds SQLite's write lock from its first statement.
pub async fn add_to_list(
    pool: &SqlitePool,
    user_id: i64,
    kind: ListKind,
    song: &SongEntry,
) -> Result<ListChange> {
    song.validate()?;

    let mut tx = pool.begin().await?;

    let insert_sql = format!(
        "INSERT INTO {} (user_id, song_id, song_name, artist_name, added_at) VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(user_id, song_id) DO NOTHING",
        kind.table()
    );
    let inserted = sqlx::query(&insert_sql)
        .bind(user_id)
        .bind(&song.song_id)
        .bind(&song.song_name)
        .bind(&song.artist_name)
        .bind(now_millis())
        .execute(&mut *tx)
        .await?
        .rows_affected()
        > 0;

    if !inserted {
        tx.commit().await?;
        return Ok(ListChange::AlreadyPresent);
    }

    let remove_sql = format!(
        "DELETE FROM {} WHERE user_id = ? AND song_id = ?",
        kind.other().table()
    );
    let moved = sqlx::query(&remove_sql)
        .bind(user_id)
        .bind(&song.song_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
        > 0;

    tx.commit().await?;

    debug!(user_id, song_id = %song.song_id, list = %kind, moved, "Song list updated");

    Ok(if moved { ListChange::Moved } else { ListChange::Added })
}

pub async fn track_song(pool: &SqlitePool, user_id: i64, song: &SongEntry) -> Result<ListChange> {
    add_to_list(pool, user_id, ListKind::Tracked, song).await
}

pub async fn complete_song(pool: &SqlitePool, user_id: i64, song: &SongEntry) -> Result<ListChange> {
    add_to_list(pool, user_id, ListKind::Completed, song).await
}

/// Move a tracked song to the completed list
///
/// Fails with `NotFound` if the song is not currently tracked.
pub async fn move_to_completed(pool: &SqlitePool, user_id: i64, song_id: &str) -> Result<SongEntry> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        "DELETE FROM tracked_songs WHERE user_id = ? AND song_id = ? \
         RETURNING song_id, song_name, artist_name",
    )
    .bind(user_id)
    .bind(song_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| Error::NotFound("Song is not in your tracked list".to_string()))?;

    let song = SongEntry {
        song_id: row.get("song_id"),
        song_name: row.get("song_name"),
        artist_name: row.get("artist_name"),
    };

    sqlx::query(
        "INSERT INTO completed_songs (user_id, song_id, song_name, artist_name, added_at) VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(user_id, song_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(&song.song_id)
    .bind(&song.song_name)
    .bind(&song.artist_name)
    .bind(now_millis())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(song)
}

/// Remove a song from one list
pub async fn remove_song(pool: &SqlitePool, user_id: i64, kind: ListKind, song_id: &str) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE user_id = ? AND song_id = ?", kind.table());
    let result = sqlx::query(&sql)
        .bind(user_id)
        .bind(song_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Song is not in your {} list", kind)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::create_user;
    use songtracker_common::db::{init_memory_database, NewUser};

    async fn setup() -> (SqlitePool, i64) {
        let pool = init_memory_database().await.unwrap();
        let user = create_user(
            &pool,
            &NewUser {
                name: "Listener".to_string(),
                email: "listener@example.com".to_string(),
                password: "pw".to_string(),
            },
        )
        .await
        .unwrap();
        (pool, user.id)
    }

    fn song(id: &str) -> SongEntry {
        SongEntry {
            song_id: id.to_string(),
            song_name: format!("Song {}", id),
            artist_name: Some("Band".to_string()),
        }
    }

    #[tokio::test]
    async fn test_track_song_is_idempotent() {
        let (pool, uid) = setup().await;

        assert_eq!(track_song(&pool, uid, &song("a")).await.unwrap(), ListChange::Added);
        assert_eq!(
            track_song(&pool, uid, &song("a")).await.unwrap(),
            ListChange::AlreadyPresent
        );

        let tracked = list_songs(&pool, uid, ListKind::Tracked).await.unwrap();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].song, song("a"));
    }

    #[tokio::test]
    async fn test_song_lives_in_one_list() {
        let (pool, uid) = setup().await;

        track_song(&pool, uid, &song("a")).await.unwrap();
        assert_eq!(complete_song(&pool, uid, &song("a")).await.unwrap(), ListChange::Moved);

        assert!(list_songs(&pool, uid, ListKind::Tracked).await.unwrap().is_empty());
        assert_eq!(list_songs(&pool, uid, ListKind::Completed).await.unwrap().len(), 1);

        assert_eq!(track_song(&pool, uid, &song("a")).await.unwrap(), ListChange::Moved);
        assert!(list_songs(&pool, uid, ListKind::Completed).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_move_to_completed() {
        let (pool, uid) = setup().await;
        track_song(&pool, uid, &song("a")).await.unwrap();

        let moved = move_to_completed(&pool, uid, "a").await.unwrap();
        assert_eq!(moved, song("a"));
        assert_eq!(list_songs(&pool, uid, ListKind::Completed).await.unwrap().len(), 1);

        assert!(matches!(
            move_to_completed(&pool, uid, "a").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_song() {
        let (pool, uid) = setup().await;
        complete_song(&pool, uid, &song("a")).await.unwrap();

        assert!(matches!(
            remove_song(&pool, uid, ListKind::Tracked, "a").await,
            Err(Error::NotFound(_))
        ));
        remove_song(&pool, uid, ListKind::Completed, "a").await.unwrap();
        assert!(list_songs(&pool, uid, ListKind::Completed).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_blank_song() {
        let (pool, uid) = setup().await;
        let blank = SongEntry {
            song_id: " ".to_string(),
            song_name: "x".to_string(),
            artist_name: None,
        };
        assert!(matches!(
            track_song(&pool, uid, &blank).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_lists_are_per_user() {
        let (pool, uid) = setup().await;
        let other = create_user(
            &pool,
            &NewUser {
                name: "Other".to_string(),
                email: "other@example.com".to_string(),
                password: "pw".to_string(),
            },
        )
        .await
        .unwrap();

        track_song(&pool, uid, &song("a")).await.unwrap();
        assert!(list_songs(&pool, other.id, ListKind::Tracked).await.unwrap().is_empty());
        assert_eq!(track_song(&pool, other.id, &song("a")).await.unwrap(), ListChange::Added);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let pool = songtracker_common::db::init_database(&dir.path().join("songs.db"))
            .await
            .unwrap();
        let uid = create_user(
            &pool,
            &NewUser {
                name: "Listener".to_string(),
                email: "listener@example.com".to_string(),
                password: "pw".to_string(),
            },
        )
        .await
        .unwrap()
        .id;

        for n in 0..10 {
            let id = format!("song-{}", n);
            let mut tasks = Vec::new();
            for i in 0..8 {
                let pool = pool.clone();
                let entry = song(&id);
                let kind = if i % 2 == 0 { ListKind::Tracked } else { ListKind::Completed };
                tasks.push(tokio::spawn(async move {
                    add_to_list(&pool, uid, kind, &entry).await
                }));
            }
            for task in tasks {
                task.await.unwrap().unwrap();
            }

            let tracked = list_songs(&pool, uid, ListKind::Tracked).await.unwrap();
            let completed = list_songs(&pool, uid, ListKind::Completed).await.unwrap();
            let copies = tracked
                .iter()
                .chain(completed.iter())
                .filter(|s| s.song.song_id == id)
                .count();
            assert_eq!(copies, 1, "{} should be in exactly one list", id);
        }
    }

    #[tokio::test]
    async fn test_move_keeps_stored_details() {
        let (pool, uid) = setup().await;
        track_song(&pool, uid, &song("a")).await.unwrap();

        let moved = move_to_completed(&pool, uid, "a").await.unwrap();
        assert_eq!(moved, song("a"));

        let completed = list_songs(&pool, uid, ListKind::Completed).await.unwrap();
        assert_eq!(completed[0].song.artist_name.as_deref(), Some("Band"));
    }
}
