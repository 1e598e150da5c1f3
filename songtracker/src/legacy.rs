//! Flat-file user store
//!
//! The original deployment kept every user in one JSON array file
//! (`users.json`). A user's id is its index in that array. Each record has
//! exactly the keys `name`, `email`, `password`, `trackedSongs`,
//! `completedSongs`.
//!
//! [`JsonUserStore`] provides CRUD over such a file, and
//! [`import_into_database`] moves its contents into SQLite.

use serde::Deserialize;
use serde_json::Value;
use songtracker_common::db::{ListKind, NewUser, SongEntry};
use songtracker_common::password::is_password_hash;
use songtracker_common::validation::ensure_correct_user_format;
use songtracker_common::{Error, Result};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::db::{songs, users, ListChange};

/// CRUD over a JSON array of user records
///
/// Every operation re-reads the file and writes it back whole; the mutex
/// keeps read-modify-write cycles from interleaving within one process.
#[derive(Debug)]
pub struct JsonUserStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonUserStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded data is (), so a poisoned lock carries no broken state
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_unlocked(&self) -> Result<Vec<Value>> {
        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&self.path, "[]")?;
        }

        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str::<Value>(&content)? {
            Value::Array(users) => Ok(users),
            _ => Err(Error::InvalidInput(format!(
                "{} does not contain a JSON array",
                self.path.display()
            ))),
        }
    }

    fn write_unlocked(&self, users: &[Value]) -> Result<()> {
        std::fs::write(&self.path, serde_json::to_string_pretty(users)?)?;
        Ok(())
    }

    /// All records; creates the file with `[]` if it does not exist
    pub fn read_all_users(&self) -> Result<Vec<Value>> {
        let _guard = self.guard();
        self.read_unlocked()
    }

    /// Replace the whole file
    pub fn write_users(&self, users: &[Value]) -> Result<()> {
        let _guard = self.guard();
        self.write_unlocked(users)
    }

    /// Validate and append a record, returning its id
    pub fn write_new_user(&self, user: Value) -> Result<usize> {
        ensure_correct_user_format(&user)?;

        let _guard = self.guard();
        let mut users = self.read_unlocked()?;

        let email = user["email"].as_str().unwrap_or_default();
        if users.iter().any(|u| u["email"].as_str() == Some(email)) {
            return Err(Error::Conflict("Email is already registered".to_string()));
        }

        users.push(user);
        self.write_unlocked(&users)?;
        Ok(users.len() - 1)
    }

    pub fn find_user_by_id(&self, id: usize) -> Result<Value> {
        self.read_all_users()?
            .into_iter()
            .nth(id)
            .ok_or_else(|| not_found(id))
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<(usize, Value)>> {
        Ok(self
            .read_all_users()?
            .into_iter()
            .enumerate()
            .find(|(_, u)| u["email"].as_str() == Some(email)))
    }

    /// Merge the keys of `changes` into record `id`
    ///
    /// The merged record must still pass the format check, so unknown keys
    /// are rejected and nothing is written.
    pub fn update_user(&self, id: usize, changes: Value) -> Result<Value> {
        let Value::Object(changes) = changes else {
            return Err(Error::InvalidInput("Update must be a JSON object".to_string()));
        };

        let _guard = self.guard();
        let mut users = self.read_unlocked()?;
        let user = users.get_mut(id).ok_or_else(|| not_found(id))?;

        let mut merged = user.clone();
        if let Value::Object(fields) = &mut merged {
            fields.extend(changes);
        }
        ensure_correct_user_format(&merged)?;

        *user = merged.clone();
        self.write_unlocked(&users)?;
        Ok(merged)
    }

    /// Remove record `id`; later records shift down by one
    pub fn delete_user(&self, id: usize) -> Result<Value> {
        let _guard = self.guard();
        let mut users = self.read_unlocked()?;
        if id >= users.len() {
            return Err(not_found(id));
        }
        let removed = users.remove(id);
        self.write_unlocked(&users)?;
        Ok(removed)
    }

    /// Check every record's format; returns the record count
    pub fn verify_integrity(&self) -> Result<usize> {
        let users = self.read_all_users()?;
        for (index, user) in users.iter().enumerate() {
            ensure_correct_user_format(user).map_err(|e| {
                Error::Internal(format!(
                    "Data integrity issue with user at index {}: {}",
                    index,
                    e.message()
                ))
            })?;
        }
        Ok(users.len())
    }
}

fn not_found(id: usize) -> Error {
    Error::NotFound(format!("User with id {} not found", id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyUser {
    name: String,
    email: String,
    password: String,
    tracked_songs: Vec<Value>,
    completed_songs: Vec<Value>,
}

/// Object form of a legacy list entry; extra keys are ignored
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySong {
    song_id: String,
    #[serde(default)]
    song_name: Option<String>,
    #[serde(default)]
    artist_name: Option<String>,
}

/// Legacy list entries are either bare ids or song objects
///
/// Entries that do not make a valid [`SongEntry`] yield `None`.
fn song_from_value(value: &Value) -> Option<SongEntry> {
    let song = match value {
        Value::String(id) => SongEntry {
            song_id: id.clone(),
            song_name: id.clone(),
            artist_name: None,
        },
        Value::Object(_) => {
            let legacy: LegacySong = serde_json::from_value(value.clone()).ok()?;
            SongEntry {
                song_name: legacy.song_name.unwrap_or_else(|| legacy.song_id.clone()),
                song_id: legacy.song_id,
                artist_name: legacy.artist_name,
            }
        }
        _ => return None,
    };
    song.validate().ok().map(|_| song)
}

/// Outcome of a legacy import
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: usize,
    /// Songs newly added to a list
    pub songs: usize,
    /// `(index, reason)` for each record not imported
    pub skipped: Vec<(usize, String)>,
}

async fn add_songs(pool: &SqlitePool, user_id: i64, entries: &[(ListKind, SongEntry)]) -> Result<usize> {
    let mut added = 0;
    for (kind, song) in entries {
        if songs::add_to_list(pool, user_id, *kind, song).await? == ListChange::Added {
            added += 1;
        }
    }
    Ok(added)
}

/// Copy every valid legacy record into the database
///
/// Records are independent: a bad record is skipped and reported, the rest
/// still import. Passwords stored as bcrypt digests are kept as they are;
/// plain-text passwords are hashed on the way in. Unusable song entries are
/// dropped with a warning. A record whose songs cannot be written is removed
/// again, so no user is left half-imported.
pub async fn import_into_database(store: &JsonUserStore, pool: &SqlitePool) -> Result<ImportReport> {
    let records = store.read_all_users()?;
    let mut report = ImportReport::default();

    for (index, record) in records.into_iter().enumerate() {
        if let Err(e) = ensure_correct_user_format(&record) {
            report.skipped.push((index, e.message()));
            continue;
        }

        let legacy: LegacyUser = match serde_json::from_value(record) {
            Ok(legacy) => legacy,
            Err(e) => {
                report.skipped.push((index, e.to_string()));
                continue;
            }
        };

        let mut entries = Vec::new();
        for (kind, list) in [
            (ListKind::Tracked, &legacy.tracked_songs),
            (ListKind::Completed, &legacy.completed_songs),
        ] {
            for value in list {
                match song_from_value(value) {
                    Some(song) => entries.push((kind, song)),
                    None => warn!(index, "Skipping unusable {} song entry: {}", kind, value),
                }
            }
        }

        let created = if is_password_hash(&legacy.password) {
            users::create_user_with_hash(pool, &legacy.name, &legacy.email, &legacy.password).await
        } else {
            let new_user = NewUser {
                name: legacy.name,
                email: legacy.email,
                password: legacy.password,
            };
            users::create_user(pool, &new_user).await
        };
        let user = match created {
            Ok(user) => user,
            Err(e @ (Error::InvalidInput(_) | Error::Conflict(_))) => {
                report.skipped.push((index, e.message()));
                continue;
            }
            Err(e) => return Err(e),
        };

        match add_songs(pool, user.id, &entries).await {
            Ok(added) => {
                report.songs += added;
                report.imported += 1;
            }
            Err(e) => {
                users::delete_user(pool, user.id).await?;
                report.skipped.push((index, e.message()));
            }
        }
    }

    info!(
        imported = report.imported,
        skipped = report.skipped.len(),
        "Legacy user import finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use songtracker_common::db::init_memory_database;
    use songtracker_common::password::verify_password;
    use tempfile::TempDir;

    fn store() -> (TempDir, JsonUserStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonUserStore::open(dir.path().join("users.json"));
        (dir, store)
    }

    fn valid_user(name: &str, email: &str, tracked: Value) -> Value {
        json!({
            "name": name,
            "email": email,
            "password": "secret",
            "trackedSongs": tracked,
            "completedSongs": []
        })
    }

    #[test]
    fn test_read_creates_missing_file() {
        let (_dir, store) = store();
        assert!(!store.path().exists());

        assert!(store.read_all_users().unwrap().is_empty());
        assert!(store.path().exists());
    }

    #[test]
    fn test_write_valid_user() {
        let (_dir, store) = store();
        let user = valid_user("John Doe", "john@example.com", json!(["song1", "song2"]));

        assert_eq!(store.write_new_user(user.clone()).unwrap(), 0);

        let users = store.read_all_users().unwrap();
        assert_eq!(users, vec![user]);
    }

    #[test]
    fn test_write_rejects_bad_records() {
        let (_dir, store) = store();

        let missing = json!({ "name": "John", "email": "john@example.com" });
        assert!(matches!(store.write_new_user(missing), Err(Error::InvalidInput(_))));

        let bad_list = valid_user("John", "john@example.com", json!("not_an_array"));
        assert!(matches!(store.write_new_user(bad_list), Err(Error::InvalidInput(_))));

        assert!(store.read_all_users().unwrap().is_empty());
    }

    #[test]
    fn test_find_by_id_and_email() {
        let (_dir, store) = store();
        let user1 = valid_user("User 1", "user1@example.com", json!([]));
        let user2 = valid_user("User 2", "user2@example.com", json!([]));
        store.write_new_user(user1.clone()).unwrap();
        store.write_new_user(user2.clone()).unwrap();

        assert_eq!(store.find_user_by_id(0).unwrap(), user1);
        assert_eq!(store.find_user_by_id(1).unwrap(), user2);
        assert!(matches!(store.find_user_by_id(999), Err(Error::NotFound(_))));

        let (id, _) = store.find_user_by_email("user2@example.com").unwrap().unwrap();
        assert_eq!(id, 1);
        assert!(store.find_user_by_email("x@example.com").unwrap().is_none());
    }

    #[test]
    fn test_update_merges_fields() {
        let (_dir, store) = store();
        store
            .write_new_user(valid_user("Original Name", "original@example.com", json!(["song1"])))
            .unwrap();

        store
            .update_user(
                0,
                json!({ "name": "Updated Name", "trackedSongs": ["song1", "song2", "song3"] }),
            )
            .unwrap();

        let updated = store.find_user_by_id(0).unwrap();
        assert_eq!(updated["name"], "Updated Name");
        assert_eq!(updated["email"], "original@example.com");
        assert_eq!(updated["trackedSongs"], json!(["song1", "song2", "song3"]));
    }

    #[test]
    fn test_update_rejects_extra_fields_and_missing_user() {
        let (_dir, store) = store();
        store
            .write_new_user(valid_user("A", "a@example.com", json!([])))
            .unwrap();

        assert!(store.update_user(0, json!({ "role": "admin" })).is_err());
        assert_eq!(store.find_user_by_id(0).unwrap().get("role"), None);

        assert!(matches!(
            store.update_user(999, json!({ "name": "New Name" })),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_shifts_ids() {
        let (_dir, store) = store();
        let user2 = valid_user("User 2", "user2@example.com", json!([]));
        store
            .write_new_user(valid_user("User 1", "user1@example.com", json!([])))
            .unwrap();
        store.write_new_user(user2.clone()).unwrap();

        store.delete_user(0).unwrap();

        let users = store.read_all_users().unwrap();
        assert_eq!(users, vec![user2]);
        assert!(matches!(store.delete_user(999), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_multiple_operations() {
        let (_dir, store) = store();
        store.write_new_user(valid_user("Alice", "alice@example.com", json!(["song1"]))).unwrap();
        store.write_new_user(valid_user("Bob", "bob@example.com", json!(["song2"]))).unwrap();
        store
            .write_new_user(valid_user("Charlie", "charlie@example.com", json!(["song3"])))
            .unwrap();
        assert_eq!(store.read_all_users().unwrap().len(), 3);

        store.update_user(1, json!({ "trackedSongs": ["song2", "song4"] })).unwrap();
        assert_eq!(
            store.find_user_by_id(1).unwrap()["trackedSongs"],
            json!(["song2", "song4"])
        );

        store.delete_user(0).unwrap();
        assert_eq!(store.read_all_users().unwrap().len(), 2);
    }

    #[test]
    fn test_verify_integrity_reports_index() {
        let (_dir, store) = store();
        store.write_users(&[
            valid_user("A", "a@example.com", json!([])),
            json!({ "name": "B" }),
        ])
        .unwrap();

        let err = store.verify_integrity().unwrap_err();
        assert!(err
            .message()
            .starts_with("Data integrity issue with user at index 1"));
    }

    #[tokio::test]
    async fn test_import_into_database() {
        let (_dir, store) = store();
        let bob_digest = songtracker_common::password::hash_password("bob-pw")
            .unwrap()
            .replacen("$2b$", "$2a$", 1);
        store.write_users(&[
            json!({
                "name": "Alice",
                "email": "alice@example.com",
                "password": "pw",
                "trackedSongs": ["mbid-1", { "songId": "mbid-2", "songName": "Two" }],
                "completedSongs": ["mbid-3"]
            }),
            json!({
                "name": "Bob",
                "email": "bob@example.com",
                "password": bob_digest,
                "trackedSongs": [],
                "completedSongs": []
            }),
            json!({ "name": "Broken" }),
        ])
        .unwrap();

        let pool = init_memory_database().await.unwrap();
        let report = import_into_database(&store, &pool).await.unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(report.songs, 3);
        let skipped: Vec<usize> = report.skipped.iter().map(|(i, _)| *i).collect();
        assert_eq!(skipped, vec![2]);

        let alice = users::find_user_by_email(&pool, "alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(verify_password("pw", &alice.password_hash));
        let tracked = songs::list_songs(&pool, alice.id, ListKind::Tracked).await.unwrap();
        assert_eq!(tracked.len(), 2);
        assert_eq!(tracked[1].song.song_name, "Two");

        let bob = users::find_user_by_email(&pool, "bob@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bob.password_hash, bob_digest);
        assert!(verify_password("bob-pw", &bob.password_hash));
    }

    #[tokio::test]
    async fn test_import_drops_bad_song_and_continues() {
        let (_dir, store) = store();
        store.write_users(&[
            json!({
                "name": "Alice",
                "email": "alice@example.com",
                "password": "pw",
                "trackedSongs": [{ "songId": " ", "songName": "x" }, "mbid-1", 42],
                "completedSongs": []
            }),
            json!({
                "name": "Bob",
                "email": "bob@example.com",
                "password": "pw",
                "trackedSongs": [{ "songId": "mbid-2", "rating": 5 }],
                "completedSongs": []
            }),
        ])
        .unwrap();

        let pool = init_memory_database().await.unwrap();
        let report = import_into_database(&store, &pool).await.unwrap();

        assert_eq!(report.imported, 2);
        assert!(report.skipped.is_empty());
        assert_eq!(report.songs, 2);

        let bob = users::find_user_by_email(&pool, "bob@example.com")
            .await
            .unwrap()
            .unwrap();
        let tracked = songs::list_songs(&pool, bob.id, ListKind::Tracked).await.unwrap();
        assert_eq!(tracked[0].song.song_id, "mbid-2");
        assert_eq!(tracked[0].song.song_name, "mbid-2");
    }

    #[tokio::test]
    async fn test_import_counts_song_in_both_lists_once() {
        let (_dir, store) = store();
        store.write_users(&[json!({
            "name": "Alice",
            "email": "alice@example.com",
            "password": "pw",
            "trackedSongs": ["mbid-1"],
            "completedSongs": ["mbid-1"]
        })])
        .unwrap();

        let pool = init_memory_database().await.unwrap();
        let report = import_into_database(&store, &pool).await.unwrap();

        assert_eq!(report.songs, 1);
        let alice = users::find_user_by_email(&pool, "alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(songs::list_songs(&pool, alice.id, ListKind::Tracked)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            songs::list_songs(&pool, alice.id, ListKind::Completed)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
