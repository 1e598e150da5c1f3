//! Database snapshots
//!
//! A backup is one JSON file, `<backup_dir>/<timestamp_ms>.json`, holding
//! every row of every user-data table. Backups are taken on a fixed interval
//! by [`spawn_backup_scheduler`] and old ones are pruned after each run.

use serde::{Deserialize, Serialize};
use songtracker_common::time::{millis_to_rfc3339, now_millis};
use songtracker_common::{Error, Result};
use sqlx::SqlitePool;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::db::sessions::purge_expired_sessions;

/// Snapshot file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupFile {
    pub timestamp: i64,
    pub date: String,
    pub data: BackupData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupData {
    pub users: Vec<UserRecord>,
    pub tracked_songs: Vec<SongRecord>,
    pub completed_songs: Vec<SongRecord>,
    pub sessions: Vec<SessionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SongRecord {
    pub id: i64,
    pub user_id: i64,
    pub song_id: String,
    pub song_name: String,
    pub artist_name: Option<String>,
    pub added_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: i64,
    pub created_at: i64,
    pub expires_at: i64,
}

/// Listing entry for one backup file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupInfo {
    pub timestamp: i64,
    pub date: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Row counts restored from a backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    pub timestamp: i64,
    pub users: usize,
    pub tracked_songs: usize,
    pub completed_songs: usize,
    pub sessions: usize,
}

fn backup_path(dir: &Path, timestamp: i64) -> PathBuf {
    dir.join(format!("{}.json", timestamp))
}

/// Parse `<timestamp>.json`; other names are not backups
fn parse_backup_name(name: &str) -> Option<i64> {
    name.strip_suffix(".json")?.parse().ok()
}

/// Read all tables into memory
pub async fn snapshot(pool: &SqlitePool) -> Result<BackupData> {
    Ok(BackupData {
        users: sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, password_hash, role, created_at, updated_at FROM users ORDER BY id",
        )
        .fetch_all(pool)
        .await?,
        tracked_songs: sqlx::query_as::<_, SongRecord>(
            "SELECT id, user_id, song_id, song_name, artist_name, added_at FROM tracked_songs ORDER BY id",
        )
        .fetch_all(pool)
        .await?,
        completed_songs: sqlx::query_as::<_, SongRecord>(
            "SELECT id, user_id, song_id, song_name, artist_name, added_at FROM completed_songs ORDER BY id",
        )
        .fetch_all(pool)
        .await?,
        sessions: sqlx::query_as::<_, SessionRecord>(
            "SELECT token, user_id, created_at, expires_at FROM sessions ORDER BY created_at",
        )
        .fetch_all(pool)
        .await?,
    })
}

/// Write a new backup file
///
/// The `<timestamp>.json` name is claimed with `create_new` before any data
/// is written, bumping the timestamp until a free name is found, so
/// concurrent calls never share a file. Contents go to a temporary file that
/// is then renamed over the claimed name.
pub async fn create_backup(pool: &SqlitePool, dir: &Path) -> Result<BackupInfo> {
    fs::create_dir_all(dir).await?;

    let data = snapshot(pool).await?;

    let mut timestamp = now_millis();
    let path = loop {
        let candidate = backup_path(dir, timestamp);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(_) => break candidate,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => timestamp += 1,
            Err(e) => return Err(e.into()),
        }
    };

    let file = BackupFile {
        timestamp,
        date: millis_to_rfc3339(timestamp),
        data,
    };

    let tmp = dir.join(format!(".{}.json.tmp", timestamp));
    let written = async {
        fs::write(&tmp, serde_json::to_vec_pretty(&file)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok::<_, Error>(())
    }
    .await;
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp).await;
        let _ = fs::remove_file(&path).await;
        return Err(e);
    }

    let size_bytes = fs::metadata(&path).await?.len();
    info!(
        "Database backed up at {} ({} users) -> {}",
        file.date,
        file.data.users.len(),
        path.display()
    );

    Ok(BackupInfo {
        timestamp,
        date: file.date,
        path,
        size_bytes,
    })
}

/// All backups in `dir`, newest first
pub async fn list_backups(dir: &Path) -> Result<Vec<BackupInfo>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut backups = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(timestamp) = name.to_str().and_then(parse_backup_name) else {
            continue;
        };
        backups.push(BackupInfo {
            timestamp,
            date: millis_to_rfc3339(timestamp),
            path: entry.path(),
            size_bytes: metadata.len(),
        });
    }

    backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(backups)
}

/// Timestamp of the newest backup, if any
pub async fn latest_backup_timestamp(dir: &Path) -> Result<Option<i64>> {
    Ok(list_backups(dir).await?.first().map(|b| b.timestamp))
}

/// Delete backups older than `max_age` relative to `now_ms`
///
/// Returns the timestamps that were removed.
pub async fn cleanup_old_backups(dir: &Path, max_age: Duration, now_ms: i64) -> Result<Vec<i64>> {
    let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
    let mut removed = Vec::new();

    for backup in list_backups(dir).await? {
        if now_ms.saturating_sub(backup.timestamp) > max_age_ms {
            fs::remove_file(&backup.path).await?;
            info!("Old backup {} deleted", backup.timestamp);
            removed.push(backup.timestamp);
        }
    }

    Ok(removed)
}

/// Replace all table contents with the backup taken at `timestamp`
pub async fn restore_backup(pool: &SqlitePool, dir: &Path, timestamp: i64) -> Result<RestoreSummary> {
    let bytes = match fs::read(backup_path(dir, timestamp)).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::NotFound("Backup file does not exist".to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    let file: BackupFile = serde_json::from_slice(&bytes)?;
    let data = file.data;

    let mut tx = pool.begin().await?;

    // Children first; users last so cascades have nothing left to do
    for table in ["sessions", "completed_songs", "tracked_songs", "users"] {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *tx)
            .await?;
    }

    for u in &data.users {
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(u.id)
        .bind(&u.name)
        .bind(&u.email)
        .bind(&u.password_hash)
        .bind(&u.role)
        .bind(u.created_at)
        .bind(u.updated_at)
        .execute(&mut *tx)
        .await?;
    }

    for (table, songs) in [
        ("tracked_songs", &data.tracked_songs),
        ("completed_songs", &data.completed_songs),
    ] {
        let sql = format!(
            "INSERT INTO {} (id, user_id, song_id, song_name, artist_name, added_at) VALUES (?, ?, ?, ?, ?, ?)",
            table
        );
        for s in songs {
            sqlx::query(&sql)
                .bind(s.id)
                .bind(s.user_id)
                .bind(&s.song_id)
                .bind(&s.song_name)
                .bind(&s.artist_name)
                .bind(s.added_at)
                .execute(&mut *tx)
                .await?;
        }
    }

    for s in &data.sessions {
        sqlx::query("INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
            .bind(&s.token)
            .bind(s.user_id)
            .bind(s.created_at)
            .bind(s.expires_at)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    info!(
        "Database recovered from backup taken at {}",
        millis_to_rfc3339(timestamp)
    );

    Ok(RestoreSummary {
        timestamp,
        users: data.users.len(),
        tracked_songs: data.tracked_songs.len(),
        completed_songs: data.completed_songs.len(),
        sessions: data.sessions.len(),
    })
}

/// How long to wait before the first scheduled backup
///
/// Immediately if there is no backup yet or the newest one is at least
/// `interval` old; otherwise whatever remains of the interval.
pub fn initial_delay(latest: Option<i64>, now_ms: i64, interval: Duration) -> Duration {
    let Some(latest) = latest else {
        return Duration::ZERO;
    };
    let elapsed = Duration::from_millis(u64::try_from(now_ms.saturating_sub(latest)).unwrap_or(0));
    interval.saturating_sub(elapsed)
}

/// One backup + cleanup + session purge cycle; failures are logged
pub async fn run_maintenance(pool: &SqlitePool, dir: &Path, max_age: Duration) {
    if let Err(e) = create_backup(pool, dir).await {
        error!("Scheduled backup failed: {}", e);
    }
    if let Err(e) = cleanup_old_backups(dir, max_age, now_millis()).await {
        warn!("Backup cleanup failed: {}", e);
    }
    match purge_expired_sessions(pool).await {
        Ok(0) => {}
        Ok(n) => info!("Purged {} expired sessions", n),
        Err(e) => warn!("Session purge failed: {}", e),
    }
}

/// Start the periodic backup task
pub fn spawn_backup_scheduler(
    pool: SqlitePool,
    dir: PathBuf,
    interval: Duration,
    max_age: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let latest = match latest_backup_timestamp(&dir).await {
            Ok(latest) => latest,
            Err(e) => {
                warn!("Could not list existing backups: {}", e);
                None
            }
        };

        let delay = initial_delay(latest, now_millis(), interval);
        if !delay.is_zero() {
            info!("Next backup in {:?}", delay);
            tokio::time::sleep(delay).await;
        }

        loop {
            run_maintenance(&pool, &dir, max_age).await;
            tokio::time::sleep(interval).await;
        }
    })
}
