//! Database models

use crate::validation::{collect_errors, validate_email, validate_name, validate_password};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

/// Full user row, including password material
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// bcrypt digest
    pub password_hash: String,
    pub role: Role,
    /// Unix epoch milliseconds
    pub created_at: i64,
    /// Unix epoch milliseconds
    pub updated_at: i64,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Public listing of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Registration payload
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    /// Check every field, reporting all failures together
    pub fn validate(&self) -> Result<()> {
        collect_errors([
            validate_name(&self.name),
            validate_email(&self.email),
            validate_password(&self.password),
        ])
    }
}

/// Partial profile update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        collect_errors([
            self.name.as_deref().map_or(Ok(()), validate_name),
            self.email.as_deref().map_or(Ok(()), validate_email),
            self.password.as_deref().map_or(Ok(()), validate_password),
        ])
    }
}

/// Which of a user's two song lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Tracked,
    Completed,
}

impl ListKind {
    pub fn table(&self) -> &'static str {
        match self {
            ListKind::Tracked => "tracked_songs",
            ListKind::Completed => "completed_songs",
        }
    }

    pub fn other(&self) -> ListKind {
        match self {
            ListKind::Tracked => ListKind::Completed,
            ListKind::Completed => ListKind::Tracked,
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKind::Tracked => f.write_str("tracked"),
            ListKind::Completed => f.write_str("completed"),
        }
    }
}

/// A song as supplied by the client when adding it to a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SongEntry {
    pub song_id: String,
    pub song_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
}

impl SongEntry {
    pub fn validate(&self) -> Result<()> {
        if self.song_id.trim().is_empty() {
            return Err(Error::InvalidInput("songId is required".to_string()));
        }
        if self.song_name.trim().is_empty() {
            return Err(Error::InvalidInput("songName is required".to_string()));
        }
        Ok(())
    }
}

/// A song stored in one of the lists (response only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedSong {
    #[serde(flatten)]
    pub song: SongEntry,
    /// Unix epoch milliseconds
    pub added_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::User.as_str(), "user");
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_new_user_rejects_unknown_fields() {
        let json = r#"{"name":"A","email":"a@b.co","password":"p","role":"admin"}"#;
        assert!(serde_json::from_str::<NewUser>(json).is_err());
    }

    #[test]
    fn test_new_user_validate() {
        let user = NewUser {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "pw".to_string(),
        };
        assert!(user.validate().is_ok());

        let bad = NewUser {
            email: "nope".to_string(),
            ..user
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_user_update_only_checks_present_fields() {
        let update = UserUpdate {
            name: Some("New Name".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
        assert!(!update.is_empty());
        assert!(UserUpdate::default().is_empty());

        let bad = UserUpdate {
            email: Some("bad".to_string()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_song_entry_uses_camel_case() {
        let json = r#"{"songId":"abc","songName":"Song","artistName":"Band"}"#;
        let entry: SongEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.song_id, "abc");
        assert_eq!(entry.artist_name.as_deref(), Some("Band"));

        let no_artist: SongEntry =
            serde_json::from_str(r#"{"songId":"x","songName":"y"}"#).unwrap();
        assert!(no_artist.artist_name.is_none());
    }

    #[test]
    fn test_song_entry_rejects_unknown_fields() {
        let json = r#"{"songId":"abc","songName":"Song","rating":5}"#;
        assert!(serde_json::from_str::<SongEntry>(json).is_err());
    }

    #[test]
    fn test_listed_song_serializes_flat() {
        let listed = ListedSong {
            song: SongEntry {
                song_id: "abc".to_string(),
                song_name: "Song".to_string(),
                artist_name: None,
            },
            added_at: 42,
        };
        assert_eq!(
            serde_json::to_value(&listed).unwrap(),
            serde_json::json!({ "songId": "abc", "songName": "Song", "addedAt": 42 })
        );
    }

    #[test]
    fn test_list_kind_tables() {
        assert_eq!(ListKind::Tracked.table(), "tracked_songs");
        assert_eq!(ListKind::Tracked.other(), ListKind::Completed);
        let kind: ListKind = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(kind, ListKind::Completed);
    }
}
