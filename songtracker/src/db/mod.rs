//! Database access layer for the song tracker service

pub mod sessions;
pub mod songs;
pub mod users;

pub use songs::ListChange;
