//! SafeSprint Storage crate - SQLite record store with change notification.
//!
//! Provides a WAL-mode SQLite database with migrations, repositories for
//! sessions, participants and messages, and a broadcast change feed that
//! repositories publish to after every successful write.

pub mod db;
pub mod feed;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use feed::ChangeFeed;
pub use repository::{MessageRepository, ParticipantRepository, SessionRepository};
