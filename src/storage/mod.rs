//! Storage accessor for the `posts` table.
//!
//! A [`Storage`] is built once at startup and shared by every request. Each
//! request takes its own [`Session`] from it, issues its statements through
//! that session one after another, and closes it before the response leaves.

#[cfg(any(test, feature = "inmemory"))]
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Post;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("Query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Session already closed")]
    Closed,
    #[cfg_attr(not(any(test, feature = "inmemory")), allow(dead_code))]
    #[error("Likes counter of post {0} out of range")]
    LikesOutOfRange(i64),
    #[error("Invalid schema name: {0:?}")]
    InvalidSchema(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Row order of a [`Select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Unordered,
    IdDescending,
}

/// Which rows of `posts` to read. Unset predicates match every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Select {
    pub id: Option<i64>,
    pub removed: Option<bool>,
    pub order: Order,
}

impl Select {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn removed(mut self, removed: bool) -> Self {
        self.removed = Some(removed);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.order = Order::IdDescending;
        self
    }
}

/// A single-column update applied to one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Content(String),
    Removed(bool),
    /// Added to the stored counter in the same statement.
    Likes(i32),
}

/// Process-wide connector that hands out per-request sessions.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Opens a session bound to the configured schema.
    async fn session(&self) -> Result<Box<dyn Session>>;
}

#[async_trait]
pub trait Session: Send {
    async fn select(&mut self, select: Select) -> Result<Vec<Post>>;

    /// Inserts a post with the given content and returns its id.
    async fn insert(&mut self, content: &str) -> Result<i64>;

    /// Applies `change` to the row with `id`; a missing row is not an error.
    async fn update(&mut self, id: i64, change: Change) -> Result<()>;

    /// Releases the session. Dropping an unclosed session still releases it,
    /// but skips the cleanup that can report a failure.
    async fn close(self: Box<Self>) -> Result<()>;
}
