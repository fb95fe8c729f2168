//! In-memory storage backend for testing and local runs.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{Change, Order, Result, Select, Session, Storage, StorageError};
use crate::models::Post;

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Post>,
    last_id: i64,
}

/// Keeps the `posts` table in a `Vec` behind an `Arc<RwLock<_>>`.
///
/// Data is lost when the last clone is dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    table: Arc<RwLock<Table>>,
    open_sessions: Arc<AtomicUsize>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions handed out and not yet released.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn session(&self) -> Result<Box<dyn Session>> {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemorySession {
            table: Some(Arc::clone(&self.table)),
            open_sessions: Arc::clone(&self.open_sessions),
        }))
    }
}

struct InMemorySession {
    table: Option<Arc<RwLock<Table>>>,
    open_sessions: Arc<AtomicUsize>,
}

impl InMemorySession {
    fn table(&self) -> Result<&RwLock<Table>> {
        self.table.as_deref().ok_or(StorageError::Closed)
    }

    fn release(&mut self) {
        if self.table.take().is_some() {
            self.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.release();
    }
}

fn matches(select: &Select, post: &Post) -> bool {
    select.id.map_or(true, |id| post.id == id)
        && select.removed.map_or(true, |removed| post.removed == removed)
}

#[async_trait]
impl Session for InMemorySession {
    async fn select(&mut self, select: Select) -> Result<Vec<Post>> {
        let table = self.table()?.read().await;
        let mut rows: Vec<Post> = table
            .rows
            .iter()
            .filter(|post| matches(&select, post))
            .cloned()
            .collect();
        if select.order == Order::IdDescending {
            rows.sort_by(|a, b| b.id.cmp(&a.id));
        }
        Ok(rows)
    }

    async fn insert(&mut self, content: &str) -> Result<i64> {
        let mut table = self.table()?.write().await;
        table.last_id += 1;
        let id = table.last_id;
        table.rows.push(Post {
            id,
            content: content.to_owned(),
            likes: 0,
            created: Utc::now().naive_utc(),
            removed: false,
        });
        Ok(id)
    }

    async fn update(&mut self, id: i64, change: Change) -> Result<()> {
        let mut table = self.table()?.write().await;
        if let Some(post) = table.rows.iter_mut().find(|post| post.id == id) {
            match change {
                Change::Content(content) => post.content = content,
                Change::Removed(removed) => post.removed = removed,
                Change::Likes(delta) => {
                    post.likes = post
                        .likes
                        .checked_add(delta)
                        .ok_or(StorageError::LikesOutOfRange(id))?;
                }
            }
        }
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        self.release();
        Ok(())
    }
}
