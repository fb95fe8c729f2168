//! Postgres accessor on top of diesel and the r2d2 pool.
//!
//! diesel is synchronous, so every statement runs on the blocking thread pool
//! while the request task awaits it.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::PgConnection;

use super::{Change, Order, Result, Select, Session, Storage, StorageError};
use crate::db::{DbConnection, DbPool};
use crate::models::{NewPost, Post};
use crate::schema::posts;

pub struct PgStorage {
    pool: DbPool,
    schema: String,
}

impl PgStorage {
    pub fn new(pool: DbPool, schema: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        if !is_identifier(&schema) {
            return Err(StorageError::InvalidSchema(schema));
        }
        Ok(Self { pool, schema })
    }
}

/// Plain SQL identifier: ASCII letters, digits and underscores, not starting
/// with a digit.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn session(&self) -> Result<Box<dyn Session>> {
        let pool = self.pool.clone();
        let search_path = format!("SET search_path TO \"{}\"", self.schema);

        let conn = tokio::task::spawn_blocking(move || -> Result<DbConnection> {
            let mut conn = pool.get()?;
            diesel::sql_query(search_path).execute(&mut *conn)?;
            Ok(conn)
        })
        .await??;

        tracing::trace!("Session acquired");
        Ok(Box::new(PgSession { conn: Some(conn) }))
    }
}

pub struct PgSession {
    conn: Option<DbConnection>,
}

impl PgSession {
    async fn run<T, F>(&mut self, query: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> QueryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut conn = self.conn.take().ok_or(StorageError::Closed)?;
        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = query(&mut *conn);
            (conn, result)
        })
        .await?;
        self.conn = Some(conn);
        Ok(result?)
    }
}

#[async_trait]
impl Session for PgSession {
    async fn select(&mut self, select: Select) -> Result<Vec<Post>> {
        self.run(move |conn| {
            let mut query = posts::table.select(Post::as_select()).into_boxed();
            if let Some(id) = select.id {
                query = query.filter(posts::id.eq(id));
            }
            if let Some(removed) = select.removed {
                query = query.filter(posts::removed.eq(removed));
            }
            if select.order == Order::IdDescending {
                query = query.order(posts::id.desc());
            }
            query.load(conn)
        })
        .await
    }

    async fn insert(&mut self, content: &str) -> Result<i64> {
        let content = content.to_owned();
        self.run(move |conn| {
            diesel::insert_into(posts::table)
                .values(&NewPost { content: &content })
                .returning(posts::id)
                .get_result(conn)
        })
        .await
    }

    async fn update(&mut self, id: i64, change: Change) -> Result<()> {
        self.run(move |conn| {
            let target = posts::table.filter(posts::id.eq(id));
            let updated = match change {
                Change::Content(content) => diesel::update(target)
                    .set(posts::content.eq(content))
                    .execute(conn),
                Change::Removed(removed) => diesel::update(target)
                    .set(posts::removed.eq(removed))
                    .execute(conn),
                Change::Likes(delta) => diesel::update(target)
                    .set(posts::likes.eq(posts::likes + delta))
                    .execute(conn),
            };
            updated.map(|_| ())
        })
        .await
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        // Clears search_path and any other session state before the
        // connection goes back to the pool.
        self.run(|conn| diesel::sql_query("DISCARD ALL").execute(conn).map(|_| ()))
            .await?;
        self.conn.take();
        tracing::trace!("Session released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::connection::SimpleConnection;

    use crate::db::get_connection_pool;

    /// Storage over a one-connection pool, so a session that is not returned
    /// blocks the next one. Creates the `social.posts` table if needed.
    fn single_connection_storage() -> PgStorage {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let mut conn = PgConnection::establish(&url).unwrap();
        conn.batch_execute(include_str!("../../sql/posts.sql"))
            .unwrap();

        let pool = get_connection_pool(&url, 1).unwrap();
        PgStorage::new(pool, "social").unwrap()
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_connection_returned_on_close_and_drop() {
        let storage = single_connection_storage();

        let mut first = storage.session().await.unwrap();
        first.select(Select::all().id(-1)).await.unwrap();
        first.close().await.unwrap();

        // search_path is bound again after DISCARD ALL reset it.
        let mut second = storage.session().await.unwrap();
        assert!(second.select(Select::all().id(-1)).await.unwrap().is_empty());
        drop(second);

        let mut third = storage.session().await.unwrap();
        third.select(Select::all().id(-1)).await.unwrap();
        third.close().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_updates_after_session_reset() {
        let storage = single_connection_storage();

        let mut session = storage.session().await.unwrap();
        let id = session.insert("from postgres").await.unwrap();
        session.close().await.unwrap();

        let mut session = storage.session().await.unwrap();
        session.update(id, Change::Likes(1)).await.unwrap();
        session.update(id, Change::Likes(1)).await.unwrap();
        session.update(id, Change::Likes(-3)).await.unwrap();
        session
            .update(id, Change::Content("edited".to_string()))
            .await
            .unwrap();
        session.update(id, Change::Removed(true)).await.unwrap();

        let post = session.select(Select::all().id(id)).await.unwrap().remove(0);
        session.close().await.unwrap();

        assert_eq!(post.likes, -1);
        assert_eq!(post.content, "edited");
        assert!(post.removed);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_select_filters_and_order() {
        let storage = single_connection_storage();
        let mut session = storage.session().await.unwrap();

        let kept = session.insert("kept").await.unwrap();
        let removed = session.insert("removed").await.unwrap();
        let newest = session.insert("newest").await.unwrap();
        session.update(removed, Change::Removed(true)).await.unwrap();

        let visible = session
            .select(Select::all().removed(false).id(kept))
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].content, "kept");

        assert!(session
            .select(Select::all().removed(false).id(removed))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            session
                .select(Select::all().removed(true).id(removed))
                .await
                .unwrap()
                .len(),
            1
        );

        let ours: Vec<i64> = session
            .select(Select::all().removed(false).newest_first())
            .await
            .unwrap()
            .into_iter()
            .map(|post| post.id)
            .filter(|id| [kept, removed, newest].contains(id))
            .collect();
        assert_eq!(ours, vec![newest, kept]);

        session.close().await.unwrap();
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("social"));
        assert!(is_identifier("_posts_2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2social"));
        assert!(!is_identifier("social\"; DROP TABLE posts; --"));
        assert!(!is_identifier("so cial"));
    }
}
