use diesel::{
    r2d2::{ConnectionManager, Pool, PooledConnection},
    PgConnection,
};

use crate::storage::StorageError;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<PgConnection>>;

pub fn get_connection_pool(url: &str, max_size: u32) -> Result<DbPool, StorageError> {
    let manager = ConnectionManager::<PgConnection>::new(url);
    // No idle connections up front: the service starts before the database is
    // reachable and requests answer 500 until it is.
    let pool = Pool::builder()
        .max_size(max_size)
        .min_idle(Some(0))
        .test_on_check_out(true)
        .build(manager)?;

    tracing::debug!(max_size, "Connection pool created");
    Ok(pool)
}
