use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod booking_store;
pub mod document_store;

pub use booking_store::PgBookingStore;
pub use document_store::PgDocumentStore;

/// Opens the pool and applies pending migrations.
pub async fn connect_pg(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database ready, migrations applied");
    Ok(pool)
}

/// Deletes refresh tokens past their expiry. Returns the number removed.
pub async fn purge_expired_tokens(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        r#"
        DELETE FROM refresh_token
        WHERE expires_at < now()
        "#,
    )
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}
