//! Database module - PostgreSQL connection and migrations

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Model artifact roles
DO $$ BEGIN
    CREATE TYPE artifact_category AS ENUM ('clustering', 'classifier');
EXCEPTION
    WHEN duplicate_object THEN NULL;
END $$;

-- Published model artifacts (immutable; payload stored inline)
CREATE TABLE IF NOT EXISTS artifacts (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    filename VARCHAR(255) NOT NULL,
    category artifact_category NOT NULL,
    size_bytes BIGINT NOT NULL,
    payload BYTEA NOT NULL,
    published_at TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ DEFAULT NOW()
);

-- Indexes for the resolver's sorted category scans
CREATE INDEX IF NOT EXISTS idx_artifacts_category_published
    ON artifacts(category, published_at DESC);
CREATE INDEX IF NOT EXISTS idx_artifacts_filename ON artifacts(filename);
"#;
