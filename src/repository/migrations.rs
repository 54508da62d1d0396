//! Database migrations.
//!
//! Migrations are compiled in from `src/migrations` and applied in order.
//! Applied names are recorded in `__schema_migrations`; each migration runs
//! in its own transaction.

use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel_async::{AsyncConnection, RunQueryDsl, SimpleAsyncConnection};
use tracing::{debug, info};

use super::diesel_pool::{AsyncSqlitePool, DieselError};
use crate::migrations::registry;

const LEDGER_DDL: &str = "CREATE TABLE IF NOT EXISTS __schema_migrations (
    name TEXT PRIMARY KEY NOT NULL,
    applied_at TEXT NOT NULL
)";

#[derive(QueryableByName)]
struct AppliedMigration {
    #[diesel(sql_type = Text)]
    name: String,
}

/// Names of migrations already applied, in application order.
pub async fn applied_migrations(pool: &AsyncSqlitePool) -> Result<Vec<String>, DieselError> {
    let mut conn = pool.get().await?;
    conn.batch_execute(LEDGER_DDL).await?;
    let rows: Vec<AppliedMigration> =
        diesel::sql_query("SELECT name FROM __schema_migrations ORDER BY applied_at, name")
            .load(&mut conn)
            .await?;
    Ok(rows.into_iter().map(|r| r.name).collect())
}

/// Apply pending migrations. Returns the names applied by this call.
pub async fn run_migrations(pool: &AsyncSqlitePool) -> Result<Vec<&'static str>, DieselError> {
    let applied = applied_migrations(pool).await?;
    let mut conn = pool.get().await?;
    let mut newly_applied = Vec::new();

    for migration in registry() {
        if applied.iter().any(|name| name == migration.name) {
            debug!("Migration {} already applied", migration.name);
            continue;
        }

        let applied_at = Utc::now().to_rfc3339();
        conn.transaction(|conn| {
            Box::pin(async move {
                for statement in migration.statements {
                    conn.batch_execute(statement).await?;
                }
                diesel::sql_query(
                    "INSERT INTO __schema_migrations (name, applied_at) VALUES (?, ?)",
                )
                .bind::<Text, _>(migration.name)
                .bind::<Text, _>(applied_at.as_str())
                .execute(conn)
                .await?;
                Ok::<_, DieselError>(())
            })
        })
        .await?;

        info!("Applied migration: {}", migration.name);
        newly_applied.push(migration.name);
    }

    if newly_applied.is_empty() {
        info!("No pending migrations");
    }
    Ok(newly_applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_migrations_apply_once() {
        let dir = tempdir().unwrap();
        let pool = AsyncSqlitePool::from_path(&dir.path().join("menus.db"));

        let first = run_migrations(&pool).await.unwrap();
        assert_eq!(first, vec!["0001_initial_schema", "0002_nutrition"]);

        let second = run_migrations(&pool).await.unwrap();
        assert!(second.is_empty());

        let applied = applied_migrations(&pool).await.unwrap();
        assert_eq!(applied.len(), 2);
    }
}
