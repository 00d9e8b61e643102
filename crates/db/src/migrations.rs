use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_TABLES: &[&str] = &[
        "medicine",
        "user_account",
        "prescription",
        "orders",
        "order_item",
        "inventory_ledger",
        "pending_confirmation",
        "refill_alert",
        "notification",
    ];

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in MANAGED_TABLES {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .expect("query sqlite_master")
            .get::<i64, _>("count");

            assert_eq!(count, 1, "expected table `{table}` to exist");
        }
    }

    #[tokio::test]
    async fn waiting_confirmation_uniqueness_is_schema_enforced() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        sqlx::query("INSERT INTO user_account (id, name, email) VALUES ('u-1', 'Demo', 'd@x.io')")
            .execute(&pool)
            .await
            .expect("insert user");

        let insert = "INSERT INTO pending_confirmation
            (id, user_id, items_json, total, status, created_at, expires_at)
            VALUES (?, 'u-1', '[]', '1.00', 'WAITING', '2026-01-01T00:00:00Z', '2026-01-01T00:10:00Z')";

        sqlx::query(insert).bind("pc-1").execute(&pool).await.expect("first waiting row");
        let second = sqlx::query(insert).bind("pc-2").execute(&pool).await;
        assert!(second.is_err(), "second WAITING row for one user must violate the unique index");
    }
}
