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
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "department",
        "city",
        "property_type",
        "request_type",
        "request_status",
        "advisor",
        "customer",
        "property",
        "property_picture",
        "request",
        "report",
        "idx_city_department_id",
        "idx_property_advisor_id",
        "idx_property_picture_property_id",
        "idx_request_customer_id",
        "idx_request_customer_property",
        "idx_request_open_customer_property",
        "idx_report_request_id",
    ];

    async fn table_exists(pool: &sqlx::SqlitePool, name: &str) -> bool {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("check table");
        count == 1
    }

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in ["advisor", "customer", "property", "property_picture", "request", "report"] {
            assert!(table_exists(&pool, table).await, "{table} should exist");
        }
    }

    #[tokio::test]
    async fn migrations_seed_lifecycle_statuses() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let statuses: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, name FROM request_status ORDER BY id")
                .fetch_all(&pool)
                .await
                .expect("load statuses");

        assert_eq!(
            statuses,
            vec![
                (1, "Sent".to_string()),
                (2, "Assigned".to_string()),
                (12, "Cancelled".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn open_request_index_is_partial() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let sql: String = sqlx::query(
            "SELECT sql FROM sqlite_master WHERE name = 'idx_request_open_customer_property'",
        )
        .fetch_one(&pool)
        .await
        .expect("index definition")
        .get("sql");

        assert!(sql.contains("UNIQUE"));
        assert!(sql.contains("close_date IS NULL"));
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_SCHEMA_OBJECTS.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");
        assert!(
            managed_schema_signature(&pool).await.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");
        assert_eq!(
            managed_schema_signature(&pool).await,
            initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            if MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()) {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}
