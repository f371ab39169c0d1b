use serde::Serialize;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Expected row counts for each table the demo dataset writes.
const SEED_TABLES: &[SeedTableContract] = &[
    SeedTableContract { table: "department", ids: &[1, 2] },
    SeedTableContract { table: "city", ids: &[1, 2, 3] },
    SeedTableContract { table: "property_type", ids: &[1, 2, 3] },
    SeedTableContract { table: "request_type", ids: &[1, 2] },
    SeedTableContract { table: "advisor", ids: &[1, 2, 3] },
    SeedTableContract { table: "customer", ids: &[1, 2] },
    SeedTableContract { table: "property", ids: &[1, 2, 3] },
    SeedTableContract { table: "property_picture", ids: &[1, 2, 3] },
    SeedTableContract { table: "request", ids: &[1] },
    SeedTableContract { table: "report", ids: &[1] },
];

/// Demo catalog for local runs: two departments, three advisors, three
/// properties, two customers and one closed request with a report.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Loads the dataset. Rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(Self::SQL).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(SeedResult {
            tables_seeded: SEED_TABLES
                .iter()
                .map(|contract| SeededTable { table: contract.table, rows: contract.ids.len() })
                .collect(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_TABLES.len());

        for contract in SEED_TABLES {
            let present: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(1) FROM {} WHERE id IN {}",
                contract.table,
                sql_array_from_ids(contract.ids)
            ))
            .fetch_one(pool)
            .await?;
            checks.push((contract.table, present == contract.ids.len() as i64));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the seeded rows, children first.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        for contract in SEED_TABLES.iter().rev() {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE id IN {}",
                contract.table,
                sql_array_from_ids(contract.ids)
            ))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedTableContract {
    table: &'static str,
    ids: &'static [i64],
}

fn sql_array_from_ids(ids: &[i64]) -> String {
    let joined = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
    format!("({joined})")
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub tables_seeded: Vec<SeededTable>,
}

#[derive(Debug, Serialize)]
pub struct SeededTable {
    pub table: &'static str,
    pub rows: usize,
}

#[derive(Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!DemoSeedDataset::SQL.is_empty());
        for contract in SEED_TABLES {
            assert!(
                DemoSeedDataset::SQL.contains(&format!("INTO {} ", contract.table)),
                "fixture should seed {}",
                contract.table
            );
        }
    }

    #[tokio::test]
    async fn verify_seed_contract_and_idempotency() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = DemoSeedDataset::load(&pool).await.expect("load seed fixtures");
        let first_verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(first_verification.all_present, "{:?}", first_verification.checks);
        assert_eq!(first.tables_seeded.len(), SEED_TABLES.len());

        DemoSeedDataset::load(&pool).await.expect("reload seed fixtures");
        let second_verification = DemoSeedDataset::verify(&pool).await.expect("re-verify");
        assert_eq!(first_verification.checks, second_verification.checks);
    }

    #[tokio::test]
    async fn seeded_properties_each_have_an_advisor() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        DemoSeedDataset::load(&pool).await.expect("load seed fixtures");

        let orphaned: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM property WHERE advisor_id IS NULL")
                .fetch_one(&pool)
                .await
                .expect("count orphaned properties");

        assert_eq!(orphaned, 0);
    }

    #[tokio::test]
    async fn clean_removes_seeded_rows() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        DemoSeedDataset::load(&pool).await.expect("load seed fixtures");

        DemoSeedDataset::clean(&pool).await.expect("clean");

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
        assert!(verification.checks.iter().all(|(_, present)| !present));
    }
}
