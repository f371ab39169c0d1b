use estatedesk_db::{DemoSeedDataset, SeedResult, VerificationResult};

use crate::commands::{load_config, migrated_pool, runtime, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;

        let seeded = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8));
        let verified = match &seeded {
            Ok(_) => DemoSeedDataset::verify(&pool)
                .await
                .map_err(|error| ("seed_verification", error.to_string(), 6u8))
                .and_then(|verification| ensure_verified(&verification)),
            Err(_) => Ok(()),
        };

        pool.close().await;
        let seeded = seeded?;
        verified?;
        Ok::<SeedResult, StepFailure>(seeded)
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", success_message(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn ensure_verified(verification: &VerificationResult) -> Result<(), StepFailure> {
    if verification.all_present {
        return Ok(());
    }
    Err(("seed_verification", verification_failure_message(&verification.checks), 6u8))
}

fn verification_failure_message(checks: &[(&'static str, bool)]) -> String {
    let failed = checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    if failed.is_empty() {
        "demo seed data did not load completely".to_string()
    } else {
        format!("demo seed verification failed for: {}", failed.join(", "))
    }
}

fn success_message(seeded: &SeedResult) -> String {
    let tables = seeded
        .tables_seeded
        .iter()
        .map(|table| format!("{} ({})", table.table, table.rows))
        .collect::<Vec<_>>();
    format!("demo catalog loaded: {}", tables.join(", "))
}
