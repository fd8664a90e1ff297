use omnisupport_core::config::{AppConfig, LoadOptions};
use omnisupport_db::fixtures::{DemoDataset, SeedSummary};
use omnisupport_db::{connect_with_settings, migrations};

use crate::commands::{CommandError, CommandResult};

pub fn run() -> CommandResult {
    match load() {
        Ok(summary) => CommandResult::success(
            "seed",
            format!(
                "demo dataset loaded: {} user(s), {} item(s), {} order(s)",
                summary.users, summary.items, summary.orders
            ),
        ),
        Err(error) => CommandResult::from_error("seed", error),
    }
}

fn load() -> Result<SeedSummary, CommandError> {
    let config = AppConfig::load(LoadOptions::default())
        .map_err(|error| CommandError::new("config_validation", 2, format!("configuration issue: {error}")))?;

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |error| CommandError::new("runtime_init", 3, format!("failed to initialize async runtime: {error}")),
    )?;

    runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| CommandError::new("db_connectivity", 4, error.to_string()))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandError::new("migration", 5, error.to_string()))?;

        let summary = DemoDataset::load(&pool)
            .await
            .map_err(|error| CommandError::new("seed_execution", 5, error.to_string()))?;

        let verification = DemoDataset::verify(&pool)
            .await
            .map_err(|error| CommandError::new("seed_verification", 6, error.to_string()))?;

        pool.close().await;

        if verification.all_present {
            return Ok(summary);
        }

        let failed_checks = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();
        Err(CommandError::new(
            "seed_verification",
            6,
            format!("seed verification failed for checks: {}", failed_checks.join(", ")),
        ))
    })
}
