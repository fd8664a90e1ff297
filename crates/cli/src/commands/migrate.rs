use omnisupport_core::config::{AppConfig, LoadOptions};
use omnisupport_db::{connect_with_settings, migrations};

use crate::commands::{CommandError, CommandResult};

pub fn run() -> CommandResult {
    match apply() {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(error) => CommandResult::from_error("migrate", error),
    }
}

fn apply() -> Result<(), CommandError> {
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

        pool.close().await;
        Ok(())
    })
}
