use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use omnisupport_agent::actions::domain_registry;
use omnisupport_agent::llm::{OpenAiChatPolicy, PolicyError};
use omnisupport_agent::orchestrator::Orchestrator;
use omnisupport_core::config::{AppConfig, ConfigError, LoadOptions};
use omnisupport_db::conversation::SqlConversationStore;
use omnisupport_db::repositories::SqlUserRepository;
use omnisupport_db::{connect_with_settings, migrations, DbPool};
use omnisupport_retrieval::{build_from_file, ChunkingParams, CorpusError};

use crate::api::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("policy corpus could not be built: {0}")]
    Corpus(#[from] CorpusError),
    #[error("reasoning policy could not be constructed: {0}")]
    Policy(#[from] PolicyError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    // The corpus is chunked once at startup; nothing at request time ever
    // triggers reindexing.
    let retriever = build_from_file(
        &config.retrieval.corpus_path,
        ChunkingParams {
            chunk_size: config.retrieval.chunk_size,
            chunk_overlap: config.retrieval.chunk_overlap,
        },
    )?;
    info!(
        event_name = "system.bootstrap.corpus_ready",
        corpus_path = %config.retrieval.corpus_path.display(),
        "policy corpus indexed"
    );

    let registry =
        domain_registry(db_pool.clone(), Arc::new(retriever), config.retrieval.top_k);
    let policy = OpenAiChatPolicy::from_config(&config.llm)?;
    let store = Arc::new(SqlConversationStore::new(db_pool.clone()));

    let orchestrator =
        Orchestrator::new(Arc::new(policy), Arc::new(registry), store.clone(), &config.agent);

    let state = AppState::new(
        Arc::new(orchestrator),
        store,
        Arc::new(SqlUserRepository::new(db_pool.clone())),
    );

    Ok(Application { config, db_pool, state })
}
