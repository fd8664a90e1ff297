//! Interactive terminal chat session against the local database.
//!
//! Uses the same orchestrator wiring as the server, minus HTTP: identity
//! comes from `--email`, a fresh thread is created per session, and the
//! loop reads one user message per line until `exit` or end of input.

use std::io::{BufRead, Write};
use std::sync::Arc;

use omnisupport_agent::actions::domain_registry;
use omnisupport_agent::context::CallerIdentity;
use omnisupport_agent::llm::OpenAiChatPolicy;
use omnisupport_agent::orchestrator::{Orchestrator, OrchestratorError};
use omnisupport_core::config::{AppConfig, LoadOptions};
use omnisupport_db::conversation::{ConversationStore, SqlConversationStore};
use omnisupport_db::repositories::{SqlUserRepository, UserRepository};
use omnisupport_db::{connect_with_settings, migrations};
use omnisupport_retrieval::{build_from_file, ChunkingParams};

use crate::commands::{CommandError, CommandResult};

pub fn run(email: &str) -> CommandResult {
    match execute(email) {
        Ok(turns) => {
            CommandResult::success("chat", format!("session ended after {turns} turn(s)"))
        }
        Err(error) => CommandResult::from_error("chat", error),
    }
}

fn execute(email: &str) -> Result<u64, CommandError> {
    let config = AppConfig::load(LoadOptions::default())
        .map_err(|error| CommandError::new("config_validation", 2, format!("configuration issue: {error}")))?;

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |error| CommandError::new("runtime_init", 3, format!("failed to initialize async runtime: {error}")),
    )?;

    runtime.block_on(session(&config, email))
}

async fn session(config: &AppConfig, email: &str) -> Result<u64, CommandError> {
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

    let retriever = build_from_file(
        &config.retrieval.corpus_path,
        ChunkingParams {
            chunk_size: config.retrieval.chunk_size,
            chunk_overlap: config.retrieval.chunk_overlap,
        },
    )
    .map_err(|error| CommandError::new("corpus", 6, error.to_string()))?;

    let registry = domain_registry(pool.clone(), Arc::new(retriever), config.retrieval.top_k);
    let policy = OpenAiChatPolicy::from_config(&config.llm)
        .map_err(|error| CommandError::new("policy_init", 7, error.to_string()))?;
    let store = Arc::new(SqlConversationStore::new(pool.clone()));
    let orchestrator =
        Orchestrator::new(Arc::new(policy), Arc::new(registry), store.clone(), &config.agent);

    let users = SqlUserRepository::new(pool.clone());
    let user = users
        .find_or_create_by_email(email)
        .await
        .map_err(|error| CommandError::new("identity", 8, error.to_string()))?;
    let caller = CallerIdentity::new(user.id, user.email.clone());

    let thread = store
        .create_thread(caller.user_id, "CLI session")
        .await
        .map_err(|error| CommandError::new("thread_create", 8, error.to_string()))?;

    println!("Connected as {} on thread {}. Type 'exit' to quit.", user.email, thread.thread_id);

    let stdin = std::io::stdin();
    let mut turns = 0u64;
    loop {
        print!("you> ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) => return Err(CommandError::new("stdin", 9, error.to_string())),
        }

        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        match orchestrator.run_turn(&caller, &thread.thread_id, message).await {
            Ok(outcome) => {
                turns += 1;
                if !outcome.tools_invoked.is_empty() {
                    println!("[actions: {}]", outcome.tools_invoked.join(", "));
                }
                println!("agent> {}", outcome.final_text);
            }
            Err(OrchestratorError::Policy(error)) => {
                eprintln!("agent unavailable: {error}");
            }
            Err(OrchestratorError::Store(error)) => {
                return Err(CommandError::new("storage", 10, error.to_string()));
            }
        }
    }

    pool.close().await;
    Ok(turns)
}
