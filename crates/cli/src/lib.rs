pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "omnisupport",
    about = "Omnisupport operator CLI",
    long_about = "Operate the support-agent runtime: migrations, demo fixtures, \
                  and a terminal chat session against the local database.",
    after_help = "Examples:\n  omnisupport migrate\n  omnisupport seed\n  omnisupport chat --email test@developer.com"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset (idempotent)")]
    Seed,
    #[command(about = "Start an interactive chat session with the support agent")]
    Chat {
        #[arg(
            long,
            default_value = "test@developer.com",
            help = "Email of the customer to act as; created on first use"
        )]
        email: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Chat { email } => commands::chat::run(&email),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
