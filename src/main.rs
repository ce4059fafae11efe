//! aicommit - CLI entry point.

use std::process::ExitCode;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};

use aicommit::commands::{self, elapsed_summary};
use aicommit::commit::CommitOptions;
use aicommit::config::{Settings, config_dir};
use aicommit::interrupt::{InterruptGuard, report_flush};
use aicommit::llm::HttpChatClient;
use aicommit::logging::{Console, RunLog, init_tracing};
use aicommit::prompt::DialoguerPrompter;

/// Commit with an AI-generated message, then sync with the remote.
#[derive(Parser, Debug)]
#[command(name = "aicommit")]
#[command(about = "Stage, commit with an AI-generated message, merge and push")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Allow a commit with no changes
    #[arg(short = 'e', long)]
    allow_empty: bool,

    /// Skip git hooks
    #[arg(short = 'n', long)]
    no_verify: bool,

    /// Skip `git add`, commit only what is already staged
    #[arg(short = 's', long = "skip")]
    skip_add: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set the chat endpoint base URL (empty clears it)
    #[command(name = "set-baseURL")]
    SetBaseUrl { url: Option<String> },

    /// Set the API key; comma-separate several to pick one at random
    #[command(name = "set-key")]
    SetKey { key: Option<String> },

    /// Set the model(s); without a value, pick from the endpoint's list
    #[command(name = "set-model")]
    SetModel { model: Option<String> },

    /// Set the diff budget in characters
    #[command(name = "set-max-token")]
    SetMaxToken { max_token: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let started = Instant::now();

    let console = Console::new(RunLog::new());
    let log_root = config_dir().ok();
    let guard = InterruptGuard::install(console.clone(), log_root.clone());

    let result = run(cli, &console).await;
    drop(guard);

    let code = match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            console.error(format!("{e:#}"));
            ExitCode::FAILURE
        }
    };
    println!("{}", elapsed_summary(started.elapsed()));
    if let Some(root) = log_root {
        report_flush(&console, &root);
    }
    code
}

async fn run(cli: Cli, console: &Console) -> Result<()> {
    let mut settings = Settings::load()?;

    match cli.command {
        None => {
            let options = CommitOptions {
                allow_empty: cli.allow_empty,
                no_verify: cli.no_verify,
                skip_add: cli.skip_add,
                ..CommitOptions::default()
            };
            commands::commit::run(&mut settings, console, options).await?;
        }
        Some(Command::SetBaseUrl { url }) => {
            commands::settings::set_base_url(&mut settings, console, url.as_deref())?;
        }
        Some(Command::SetKey { key }) => {
            commands::settings::set_key(&mut settings, console, key.as_deref())?;
        }
        Some(Command::SetModel { model }) => {
            let client = HttpChatClient::new(settings.chat_endpoint())?;
            commands::settings::set_model(
                &mut settings,
                &client,
                &DialoguerPrompter,
                console,
                model.as_deref(),
            )
            .await?;
        }
        Some(Command::SetMaxToken { max_token }) => {
            commands::settings::set_max_token(&mut settings, console, &max_token)?;
        }
    }
    Ok(())
}
