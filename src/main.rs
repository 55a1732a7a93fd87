#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

use anyhow::Result;
use clap::Parser;
use ilirion::config::Config;
use ilirion::knowledge::StaticKnowledgeBase;
use ilirion::orchestrator::Orchestrator;
use ilirion::persona;
use ilirion::providers::DeepSeekProvider;
use ilirion::research::CannedResearch;
use ilirion::sessions::{SessionStore, Tier};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Ilirion — Albanian-speaking conversational assistant.
#[derive(Parser)]
#[command(name = "ilirion", version, about)]
struct Cli {
    /// One-shot message; omit to start an interactive session.
    message: Option<String>,

    /// Conversation identifier (defaults to a fresh random key).
    #[arg(long)]
    session: Option<String>,

    /// Use the elevated capacity tier (larger memory window and output
    /// ceiling).
    #[arg(long)]
    elevated: bool,

    /// Enhance an image prompt instead of chatting.
    #[arg(long)]
    image: bool,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let config = Config::load_or_init()?;

    let store = Arc::new(SessionStore::new(
        persona::SYSTEM_PROMPT,
        config.memory.eviction_watermark,
        config.memory.eviction_fraction,
    ));
    let orchestrator = Orchestrator::new(
        Arc::new(DeepSeekProvider::new(&config)),
        Arc::new(StaticKnowledgeBase::new()),
        Arc::new(CannedResearch::new()),
        store,
        config.memory,
    );

    let tier = if cli.elevated {
        Tier::Elevated
    } else {
        Tier::Standard
    };
    let session_key = cli
        .session
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    if cli.image {
        let prompt = cli.message.unwrap_or_default();
        println!("{}", orchestrator.generate_image(&prompt).await);
        return Ok(());
    }

    if let Some(message) = cli.message {
        let reply = orchestrator.complete(&message, tier, Some(&session_key)).await;
        println!("{reply}");
        return Ok(());
    }

    repl(&orchestrator, tier, &session_key).await
}

/// Interactive loop: one line in, one reply out. `exit` or `dil` quits.
async fn repl(orchestrator: &Orchestrator, tier: Tier, session_key: &str) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all("Ilirion është gati. Shkruaj 'dil' për të mbyllur.\n".as_bytes())
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("dil") {
            break;
        }

        let reply = orchestrator.complete(message, tier, Some(session_key)).await;
        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }

    Ok(())
}
