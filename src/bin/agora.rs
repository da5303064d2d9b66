//! `agora` runs one agent society and prints its report as JSON.
//!
//! ```text
//! agora --task leader-election --agents 4
//! agora --task refcheck --offline
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde_json::Value;
use tower::BoxError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tower_agora::config::{self, AgoraConfig};
use tower_agora::games::{refcheck, LeaderElectionGame, RefCheckArena};
use tower_agora::{AgentExecutor, MockExecutor, OpenAIExecutor, TraceRecorder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Task {
    /// Agents with private scores nominate a leader
    LeaderElection,
    /// A team works shared tasks and reference-checks each other
    Refcheck,
}

#[derive(Parser)]
#[command(name = "agora")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run multi-agent leader election or peer reference checks", long_about = None)]
struct Cli {
    /// Society to run
    #[arg(long, value_enum, default_value = "leader-election")]
    task: Task,

    /// Number of agents in a leader election
    #[arg(long)]
    agents: Option<usize>,

    /// Where to write the exported trace
    #[arg(long)]
    trace_file: Option<PathBuf>,

    /// Use scripted offline agents instead of the OpenAI API
    #[arg(long)]
    offline: bool,

    /// TOML configuration file
    #[arg(long, env = "AGORA_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    fn resolve_config(&self) -> tower_agora::Result<AgoraConfig> {
        let base = match &self.config {
            Some(path) => config::from_file(path)?,
            None => AgoraConfig::default(),
        };
        let mut config = config::apply_env(base);
        if let Some(n) = self.agents {
            config.agent_count = n;
        }
        if let Some(path) = &self.trace_file {
            config.trace_file = path.clone();
        }
        Ok(config)
    }
}

async fn run<E>(task: Task, executor: E, config: &AgoraConfig) -> tower_agora::Result<Value>
where
    E: AgentExecutor + Clone + Send + 'static,
    E::Future: Send + 'static,
{
    let recorder = TraceRecorder::new();
    let report = match task {
        Task::LeaderElection => {
            let game = LeaderElectionGame::new(config.agent_count)?;
            serde_json::to_value(game.run(executor, &recorder).await?)?
        }
        Task::Refcheck => {
            let arena = RefCheckArena::new(refcheck::default_team()?)
                .review_concurrency(config.review_concurrency);
            serde_json::to_value(arena.run(executor, &recorder).await?)?
        }
    };
    recorder.write_json(&config.trace_file)?;
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    info!(task = ?cli.task, model = %config.model, offline = cli.offline, "starting run");

    let report = if cli.offline {
        run(cli.task, MockExecutor::new(), &config).await?
    } else {
        if std::env::var("OPENAI_API_KEY").is_err() {
            warn!("OPENAI_API_KEY is not set; requests will fail (try --offline)");
        }
        run(cli.task, OpenAIExecutor::from_config(&config), &config).await?
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    info!(trace_file = %config.trace_file.display(), "done");
    Ok(())
}
