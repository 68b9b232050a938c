use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pluto::channels::{LogChannel, OutboundChannel, TwilioChannel};
use pluto::db::{self, Embed, Embedder, UserRepo};
use pluto::{
    Config, ContextAggregator, ContextSources, HabitEngine, MemoryStore, ProactiveAgent,
    ProactiveScheduler,
};

/// How long shutdown waits for the in-flight cycle
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Pluto - proactive personal assistant daemon
#[derive(Parser)]
#[command(name = "pluto", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/pluto/config.toml)
    #[arg(short, long, env = "PLUTO_CONFIG")]
    config: Option<PathBuf>,

    /// Database path, overriding the config file
    #[arg(long)]
    db: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run a single proactive cycle and exit
    #[arg(long)]
    once: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Register a user by phone number
    AddUser {
        /// Phone number in E.164 form
        phone: String,
        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Run habit analysis for a user now
    Analyze {
        /// User ID
        #[arg(short, long)]
        user: String,
    },
    /// Print ranked suggestions for a user
    Suggest {
        /// User ID
        #[arg(short, long)]
        user: String,
        /// Maximum suggestions
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = match cli.verbose {
        0 => "info,pluto=info",
        1 => "info,pluto=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db_path) = cli.db {
        config.db_path = db_path;
    }
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let pool = db::init(&config.db_path)?;

    let mut memories = MemoryStore::new(pool.clone(), config.memory.clone());
    if let Some(key) = config.openai_api_key.take() {
        let embedder = match config.embedding_model.take() {
            Some(model) => Embedder::with_model(key, model)?,
            None => Embedder::new(key)?,
        };
        memories = memories.with_embedder(Arc::new(embedder) as Arc<dyn Embed>);
    } else {
        tracing::info!("no OpenAI key, semantic recall disabled");
    }

    let habits = HabitEngine::new(pool.clone(), memories.clone(), config.habits.clone());

    let suggest_for = match cli.command {
        Some(Command::AddUser { phone, name }) => {
            let user = UserRepo::new(pool).find_or_create(&phone, name.as_deref())?;
            println!("{}", user.id);
            return Ok(());
        }
        Some(Command::Analyze { user }) => {
            let report = habits.analyze(&user)?;
            println!(
                "scanned {} memories: {} habits created, {} updated",
                report.memories_scanned, report.created, report.updated
            );
            return Ok(());
        }
        Some(Command::Suggest { user, limit }) => Some((user, limit)),
        None => None,
    };

    let context = ContextAggregator::new(
        memories.clone(),
        habits.clone(),
        ContextSources::default(),
        config.context.clone(),
    );

    let channel: Arc<dyn OutboundChannel> = match config.twilio.take() {
        Some(twilio) => Arc::new(TwilioChannel::new(twilio)),
        None => {
            tracing::info!("no Twilio credentials, messages will be logged only");
            Arc::new(LogChannel)
        }
    };

    let agent = Arc::new(ProactiveAgent::new(
        &pool,
        memories,
        habits,
        context,
        channel,
        config.proactive.clone(),
    ));

    if let Some((user, limit)) = suggest_for {
        let limit = limit.unwrap_or(config.proactive.suggestion_limit);
        for suggestion in agent.suggest(&user, limit).await? {
            println!(
                "[{}] {} ({:.2})",
                suggestion.priority, suggestion.message, suggestion.confidence
            );
        }
        return Ok(());
    }

    let scheduler = ProactiveScheduler::new(agent);

    if cli.once {
        scheduler.run_cycle(Utc::now()).await?;
        return Ok(());
    }

    let handle = scheduler.start();
    tracing::info!("pluto ready");

    tokio::signal::ctrl_c().await?;
    if !handle.stop_within(SHUTDOWN_GRACE).await {
        tracing::warn!("in-flight cycle did not finish before shutdown");
    }

    Ok(())
}
