use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gator::config::Config;
use gator::db::Database;
use gator::fetcher::FeedClient;
use gator::handlers::AppState;
use gator::router::{Command, Commands};
use gator::session::Session;

/// Follow RSS feeds from the terminal
#[derive(Parser)]
#[command(name = "gator", version)]
struct Args {
    /// Config file [default: $GATOR_CONFIG or ~/.gatorconfig.toml]
    #[arg(long)]
    config: Option<PathBuf>,
    /// register, login, reset, users, feeds, addfeed, follow, unfollow, following, agg, browse
    command: Option<String>,
    /// Arguments for the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Logs go to stderr so command output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let Some(name) = args.command else {
        println!("Error: no command provided");
        return ExitCode::FAILURE;
    };
    let command = Command::new(name, args.args);

    match run(args.config, &command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("Error: command `{}` failed due to {:#}", command.name, e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config_path: Option<PathBuf>, command: &Command) -> anyhow::Result<()> {
    let config_path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let mut config = Config::load_or_default(&config_path)?;
    debug!("Loaded configuration from {}", config_path.display());

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| config.db_url.clone());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;

    let session = Session::new(config.current_user_name.clone());
    let mut state = AppState::new(db, FeedClient::new()?, session);

    Commands::standard().run(&mut state, command).await?;

    // Persist identity only once the command has succeeded.
    if let Some(name) = state.session.current_user_name() {
        if config.current_user_name.as_deref() != Some(name) {
            config.set_current_user(name);
            config.save(&config_path)?;
            info!("Current user is now '{}'", name);
        }
    }

    Ok(())
}
