use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use quizroom_core::player::UserId;
use quizroom_server::auth::AuthConfig;
use quizroom_server::config::ServerConfig;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("QUIZROOM_LOG_FORMAT").is_ok_and(|v| v == "json");
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[derive(Parser)]
#[command(name = "quizroom-server", version, about = "Real-time multiplayer quiz rooms")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print a signed bearer token for a stored user id
    IssueToken {
        /// Id of the user the token identifies
        user_id: UserId,
    },
}

fn issue_token(config: &ServerConfig, user_id: UserId) -> ExitCode {
    let Some(secret) = &config.auth.token_secret else {
        eprintln!("issue-token needs QUIZROOM_TOKEN_SECRET or auth.token_secret");
        return ExitCode::FAILURE;
    };
    println!("{}", AuthConfig::new(secret.as_bytes()).issue_token(user_id));
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let config = ServerConfig::load();
    if let Some(Command::IssueToken { user_id }) = cli.command {
        return issue_token(&config, user_id);
    }

    config.validate();
    tracing::info!("Quizroom server starting");

    let store = match quizroom_server::build_store(&config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to load store: {e}");
            return ExitCode::FAILURE;
        },
    };

    let listen_addr = config.listen_addr.clone();
    let (app, _state) = quizroom_server::build_app(config, store);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {listen_addr}: {e}");
            return ExitCode::FAILURE;
        },
    };
    tracing::info!("Listening on {listen_addr}");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
