//! copilot-auth CLI binary entry point.

use clap::Parser;
use copilot_auth::auth::SessionManager;
use copilot_auth::cli::{auth, Cli, Commands};
use copilot_auth::config::AuthConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "copilot_auth=warn".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let session = match SessionManager::from_config(AuthConfig::from_env()) {
        Ok(session) => session.with_cancellation(cancel),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Login(args) => auth::handle_login(&session, args.force).await,
        Commands::Status => auth::handle_status(&session).await,
        Commands::Token => auth::handle_token(&session).await,
        Commands::Logout => auth::handle_logout(&session).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        let hint = e.recovery().message();
        if !hint.is_empty() {
            eprintln!("{hint}");
        }
        std::process::exit(1);
    }
}
