//! `tounet-console` command-line entry point.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};

use tounet_auth::{badge, display_name};
use tounet_console::{Console, ConsoleConfig};
use tounet_observability::tracing::{self as logging, LogFormat};

/// TouNet admin console
#[derive(Parser, Debug)]
#[command(name = "tounet-console")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and keep the session for later invocations
    Login {
        username: String,
        password: String,
    },
    /// Show the logged-in user
    Whoami,
    /// List the applications the current user may open
    Apps,
    /// Drop the stored session
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(LogFormat::from_env());

    let config = ConsoleConfig::from_env().context("invalid configuration")?;
    tracing::debug!(api_url = %config.api_url, token_path = %config.token_path.display(), "starting");

    let console = Console::from_config(&config)?;

    match cli.command {
        Command::Login { username, password } => {
            let user = console
                .login_with_password(&username, &password)
                .await
                .context("login failed")?;
            println!("logged in as {} ({})", user.username, display_name(&user.status));
        }
        Command::Whoami => match console.restore().await? {
            Some(user) => {
                let badge = badge(&user.status);
                println!("{} [{}] id={}", user.username, badge.name, user.id);
            }
            None => println!("not logged in"),
        },
        Command::Apps => {
            if console.restore().await?.is_none() {
                bail!("not logged in");
            }
            for app in console.accessible_apps().await? {
                println!(
                    "{:<20} {:<30} requires {}",
                    app.app_id,
                    app.name,
                    display_name(&app.required_permission_level)
                );
            }
        }
        Command::Logout => {
            console.logout();
            println!("logged out");
        }
    }

    Ok(())
}
