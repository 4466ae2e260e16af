//! Kartica CLI - Database migrations and account management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! kartica migrate
//!
//! # Create a local user
//! kartica user create -u ana -e ana@example.com -p 'correct horse'
//! ```
//!
//! # Environment Variables
//!
//! - `KARTICA_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "kartica")]
#[command(author, version, about = "Kartica CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a local user with a password
    Create {
        /// Username (3-15 characters, a-z, 0-9 and underscore)
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (at least 6 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                email,
                password,
            } => {
                commands::user::create(&username, &email, &password).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_user_create() {
        let cli = Cli::try_parse_from([
            "kartica", "user", "create", "-u", "ana", "-e", "ana@x.com", "-p", "secret1",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::User {
                action: UserAction::Create { .. }
            })
        ));
    }
}
