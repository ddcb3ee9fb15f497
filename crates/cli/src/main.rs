//! Shop Mailchimp CLI - migrations, settings and manual sync.
//!
//! # Usage
//!
//! ```bash
//! # Create the mailchimp schema and tables
//! smc-cli migrate
//!
//! # Show a shop's settings (API key masked)
//! smc-cli settings show --shop 1
//!
//! # Configure and enable a shop
//! smc-cli settings set --shop 1 --api-key abc-us6 --list-id 9f2c1d --enabled true
//!
//! # Push one email to a shop's list
//! smc-cli sync --shop 1 --email jane@example.com
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "smc-cli")]
#[command(author, version, about = "Shop Mailchimp addon CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Inspect or change a shop's Mailchimp settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Add or update one email in a shop's Mailchimp list
    Sync {
        /// Shop ID
        #[arg(short, long)]
        shop: i64,

        /// Email address to sync
        #[arg(short, long)]
        email: String,

        /// Platform contact the email belongs to
        #[arg(short, long)]
        contact: Option<i64>,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the shop's settings
    Show {
        /// Shop ID
        #[arg(short, long)]
        shop: i64,
    },
    /// Change settings; omitted options keep their stored value
    Set {
        /// Shop ID
        #[arg(short, long)]
        shop: i64,

        /// Mailchimp API key (empty string clears it)
        #[arg(long)]
        api_key: Option<String>,

        /// Audience list ID
        #[arg(long)]
        list_id: Option<String>,

        /// API username
        #[arg(long)]
        username: Option<String>,

        /// Turn the integration on or off
        #[arg(long)]
        enabled: Option<bool>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Settings { action } => match action {
            SettingsAction::Show { shop } => commands::settings::show(shop).await?,
            SettingsAction::Set {
                shop,
                api_key,
                list_id,
                username,
                enabled,
            } => {
                let changes = commands::settings::SettingsChanges {
                    api_key,
                    list_id,
                    username,
                    enabled,
                };
                commands::settings::set(shop, changes).await?;
            }
        },
        Commands::Sync {
            shop,
            email,
            contact,
        } => commands::sync::email(shop, &email, contact).await?,
    }
    Ok(())
}
