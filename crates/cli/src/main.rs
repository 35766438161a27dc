//! MiBooks CLI - cart session client for the Magento storefront.
//!
//! # Usage
//!
//! ```bash
//! # Show the current cart (creates an anonymous cart on first use)
//! mibooks show
//!
//! # Add two copies of a book
//! mibooks add 978-0441478125 2
//!
//! # Change a line's quantity (0 or less removes the line)
//! mibooks update 12 3
//!
//! # Remove a line
//! mibooks remove 12
//!
//! # Merge the anonymous cart into the customer cart (needs MAGENTO_CUSTOMER_TOKEN)
//! mibooks sign-in
//! ```
//!
//! The cart identifier is kept in `MIBOOKS_CART_STORE_PATH`
//! (default `.mibooks/cart.json`), so consecutive invocations share a cart.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use mibooks_storefront::config::StorefrontConfig;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "mibooks")]
#[command(author, version, about = "MiBooks cart client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the cart contents
    Show,
    /// Add a product to the cart
    Add {
        /// Product SKU
        sku: String,

        /// Number of units to add
        #[arg(default_value_t = 1)]
        quantity: i64,
    },
    /// Set the quantity of a line item (0 or less removes it)
    Update {
        /// Line item ID
        line: i32,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line item
    Remove {
        /// Line item ID
        line: i32,
    },
    /// Merge one cart into another and make the destination active
    Merge {
        /// Cart to merge from
        source: String,

        /// Cart to merge into
        destination: String,
    },
    /// Adopt the signed-in customer's cart, merging the anonymous cart into it
    SignIn,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Warnings and errors become Sentry events; info and debug become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mibooks_storefront=info,mibooks=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &StorefrontConfig) -> Result<(), commands::CommandError> {
    let session = commands::open_session(config)?;

    match cli.command {
        Commands::Show => commands::cart::show(&session).await,
        Commands::Add { sku, quantity } => commands::cart::add(&session, &sku, quantity).await,
        Commands::Update { line, quantity } => {
            commands::cart::update(&session, line, quantity).await
        }
        Commands::Remove { line } => commands::cart::remove(&session, line).await,
        Commands::Merge {
            source,
            destination,
        } => commands::cart::merge(&session, &source, &destination).await,
        Commands::SignIn => commands::cart::sign_in(&session, config).await,
    }
}
