//! Loyalty CLI - points ledger operations from command line
//!
//! Usage:
//! ```bash
//! loyalty init
//! loyalty register admin --name "Root" --email root@shop.com --pin 1234
//! loyalty register customer --name "Alice" --email alice@shop.com --pin 5678
//! loyalty scan <card-code>
//! loyalty credit <customer-id> 500 --admin <admin-id> --pin 1234
//! loyalty debit <customer-id> 5 --admin <admin-id> --pin 1234
//! loyalty balance <customer-id>
//! loyalty reconcile <customer-id>
//! loyalty journal --subject <customer-id>
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use loyalty_business::LoyaltyError;
use std::path::PathBuf;

mod commands;
mod db;

use commands::{audit, identity, ledger};

/// Loyalty - points ledger with PIN-gated credit/debit
#[derive(Parser)]
#[command(name = "loyalty")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database file path
    #[arg(long, default_value = "data/loyalty.db", global = true)]
    pub db: PathBuf,

    /// Audit journal directory
    #[arg(long, default_value = "data/journal", global = true)]
    pub journal_dir: PathBuf,

    /// JSON config file (defaults + LOYALTY_* environment when absent)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize database schema
    Init {
        /// Remove the existing database first
        #[arg(long)]
        force: bool,
    },

    /// Show database status
    Status,

    /// Register a customer or administrator
    Register {
        #[command(subcommand)]
        kind: RegisterKind,
    },

    /// Administrator login (prints the digest to cache for `--resume`)
    Login {
        #[arg(long, short)]
        email: String,
        /// PIN; omit when resuming with `--cached-digest`
        #[arg(long, required_unless_present = "cached_digest")]
        pin: Option<String>,
        /// Digest cached from an earlier login
        #[arg(long)]
        cached_digest: Option<String>,
    },

    /// Check a PIN for any identity
    VerifyPin {
        identity_id: String,
        #[arg(long)]
        pin: String,
    },

    /// Resolve a scanned card code and show the balance
    Scan {
        code: String,
    },

    /// Show a customer's balance
    Balance {
        customer_id: String,
    },

    /// Show a customer's transactions
    History {
        customer_id: String,
        /// Print JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Earn points for a purchase
    Credit {
        customer_id: String,
        /// Purchase amount
        amount: String,
        #[command(flatten)]
        auth: AdminAuth,
        #[command(flatten)]
        options: AppendOptions,
    },

    /// Redeem points
    Debit {
        customer_id: String,
        /// Amount to redeem
        amount: String,
        #[command(flatten)]
        auth: AdminAuth,
        #[command(flatten)]
        options: AppendOptions,
    },

    /// Replay a customer's ledger and report divergences
    Reconcile {
        customer_id: String,
    },

    /// Read the audit journal
    Journal {
        /// Only events about this identity
        #[arg(long)]
        subject: Option<String>,
        /// Only events by this administrator
        #[arg(long)]
        actor: Option<String>,
        /// Single day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Event types to keep
        #[arg(long, value_delimiter = ',')]
        types: Option<Vec<EventTypeArg>>,
    },
}

#[derive(Subcommand)]
pub enum RegisterKind {
    /// Register a customer
    Customer {
        #[arg(long, short)]
        name: String,
        #[arg(long, short)]
        email: String,
        #[arg(long)]
        pin: String,
    },
    /// Register an administrator (the first one needs no --admin)
    Admin {
        #[arg(long, short)]
        name: String,
        #[arg(long, short)]
        email: String,
        #[arg(long)]
        pin: String,
        /// Acting administrator id
        #[arg(long, requires = "admin_pin")]
        admin: Option<String>,
        /// Acting administrator PIN
        #[arg(long)]
        admin_pin: Option<String>,
    },
}

#[derive(clap::Args)]
pub struct AdminAuth {
    /// Acting administrator id
    #[arg(long)]
    pub admin: String,
    /// Acting administrator PIN
    #[arg(long)]
    pub pin: String,
}

#[derive(clap::Args)]
pub struct AppendOptions {
    /// Payment method (defaults to config)
    #[arg(long)]
    pub payment_method: Option<String>,
    /// Idempotency token; reuse it to retry safely
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum EventTypeArg {
    Transaction,
    Registration,
    PinRejected,
    Divergence,
}

impl EventTypeArg {
    pub fn to_core_type(&self) -> loyalty_core::EventType {
        match self {
            EventTypeArg::Transaction => loyalty_core::EventType::TransactionRecorded,
            EventTypeArg::Registration => loyalty_core::EventType::IdentityRegistered,
            EventTypeArg::PinRejected => loyalty_core::EventType::PinRejected,
            EventTypeArg::Divergence => loyalty_core::EventType::ReconciliationDivergence,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<LoyaltyError>() {
            Some(err) => {
                tracing::debug!(error = %err, "Command failed");
                eprintln!("❌ {}", err.user_message());
            }
            None => eprintln!("❌ {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Ensure data directories exist
    if let Some(parent) = cli.db.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    match cli.command {
        Commands::Init { force } => {
            db::init_database(&cli.db, force).await?;
            println!("✅ Database initialized at {:?}", cli.db);
        }

        Commands::Status => {
            db::show_status(&cli.db, &cli.journal_dir).await?;
        }

        Commands::Journal {
            subject,
            actor,
            date,
            types,
        } => {
            audit::show_journal(&cli.journal_dir, subject, actor, date, types)?;
        }

        command => {
            let service = db::open_service(&cli.db, &cli.journal_dir, cli.config.as_deref()).await?;
            match command {
                Commands::Register { kind } => identity::register(&service, kind).await?,
                Commands::Login {
                    email,
                    pin,
                    cached_digest,
                } => identity::login(&service, &email, pin.as_deref(), cached_digest.as_deref()).await?,
                Commands::VerifyPin { identity_id, pin } => {
                    identity::verify_pin(&service, &identity_id, &pin).await?
                }
                Commands::Scan { code } => identity::scan(&service, &code).await?,
                Commands::Balance { customer_id } => ledger::balance(&service, &customer_id).await?,
                Commands::History { customer_id, json } => {
                    ledger::history(&service, &customer_id, json).await?
                }
                Commands::Credit {
                    customer_id,
                    amount,
                    auth,
                    options,
                } => {
                    ledger::append(
                        &service,
                        loyalty_core::OperationKind::Credit,
                        &customer_id,
                        &amount,
                        auth,
                        options,
                    )
                    .await?
                }
                Commands::Debit {
                    customer_id,
                    amount,
                    auth,
                    options,
                } => {
                    ledger::append(
                        &service,
                        loyalty_core::OperationKind::Debit,
                        &customer_id,
                        &amount,
                        auth,
                        options,
                    )
                    .await?
                }
                Commands::Reconcile { customer_id } => ledger::reconcile(&service, &customer_id).await?,
                Commands::Init { .. } | Commands::Status | Commands::Journal { .. } => {}
            }
        }
    }

    Ok(())
}
