//! Database initialization, status, and service wiring

use anyhow::{Context, Result};
use loyalty_business::{LoyaltyConfig, LoyaltyService, ServiceContext};
use loyalty_persistence::sqlite::create_schema;
use loyalty_persistence::{Database, JournalReader};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

pub fn db_url(db_path: &Path) -> String {
    format!("sqlite:{}", db_path.display())
}

/// Initialize the database with schema
pub async fn init_database(db_path: &Path, force: bool) -> Result<()> {
    if force && db_path.exists() {
        std::fs::remove_file(db_path).context("Failed to remove existing database")?;
        println!("🗑️  Removed existing database");
    }

    let options = SqliteConnectOptions::from_str(&db_url(db_path))?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    create_schema(&pool).await.context("Failed to create schema")?;

    pool.close().await;
    Ok(())
}

/// Show database status
pub async fn show_status(db_path: &Path, journal_dir: &Path) -> Result<()> {
    if !db_path.exists() {
        println!("❌ Database not found at {:?}", db_path);
        println!("   Run 'loyalty init' to create the database");
        return Ok(());
    }

    let pool = SqlitePool::connect(&db_url(db_path))
        .await
        .context("Failed to open database")?;

    println!("📊 Database Status");
    println!("   Path: {:?}", db_path);
    println!();

    let admins = count(&pool, "SELECT COUNT(*) FROM identities WHERE kind = 'admin'").await?;
    let customers = count(&pool, "SELECT COUNT(*) FROM identities WHERE kind = 'customer'").await?;
    let transactions = count(&pool, "SELECT COUNT(*) FROM transactions").await?;
    let malformed = count(
        &pool,
        "SELECT COUNT(*) FROM transactions WHERE resulting_balance IS NULL",
    )
    .await?;

    println!("   Administrators: {}", admins);
    println!("   Customers:      {}", customers);
    println!("   Transactions:   {}", transactions);
    if malformed > 0 {
        println!("   ⚠️  Without points: {}", malformed);
    }

    let events = JournalReader::new(journal_dir).read_all().map(|e| e.len()).unwrap_or(0);
    println!("   Journal events: {}", events);

    pool.close().await;
    Ok(())
}

async fn count(pool: &SqlitePool, sql: &str) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(sql)
        .fetch_one(pool)
        .await
        .with_context(|| format!("Query failed: {}", sql))?;
    Ok(row.0)
}

/// Open the store + journal and build the service
pub async fn open_service(
    db_path: &Path,
    journal_dir: &Path,
    config_path: Option<&Path>,
) -> Result<LoyaltyService> {
    let config = match config_path {
        Some(path) => LoyaltyConfig::from_file(path)?,
        None => LoyaltyConfig::from_env()?,
    };

    let db = Database::open(&db_url(db_path), journal_dir, config.store_timeout())
        .await
        .with_context(|| format!("Failed to open database {:?}", db_path))?;

    Ok(LoyaltyService::new(ServiceContext::from_database(&db, config)?))
}
