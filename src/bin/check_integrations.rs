//! Utility to check the lead store schema and the Bitrix webhook before a
//! deployment goes live.

use dotenvy::dotenv;
use parkline_leads::bitrix_client::BitrixClient;
use parkline_leads::settings::{SettingsStore, BITRIX_WEBHOOK_KEY};
use sqlx::postgres::PgPoolOptions;
use std::env;

const TABLES: [&str; 2] = ["leads", "sync_log"];

/// Main entry point for the integration check utility.
///
/// Lists the columns of the lead tables and runs a Bitrix connection test
/// with the webhook the server would use.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    match env::var("DATABASE_URL").or_else(|_| env::var("SUPABASE_DB_URL")) {
        Ok(database_url) => {
            let pool = PgPoolOptions::new().connect(&database_url).await?;

            for table in TABLES {
                let columns: Vec<(String, String)> = sqlx::query_as(
                    "SELECT column_name, data_type FROM information_schema.columns WHERE table_name = $1 ORDER BY ordinal_position"
                )
                .bind(table)
                .fetch_all(&pool)
                .await?;

                if columns.is_empty() {
                    println!("✗ {}: table missing", table);
                    continue;
                }

                println!("✓ {}", table);
                for (col, type_) in columns {
                    println!("  - {}: {}", col, type_);
                }
                println!();
            }
        }
        Err(_) => println!("✗ DATABASE_URL not set, lead store unconfigured"),
    }

    let settings_path =
        env::var("SETTINGS_PATH").unwrap_or_else(|_| "parkline-settings.json".to_string());
    let settings = SettingsStore::load(settings_path)?;
    let webhook_url = match settings.get(BITRIX_WEBHOOK_KEY).await {
        Some(saved) => Some(saved),
        None => env::var("BITRIX_WEBHOOK_URL").ok(),
    };

    let bitrix = BitrixClient::new(webhook_url)?;
    let status = bitrix.test_connection().await;
    let mark = if status.success { "✓" } else { "✗" };
    println!("{} Bitrix: {}", mark, status.message);

    Ok(())
}
