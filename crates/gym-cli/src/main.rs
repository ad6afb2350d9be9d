use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use gym_core::config::DatabaseConfig;
use gym_sync::{Collection, PgSyncStore, SyncOrchestrator, SyncPayload};
use serde::Serialize;
use sqlx::{Pool, Postgres};
use std::io::Read;
use std::path::Path;

#[derive(Parser)]
#[command(name = "gym", version, about = "Gym cloud sync CLI")]
struct Cli {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Migrate,
    /// Apply a desktop sync payload and print the result.
    Sync(SyncArgs),
    /// Print the most recent sync time across all collections.
    LastSync(OutputArgs),
    Status,
    /// Delete every synced row and restart identities.
    Reset {
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(Args)]
struct SyncArgs {
    /// Payload file, or `-` for stdin.
    #[arg(long)]
    file: String,
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct OutputArgs {
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    gym_core::logging::init("gym-cli");

    match cli.command {
        Commands::Migrate => {
            let pool = connect(cli.database_url).await?;
            gym_core::migrations::run(&pool).await?;
        }
        Commands::Sync(args) => {
            let raw = read_payload(&args.file)?;
            let payload = SyncPayload::from_json(&raw)?;
            let pool = connect(cli.database_url).await?;
            let sync = SyncOrchestrator::new(PgSyncStore::new(pool));
            let result = sync.sync(&payload).await;
            println!("{}", render(&result, args.pretty)?);
            if !result.success {
                bail!("sync finished with {} error(s)", result.error_messages().len());
            }
        }
        Commands::LastSync(args) => {
            let pool = connect(cli.database_url).await?;
            let sync = SyncOrchestrator::new(PgSyncStore::new(pool));
            println!("{}", render(&sync.last_sync_time().await, args.pretty)?);
        }
        Commands::Status => {
            let pool = connect(cli.database_url).await?;
            gym_core::db::check_ready(&pool)
                .await
                .context("database is not ready")?;
            let output = serde_json::json!({
                "status": "ok",
                "timestamp": chrono::Utc::now(),
            });
            println!("{}", render(&output, false)?);
        }
        Commands::Reset { confirm } => {
            if !confirm {
                bail!("reset deletes every synced row; pass --confirm to proceed");
            }
            let pool = connect(cli.database_url).await?;
            sqlx::query(&reset_statement()).execute(&pool).await?;
            tracing::warn!("sync tables truncated");
        }
    }

    Ok(())
}

async fn connect(database_url: Option<String>) -> Result<Pool<Postgres>> {
    let config = match database_url {
        Some(url) => DatabaseConfig::with_url(url)?,
        None => DatabaseConfig::from_env()?,
    };
    gym_core::db::connect(&config).await
}

fn read_payload(source: &str) -> Result<String> {
    if source == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read payload from stdin")?;
        return Ok(raw);
    }
    let path = Path::new(source);
    if !path.is_file() {
        return Err(anyhow!("payload file not found: {}", path.display()));
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read payload: {}", path.display()))
}

fn render<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(rendered)
}

/// Children first so the statement reads in dependency order.
fn reset_statement() -> String {
    let tables = Collection::ALL
        .iter()
        .rev()
        .map(|collection| collection.table())
        .collect::<Vec<_>>()
        .join(", ");
    format!("TRUNCATE {tables} RESTART IDENTITY CASCADE")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_sync_command() {
        let cli = Cli::try_parse_from([
            "gym",
            "--database-url",
            "postgres://localhost/gym",
            "sync",
            "--file",
            "batch.json",
            "--pretty",
        ])
        .unwrap();
        assert_eq!(cli.database_url.as_deref(), Some("postgres://localhost/gym"));
        let Commands::Sync(args) = cli.command else {
            panic!("expected sync command");
        };
        assert_eq!(args.file, "batch.json");
        assert!(args.pretty);
    }

    #[test]
    fn sync_requires_a_file() {
        assert!(Cli::try_parse_from(["gym", "sync"]).is_err());
    }

    #[test]
    fn reset_defaults_to_unconfirmed() {
        let cli = Cli::try_parse_from(["gym", "reset"]).unwrap();
        assert!(matches!(cli.command, Commands::Reset { confirm: false }));
    }

    #[test]
    fn reads_payload_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"staff":[{{"id":1,"fullName":"Coach"}}]}}"#).unwrap();

        let raw = read_payload(file.path().to_str().unwrap()).unwrap();
        let payload = SyncPayload::from_json(&raw).unwrap();

        assert_eq!(payload.staff.len(), 1);
        assert_eq!(payload.staff[0].full_name, "Coach");
    }

    #[test]
    fn missing_payload_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        let err = read_payload(missing.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("payload file not found"));
    }

    #[test]
    fn render_switches_on_pretty() {
        let value = serde_json::json!({ "lastSyncAt": null });
        assert_eq!(render(&value, false).unwrap(), r#"{"lastSyncAt":null}"#);
        assert!(render(&value, true).unwrap().contains('\n'));
    }

    #[test]
    fn reset_truncates_every_sync_table() {
        let statement = reset_statement();
        assert!(statement.starts_with("TRUNCATE gym.staff_attendance, gym.staff,"));
        assert!(statement.ends_with("gym.services RESTART IDENTITY CASCADE"));
        for collection in Collection::ALL {
            assert!(statement.contains(collection.table()));
        }
    }
}
