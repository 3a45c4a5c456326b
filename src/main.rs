/// Version injected at compile time via SUPERSET_CLIENT_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("SUPERSET_CLIENT_VERSION") {
    Some(v) => v,
    None => "dev",
};

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use superset_client::config::Config;
use superset_client::{Collection, Object, Query, SupersetClient};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Command line client for the Superset REST API
#[derive(Parser, Debug)]
#[command(name = "superset", version = VERSION, about, long_about = None)]
struct Args {
    /// Superset server root, e.g. http://localhost:8088
    #[arg(long, env = "SUPERSET_URL", global = true)]
    url: Option<String>,

    /// Username for database login
    #[arg(short, long, env = "SUPERSET_USERNAME", global = true)]
    username: Option<String>,

    /// Password for database login
    #[arg(long, env = "SUPERSET_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Pre-issued access token; skips login
    #[arg(long, env = "SUPERSET_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Log level for debugging (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Resource {
    Dashboards,
    Charts,
    Datasets,
    Databases,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Resource(ResourceCommand),

    /// Test the connection of a registered database
    TestConnection { id: i64 },

    /// Remember the server url in the config file
    SetUrl { url: String },
}

#[derive(Subcommand, Debug)]
enum ResourceCommand {
    /// List one page of resources matching equality filters
    Find {
        resource: Resource,
        /// Equality filter; VALUE is parsed as a JSON scalar when possible
        #[arg(short, long = "filter", value_name = "COL=VALUE", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,
        #[arg(long, default_value_t = 100)]
        page_size: u32,
        #[arg(long, default_value_t = 0)]
        page: u32,
    },

    /// Show a single resource
    Get { resource: Resource, id: i64 },

    /// Count resources
    Count { resource: Resource },

    /// Delete a resource
    Delete { resource: Resource, id: i64 },

    /// Export resources into an importable file
    Export {
        resource: Resource,
        #[arg(required = true)]
        ids: Vec<i64>,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import a JSON or ZIP export
    Import {
        resource: Resource,
        file: PathBuf,
        /// Overwrite existing resources
        #[arg(long)]
        overwrite: bool,
        /// Password of a database contained in the export
        #[arg(long = "password", value_name = "DATABASE=PASSWORD", value_parser = parse_key_value)]
        passwords: Vec<(String, String)>,
    },
}

impl ResourceCommand {
    fn resource(&self) -> Resource {
        match self {
            Self::Find { resource, .. }
            | Self::Get { resource, .. }
            | Self::Count { resource }
            | Self::Delete { resource, .. }
            | Self::Export { resource, .. }
            | Self::Import { resource, .. } => *resource,
        }
    }
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    if key.is_empty() {
        return Err(format!("empty key in {raw:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Interpret a filter value as a JSON scalar, falling back to a string
fn parse_filter_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => value,
        _ => Value::String(raw.to_string()),
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(tracing_level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .init();

    tracing::debug!("superset {} started with log level: {:?}", VERSION, level);

    Some(guard)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let mut config = Config::load();

    match &args.command {
        Command::SetUrl { url } => {
            SupersetClient::new(url)?;
            config.set_url(url).context("Failed to save configuration")?;
            println!("Using {url}");
            Ok(())
        }
        Command::TestConnection { id } => {
            let client = connect(&args, &config).await?;
            test_connection(&client, *id).await
        }
        Command::Resource(command) => {
            let client = connect(&args, &config).await?;
            match command.resource() {
                Resource::Dashboards => execute(&client.dashboards(), command).await,
                Resource::Charts => execute(&client.charts(), command).await,
                Resource::Datasets => execute(&client.datasets(), command).await,
                Resource::Databases => execute(&client.databases(), command).await,
            }
        }
    }
}

async fn connect(args: &Args, config: &Config) -> Result<SupersetClient> {
    let url = config.effective_url(args.url.as_deref());
    let client = SupersetClient::new(&url)
        .with_context(|| format!("Failed to create client for {url}"))?;

    if let Some(token) = config.effective_token(args.token.as_deref()) {
        return Ok(client.with_token(token));
    }

    match (
        config.effective_username(args.username.as_deref()),
        args.password.as_deref(),
    ) {
        (Some(username), Some(password)) => {
            let mut client = client;
            client
                .login(&username, password)
                .await
                .with_context(|| format!("Failed to log in to {url} as {username}"))?;
            Ok(client)
        }
        _ => {
            tracing::warn!("No token or credentials given, requests to {} are anonymous", url);
            Ok(client)
        }
    }
}

async fn execute<T: Object>(collection: &Collection<T>, command: &ResourceCommand) -> Result<()> {
    match command {
        ResourceCommand::Find {
            filters,
            page_size,
            page,
            ..
        } => {
            let query = filters.iter().fold(
                Query::new().page_size(*page_size).page(*page),
                |query, (col, value)| query.filter(col.as_str(), parse_filter_value(value)),
            );
            let objects = collection
                .find(&query)
                .await
                .with_context(|| format!("Failed to list {}", T::NAME))?;
            print_json(&objects)
        }
        ResourceCommand::Get { id, .. } => {
            let object = collection
                .get(*id)
                .await
                .with_context(|| format!("Failed to get {} {}", T::NAME, id))?;
            print_json(&object)
        }
        ResourceCommand::Count { .. } => {
            println!("{}", collection.count().await?);
            Ok(())
        }
        ResourceCommand::Delete { id, .. } => {
            if !collection.delete(*id).await? {
                bail!("Server did not confirm deletion of {} {}", T::NAME, id);
            }
            println!("Deleted {} {}", T::NAME, id);
            Ok(())
        }
        ResourceCommand::Export { ids, output, .. } => {
            let format = collection
                .export(ids, output)
                .await
                .with_context(|| format!("Failed to export {} {:?}", T::NAME, ids))?;
            println!("Wrote {} export to {}", format.extension(), output.display());
            Ok(())
        }
        ResourceCommand::Import {
            file,
            overwrite,
            passwords,
            ..
        } => {
            let passwords: BTreeMap<String, String> = passwords.iter().cloned().collect();
            let ack = collection
                .import_file(file, *overwrite, &passwords)
                .await
                .with_context(|| format!("Failed to import {}", file.display()))?;
            print_json(&ack)
        }
    }
}

async fn test_connection(client: &SupersetClient, id: i64) -> Result<()> {
    let databases = client.databases();
    let database = databases.get(id).await?;

    if !databases.test_connection(&database).await? {
        bail!("Connection to database {:?} failed", database.database_name);
    }
    println!("Connection to database {:?} succeeded", database.database_name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_value_splits_on_first_equals() {
        assert_eq!(
            parse_key_value("sqlalchemy_uri=postgresql://a=b").unwrap(),
            ("sqlalchemy_uri".to_string(), "postgresql://a=b".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn filter_values_parse_as_scalars() {
        assert_eq!(parse_filter_value("12"), json!(12));
        assert_eq!(parse_filter_value("true"), json!(true));
        assert_eq!(parse_filter_value("Sales"), json!("Sales"));
        assert_eq!(parse_filter_value("[1,2]"), json!("[1,2]"));
    }

    #[test]
    fn cli_parses_find_with_filters() {
        let args = Args::try_parse_from([
            "superset",
            "find",
            "dashboards",
            "-f",
            "dashboard_title=Sales",
            "--page-size",
            "10",
        ])
        .unwrap();
        match args.command {
            Command::Resource(ResourceCommand::Find {
                filters, page_size, ..
            }) => {
                assert_eq!(filters, vec![("dashboard_title".to_string(), "Sales".to_string())]);
                assert_eq!(page_size, 10);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_export_requires_ids() {
        assert!(Args::try_parse_from(["superset", "export", "charts", "-o", "out.zip"]).is_err());
    }
}
