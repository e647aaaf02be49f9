//! rockstream CLI - run queries against a configured cluster
//!
//! Usage:
//!   rockstream query <sql> [--connection <name>] [--transport <mysql|flight>]
//!   rockstream schema <sql> [--connection <name>]
//!
//! Examples:
//!   rockstream query "SELECT * FROM sales.orders LIMIT 10"
//!   rockstream query "SELECT count(*) FROM lineitem" --connection analytics --transport flight
//!   rockstream schema "SELECT * FROM sales.orders"
//!
//! Rows are printed as JSON lines. Set `RUST_LOG=rockstream=debug` for
//! transport logs.

use clap::{Parser, Subcommand, ValueEnum};
use rockstream::{
    ClientError, Connection, ConnectionConfig, QueryContext, Settings, Statement, TransportKind,
};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rockstream")]
#[command(about = "rockstream - query an OLAP cluster over MySQL or Arrow Flight SQL")]
#[command(version)]
struct Cli {
    /// Named connection from the config file (default connection if omitted)
    #[arg(short, long, global = true)]
    connection: Option<String>,

    /// Override the configured transport
    #[arg(short, long, global = true)]
    transport: Option<TransportArg>,

    /// Cancel the command after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and print its rows as JSON lines
    Query {
        /// SQL text
        sql: String,

        /// Plan the query with EXPLAIN instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the result columns of a query without fetching rows
    Schema {
        /// SQL text
        sql: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TransportArg {
    Mysql,
    Flight,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Mysql => TransportKind::Mysql,
            TransportArg::Flight => TransportKind::Flight,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut config = match load_connection(&settings, cli.connection.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(transport) = cli.transport {
        config.transport = transport.into();
    }

    let mut ctx = QueryContext::new();
    if let Some(secs) = cli.timeout {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }

    let conn = match Connection::open_with(config, &settings.pool, &ctx).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Connection error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = match cli.command {
        Commands::Query { sql, dry_run } => cmd_query(&conn, &ctx, sql, dry_run).await,
        Commands::Schema { sql } => cmd_schema(&conn, &ctx, &sql).await,
    };

    if let Err(e) = conn.close().await {
        eprintln!("Error closing connection: {}", e);
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Query error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Pick the named connection, else the default one, else the environment.
fn load_connection(settings: &Settings, name: Option<&str>) -> Result<ConnectionConfig, String> {
    match name {
        Some(name) => settings
            .connection(name)
            .map_err(|e| format!("Error loading connection '{}': {}", name, e)),
        None if settings.connections.is_empty() => ConnectionConfig::from_env()
            .map_err(|e| format!("No config file connection and {}", e)),
        None => settings
            .default_connection()
            .map(|(_, config)| config)
            .map_err(|e| format!("Error loading default connection: {}", e)),
    }
}

async fn cmd_query(
    conn: &Connection,
    ctx: &QueryContext,
    sql: String,
    dry_run: bool,
) -> Result<(), ClientError> {
    let mut stmt = Statement::new(sql);
    if dry_run {
        stmt = stmt.dry_run();
    }

    let mut result = conn.query(ctx, &stmt).await?;
    let columns = result.rows.columns().to_vec();
    while result.next().await? {
        let values = result.rows.values()?;
        let mut line = serde_json::Map::with_capacity(columns.len());
        for (column, value) in columns.iter().zip(values) {
            line.insert(
                column.clone(),
                serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
            );
        }
        println!("{}", serde_json::Value::Object(line));
    }
    result.close();
    Ok(())
}

async fn cmd_schema(conn: &Connection, ctx: &QueryContext, sql: &str) -> Result<(), ClientError> {
    let schema = conn.query_schema(ctx, sql, &[]).await?;
    for field in &schema.fields {
        println!(
            "{}\t{:?}\t{}",
            field.name,
            field.code,
            if field.nullable { "NULL" } else { "NOT NULL" }
        );
    }
    Ok(())
}
