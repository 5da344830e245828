//! Command-line client for the graph database HTTP transactional endpoint
//!
//! Runs single queries atomically, or a file of statements in one
//! long-running transaction.

mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use graphtx_client::{ContextKey, Error as ClientError, GraphClient, Statement};
use graphtx_config::{ClientConfig, ConfigLoader, Credentials};
use graphtx_protocol::{ResultKind, StatementResult};
use output::OutputFormat;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "graphtx")]
#[command(about = "Run queries against a graph database over its HTTP transaction API", long_about = None)]
struct Cli {
    /// Config file (TOML or JSON); defaults to ~/.config/graphtx/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the REST API
    #[arg(long, env = "GRAPHTX_URL", global = true)]
    url: Option<String>,

    /// Basic auth username
    #[arg(long, env = "GRAPHTX_USERNAME", global = true)]
    username: Option<String>,

    /// Basic auth password
    #[arg(long, env = "GRAPHTX_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one query in an atomic transaction
    Query {
        /// Query text
        query: String,

        /// Return a graph instead of rows
        #[arg(long)]
        graph: bool,

        /// Include execution statistics
        #[arg(long)]
        stats: bool,

        /// Query parameter as name=value; the value is parsed as JSON, else taken as a string
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, serde_json::Value)>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Run each non-empty line of a file in one long-running transaction
    Batch {
        /// File with one query per line
        file: PathBuf,

        /// Flush after this many statements (0 sends everything with the commit)
        #[arg(long, default_value_t = 0)]
        flush_every: usize,
    },

    /// Print the effective configuration
    Config,
}

fn parse_param(raw: &str) -> std::result::Result<(String, serde_json::Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("parameter name is empty in '{}'", raw));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

async fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ConfigLoader::load_unvalidated(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;

    if let Some(url) = &cli.url {
        config.base_url = url.clone();
    }
    if let Some(username) = &cli.username {
        let password = cli
            .password
            .clone()
            .or_else(|| config.credentials.take().map(|c| c.password))
            .unwrap_or_default();
        config.credentials = Some(Credentials::new(username.clone(), password));
    } else if let (Some(password), Some(credentials)) = (&cli.password, config.credentials.as_mut()) {
        credentials.password = password.clone();
    }

    config.validate().context("Invalid configuration")?;
    info!("Using graph endpoint {}", config.base_url);
    Ok(config)
}

async fn run_query(
    client: &GraphClient,
    query: String,
    graph: bool,
    stats: bool,
    params: Vec<(String, serde_json::Value)>,
    format: OutputFormat,
) -> Result<()> {
    let kind = if graph { ResultKind::Graph } else { ResultKind::Row };
    let mut statement = Statement::new(query, kind);
    for (name, value) in params {
        statement.set_param(name, value);
    }
    statement.set_include_stats(stats);

    let statement = client.execute(statement).await.context("Query failed")?;

    match (statement.result(), format) {
        (Some(StatementResult::Rows(rows)), OutputFormat::Table) => {
            println!("{}", output::rows_table(rows))
        }
        (Some(StatementResult::Rows(rows)), OutputFormat::Json) => {
            println!("{}", output::to_json(rows)?)
        }
        (Some(StatementResult::Graph(graph)), OutputFormat::Table) => {
            println!("{}", output::graph_table(graph))
        }
        (Some(StatementResult::Graph(graph)), OutputFormat::Json) => {
            println!("{}", output::to_json(graph)?)
        }
        (None, _) => bail!("Server returned no result for the query"),
    }

    if let Some(stats) = statement.stats() {
        match format {
            OutputFormat::Table => println!("{}", output::stats_table(stats)),
            OutputFormat::Json => println!("{}", output::to_json(stats)?),
        }
    }
    Ok(())
}

async fn run_batch(client: &GraphClient, file: PathBuf, flush_every: usize) -> Result<()> {
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let queries: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//"))
        .map(str::to_string)
        .collect();

    if queries.is_empty() {
        warn!("No statements in {}", file.display());
        return Ok(());
    }
    info!("Running {} statements from {}", queries.len(), file.display());

    let outcome = client
        .in_transaction(ContextKey::unique(), move |tx| {
            Box::pin(async move {
                let mut executed = Vec::with_capacity(queries.len());
                for (index, query) in queries.into_iter().enumerate() {
                    executed.push(tx.add(Statement::row(query))?);
                    if flush_every > 0 && (index + 1) % flush_every == 0 {
                        debug!("Flushing after statement {}", index + 1);
                        tx.flush().await?;
                    }
                }
                Ok(executed)
            })
        })
        .await;

    let executed: Vec<Arc<Statement>> = match outcome {
        Ok(executed) => executed,
        Err(err @ (ClientError::RemoteStatement(_) | ClientError::RemoteMulti(_))) => {
            return Err(err).context("Server rejected the batch; transaction rolled back")
        }
        Err(err) => return Err(err).context("Batch failed"),
    };

    for (index, statement) in executed.iter().enumerate() {
        let rows = statement.row_set().map_or(0, |rows| rows.len());
        println!("{:>4}  {:>6} rows  {}", index + 1, rows, statement.query());
    }
    println!("Committed {} statements", executed.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli).await?;

    match cli.command {
        Commands::Config => {
            let rendered = toml::to_string_pretty(&config.redacted())
                .context("Failed to render configuration")?;
            print!("{}", rendered);
            Ok(())
        }
        Commands::Query {
            query,
            graph,
            stats,
            params,
            format,
        } => {
            let client = GraphClient::from_config(&config).context("Failed to create client")?;
            run_query(&client, query, graph, stats, params, format).await
        }
        Commands::Batch { file, flush_every } => {
            let client = GraphClient::from_config(&config).context("Failed to create client")?;
            run_batch(&client, file, flush_every).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_values_parse_as_json_or_string() {
        assert_eq!(
            parse_param("age=36").unwrap(),
            ("age".to_string(), serde_json::json!(36))
        );
        assert_eq!(
            parse_param("tags=[\"a\",\"b\"]").unwrap().1,
            serde_json::json!(["a", "b"])
        );
        assert_eq!(
            parse_param("name=Ada").unwrap().1,
            serde_json::json!("Ada")
        );
        assert_eq!(
            parse_param("expr=a=b").unwrap(),
            ("expr".to_string(), serde_json::json!("a=b"))
        );
    }

    #[test]
    fn malformed_params_are_rejected() {
        assert!(parse_param("no-equals").is_err());
        assert!(parse_param("=1").is_err());
    }

    #[tokio::test]
    async fn url_flag_overrides_invalid_file_value() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = \"localhost:7474\"\n").unwrap();
        let path = path.to_string_lossy().into_owned();

        let cli = Cli::try_parse_from([
            "graphtx",
            "--config",
            path.as_str(),
            "--url",
            "http://db:7474/db/data",
            "config",
        ])
        .unwrap();
        let config = load_config(&cli).await.unwrap();
        assert_eq!(config.base_url, "http://db:7474/db/data");

        let cli = Cli::try_parse_from(["graphtx", "--config", path.as_str(), "config"]).unwrap();
        assert!(load_config(&cli).await.is_err());
    }

    #[test]
    fn cli_parses_query_flags() {
        let cli = Cli::try_parse_from([
            "graphtx",
            "--url",
            "http://db:7474/db/data",
            "query",
            "MATCH (n) RETURN n",
            "--graph",
            "--param",
            "limit=5",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.url.as_deref(), Some("http://db:7474/db/data"));
        match cli.command {
            Commands::Query {
                graph,
                params,
                format,
                ..
            } => {
                assert!(graph);
                assert_eq!(params.len(), 1);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
