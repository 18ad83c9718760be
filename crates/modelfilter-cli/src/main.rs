use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use modelfilter_core::{execute_query, preview, Catalog, Item, QueryNode, QueryResponse};
use modelfilter_storage::{fixture_items, load_items};
use serde_json::Value as JsonValue;
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(name = "modelfilter")]
#[command(about = "Evaluate model filter queries against item collections", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run a query and print the response body.
    Eval {
        #[arg(long, required_unless_present = "fixture")]
        items: Option<PathBuf>,
        /// Query file, or `-` for stdin.
        #[arg(long)]
        query: String,
        #[arg(long)]
        fixture: bool,
    },
    /// Print every category with its field names.
    Categories {
        #[arg(long, required_unless_present = "fixture")]
        items: Option<PathBuf>,
        #[arg(long)]
        fixture: bool,
    },
    /// Print a query as indented text.
    Preview {
        #[arg(long)]
        query: String,
    },
    /// Print the canonical form of a query.
    Normalize {
        #[arg(long)]
        query: String,
    },
}

fn read_query(src: &str) -> Result<JsonValue> {
    let mut raw = String::new();
    if src == "-" {
        std::io::stdin().read_to_string(&mut raw)?;
    } else {
        raw = std::fs::read_to_string(src).with_context(|| format!("reading query {src}"))?;
    }
    parse_query(&raw)
}

fn parse_query(raw: &str) -> Result<JsonValue> {
    if raw.trim().is_empty() {
        return Ok(JsonValue::Null);
    }
    serde_json::from_str(raw).context("query is not valid JSON")
}

fn collection(items: Option<PathBuf>, fixture: bool) -> Result<Vec<Item>> {
    if fixture {
        return Ok(fixture_items());
    }
    match items {
        Some(path) => {
            let items = load_items(&path).with_context(|| format!("loading {}", path.display()))?;
            debug!(count = items.len(), "loaded items");
            Ok(items)
        }
        None => bail!("either --items or --fixture is required"),
    }
}

fn eval(items: &[Item], payload: &JsonValue) -> QueryResponse {
    QueryResponse::from(execute_query(items, payload))
}

fn main() -> Result<()> {
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Eval {
            items,
            query,
            fixture,
        } => {
            let items = collection(items, fixture)?;
            let payload = read_query(&query)?;
            let resp = eval(&items, &payload);
            println!("{}", serde_json::to_string_pretty(&resp)?);
            if !resp.success {
                std::process::exit(1);
            }
        }
        Cmd::Categories { items, fixture } => {
            let items = collection(items, fixture)?;
            let catalog = Catalog::from_items(&items);
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
        Cmd::Preview { query } => {
            let payload = read_query(&query)?;
            println!("{}", preview::render(&QueryNode::from_json(&payload)));
        }
        Cmd::Normalize { query } => {
            let payload = read_query(&query)?;
            let node = QueryNode::from_json(&payload);
            if node.is_invalid() {
                bail!("query structure is not recognised");
            }
            println!("{}", serde_json::to_string_pretty(&node.to_payload())?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn eval_requires_items_or_fixture() {
        assert!(Cli::try_parse_from(["modelfilter", "eval", "--query", "q.json"]).is_err());
        assert!(
            Cli::try_parse_from(["modelfilter", "eval", "--query", "q.json", "--fixture"]).is_ok()
        );
    }

    #[test]
    fn blank_query_reads_as_missing() {
        assert_eq!(parse_query("  \n").unwrap(), JsonValue::Null);
        assert!(parse_query("{oops").is_err());
    }

    #[test]
    fn eval_against_fixture() {
        let items = collection(None, true).unwrap();
        let payload = parse_query(
            r#"{"conditions": {"category": "Constraints", "field": "Level", "operator": "does_not_contain", "value": "level"}}"#,
        )
        .unwrap();
        let resp = eval(&items, &payload);
        assert!(resp.success);
        assert_eq!(resp.db_ids, vec!["ext-009", "ext-012", "ext-014"]);
    }

    #[test]
    fn eval_without_body_fails() {
        let items = collection(None, true).unwrap();
        let resp = eval(&items, &JsonValue::Null);
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("request body is missing or empty"));
    }

    #[test]
    fn collection_needs_a_source() {
        assert!(collection(None, false).is_err());
    }
}
