//! # bj: body-JSON filter compiler CLI
//!
//! - `bj compile <key> <op> [value]`: WHERE fragment plus bound arguments.
//! - `bj plan <key> <op> [value]`: the traversal plan tree(s).
//! - `bj group-by <key>`: ARRAY JOIN clauses and field expression.
//! - `bj types [--prefix p]`: cached path types as a table.
//! - `bj watch`: run the background refresh loops and report cache stats.
//!
//! Types come from `--types <fixture.json>` when given, otherwise from the
//! ClickHouse catalog configured in `--config`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tabled::{Table, Tabled};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bj_cache::{spawn_refresh_tasks, ClickHouseCatalog, Config, PathTypeCache};
use bj_core::{FieldKey, ObservedType, Operator, TypeLookup};
use bj_plan::{ArgsBuilder, Compiler};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Compile log-body JSON filters into ClickHouse SQL.
#[derive(Parser)]
#[command(name = "bj", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, global = true, default_value = "bj.toml")]
    config: PathBuf,

    /// Static type fixture (JSON object: path -> [types]) used instead of the catalog
    #[arg(long, global = true)]
    types: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a filter into a WHERE fragment.
    Compile {
        key: String,
        /// Operator, e.g. `=`, `contains`, `not in`, `exists`
        op: String,
        /// Literal; parsed as JSON when possible, otherwise taken as text
        value: Option<String>,
        /// Also search the promoted column
        #[arg(long)]
        promoted: bool,
        /// Print SQL with arguments substituted instead of JSON
        #[arg(long)]
        inline: bool,
    },

    /// Print the traversal plan for a filter.
    Plan {
        key: String,
        op: String,
        value: Option<String>,
        #[arg(long)]
        promoted: bool,
    },

    /// Print ARRAY JOIN clauses and the field expression for grouping.
    GroupBy {
        key: String,
        #[arg(long)]
        promoted: bool,
    },

    /// List cached path types.
    Types {
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Keep the cache refreshed and log its stats until Ctrl-C.
    Watch,
}

// =============================================================================
// Type sources
// =============================================================================

enum Source {
    Fixture(HashMap<String, Vec<ObservedType>>),
    Catalog(Arc<PathTypeCache>),
}

impl Source {
    fn is_promoted(&self, name: &str) -> bool {
        match self {
            Source::Fixture(_) => false,
            Source::Catalog(cache) => cache.is_promoted(name),
        }
    }

    fn entries(&self) -> Vec<(String, Vec<ObservedType>)> {
        match self {
            Source::Fixture(map) => {
                let mut entries: Vec<_> = map.keys().map(|k| (k.clone(), map.types(k))).collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                entries
            }
            Source::Catalog(cache) => cache.entries(),
        }
    }
}

impl TypeLookup for Source {
    fn types(&self, path: &str) -> Vec<ObservedType> {
        match self {
            Source::Fixture(map) => map.types(path),
            Source::Catalog(cache) => cache.get(path),
        }
    }

    fn string_indexed(&self, column: &str, path: &str) -> bool {
        match self {
            Source::Fixture(_) => false,
            Source::Catalog(cache) => cache.is_string_indexed(column, path),
        }
    }
}

/// Parse a fixture of `{"path": ["String", "Array(JSON)"]}`.
fn parse_fixture(text: &str) -> Result<HashMap<String, Vec<ObservedType>>, BoxError> {
    let raw: HashMap<String, Vec<String>> = serde_json::from_str(text)?;
    let mut map = HashMap::with_capacity(raw.len());
    for (path, names) in raw {
        let types = names
            .iter()
            .map(|n| n.parse::<ObservedType>())
            .collect::<Result<Vec<_>, _>>()?;
        map.insert(path, types);
    }
    Ok(map)
}

fn load_fixture(path: &Path) -> Result<HashMap<String, Vec<ObservedType>>, BoxError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    parse_fixture(&text)
}

async fn open_catalog(config: &Config) -> Result<Arc<PathTypeCache>, BoxError> {
    let catalog = ClickHouseCatalog::new(config.catalog.clone())?;
    let cache = Arc::new(PathTypeCache::new(Arc::new(catalog)));
    let outcome = cache.refresh(true).await?;
    tracing::info!("loaded {} catalog rows", outcome.rows);
    if let Err(e) = cache.sync_promoted().await {
        tracing::warn!("promoted paths unavailable: {}", e);
    }
    if let Err(e) = cache.sync_string_indexes().await {
        tracing::warn!("string indexes unavailable: {}", e);
    }
    Ok(cache)
}

/// JSON when it parses (numbers, booleans, lists), text otherwise.
fn parse_value(raw: Option<&str>) -> serde_json::Value {
    match raw {
        None => serde_json::Value::Null,
        Some(s) => serde_json::from_str(s).unwrap_or_else(|_| serde_json::Value::String(s.to_string())),
    }
}

#[derive(Tabled)]
struct TypeRow {
    path: String,
    types: String,
}

#[derive(Serialize)]
struct CompileOutput {
    #[serde(rename = "where")]
    where_clause: String,
    args: Vec<serde_json::Value>,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "bj=info,bj_cache=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    let config = Config::load(&cli.config)?;

    let source = match &cli.types {
        Some(path) => Source::Fixture(load_fixture(path)?),
        None => Source::Catalog(open_catalog(&config).await?),
    };

    match cli.command {
        Commands::Compile {
            key,
            op,
            value,
            promoted,
            inline,
        } => {
            let compiler = Compiler::new(&source, config.columns.clone());
            let key = FieldKey::new(&key).promoted(promoted || source.is_promoted(&key));
            let op: Operator = op.parse()?;
            let mut sb = ArgsBuilder::new();
            compiler.filter(&key, op, &parse_value(value.as_deref()), &mut sb)?;
            let where_clause = sb.where_clause().unwrap_or_default();

            if inline {
                println!("{}", sb.inline(&where_clause));
            } else {
                let out = CompileOutput {
                    args: sb.args().to_vec(),
                    where_clause,
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
        }

        Commands::Plan {
            key,
            op,
            value,
            promoted,
        } => {
            let compiler = Compiler::new(&source, config.columns.clone());
            let key = FieldKey::new(&key).promoted(promoted || source.is_promoted(&key));
            let op: Operator = op.parse()?;
            for plan in compiler.plans(&key, op, &parse_value(value.as_deref()))? {
                println!("{}", plan);
            }
        }

        Commands::GroupBy { key, promoted } => {
            let compiler = Compiler::new(&source, config.columns.clone());
            let key = FieldKey::new(&key).promoted(promoted || source.is_promoted(&key));
            let group_by = compiler.group_by(&key)?;
            println!("{}", serde_json::to_string_pretty(&group_by)?);
        }

        Commands::Types { prefix } => {
            let rows: Vec<TypeRow> = source
                .entries()
                .into_iter()
                .filter(|(path, _)| prefix.as_deref().map_or(true, |p| path.starts_with(p)))
                .map(|(path, types)| TypeRow {
                    path,
                    types: types.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", "),
                })
                .collect();
            eprintln!("{} paths", rows.len());
            println!("{}", Table::new(rows));
        }

        Commands::Watch => {
            let cache = match source {
                Source::Catalog(cache) => cache,
                Source::Fixture(_) => return Err("watch needs the catalog; drop --types".into()),
            };

            let tasks = spawn_refresh_tasks(cache.clone(), &config.refresh);
            let mut ticker = tokio::time::interval(config.refresh.incremental_interval());
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let stats = cache.stats();
                        tracing::info!(
                            "cache: {} paths, {} promoted, {} string indexed, watermark {}",
                            stats.paths,
                            stats.promoted_paths,
                            stats.string_indexed_paths,
                            stats.watermark
                        );
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("shutting down refresh tasks");
                        tasks.shutdown();
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bj_cache::{MemoryCatalog, PathTypeRow};
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compile_args() {
        let cli = Cli::try_parse_from([
            "bj",
            "--types",
            "fixtures/types.json",
            "compile",
            "education[].name",
            "=",
            "IIT",
        ])
        .unwrap();
        match cli.command {
            Commands::Compile { key, op, value, promoted, .. } => {
                assert_eq!(key, "education[].name");
                assert_eq!(op, "=");
                assert_eq!(value.as_deref(), Some("IIT"));
                assert!(!promoted);
            }
            _ => panic!("expected compile"),
        }
        assert_eq!(cli.types, Some(PathBuf::from("fixtures/types.json")));
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(None), serde_json::Value::Null);
        assert_eq!(parse_value(Some("42")), json!(42));
        assert_eq!(parse_value(Some("[1, 2]")), json!([1, 2]));
        assert_eq!(parse_value(Some("IIT")), json!("IIT"));
        assert_eq!(parse_value(Some("\"42\"")), json!("42"));
    }

    #[test]
    fn test_bundled_fixture_parses() {
        let map = parse_fixture(include_str!("../fixtures/types.json")).unwrap();
        assert_eq!(
            map.types("education[].parameters"),
            vec![ObservedType::ArrayFloat64, ObservedType::ArrayDynamic]
        );
        assert_eq!(map.types("education"), vec![ObservedType::ArrayJson]);
    }

    #[test]
    fn test_fixture_rejects_unknown_type() {
        assert!(parse_fixture(r#"{"a": ["Decimal(10, 2)"]}"#).is_err());
    }

    #[test]
    fn test_fixture_source_compiles() {
        let source = Source::Fixture(parse_fixture(include_str!("../fixtures/types.json")).unwrap());
        let compiler = Compiler::new(&source, bj_core::Columns::default());
        let mut sb = ArgsBuilder::new();
        compiler
            .filter(&FieldKey::new("user.age"), Operator::GreaterThan, &json!(30), &mut sb)
            .unwrap();
        assert_eq!(
            sb.inline(&sb.where_clause().unwrap()),
            "dynamicElement(body_json.`user.age`, 'Int64') > 30"
        );
        assert_eq!(source.entries().len(), 16);
    }

    #[tokio::test]
    async fn test_catalog_source_reads_string_indexes() {
        let catalog = Arc::new(MemoryCatalog::with_rows(vec![PathTypeRow::new("message", "String", 1)]));
        catalog.set_string_indexes(vec![
            "lower(assumeNotNull(dynamicElement(body_json.message, 'String')))".to_string(),
        ]);
        let cache = Arc::new(PathTypeCache::new(catalog));
        cache.refresh(true).await.unwrap();
        cache.sync_string_indexes().await.unwrap();

        let source = Source::Catalog(cache);
        let compiler = Compiler::new(&source, bj_core::Columns::default());
        let mut sb = ArgsBuilder::new();
        compiler
            .filter(&FieldKey::new("message"), Operator::Contains, &json!("timeout"), &mut sb)
            .unwrap();
        assert_eq!(
            sb.where_clause().unwrap(),
            "LOWER(assumeNotNull(dynamicElement(body_json.`message`, 'String'))) LIKE LOWER(?)"
        );
    }
}
