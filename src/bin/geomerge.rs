//! geomerge — nearest-location merge SQL from the command line
//!
//! # Usage
//!
//! ```bash
//! # Generate the merge statement
//! geomerge generate request.json --project my-project --output raw.merged
//!
//! # Show how the request was understood
//! geomerge explain request.json
//!
//! # Start a request from column lists
//! geomerge scaffold --table ds.obs:lat,lon,ts --table ds.env:lat,lon,day,temp
//! ```

use std::io::Read;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use geomerge::prelude::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "geomerge")]
#[command(version)]
#[command(about = "Merge geospatial tables by nearest location and date", long_about = None)]
#[command(after_help = "EXAMPLES:
    geomerge generate request.json --project my-project
    cat request.json | geomerge generate - --output raw.merged --format json
    geomerge scaffold --table ds.obs:lat,lon,ts --table ds.env:lat,lon,day,temp")]
struct Cli {
    /// Verbose output (debug logs on stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct Target {
    /// Project owning the source and output tables
    #[arg(short, long, env = "GEOMERGE_PROJECT")]
    project: Option<String>,

    /// Output table (dataset.table), replaced if it exists
    #[arg(short, long, env = "GEOMERGE_OUTPUT_TABLE")]
    output: Option<String>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Sql,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the merge statement for a request
    Generate {
        /// Request JSON file, or '-' for stdin
        request: String,

        #[command(flatten)]
        target: Target,

        /// Output format
        #[arg(short, long, value_enum, default_value = "sql")]
        format: OutputFormat,
    },
    /// Validate a request and explain the merge
    Explain {
        /// Request JSON file, or '-' for stdin
        request: String,

        #[command(flatten)]
        target: Target,
    },
    /// Print a starter request with inferred column roles
    Scaffold {
        /// Table and its columns: dataset.table:col1,col2,...
        #[arg(short, long = "table", required = true)]
        tables: Vec<String>,
    },
    /// Show the column names recognized for each role
    Roles,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Some(Commands::Generate { request, target, format }) => generate(&request, target, format),
        Some(Commands::Explain { request, target }) => explain(&request, target),
        Some(Commands::Scaffold { tables }) => scaffold(&tables),
        Some(Commands::Roles) => {
            show_roles();
            Ok(())
        }
        None => {
            println!("{}", "geomerge — nearest-location merge SQL".cyan().bold());
            println!();
            println!("Usage: geomerge <COMMAND> [OPTIONS]");
            println!();
            println!("Try: geomerge --help");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(exit_code(&e));
    }
}

/// 2 when the request itself is invalid, 1 for everything else.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<MergeError>() {
        Some(e) if e.is_validation() => 2,
        _ => 1,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read a request and resolve its target: flags and environment first,
/// then the request envelope, then the config file.
fn load(path: &str, target: Target) -> anyhow::Result<(Config, Request)> {
    let content = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?
    };

    let (project, output, request) = RequestDocument::from_json(&content)?.into_parts();
    let config = Config::resolve(
        Config::discover()?,
        Config::new(project, output),
        Config::new(target.project, target.output),
    );
    debug!(tables = request.len(), "loaded request");
    Ok((config, request))
}

fn generate(path: &str, target: Target, format: OutputFormat) -> anyhow::Result<()> {
    let (config, request) = load(path, target)?;
    let project = config.project_id()?;
    let sql = geomerge::generate(project, config.output_table(), &request)?;

    match format {
        OutputFormat::Sql => println!("{}", sql),
        OutputFormat::Json => {
            let columns = plan(project, config.output_table(), &request)?.output_columns();
            let body = serde_json::json!({
                "projectId": project,
                "outputTableName": config.output_table(),
                "columns": columns,
                "sql": sql,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }
    Ok(())
}

fn explain(path: &str, target: Target) -> anyhow::Result<()> {
    let (config, request) = load(path, target)?;
    let project = config.project_id()?;
    let merge = plan(project, config.output_table(), &request)?;

    println!("{}", "Merge Plan:".green().bold());
    println!(
        "  {} {}",
        "Output:".dimmed(),
        format!("{}.{}", merge.project, merge.output_table).cyan()
    );
    for table in merge.tables() {
        let kind = if table.key.is_main() { "main" } else { "auxiliary" };
        println!(
            "  {} {} {}",
            format!("[{}]", table.alias()).cyan(),
            table.key.table.white().bold(),
            format!("({})", kind).dimmed()
        );
        for role in ColumnRole::REQUIRED {
            if let Some(column) = table.column_for(role) {
                println!("    {:10} {}", format!("{}:", role).dimmed(), column.yellow());
            }
        }
    }

    let columns = merge.output_columns();
    println!("  {} {}", "Columns:".dimmed(), columns.len().to_string().cyan());
    for column in columns {
        println!("    • {}", column.white());
    }

    println!();
    println!("{}", "Generated SQL:".green().bold());
    println!("{}", merge.to_sql().white());
    Ok(())
}

fn scaffold(entries: &[String]) -> anyhow::Result<()> {
    let tables = entries
        .iter()
        .map(|entry| {
            let (table, columns) = entry
                .split_once(':')
                .with_context(|| format!("Expected dataset.table:col1,col2 but got '{}'", entry))?;
            let columns: Vec<String> = columns
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
            Ok((table.trim().to_string(), columns))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let request = Request::scaffold(tables);
    println!("{}", serde_json::to_string_pretty(&request)?);

    // Only warn: the printed request is meant to be edited.
    if let Err(e) = plan("scaffold", geomerge::DEFAULT_OUTPUT_TABLE, &request) {
        eprintln!("{} {}", "⚠".yellow(), e.to_string().yellow());
    }
    Ok(())
}

fn show_roles() {
    println!("{}", "Column Roles".cyan().bold());
    println!();
    println!(
        "{:12} {}",
        "Role".white().bold(),
        "Recognized column names".white().bold()
    );
    println!("{}", "─".repeat(50).dimmed());
    for (role, names) in ColumnRole::KNOWN_NAMES {
        println!("{:12} {}", role.to_string().cyan().bold(), names.join(", ").yellow());
    }
    println!();
    println!(
        "{}",
        "Every table needs exactly one selected latitude, longitude and date column.".dimmed()
    );
}
