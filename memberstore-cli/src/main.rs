use clap::{Parser, Subcommand, ValueEnum};
use memberstore::{Database, Step, StoreOptions, Value};
use std::path::PathBuf;
use std::process;

/// memberstore CLI: inspect and maintain a cluster member's store
#[derive(Parser)]
#[command(name = "memberstore", version, about)]
struct Cli {
    /// Path to the store file
    #[arg(long, default_value = "store.db")]
    db: PathBuf,

    /// YAML file with connection options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Show every table with its columns
    Tables,

    /// Run a statement, discarding any rows
    Exec {
        /// SQL text
        sql: String,
    },

    /// Run a query and print its rows
    Query {
        /// SQL text
        sql: String,
        /// Positional parameters, parsed as JSON scalars when possible (e.g. --param 42)
        #[arg(long = "param")]
        params: Vec<String>,
    },

    /// Write a snapshot of the whole store to a file
    Snapshot {
        /// Output file
        out: PathBuf,
    },

    /// Replace the whole store with a snapshot file
    Install {
        /// Snapshot file
        input: PathBuf,
    },

    /// Remove a column, rebuilding the table
    DropColumn {
        table: String,
        column: String,
    },

    /// Remove a table
    DropTable {
        table: String,
    },

    /// Rename a table
    RenameTable {
        old_name: String,
        new_name: String,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let options = match &cli.config {
        Some(path) => StoreOptions::load(path)?,
        None => StoreOptions::default(),
    };
    let db = Database::new(options);
    db.open(&cli.db)?;

    match cli.command {
        Command::Tables => {
            let tables = db.describe_tables()?;
            print_output(&serde_json::to_value(&tables)?, &cli.format)?;
        }

        Command::Exec { sql } => {
            db.execute_statement(&sql)?;
            print_output(&serde_json::json!({ "ok": true }), &cli.format)?;
        }

        Command::Query { sql, params } => {
            let rows = query(&db, &sql, &params)?;
            print_output(&serde_json::Value::Array(rows), &cli.format)?;
        }

        Command::Snapshot { out } => {
            let blob = db.create_snapshot()?;
            std::fs::write(&out, &blob)
                .map_err(|e| format!("Failed to write snapshot '{}': {e}", out.display()))?;
            print_output(
                &serde_json::json!({ "ok": true, "bytes": blob.len() }),
                &cli.format,
            )?;
        }

        Command::Install { input } => {
            let blob = std::fs::read(&input)
                .map_err(|e| format!("Failed to read snapshot '{}': {e}", input.display()))?;
            db.install_snapshot(&blob)?;
            print_output(
                &serde_json::json!({ "ok": true, "bytes": blob.len() }),
                &cli.format,
            )?;
        }

        Command::DropColumn { table, column } => {
            db.destroy_column(&table, &column)?;
            print_output(&serde_json::json!({ "ok": true }), &cli.format)?;
        }

        Command::DropTable { table } => {
            db.destroy_table(&table)?;
            print_output(&serde_json::json!({ "ok": true }), &cli.format)?;
        }

        Command::RenameTable { old_name, new_name } => {
            db.rename_table(&old_name, &new_name)?;
            print_output(&serde_json::json!({ "ok": true }), &cli.format)?;
        }
    }

    Ok(())
}

/// Run `sql` with `params` bound in order and collect rows as JSON objects.
fn query(
    db: &Database,
    sql: &str,
    params: &[String],
) -> Result<Vec<serde_json::Value>, Box<dyn std::error::Error>> {
    let mut statement = db.build_statement(sql)?;
    for (index, param) in params.iter().enumerate() {
        statement.bind_parameter(index, param_to_value(param))?;
    }

    let columns = statement.column_names()?;
    let mut rows = Vec::new();
    while statement.step()? == Step::Row {
        let mut obj = serde_json::Map::new();
        for (i, name) in columns.iter().enumerate() {
            let value = statement.fetch_stored_column(i)?;
            obj.insert(name.clone(), serde_json::to_value(&value)?);
        }
        rows.push(serde_json::Value::Object(obj));
    }
    Ok(rows)
}

/// Parse a `--param` as a JSON scalar, falling back to text.
fn param_to_value(param: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(param) {
        Ok(serde_json::Value::Null) => Value::Null,
        Ok(serde_json::Value::Bool(b)) => b.into(),
        Ok(serde_json::Value::Number(n)) => match n.as_i64() {
            Some(i) => i.into(),
            None => n.as_f64().map(Value::Real).unwrap_or_default(),
        },
        _ => param.into(),
    }
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
