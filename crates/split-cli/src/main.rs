//! Split Table CLI
//!
//! Command-line tool for viewing tables, extracting entities into derived
//! columns, searching/replacing, and pruning rows and columns.

use clap::{Parser, Subcommand};
use split_core::{
    to_csv_string, JobFile, PatternClassifier, Replacement, Session, SystemClock, Table,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "split-cli")]
#[command(about = "Extract entities from CSV tables into derived columns", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display a CSV file
    Show {
        /// Path to CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Maximum number of rows to display
        #[arg(short, long)]
        limit: Option<usize>,

        /// Columns to display (comma-separated)
        #[arg(short, long)]
        columns: Option<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Extract entities from the selected columns into derived columns
    Extract {
        /// Path to CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Columns to read text from (comma-separated)
        #[arg(short, long)]
        columns: String,

        /// Output file path; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List cells containing a query
    Search {
        /// Path to CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Columns to search (comma-separated)
        #[arg(short, long)]
        columns: String,

        /// Text to search for (case-insensitive)
        #[arg(short, long)]
        query: String,
    },

    /// Replace a query in one or all matching cells
    Replace {
        /// Path to CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Columns to search (comma-separated)
        #[arg(short, long)]
        columns: String,

        /// Text to search for (case-insensitive)
        #[arg(short, long)]
        query: String,

        /// Replacement text
        #[arg(short, long = "with")]
        with: String,

        /// Which match to replace (0-based, wraps around)
        #[arg(long, default_value_t = 0)]
        nth: usize,

        /// Replace in every matching cell
        #[arg(long)]
        all: bool,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Delete rows and columns
    Drop {
        /// Path to CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Row indices to delete (comma-separated, 0-based)
        #[arg(short, long)]
        rows: Option<String>,

        /// Column names to delete (comma-separated)
        #[arg(short, long)]
        columns: Option<String>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run a job file
    Run {
        /// Path to job file (JSON)
        #[arg(short, long)]
        job: PathBuf,
    },

    /// Create a job file template
    CreateJob {
        /// Output path for the job file
        #[arg(short, long)]
        output: PathBuf,

        /// Input CSV file for the job
        #[arg(short, long, default_value = "input.csv")]
        input: PathBuf,

        /// Columns to extract from (comma-separated)
        #[arg(short, long)]
        columns: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> split_core::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Show {
            file,
            limit,
            columns,
            format,
        } => cmd_show(&file, limit, columns, &format),
        Commands::Extract {
            file,
            columns,
            output,
        } => cmd_extract(&file, &columns, output.as_deref()).await,
        Commands::Search {
            file,
            columns,
            query,
        } => cmd_search(&file, &columns, &query),
        Commands::Replace {
            file,
            columns,
            query,
            with,
            nth,
            all,
            output,
        } => cmd_replace(&file, &columns, &query, &with, nth, all, &output),
        Commands::Drop {
            file,
            rows,
            columns,
            output,
        } => cmd_drop(&file, rows, columns, &output),
        Commands::Run { job } => cmd_run(&job).await,
        Commands::CreateJob {
            output,
            input,
            columns,
        } => cmd_create_job(&output, &input, columns),
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn open(file: &Path) -> split_core::Result<Session> {
    let mut session = Session::new();
    session.load_path(file)?;
    Ok(session)
}

fn print_table(table: &Table, limit: Option<usize>, columns: Option<&[String]>) {
    let display_cols: Vec<&split_core::Column> = match columns {
        Some(filter) => table
            .columns
            .iter()
            .filter(|c| filter.contains(&c.name))
            .collect(),
        None => table.columns.iter().collect(),
    };

    // Print header
    let header: Vec<&str> = display_cols.iter().map(|c| c.name.as_str()).collect();
    println!("{}", header.join("\t"));
    println!("{}", "-".repeat(header.len() * 12));

    // Print rows
    let row_limit = limit.unwrap_or(table.row_count());
    for row in table.rows.iter().take(row_limit) {
        let values: Vec<&str> = display_cols
            .iter()
            .map(|col| row.get(col.index).unwrap_or_default())
            .collect();
        println!("{}", values.join("\t"));
    }

    if table.row_count() > row_limit {
        println!("... ({} more rows)", table.row_count() - row_limit);
    }
}

fn cmd_show(
    file: &Path,
    limit: Option<usize>,
    columns: Option<String>,
    format: &str,
) -> split_core::Result<()> {
    let session = open(file)?;
    let table = session.processed();

    match format.to_lowercase().as_str() {
        "text" => {}
        "json" => {
            println!("{}", serde_json::to_string_pretty(table)?);
            return Ok(());
        }
        _ => {
            eprintln!("Unknown format: {}. Supported formats: text, json", format);
            std::process::exit(1);
        }
    }

    println!("File: {}", file.display());
    println!("Columns: {}", table.column_count());
    println!("Rows: {}", table.row_count());
    println!();

    let filter = columns.as_deref().map(split_list);
    print_table(table, limit, filter.as_deref());

    Ok(())
}

async fn cmd_extract(file: &Path, columns: &str, output: Option<&Path>) -> split_core::Result<()> {
    let mut session = open(file)?;
    let columns = split_list(columns);

    let report = session
        .run_extraction(&columns, &PatternClassifier::new(), &SystemClock)
        .await?;

    match output {
        Some(path) => {
            let rows = session.export_to_path(path)?;
            println!("Exported {} rows to {}", rows, path.display());
        }
        None => print!("{}", to_csv_string(session.processed())?),
    }

    if report.added_columns.is_empty() {
        eprintln!("No new columns added");
    } else {
        eprintln!("Added columns: {}", report.added_columns.join(", "));
    }
    eprintln!(
        "{} of {} rows had entities",
        report.rows_with_entities,
        session.processed().row_count()
    );

    Ok(())
}

fn cmd_search(file: &Path, columns: &str, query: &str) -> split_core::Result<()> {
    let mut session = open(file)?;
    session.set_column_selection(&split_list(columns));

    let count = session.search(query);
    println!("{} match(es) for '{}'", count, query.trim());

    for (i, m) in session.search_state().matches().iter().enumerate() {
        let value = session.processed().cell(m.row, &m.column).unwrap_or_default();
        println!("  {}. row {}, {}: {}", i + 1, m.row, m.column, value);
    }

    Ok(())
}

fn cmd_replace(
    file: &Path,
    columns: &str,
    query: &str,
    with: &str,
    nth: usize,
    all: bool,
    output: &Path,
) -> split_core::Result<()> {
    let mut session = open(file)?;
    session.set_column_selection(&split_list(columns));

    let count = session.search(query);
    if count == 0 {
        println!("No matches for '{}'", query.trim());
        return Ok(());
    }

    let changed = if all {
        session.replace_all(with)
    } else {
        for _ in 0..nth % count {
            session.next_match();
        }
        if let Some(m) = session.current_match() {
            println!("Replacing in row {}, {}", m.row, m.column);
        }
        usize::from(session.replace_current(with))
    };

    let rows = session.export_to_path(output)?;
    println!("Replaced in {} cell(s), {} match(es) remain", changed, session.search_state().matches().len());
    println!("Exported {} rows to {}", rows, output.display());

    Ok(())
}

fn cmd_drop(
    file: &Path,
    rows: Option<String>,
    columns: Option<String>,
    output: &Path,
) -> split_core::Result<()> {
    let mut session = open(file)?;

    if let Some(rows) = rows {
        let mut indices = Vec::new();
        for item in split_list(&rows) {
            match item.parse::<usize>() {
                Ok(idx) => indices.push(idx),
                Err(_) => eprintln!("Warning: Invalid row index '{}'", item),
            }
        }
        let removed = session.delete_rows(&indices);
        println!("Deleted {} row(s)", removed);
    }

    if let Some(columns) = columns {
        let removed = session.delete_columns(&split_list(&columns));
        println!("Deleted column(s): {}", removed.join(", "));
    }

    let written = session.export_to_path(output)?;
    println!("Exported {} rows to {}", written, output.display());

    Ok(())
}

async fn cmd_run(job_path: &Path) -> split_core::Result<()> {
    let job = JobFile::load(job_path)?;
    println!("Running job for {}", job.input.display());

    let (session, report) = job.run(&PatternClassifier::new(), &SystemClock).await?;

    println!("  {} rows loaded", report.rows_loaded);
    if report.rows_deleted > 0 {
        println!("  {} rows deleted", report.rows_deleted);
    }
    if !report.columns_deleted.is_empty() {
        println!("  columns deleted: {}", report.columns_deleted.join(", "));
    }
    if let Some(merge) = &report.merge {
        println!(
            "  {} rows with entities, added columns: {}",
            merge.rows_with_entities,
            merge.added_columns.join(", ")
        );
    }
    if report.cells_replaced > 0 {
        println!("  {} cells replaced", report.cells_replaced);
    }

    match (&job.output, report.rows_written) {
        (Some(path), Some(rows)) => println!("  {} rows written to {}", rows, path.display()),
        _ if session.processed().is_empty() => println!("  no rows left to print"),
        _ => print!("{}", to_csv_string(session.processed())?),
    }

    Ok(())
}

fn cmd_create_job(output: &Path, input: &Path, columns: Option<String>) -> split_core::Result<()> {
    let mut job = JobFile::new(input);
    job.output = Some(PathBuf::from("output.csv"));
    job.columns = columns
        .as_deref()
        .map(split_list)
        .unwrap_or_else(|| vec!["ColumnName".to_string()]);
    job.replacements.push(Replacement {
        query: "find".to_string(),
        replacement: "replace".to_string(),
        columns: Vec::new(),
        all: false,
    });

    job.save(output)?;
    println!("Created job file: {}", output.display());
    println!();
    println!("Edit the file to configure your job, then run:");
    println!("  split-cli run --job {}", output.display());

    Ok(())
}
