use clap::{Parser, Subcommand, ValueEnum};
use plp_bookstore::catalog::{self, Catalog};
use plp_bookstore::cli::{self as prog_cli, Command, Report};
use plp_bookstore::config::{self, AppConfig, ConfigLayer};
use plp_bookstore::errors::DbError;
use plp_bookstore::query::telemetry;
use plp_bookstore::{Database, logger};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bookstore", version, about = "Bookstore catalog queries over an in-memory document store")]
struct Cli {
    /// TOML config file (overrides BOOKSTORE_CONFIG and the default locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    db_name: Option<String>,
    #[arg(long, global = true)]
    collection: Option<String>,
    #[arg(long, global = true)]
    page_size: Option<usize>,
    /// NDJSON file of books to load instead of the built-in sample
    #[arg(long, global = true)]
    seed_file: Option<PathBuf>,
    /// Write rolling log files here instead of logging to stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Rolled log files kept per stream
    #[arg(long, global = true)]
    log_retention: Option<u32>,
    #[arg(long, global = true)]
    slow_query_ms: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ReportKind {
    AvgPrice,
    TopAuthor,
    Decades,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the catalog and report how many books were inserted
    Seed,
    /// Find books matching a JSON filter
    Find {
        #[arg(long, default_value = "{}")]
        filter: String,
        /// JSON projection or comma-separated include list
        #[arg(long)]
        project: Option<String>,
        /// JSON sort spec or `field,-field`
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        skip: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
        /// Force a named index
        #[arg(long)]
        hint: Option<String>,
    },
    Count {
        #[arg(long, default_value = "{}")]
        filter: String,
    },
    UpdateOne {
        #[arg(long)]
        filter: String,
        #[arg(long)]
        update: String,
    },
    DeleteOne {
        #[arg(long)]
        filter: String,
    },
    /// Run a JSON pipeline (array of stages)
    Aggregate {
        #[arg(long)]
        pipeline: String,
    },
    Report {
        #[arg(value_enum)]
        kind: ReportKind,
    },
    /// Page N (0-indexed) sorted by title
    Page {
        n: usize,
    },
    CreateIndex {
        /// e.g. '{"author": 1, "published_year": 1}'
        #[arg(long)]
        keys: String,
    },
    ListIndexes,
    Explain {
        #[arg(long, default_value = "{}")]
        filter: String,
        #[arg(long)]
        hint: Option<String>,
    },
    /// Run every catalog query in order
    Demo,
}

impl From<Commands> for Command {
    fn from(c: Commands) -> Self {
        match c {
            Commands::Seed => Self::Seed,
            Commands::Find { filter, project, sort, skip, limit, hint } => {
                Self::Find { filter_json: filter, project, sort, skip, limit, hint }
            }
            Commands::Count { filter } => Self::Count { filter_json: filter },
            Commands::UpdateOne { filter, update } => {
                Self::UpdateOne { filter_json: filter, update_json: update }
            }
            Commands::DeleteOne { filter } => Self::DeleteOne { filter_json: filter },
            Commands::Aggregate { pipeline } => Self::Aggregate { pipeline_json: pipeline },
            Commands::Report { kind } => Self::Report(match kind {
                ReportKind::AvgPrice => Report::AvgPrice,
                ReportKind::TopAuthor => Report::TopAuthor,
                ReportKind::Decades => Report::Decades,
            }),
            Commands::Page { n } => Self::Page { n },
            Commands::CreateIndex { keys } => Self::CreateIndex { keys_json: keys },
            Commands::ListIndexes => Self::ListIndexes,
            Commands::Explain { filter, hint } => Self::Explain { filter_json: filter, hint },
            Commands::Demo => Self::Demo,
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, DbError> {
    let layer = ConfigLayer {
        db_name: cli.db_name.clone(),
        collection: cli.collection.clone(),
        page_size: cli.page_size,
        log_dir: cli.log_dir.clone(),
        log_level: cli.log_level.clone(),
        log_retention: cli.log_retention,
        slow_query_ms: cli.slow_query_ms,
        seed_file: cli.seed_file.clone(),
    };
    config::load(layer, cli.config.as_deref())
}

fn execute(cfg: &AppConfig, cmd: Command) -> Result<(), DbError> {
    logger::configure_logging(cfg.log_dir.as_deref(), &cfg.log_level, cfg.log_retention)?;
    telemetry::set_slow_query_ms(cfg.slow_query_ms);
    let db = Database::with_name(&cfg.db_name);
    let books = match &cfg.seed_file {
        Some(path) => catalog::load_ndjson(path)?,
        None => catalog::sample_books(),
    };
    catalog::seed_books(&db, &cfg.collection, &books)?;
    let cat = Catalog::new(&db, &cfg.collection).with_page_size(cfg.page_size);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    prog_cli::run(&cat, cmd, &mut out)?;
    out.flush()?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let cfg = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };
    if let Err(e) = execute(&cfg, cli.command.into()) {
        log::error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
