use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use refdex::emit::{self, RecordSink, RowKind, TsvWriter};
use refdex::parser::rules::SelectorRules;
use refdex::settings::{Overrides, Settings};
use refdex::{db, pipeline, sources};

#[derive(Parser)]
#[command(name = "refdex", about = "Compile list-style reference pages into a title-keyed record store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every page, resolve aliases, write the output file and database
    Run {
        /// Settings file (default: refdex.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory holding the source pages
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Absolute URL the page paths are joined onto
        #[arg(long)]
        base_url: Option<String>,
        /// Tab-separated output file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// SQLite record store
        #[arg(long)]
        db: Option<PathBuf>,
        /// Max pages to process (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Look a title up in the record store, following redirects
    Lookup {
        title: String,
        #[arg(long, default_value = db::DB_PATH)]
        db: PathBuf,
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show record store statistics
    Stats {
        #[arg(long, default_value = db::DB_PATH)]
        db: PathBuf,
    },
}

/// Redirect hops `lookup` follows before giving up.
const MAX_REDIRECTS: usize = 16;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            input,
            base_url,
            output,
            db: db_path,
            limit,
        } => {
            let settings = Settings::load(
                config.as_deref(),
                Overrides {
                    base_url,
                    input_dir: input,
                    output,
                    database: db_path,
                },
            )?;
            run(&settings, limit)
        }
        Commands::Lookup { title, db: db_path, json } => {
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let mut current = title;
            for _ in 0..MAX_REDIRECTS {
                let rows = db::lookup(&conn, &current)?;
                if rows.is_empty() {
                    println!("No record titled '{}'.", current);
                    break;
                }
                let next = rows
                    .iter()
                    .find(|r| r.kind == RowKind::Redirect)
                    .map(|r| r.alias.clone());
                for r in &rows {
                    if json {
                        println!("{}", serde_json::to_string_pretty(r)?);
                    } else {
                        print_row(r);
                    }
                }
                match next {
                    Some(target) => current = target,
                    None => break,
                }
            }
            Ok(())
        }
        Commands::Stats { db: db_path } => {
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Runs:            {}", s.runs);
            println!("Last run:        {}", s.last_run.as_deref().unwrap_or("-"));
            println!("Articles:        {}", s.articles);
            println!("Redirects:       {}", s.redirects);
            println!("Disambiguations: {}", s.disambiguations);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn run(settings: &Settings, limit: Option<usize>) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    let base = settings.base_url()?;
    let rules = SelectorRules::compile(&settings.source)?;

    let mut pages = sources::discover_pages(&settings.input_dir)?;
    if let Some(n) = limit {
        pages.truncate(n);
    }
    if pages.is_empty() {
        println!("No pages found under {}.", settings.input_dir.display());
        return Ok(());
    }

    // Phase 1: extract
    let t_extract = Instant::now();
    println!("Extracting {} pages...", pages.len());
    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );
    let extraction = pipeline::extract_pages(&pages, &base, &rules, &pb);
    pb.finish_and_clear();
    println!(
        "Extracted {} articles, {} aliases from {} pages ({} skipped, {} duplicate titles) in {:.1}s",
        extraction.counts.articles,
        extraction.counts.aliases,
        extraction.pages,
        extraction.failed,
        extraction.counts.duplicates,
        t_extract.elapsed().as_secs_f64()
    );

    // Phase 2: resolve + emit
    let compiled = pipeline::compile(extraction.corpus).context("Alias resolution failed")?;

    let file = File::create(&settings.output)
        .with_context(|| format!("Failed to create {}", settings.output.display()))?;
    let mut tsv = TsvWriter::new(BufWriter::new(file));

    let conn = db::connect(&settings.database)?;
    db::init_schema(&conn)?;
    let run_row = db::RunRow {
        run_id: new_run_id(),
        pages: compiled.corpus.pages(),
        articles: compiled.count(RowKind::Article),
        redirects: compiled.count(RowKind::Redirect),
        disambiguations: compiled.count(RowKind::Disambiguation),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    db::insert_run(&conn, &run_row)?;
    let mut store = db::SqliteSink::begin(&conn, &run_row.run_id)?;

    for row in &compiled.rows {
        tsv.write_row(row)?;
        store.write_row(row)?;
    }
    tsv.finish()?;
    store.finish()?;
    let written = tsv.rows();
    tsv.into_inner()
        .into_inner()
        .map_err(|e| e.into_error())?
        .sync_all()
        .with_context(|| format!("Failed to sync {}", settings.output.display()))?;

    println!(
        "Wrote {} rows ({} articles, {} redirects, {} disambiguations) to {}, {} stored in {}",
        written,
        run_row.articles,
        run_row.redirects,
        run_row.disambiguations,
        settings.output.display(),
        store.rows(),
        settings.database.display(),
    );
    Ok(())
}

fn print_row(r: &emit::OutputRow) {
    println!("{} [{}]", r.title, r.kind.code());
    match r.kind {
        RowKind::Article => {
            if !r.categories.is_empty() {
                println!("  categories: {}", r.categories.replace(emit::ITEM_SEP, ", "));
            }
            if !r.related.is_empty() {
                println!("  related:    {}", r.related.replace(emit::ITEM_SEP, ", "));
            }
            println!("  abstract:   {}", truncate(&r.abstract_text, 160));
            println!("  source:     {}", r.source_url);
        }
        RowKind::Redirect => println!("  -> {}", r.alias),
        RowKind::Disambiguation => {
            for entry in r.disambiguation.split(emit::ITEM_SEP) {
                println!("  {}", entry);
            }
        }
    }
}

fn new_run_id() -> String {
    format!("run-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f"))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
