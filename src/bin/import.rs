use anyhow::{Context, Result};
use clap::Parser;
use flowkg::Config;
use flowkg::db::{import_corpus, Db, ObservedFlow};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "import")]
#[command(about = "Build the graph snapshot database from a JSON corpus of observed flows")]
struct Args {
    /// JSON array of {"flow_id": ..., "components": [...]} objects
    #[arg(short, long)]
    input: PathBuf,

    /// Write to this database instead of flowkg.snapshot_db
    #[arg(long)]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let args = Args::parse();

    let db_path = match args.db {
        Some(path) => path,
        None => Config::load()?.snapshot_db().to_path_buf(),
    };

    log::info!("Reading corpus from {}", args.input.display());
    let content = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read corpus: {}", args.input.display()))?;
    let flows: Vec<ObservedFlow> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse corpus: {}", args.input.display()))?;

    if flows.is_empty() {
        log::warn!("Corpus contains no flows; the snapshot will be empty");
    }

    let start = Instant::now();
    let summary = import_corpus(&Db::new(&db_path), flows).await?;

    println!("\n=== Import Summary ===");
    println!("Database:         {}", db_path.display());
    println!("Flows:            {}", summary.flows);
    println!("Steps:            {}", summary.steps);
    println!("Transitions:      {}", summary.transitions);
    println!("Component types:  {}", summary.component_types);
    println!("Elapsed:          {:.2?}", start.elapsed());

    Ok(())
}
