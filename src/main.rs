use anyhow::Result;
use clap::{Parser, Subcommand};
use flowkg::config::Config;
use flowkg::graph::{
    spawn_periodic_refresh, ConfiguredSource, GraphStore, RefreshOutcome, SnapshotSource, StatisticsCompiler,
};
use flowkg::optimize::{CandidateComponent, FlowOptimizer};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "flowkg")]
#[command(about = "Knowledge-graph boosting and path suggestions for integration flows")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the configured snapshot and report what was compiled (default)
    Verify,
    /// Rank the most probable paths between two component types
    Paths {
        start: String,
        end: String,
        /// Path length ceiling in edges (defaults to optimization.max_hops)
        #[arg(long)]
        max_hops: Option<usize>,
    },
    /// Boost candidates for the next step of a flow and print the result as JSON
    Optimize {
        /// Component types already selected, in flow order
        #[arg(long = "prefix")]
        prefix: Vec<String>,
        /// Retrieved candidate as TYPE=SCORE
        #[arg(long = "candidate", value_parser = parse_candidate)]
        candidates: Vec<CandidateComponent>,
        /// Desired final component type, enables path suggestions
        #[arg(long)]
        end: Option<String>,
    },
    /// Keep the snapshot fresh until interrupted
    ServeRefresh,
}

fn parse_candidate(value: &str) -> std::result::Result<CandidateComponent, String> {
    let (component_type, score) = value
        .split_once('=')
        .ok_or_else(|| format!("expected TYPE=SCORE, got '{}'", value))?;
    let score: f64 = score
        .trim()
        .parse()
        .map_err(|e| format!("invalid score in '{}': {}", value, e))?;
    Ok(CandidateComponent::new(component_type.trim(), score))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", config.flowkg.log_level.as_str())
    ).init();

    let source = ConfiguredSource::from_config(&config);
    let store = Arc::new(GraphStore::new(StatisticsCompiler::from_config(&config.optimization)));

    match cli.command.unwrap_or(Command::Verify) {
        Command::Verify => run_verify(&config, &store, &source).await?,
        Command::Paths { start, end, max_hops } => {
            load_or_degrade(&store, &source).await;
            let optimizer = FlowOptimizer::new(Arc::clone(&store), config.optimization.clone());
            let paths = optimizer.find_paths(&start, &end, max_hops);
            if paths.is_empty() {
                println!("No path from {} to {}", start, end);
            }
            for (rank, path) in paths.iter().enumerate() {
                let joined: Vec<&str> = path.types.iter().map(|t| t.as_str()).collect();
                println!("{:>2}. {:.4}  {}", rank + 1, path.confidence, joined.join(" -> "));
            }
        }
        Command::Optimize { prefix, candidates, end } => {
            load_or_degrade(&store, &source).await;
            let optimizer = FlowOptimizer::new(Arc::clone(&store), config.optimization.clone());
            let result = optimizer.optimize(&prefix, &candidates, end.as_deref());
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::ServeRefresh => run_refresh_loop(&config, store, source).await?,
    }

    Ok(())
}

/// Queries still answer from an empty graph when the snapshot is unavailable
async fn load_or_degrade(store: &GraphStore, source: &ConfiguredSource) {
    if let Err(e) = store.load(source).await {
        log::warn!("Continuing without graph statistics: {}", e);
    }
}

async fn run_verify(config: &Config, store: &GraphStore, source: &ConfiguredSource) -> Result<()> {
    log::info!("Starting flowkg v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Snapshot source: {}", source.describe());
    log::info!(
        "Pattern steps {:?}, top_k {}, beam width {}, max hops {}",
        config.optimization.pattern_steps,
        config.optimization.top_k,
        config.optimization.beam_width,
        config.optimization.max_hops
    );

    store.load(source).await?;
    let snapshot = store.require_data()?;
    let graph = snapshot.graph();

    log::info!("✓ Generation {} loaded at {}", snapshot.generation, snapshot.loaded_at.to_rfc3339());
    log::info!("✓ {} component types, {} transitions", graph.graph().type_count(), graph.graph().edge_count());
    log::info!("✓ {} patterns retained", graph.pattern_count());
    log::info!("✓ {} occurrences in corpus", graph.total_occurrences());
    Ok(())
}

async fn run_refresh_loop(config: &Config, store: Arc<GraphStore>, source: ConfiguredSource) -> Result<()> {
    let Some(every) = config.refresh.interval() else {
        anyhow::bail!("refresh.interval_secs is 0; periodic refresh is disabled");
    };

    match store.load(&source).await {
        Ok(RefreshOutcome::Replaced { generation, .. }) => log::info!("Initial generation {}", generation),
        Ok(RefreshOutcome::Unchanged) => {}
        Err(e) => log::warn!("Initial load failed, serving an empty graph until the next refresh: {}", e),
    }

    log::info!("Refreshing from {} every {}s", source.describe(), every.as_secs());
    let handle = spawn_periodic_refresh(Arc::clone(&store), Arc::new(source), every);

    tokio::signal::ctrl_c().await?;
    handle.abort();
    log::info!("Shutting down refresh loop");
    Ok(())
}
