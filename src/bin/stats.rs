use anyhow::Result;
use clap::Parser;
use flowkg::graph::{ConfiguredSource, GraphStore, StatisticsCompiler, TransitionEdge};
use flowkg::Config;

#[derive(Parser, Debug)]
#[command(name = "stats")]
#[command(about = "Print component frequencies, top transitions and patterns of the graph snapshot")]
struct Args {
    /// Rows shown per table
    #[arg(short, long, default_value_t = 15)]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = Config::load()?;
    let source = ConfiguredSource::from_config(&config);
    let store = GraphStore::new(StatisticsCompiler::from_config(&config.optimization));

    store.load(&source).await?;
    let snapshot = store.require_data()?;
    let graph = snapshot.graph();

    println!("\n=== flowkg Graph Statistics ===\n");
    println!("Generation:       {}", snapshot.generation);
    println!("Fingerprint:      {}", &snapshot.fingerprint[..16]);
    println!("Component types:  {}", graph.graph().type_count());
    println!("Transitions:      {}", graph.graph().edge_count());
    println!("Occurrences:      {}", graph.total_occurrences());
    println!("Patterns:         {}", graph.pattern_count());

    println!("\nMost Frequent Component Types:\n");
    println!("{:-<60}", "");
    println!("{:<36} {:>10} {:>10}", "Type", "Count", "Share");
    println!("{:-<60}", "");
    for (component_type, count) in graph.graph().ranked_frequencies().into_iter().take(args.limit) {
        println!(
            "{:<36} {:>10} {:>9.1}%",
            component_type,
            count,
            graph.frequency_share(component_type.as_str()) * 100.0
        );
    }
    println!("{:-<60}", "");

    let mut edges: Vec<&TransitionEdge> = graph.graph().edges().collect();
    edges.sort_by(|a, b| {
        b.observed_count
            .cmp(&a.observed_count)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.target.cmp(&b.target))
    });

    println!("\nMost Observed Transitions:\n");
    println!("{:-<80}", "");
    println!("{:<30} {:<30} {:>8} {:>8}", "From", "To", "Count", "P");
    println!("{:-<80}", "");
    for edge in edges.iter().take(args.limit) {
        println!(
            "{:<30} {:<30} {:>8} {:>8.3}",
            edge.source, edge.target, edge.observed_count, edge.probability
        );
    }
    println!("{:-<80}", "");

    for &steps in &config.optimization.pattern_steps {
        let patterns = graph.patterns(steps);
        if patterns.is_empty() {
            continue;
        }
        println!("\nTop {}-Step Patterns:\n", steps);
        for pattern in patterns.iter().take(args.limit) {
            let joined: Vec<&str> = pattern.types.iter().map(|t| t.as_str()).collect();
            println!("  {:>6}x  {:.3}  {}", pattern.frequency, pattern.confidence, joined.join(" -> "));
        }
    }

    println!();

    Ok(())
}
