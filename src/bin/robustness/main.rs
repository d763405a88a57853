// Foodweb Robustness Runner
// Monte Carlo node-removal experiments over a trophic dependency network.
//
// Usage:
//   cargo run --release --bin robustness -- edges.csv                          # Random attack, 100 runs
//   cargo run --release --bin robustness -- edges.csv --runs 500 --seed 42
//   cargo run --release --bin robustness -- edges.csv --strategy sequential --sort-by in-degree
//   cargo run --release --bin robustness -- edges.csv --attrs species.csv \
//       --strategy threatened-habitats --habitats Grassland,Forest
//   cargo run --release --bin robustness -- edges.csv --track-nodes --out results/

mod loader;

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use foodweb_engine::{
    export, AttackStrategy, Random, Sequential, Simulation, SimulationConfig, SortBy,
    StructuralMetrics, ThreatenedHabitats, ThreatenedSpecies,
};

// ─── CLI Parsing ─────────────────────────────────────────────────────────────

struct CliArgs {
    edges: PathBuf,
    attrs: Option<PathBuf>,
    food_groups: Option<PathBuf>,
    strategy: String,
    habitats: Vec<String>,
    species: Vec<String>,
    min_probability: Option<f64>,
    sort_by: SortBy,
    runs: usize,
    seed: u64,
    track_nodes: bool,
    out: PathBuf,
}

fn usage() -> ! {
    eprintln!(
        "Usage: robustness <edges.csv> [options]\n\
         \n\
         Options:\n\
           --attrs <csv>            Taxon,Habitat attribute table\n\
           --food-groups <file>     basal food-group names, one per line\n\
           --strategy <name>        random | sequential | threatened-habitats | threatened-species\n\
           --habitats <a,b,...>     threatened habitat names\n\
           --species <a,b,...>      threatened species names\n\
           --min-probability <f>    per-bucket probability floor (default 0.05)\n\
           --sort-by <order>        out-degree | in-degree | total-degree\n\
           --runs <n>               trajectories to average (default 100)\n\
           --seed <n>               base seed (default 0)\n\
           --track-nodes            record per-step removal logs\n\
           --out <dir>              output directory (default robustness-results)"
    );
    process::exit(2);
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs {
        edges: PathBuf::new(),
        attrs: None,
        food_groups: None,
        strategy: "random".to_string(),
        habitats: Vec::new(),
        species: Vec::new(),
        min_probability: None,
        sort_by: SortBy::OutDegree,
        runs: 100,
        seed: 0,
        track_nodes: false,
        out: PathBuf::from("robustness-results"),
    };
    let mut edges_set = false;

    let mut i = 0;
    let value = |i: &mut usize| -> String {
        *i += 1;
        if *i >= args.len() {
            eprintln!("Missing value for {}", args[*i - 1]);
            usage();
        }
        args[*i].clone()
    };

    while i < args.len() {
        match args[i].as_str() {
            "--attrs" => cli.attrs = Some(PathBuf::from(value(&mut i))),
            "--food-groups" => cli.food_groups = Some(PathBuf::from(value(&mut i))),
            "--strategy" => cli.strategy = value(&mut i),
            "--habitats" => {
                cli.habitats = value(&mut i)
                    .split(',')
                    .map(|h| h.trim().to_string())
                    .filter(|h| !h.is_empty())
                    .collect();
            }
            "--species" => {
                cli.species = value(&mut i)
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            "--min-probability" => {
                let raw = value(&mut i);
                match raw.parse() {
                    Ok(p) => cli.min_probability = Some(p),
                    Err(_) => {
                        eprintln!("Invalid --min-probability: {raw}");
                        usage();
                    }
                }
            }
            "--sort-by" => {
                cli.sort_by = match value(&mut i).as_str() {
                    "out-degree" => SortBy::OutDegree,
                    "in-degree" => SortBy::InDegree,
                    "total-degree" => SortBy::TotalDegree,
                    other => {
                        eprintln!("Unknown --sort-by: {other}");
                        usage();
                    }
                };
            }
            "--runs" => cli.runs = value(&mut i).parse().unwrap_or(100),
            "--seed" => cli.seed = value(&mut i).parse().unwrap_or(0),
            "--track-nodes" => cli.track_nodes = true,
            "--out" => cli.out = PathBuf::from(value(&mut i)),
            "--help" | "-h" => usage(),
            arg if !arg.starts_with('-') && !edges_set => {
                cli.edges = PathBuf::from(arg);
                edges_set = true;
            }
            arg => {
                eprintln!("Unknown argument: {arg}");
                usage();
            }
        }
        i += 1;
    }

    if !edges_set {
        eprintln!("Missing required <edges.csv>");
        usage();
    }
    cli
}

fn build_strategy(cli: &CliArgs) -> Box<dyn AttackStrategy> {
    match cli.strategy.as_str() {
        "random" => Box::new(Random),
        "sequential" => Box::new(Sequential::new(cli.sort_by)),
        "threatened-habitats" => {
            if cli.habitats.is_empty() {
                eprintln!("--strategy threatened-habitats requires --habitats");
                usage();
            }
            match cli.min_probability {
                Some(m) => Box::new(ThreatenedHabitats::with_min_probability(
                    cli.habitats.clone(),
                    m,
                )),
                None => Box::new(ThreatenedHabitats::new(cli.habitats.clone())),
            }
        }
        "threatened-species" => Box::new(ThreatenedSpecies::new(cli.species.clone())),
        other => {
            eprintln!("Unknown --strategy: {other}");
            usage();
        }
    }
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() {
    let cli = parse_args();

    let mut graph = match loader::load_edges(&cli.edges) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Failed to load edge list: {e}");
            process::exit(1);
        }
    };
    if let Some(attrs) = &cli.attrs {
        if let Err(e) = loader::load_attributes(attrs, &mut graph) {
            eprintln!("Failed to load attributes: {e}");
            process::exit(1);
        }
    }
    if let Some(fg) = &cli.food_groups {
        if let Err(e) = loader::load_food_groups(fg, &mut graph) {
            eprintln!("Failed to load food groups: {e}");
            process::exit(1);
        }
    }

    let strategy = build_strategy(&cli);
    let provider = StructuralMetrics;

    println!("\n  Foodweb Robustness Runner");
    println!(
        "  Network: {} nodes, {} edges | Strategy: {} | PRNG: ChaCha8Rng",
        graph.size(),
        graph.edge_count(),
        strategy.name(),
    );
    println!("  Trajectories: {} | Base seed: {}\n", cli.runs, cli.seed);

    let mut simulation = Simulation::new(SimulationConfig {
        trajectories: cli.runs,
        base_seed: cli.seed,
        track_removals: cli.track_nodes,
    });

    let start = Instant::now();
    if let Err(e) = simulation.run(&graph, strategy.as_ref(), &provider) {
        eprintln!("Simulation failed: {e}");
        process::exit(1);
    }
    let elapsed = start.elapsed();

    let averaged = match simulation.averaged() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Averaging failed: {e}");
            process::exit(1);
        }
    };

    // ─── Summary table ──────────────────────────────────────────────────

    if averaged.is_empty() {
        println!("  Empty network, nothing to report.\n");
        return;
    }
    let last = averaged.len().saturating_sub(1);
    let half = last / 2;
    println!(
        "  {:<20} {:>12} {:>12} {:>12}",
        "Metric", "Intact", "Half-gone", "Final"
    );
    println!("  {}", "-".repeat(60));
    for (name, series) in averaged.names.iter().zip(averaged.series.iter()) {
        println!(
            "  {:<20} {:>12.4} {:>12.4} {:>12.4}",
            name, series[0], series[half], series[last]
        );
    }
    println!("  {}", "-".repeat(60));

    let avg_steps = simulation
        .results()
        .iter()
        .map(|r| r.steps as f64)
        .sum::<f64>()
        / cli.runs.max(1) as f64;
    println!(
        "  Avg primary removals/trajectory: {:.1} | Suite time: {:.1}s\n",
        avg_steps,
        elapsed.as_secs_f64()
    );

    // ─── Export ─────────────────────────────────────────────────────────

    let csv_path = cli.out.join("robustness.csv");
    let jsonl_path = cli.out.join("robustness.jsonl");
    if let Err(e) = export::write_csv(&csv_path, &averaged) {
        eprintln!("Failed to write {}: {e}", csv_path.display());
        process::exit(1);
    }
    if let Err(e) = export::write_jsonl(&jsonl_path, &averaged) {
        eprintln!("Failed to write {}: {e}", jsonl_path.display());
        process::exit(1);
    }
    println!("  Results saved to: {}", csv_path.display());
    println!("                    {}", jsonl_path.display());

    if cli.track_nodes {
        let logs: Vec<_> = simulation
            .results()
            .iter()
            .map(|r| r.removals.clone())
            .collect();
        let removals_path = cli.out.join("removals.csv");
        if let Err(e) = export::write_removals_csv(&removals_path, &logs) {
            eprintln!("Failed to write {}: {e}", removals_path.display());
            process::exit(1);
        }
        println!("                    {}", removals_path.display());
    }
    println!();
}
