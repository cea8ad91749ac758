use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use od_migration::{EngineConfig, Pipeline, PipelinePaths, RunSummary, Stage};

#[derive(Parser)]
#[command(
    name = "od-migration",
    version,
    about = "Year-over-year household migration OD dataset and region-code crosswalk"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    options: RunOptions,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the OD dataset and the crosswalk (default)
    Run,
    /// Build only the OD adjacency dataset
    Od,
    /// Build only the geometry → admin code crosswalk
    Crosswalk,
    /// Re-emit the province lookup table
    Provinces,
}

#[derive(Args)]
struct RunOptions {
    /// Directory holding {year}.csv migration files
    #[arg(long, global = true, default_value = "datasets/popMove/houseHold")]
    data_dir: PathBuf,
    /// Output directory for the JSON artifacts
    #[arg(long, global = true, default_value = "dashboard/public")]
    out_dir: PathBuf,
    /// Legacy reporting year (reconciled onto current codes)
    #[arg(long, global = true, default_value_t = 2023)]
    previous_year: u16,
    /// Current reporting year
    #[arg(long, global = true, default_value_t = 2024)]
    current_year: u16,
    /// Administrative registry CSV
    #[arg(long, global = true, default_value = "datasets/popMove/houseHold/2024_description.csv")]
    registry: PathBuf,
    /// Geometry FeatureCollection (GeoJSON)
    #[arg(long, global = true, default_value = "dashboard/public/sigungu.json")]
    geometry: PathBuf,
    /// JSON config overriding the built-in tables
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Exclude malformed migration rows instead of aborting
    #[arg(long, global = true)]
    allow_rejected: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let stage = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => Stage::All,
        Commands::Od => Stage::Od,
        Commands::Crosswalk => Stage::Crosswalk,
        Commands::Provinces => Stage::Provinces,
    };

    let options = cli.options;
    let mut config = match &options.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if options.allow_rejected {
        config.allow_rejected_records = true;
    }

    let paths = PipelinePaths {
        data_dir: options.data_dir,
        previous_year: options.previous_year,
        current_year: options.current_year,
        registry: options.registry,
        geometry: options.geometry,
        out_dir: options.out_dir,
    };

    println!(
        "🚚 OD migration {} → {}",
        paths.previous_year, paths.current_year
    );
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let summary = Pipeline::new(config, paths)?.run(stage)?;
    print_summary(&summary);

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    if let Some(od) = &summary.od {
        println!("\n📊 OD dataset");
        println!(
            "✓ Records: {} previous, {} current ({} rejected)",
            od.previous_records, od.current_records, od.rejected_records
        );
        println!(
            "✓ Edges: {} previous, {} current",
            od.previous_edges, od.current_edges
        );
        println!("✓ {}", od.reconciliation.summary());
        println!(
            "✓ Adjacency: {} regions, {} edges",
            od.document.region_count(),
            od.edges.len()
        );
    }

    if let Some(crosswalk) = &summary.crosswalk {
        println!("\n🔀 Crosswalk");
        println!(
            "✓ Admin names: {} ({} registry rows skipped)",
            crosswalk.admin_names, crosswalk.registry_rows_skipped
        );
        println!(
            "✓ Matched {} of {} geometry regions",
            crosswalk.crosswalk.len(),
            crosswalk.report.features
        );
        println!("\n--- Validating Region Codes ---");
        print!("{}", crosswalk.report);
        println!("-------------------------------");
    }

    if let Some(error) = &summary.crosswalk_error {
        eprintln!("\n❌ Crosswalk not generated: {}", error);
    }

    println!("\n💾 Artifacts");
    for artifact in &summary.artifacts {
        println!(
            "✓ {} ({:.2} MB, sha256 {})",
            artifact.path.display(),
            artifact.bytes as f64 / (1024.0 * 1024.0),
            &artifact.sha256[..12]
        );
    }
    println!(
        "\n✅ Done at {}",
        summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}
