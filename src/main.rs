mod config;
mod conflation;
mod error;
mod geometry;
mod graph;
mod index;
mod io;
mod meshblock;
mod model;
mod network;
mod node_key;
mod pipeline;
mod projection;
mod readers;
mod report;
mod rules;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::ThreadPoolBuilder;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use model::{LineLayer, PointLayer};
use network::{LayerRole, LineNetwork};
use projection::Reprojector;
use report::ValidationReport;
use rules::RuleContext;

#[derive(Parser, Debug)]
#[command(author, version, about = "Topology validation for road network vector data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Output directory
    #[arg(short, long, value_name = "DIR", global = true, default_value = "output")]
    output: PathBuf,

    /// JSON file overriding thresholds, id field and CRS settings
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Worker threads (default: number of CPU cores)
    #[arg(short, long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flag topology and attribute errors in road, ferry and point layers
    Validate {
        /// Road segment arcs (file or directory)
        #[arg(long)]
        roads: PathBuf,

        /// Ferry segment arcs
        #[arg(long)]
        ferries: Option<PathBuf>,

        /// Point layer such as junctions, blocked passages or toll points
        #[arg(long)]
        points: Vec<PathBuf>,
    },
    /// Find arcs that cannot close a meshblock and polygonize the rest
    Meshblock {
        #[arg(long)]
        roads: PathBuf,

        /// Boundary-only arcs that close blocks without road attribution
        #[arg(long)]
        boundary: Option<PathBuf>,
    },
    /// Classify match cardinality between two line networks
    Conflate {
        #[arg(long)]
        source: PathBuf,

        #[arg(long)]
        target: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let start_time = std::time::Instant::now();

    if let Some(threads) = cli.common.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    let config = match &cli.common.config {
        Some(path) => Config::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    let reprojector = Reprojector::new(&config.projection)?;
    fs::create_dir_all(&cli.common.output)?;

    match &cli.command {
        Command::Validate { roads, ferries, points } => {
            validate(&config, &reprojector, &cli.common.output, roads, ferries.as_deref(), points)?
        }
        Command::Meshblock { roads, boundary } => {
            meshblock(&config, &reprojector, &cli.common.output, roads, boundary.as_deref())?
        }
        Command::Conflate { source, target } => conflate(&config, &reprojector, &cli.common.output, source, target)?,
    }

    info!("Total processing time: {:?}", start_time.elapsed());
    Ok(())
}

fn layer_name(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("layer");
    name.split('.').next().unwrap_or(name).to_string()
}

/// Reserves an output file stem, suffixing `_2`, `_3`, ... when two inputs
/// would otherwise write over each other.
fn claim_stem(taken: &mut HashSet<String>, base: String) -> String {
    let mut stem = base.clone();
    let mut n = 1;
    while !taken.insert(stem.clone()) {
        n += 1;
        stem = format!("{base}_{n}");
    }
    stem
}

fn load_lines(path: &Path, config: &Config, reprojector: &Reprojector) -> Result<LineLayer> {
    let raw = readers::read_features(path).with_context(|| format!("reading {}", path.display()))?;
    let mut layer = readers::into_line_layer(&layer_name(path), raw, &config.id_field);
    reprojector.lines(&mut layer)?;
    if layer.is_empty() {
        warn!("No line features found in {}", path.display());
    }
    info!("✓ Loaded {} arcs from {}", layer.len(), path.display());
    Ok(layer)
}

fn load_points(path: &Path, config: &Config, reprojector: &Reprojector) -> Result<PointLayer> {
    let raw = readers::read_features(path).with_context(|| format!("reading {}", path.display()))?;
    let mut layer = readers::into_point_layer(&layer_name(path), raw, &config.id_field);
    reprojector.points(&mut layer)?;
    if layer.is_empty() {
        warn!("No point features found in {}", path.display());
    }
    info!("✓ Loaded {} points from {}", layer.len(), path.display());
    Ok(layer)
}

fn validate(
    config: &Config,
    reprojector: &Reprojector,
    output: &Path,
    roads: &Path,
    ferries: Option<&Path>,
    points: &[PathBuf],
) -> Result<()> {
    let context = RuleContext {
        thresholds: config.thresholds.clone(),
        id_field: config.id_field.clone(),
        today: chrono::Local::now().date_naive(),
    };
    let precision = config.thresholds.node_precision;
    let epsg = reprojector.target_epsg();
    let mut report = ValidationReport::new();

    let road_network = LineNetwork::new(load_lines(roads, config, reprojector)?, LayerRole::Road, precision);
    let ferry_network = match ferries {
        Some(path) => Some(LineNetwork::new(load_lines(path, config, reprojector)?, LayerRole::Ferry, precision)),
        None => None,
    };

    let mut networks = vec![(&road_network, ferry_network.as_ref().map(|n| &n.layer))];
    if let Some(ferry_network) = &ferry_network {
        networks.push((ferry_network, Some(&road_network.layer)));
    }
    let mut taken = HashSet::new();
    for (network, neighbours) in networks {
        let findings = pipeline::validate_network(network, neighbours, &context, &mut report);
        let name = &network.layer.name;
        let stem = claim_stem(&mut taken, format!("{}_{}", network.role.label(), name));
        io::write_flagged_arcs(&network.layer, &findings, &output.join(format!("{stem}_flagged.fgb")), epsg)?;
        io::write_reference_points(name, &findings, &output.join(format!("{stem}_deadends.fgb")), epsg)?;
    }

    for path in points {
        let layer = load_points(path, config, reprojector)?;
        let findings = pipeline::validate_points(&layer, &context, &mut report);
        let stem = claim_stem(&mut taken, format!("point_{}", layer.name));
        io::write_flagged_points(&layer, &findings, &output.join(format!("{stem}_flagged.fgb")), epsg)?;
    }

    let report_path = output.join("validation_report.json");
    report.write_json(&report_path)?;
    info!(
        "\n--- Summary ---\n{} flags across {} layers, report written to {}",
        report.flagged_total(),
        report.layers.len(),
        report_path.display()
    );
    Ok(())
}

fn meshblock(
    config: &Config,
    reprojector: &Reprojector,
    output: &Path,
    roads: &Path,
    boundary: Option<&Path>,
) -> Result<()> {
    let roads = load_lines(roads, config, reprojector)?;
    let boundary = boundary
        .map(|path| load_lines(path, config, reprojector))
        .transpose()?;

    let result = meshblock::build_meshblocks(&roads, boundary.as_ref(), config.thresholds.node_precision)?;
    io::write_meshblocks(&result, output, reprojector.target_epsg())?;

    let summary = result.summary();
    let summary_path = output.join("meshblock_summary.json");
    serde_json::to_writer_pretty(fs::File::create(&summary_path)?, &summary)?;
    info!(
        "✓ {} meshblocks ({:.0} m²), {} of {} arcs missing a closing connection",
        summary.meshblock_count, summary.total_area, summary.missing_count, summary.arc_count
    );
    Ok(())
}

fn conflate(config: &Config, reprojector: &Reprojector, output: &Path, source: &Path, target: &Path) -> Result<()> {
    let source = load_lines(source, config, reprojector)?;
    let target = load_lines(target, config, reprojector)?;
    let epsg = reprojector.target_epsg();

    let result = conflation::conflate(&source, &target, &config.conflation);
    io::write_conflation(&source, &result.source, &output.join(format!("source_{}_conflation.fgb", source.name)), epsg)?;
    io::write_conflation(&target, &result.target, &output.join(format!("target_{}_conflation.fgb", target.name)), epsg)?;

    let summary_path = output.join("conflation_report.json");
    serde_json::to_writer_pretty(fs::File::create(&summary_path)?, &result)?;
    info!("✓ Conflation report written to {}", summary_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_stem_inputs_get_distinct_outputs() {
        let roads = layer_name(Path::new("nb/data/roadseg.geojson"));
        let ferries = layer_name(Path::new("ns/data.geojsonl.gz"));
        assert_eq!(roads, "roadseg");
        assert_eq!(ferries, "data");

        let mut taken = HashSet::new();
        assert_eq!(claim_stem(&mut taken, format!("{}_data", LayerRole::Road.label())), "road_data");
        assert_eq!(claim_stem(&mut taken, format!("{}_data", LayerRole::Ferry.label())), "ferry_data");
        assert_eq!(claim_stem(&mut taken, "point_data".to_string()), "point_data");
        assert_eq!(claim_stem(&mut taken, "point_data".to_string()), "point_data_2");
        assert_eq!(claim_stem(&mut taken, "point_data".to_string()), "point_data_3");
    }
}
