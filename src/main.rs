mod app;
mod domain;
mod infra;
mod util;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::app::{RoutePipeline, RunRequest};
use crate::domain::{optimize_with_capacity, LoadableItem, RouteFilter, SkillSet};
use crate::infra::capacity::CapacityService;
use crate::infra::fees::StandardFees;
use crate::infra::navigation::StargateGraph;
use crate::infra::universe::UniverseClient;
use crate::util::settings::{load_settings, save_settings, PersistedSettings};
use crate::util::version::version_label;

/// Find and rank profitable hauling routes from regional order books.
#[derive(Debug, Parser)]
#[command(name = "trade_route_planner", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan a region's order book and rank hauling routes for a vehicle.
    Routes(RoutesArgs),
    /// Plan the value-maximizing cargo loadout from an item list.
    Loadout(LoadoutArgs),
}

#[derive(Debug, Args)]
struct RoutesArgs {
    /// Market region to scan.
    #[arg(long, env = "TRP_REGION_ID")]
    region_id: Option<u32>,

    /// Vehicle type doing the hauling.
    #[arg(long, env = "TRP_VEHICLE_TYPE_ID")]
    vehicle_type_id: Option<u32>,

    /// Trained accounting level (0-5).
    #[arg(long)]
    accounting: Option<u8>,

    /// Trained broker-relations level (0-5).
    #[arg(long)]
    broker_relations: Option<u8>,

    /// Trained cargo-handling level (0-5).
    #[arg(long)]
    cargo_handling: Option<u8>,

    /// Stargate graph JSON (systems + gates). Without one, only
    /// same-system routes get travel times.
    #[arg(long)]
    graph: Option<PathBuf>,

    /// Upper bound on buy-side outlay.
    #[arg(long)]
    max_investment: Option<f64>,

    #[arg(long)]
    min_profit_per_hour: Option<f64>,

    #[arg(long)]
    max_jumps: Option<u32>,

    /// Persist this query's context as the new defaults.
    #[arg(long)]
    save: bool,
}

#[derive(Debug, Args)]
struct LoadoutArgs {
    /// JSON array of loadable items: type_id, unit_volume, unit_value,
    /// quantity.
    #[arg(long)]
    items: PathBuf,

    /// Hold size before bonuses.
    #[arg(long)]
    base_capacity: f64,

    /// Skill/fitting bonus applied on top of the base hold, in percent.
    #[arg(long, default_value_t = 0.0)]
    bonus_pct: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Routes(args) => run_routes(args).await,
        Command::Loadout(args) => run_loadout(args),
    }
}

async fn run_routes(args: RoutesArgs) -> anyhow::Result<()> {
    let settings = load_settings().unwrap_or_default();

    let region_id = args
        .region_id
        .or(settings.region_id)
        .context("no region id given; pass --region-id or store one with --save")?;
    let vehicle_type_id = args
        .vehicle_type_id
        .or(settings.vehicle_type_id)
        .context("no vehicle type given; pass --vehicle-type-id or store one with --save")?;

    let skills = SkillSet {
        accounting: args.accounting.unwrap_or(settings.skills.accounting),
        broker_relations: args
            .broker_relations
            .unwrap_or(settings.skills.broker_relations),
        cargo_handling: args.cargo_handling.unwrap_or(settings.skills.cargo_handling),
    };
    let filter = RouteFilter {
        max_investment: args.max_investment.or(settings.filter.max_investment),
        min_profit_per_hour: args
            .min_profit_per_hour
            .or(settings.filter.min_profit_per_hour),
        max_jumps: args.max_jumps.or(settings.filter.max_jumps),
    };

    let graph_path = args.graph.clone().or_else(|| settings.graph_path.clone());
    let graph = match &graph_path {
        Some(path) => StargateGraph::from_json_file(path)
            .with_context(|| format!("loading gate graph from {}", path.display()))?,
        None => StargateGraph::default(),
    };

    if args.save {
        save_settings(&PersistedSettings {
            region_id: Some(region_id),
            vehicle_type_id: Some(vehicle_type_id),
            skills,
            filter: filter.clone(),
            graph_path,
        })?;
    }

    let client = Arc::new(UniverseClient::new().context("building market client")?);
    let pipeline = RoutePipeline::new(
        client.clone(),
        client,
        Arc::new(CapacityService::with_stock_vehicles()),
        Arc::new(graph),
        Arc::new(StandardFees),
    );

    tracing::info!(
        version = %version_label(),
        region_id,
        vehicle_type_id,
        "starting route discovery"
    );

    let result = pipeline
        .run(RunRequest {
            region_id,
            vehicle_type_id,
            skills,
            filter,
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn run_loadout(args: LoadoutArgs) -> anyhow::Result<()> {
    let raw = fs::read_to_string(&args.items)
        .with_context(|| format!("reading item list from {}", args.items.display()))?;
    let items: Vec<LoadableItem> =
        serde_json::from_str(&raw).context("parsing loadable item list")?;

    let loadout = optimize_with_capacity(&items, args.base_capacity, args.bonus_pct);

    println!("{}", serde_json::to_string_pretty(&loadout)?);
    Ok(())
}
