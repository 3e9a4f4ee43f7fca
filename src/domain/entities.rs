#![allow(dead_code)]

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of the order book an order sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// A single market order from the regional order book.
/// Immutable once fetched; identified by `order_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: u64,
    pub type_id: u32,
    /// Station/structure the order lives at.
    pub location_id: u64,
    /// Solar system containing the location, for travel-time lookups.
    pub system_id: u32,
    pub side: OrderSide,
    pub price: f64,
    pub volume_total: u64,
    pub volume_remain: u64,
    /// Smallest fill the order accepts, if the issuer set one.
    pub min_volume: Option<u64>,
    pub issued: SystemTime,
    pub duration_days: u32,
}

impl Order {
    pub fn is_sell(&self) -> bool {
        self.side == OrderSide::Sell
    }

    pub fn is_buy(&self) -> bool {
        self.side == OrderSide::Buy
    }
}

/// A two-sided spread worth hauling: acquire stock at the market's lowest
/// sell order, offload it into the highest buy order somewhere else.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub type_id: u32,
    pub type_name: String,
    pub unit_volume: f64,

    // Acquisition side (the market's lowest sell order)
    pub buy_location_id: u64,
    pub buy_system_id: u32,
    pub buy_price: f64,

    // Disposal side (the market's highest buy order)
    pub sell_location_id: u64,
    pub sell_system_id: u32,
    pub sell_price: f64,

    /// (sell_price - buy_price) / buy_price * 100.
    pub spread_pct: f64,
    /// min(sell-side remaining, buy-side remaining): you can neither buy
    /// more than is offered nor sell more than is demanded.
    pub available_quantity: u64,
    pub available_volume: f64,
}

/// An item eligible for cargo loading, as seen by the optimizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadableItem {
    pub type_id: u32,
    /// Volume per unit. Must be > 0; non-positive volumes are excluded
    /// upstream and treated as unselectable here.
    pub unit_volume: f64,
    pub unit_value: f64,
    pub quantity: u64,
}

impl LoadableItem {
    /// Value per unit of volume, the ranking key of the greedy fallback.
    pub fn value_density(&self) -> f64 {
        if self.unit_volume > 0.0 {
            self.unit_value / self.unit_volume
        } else {
            0.0
        }
    }
}

/// One chosen line of a loadout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadoutEntry {
    pub type_id: u32,
    pub quantity: u64,
    pub volume: f64,
    pub value: f64,
}

/// The value-maximizing selection for a given capacity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Loadout {
    pub entries: Vec<LoadoutEntry>,
    pub total_volume: f64,
    pub total_value: f64,
    pub utilization_pct: f64,
    /// Present when the caller supplied a capacity breakdown.
    pub base_capacity: Option<f64>,
    pub bonus_pct: Option<f64>,
}

/// A fully costed haul for one opportunity: tour sizing, travel time, fees
/// and the resulting profitability figures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub opportunity: Opportunity,

    /// Number of load-and-deliver cycles, capped at 10.
    pub tours: u32,
    pub quantity_per_tour: u64,
    pub total_quantity: u64,

    pub jumps: u32,
    pub one_way_seconds: f64,
    pub round_trip_seconds: f64,
    /// (tours - 1) * round trip + one way; the final tour does not return.
    pub total_seconds: f64,

    pub gross_profit: f64,
    pub broker_fees: f64,
    pub sales_tax: f64,
    pub net_profit: f64,

    pub cargo_utilization_pct: f64,
    pub profit_per_hour: f64,
}

impl Route {
    pub fn total_fees(&self) -> f64 {
        self.broker_fees + self.sales_tax
    }
}

/// Response of one pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub region_id: u32,
    pub vehicle_type_id: u32,
    pub effective_capacity: f64,
    /// Ranked by profit per hour, positive net profit only, at most 50.
    pub routes: Vec<Route>,
    pub elapsed_ms: u64,
    /// Set when a phase exhausted its time budget and the list is partial.
    pub warning: Option<String>,
}

/// Vehicle master data needed for capacity and travel-time resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleProfile {
    pub type_id: u32,
    pub name: String,
    pub base_capacity: f64,
    pub warp_speed_au_s: f64,
    pub align_time_s: f64,
}

/// Trained skill levels (0-5) feeding fee and capacity formulas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSet {
    pub accounting: u8,
    pub broker_relations: u8,
    pub cargo_handling: u8,
}

impl SkillSet {
    /// All levels zero: the conservative inputs used when character data
    /// is unavailable.
    pub fn worst_case() -> Self {
        Self::default()
    }
}

/// How an effective capacity figure was reached.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapacityBreakdown {
    pub base: f64,
    pub bonus_pct: f64,
    pub fitting_bonus_volume: f64,
    pub effective: f64,
}

impl CapacityBreakdown {
    /// Degraded form: base capacity with zero bonuses.
    pub fn base_only(base: f64) -> Self {
        Self {
            base,
            bonus_pct: 0.0,
            fitting_bonus_volume: 0.0,
            effective: base,
        }
    }
}

/// One-way travel figures between two systems.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Travel {
    pub jumps: u32,
    pub seconds: f64,
    pub path: Vec<u32>,
}

/// Item master data relevant to route discovery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub type_id: u32,
    pub name: String,
}
