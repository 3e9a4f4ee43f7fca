//! Boundary contracts for the external collaborators the pipeline consumes.
//!
//! The pipeline only ever sees these traits; concrete implementations
//! (HTTP client, stargate graph, fee schedule) live in `infra`.

use async_trait::async_trait;
use thiserror::Error;

use super::entities::{CapacityBreakdown, Order, SkillSet, Travel, TypeInfo, VehicleProfile};

/// Failure of a collaborator call. The pipeline decides per call site
/// whether this is fatal, degradable or a per-item skip.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("lookup failed: {0}")]
    Lookup(String),
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Source of regional order books (upstream API, possibly cache-backed).
#[async_trait]
pub trait OrderBookProvider: Send + Sync {
    async fn fetch_orders(&self, region_id: u32) -> Result<Vec<Order>, ServiceError>;
}

/// Item names and packaged volumes.
#[async_trait]
pub trait ItemMasterData: Send + Sync {
    async fn type_info(&self, type_id: u32) -> Result<TypeInfo, ServiceError>;
    async fn item_volume(&self, type_id: u32) -> Result<f64, ServiceError>;
}

/// Resolves a vehicle plus trained skills into an effective cargo capacity.
/// Callers degrade to `CapacityBreakdown::base_only` when this fails.
#[async_trait]
pub trait CapacityResolver: Send + Sync {
    fn vehicle(&self, vehicle_type_id: u32) -> Result<VehicleProfile, ServiceError>;

    async fn effective_capacity(
        &self,
        vehicle_type_id: u32,
        skills: &SkillSet,
    ) -> Result<CapacityBreakdown, ServiceError>;
}

/// One-way travel figures between two solar systems for a given vehicle.
#[async_trait]
pub trait TravelTimeService: Send + Sync {
    async fn travel_time(
        &self,
        from_system: u32,
        to_system: u32,
        vehicle: &VehicleProfile,
    ) -> Result<Travel, ServiceError>;
}

/// Trade fee schedule. Both fees honor a minimum absolute floor.
pub trait FeeSchedule: Send + Sync {
    /// Fee for placing an order of the given total value.
    fn broker_fee(&self, broker_relations: u8, order_value: f64) -> f64;

    /// Tax charged when stock is sold for the given total value.
    fn sales_tax(&self, accounting: u8, order_value: f64) -> f64;
}
