//! Domain logic for route discovery and cargo optimization lives here.

pub mod entities;
pub mod optimizer;
pub mod routes;
pub mod scanner;
pub mod services;

pub use entities::{
    CapacityBreakdown, LoadableItem, Loadout, LoadoutEntry, Opportunity, Order, OrderSide, Route,
    RunResult, SkillSet, Travel, TypeInfo, VehicleProfile,
};
pub use optimizer::{optimize, optimize_with_capacity};
pub use routes::{
    batch_seconds, effective_one_way, plan_tours, post_process, profit_per_hour, RouteFilter,
    TourPlan, MAX_RESULTS, MAX_TOURS, MIN_ONE_WAY_SECONDS,
};
pub use scanner::{scan, DEFAULT_MIN_SPREAD_PCT};
pub use services::{
    CapacityResolver, FeeSchedule, ItemMasterData, OrderBookProvider, ServiceError,
    TravelTimeService,
};
