//! Travel times over a static stargate graph.
//!
//! The graph is loaded once (bundled defaults or a JSON file) and queried
//! per route leg. All gate hops cost the same for a given vehicle, so the
//! jump-minimizing path is also the time-minimizing one.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use pathfinding::prelude::bfs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ServiceError, Travel, TravelTimeService, VehicleProfile};

/// Average in-system warp distance covered per gate hop.
const AVG_WARP_AU_PER_SYSTEM: f64 = 40.0;
/// Gate lock, session change and re-align overhead per hop.
const GATE_ACTIVATION_SECONDS: f64 = 10.0;

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("failed to read graph file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse graph file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One solar system node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StarSystem {
    pub system_id: u32,
    pub name: String,
    #[serde(default)]
    pub security: f64,
}

#[derive(Debug, Deserialize)]
struct GraphFile {
    systems: Vec<StarSystem>,
    /// Undirected gate connections as [from, to] pairs.
    gates: Vec<(u32, u32)>,
}

/// Static stargate topology with an adjacency index.
#[derive(Clone, Debug, Default)]
pub struct StargateGraph {
    systems: HashMap<u32, StarSystem>,
    adjacency: HashMap<u32, Vec<u32>>,
}

impl StargateGraph {
    pub fn new(systems: Vec<StarSystem>, gates: Vec<(u32, u32)>) -> Self {
        let systems: HashMap<u32, StarSystem> =
            systems.into_iter().map(|s| (s.system_id, s)).collect();
        let mut adjacency: HashMap<u32, Vec<u32>> = HashMap::new();
        for (a, b) in gates {
            if !systems.contains_key(&a) || !systems.contains_key(&b) {
                continue;
            }
            adjacency.entry(a).or_default().push(b);
            adjacency.entry(b).or_default().push(a);
        }
        Self { systems, adjacency }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, NavigationError> {
        let raw = fs::read_to_string(path)?;
        let file: GraphFile = serde_json::from_str(&raw)?;
        Ok(Self::new(file.systems, file.gates))
    }

    pub fn contains(&self, system_id: u32) -> bool {
        self.systems.contains_key(&system_id)
    }

    fn jump_path(&self, from: u32, to: u32) -> Option<Vec<u32>> {
        bfs(
            &from,
            |system| {
                self.adjacency.get(system).cloned().unwrap_or_default()
            },
            |system| *system == to,
        )
    }
}

/// Seconds for one gate-to-gate hop with the given vehicle.
fn seconds_per_jump(vehicle: &VehicleProfile) -> f64 {
    let warp_speed = vehicle.warp_speed_au_s.max(0.1);
    vehicle.align_time_s + AVG_WARP_AU_PER_SYSTEM / warp_speed + GATE_ACTIVATION_SECONDS
}

#[async_trait]
impl TravelTimeService for StargateGraph {
    async fn travel_time(
        &self,
        from_system: u32,
        to_system: u32,
        vehicle: &VehicleProfile,
    ) -> Result<Travel, ServiceError> {
        if from_system == to_system {
            // Truthful zero-length trip; callers substitute their own floor.
            return Ok(Travel {
                jumps: 0,
                seconds: 0.0,
                path: vec![from_system],
            });
        }
        if !self.contains(from_system) || !self.contains(to_system) {
            return Err(ServiceError::Lookup(format!(
                "system {from_system} or {to_system} not in the gate graph"
            )));
        }

        let path = self.jump_path(from_system, to_system).ok_or_else(|| {
            ServiceError::Lookup(format!(
                "no gate route between {from_system} and {to_system}"
            ))
        })?;
        let jumps = path.len().saturating_sub(1) as u32;

        Ok(Travel {
            jumps,
            seconds: jumps as f64 * seconds_per_jump(vehicle),
            path,
        })
    }
}
