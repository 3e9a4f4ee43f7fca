//! Effective-capacity resolution from vehicle master data, trained skills
//! and fitted cargo expanders.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{CapacityBreakdown, CapacityResolver, ServiceError, SkillSet, VehicleProfile};

/// Hold bonus per trained cargo-handling level.
const CARGO_SKILL_PCT_PER_LEVEL: f64 = 5.0;

const MAX_SKILL_LEVEL: u8 = 5;

/// Capacity resolver backed by an in-process vehicle table.
#[derive(Clone, Debug, Default)]
pub struct CapacityService {
    vehicles: HashMap<u32, VehicleProfile>,
    /// Extra volume granted by fitted expanders, per vehicle type.
    fitting_bonus: HashMap<u32, f64>,
}

impl CapacityService {
    pub fn new(vehicles: Vec<VehicleProfile>) -> Self {
        Self {
            vehicles: vehicles.into_iter().map(|v| (v.type_id, v)).collect(),
            fitting_bonus: HashMap::new(),
        }
    }

    /// A small stock table of common haulers, for runs without custom
    /// master data.
    pub fn with_stock_vehicles() -> Self {
        Self::new(vec![
            VehicleProfile {
                type_id: 648,
                name: "Badger".to_string(),
                base_capacity: 3_900.0,
                warp_speed_au_s: 4.5,
                align_time_s: 9.0,
            },
            VehicleProfile {
                type_id: 649,
                name: "Tayra".to_string(),
                base_capacity: 5_250.0,
                warp_speed_au_s: 4.5,
                align_time_s: 11.0,
            },
            VehicleProfile {
                type_id: 650,
                name: "Nereus".to_string(),
                base_capacity: 2_700.0,
                warp_speed_au_s: 4.5,
                align_time_s: 7.0,
            },
            VehicleProfile {
                type_id: 655,
                name: "Iteron Mark V".to_string(),
                base_capacity: 5_800.0,
                warp_speed_au_s: 4.5,
                align_time_s: 12.0,
            },
        ])
    }

    pub fn with_fitting_bonus(mut self, vehicle_type_id: u32, bonus_volume: f64) -> Self {
        self.fitting_bonus.insert(vehicle_type_id, bonus_volume);
        self
    }
}

#[async_trait]
impl CapacityResolver for CapacityService {
    fn vehicle(&self, vehicle_type_id: u32) -> Result<VehicleProfile, ServiceError> {
        self.vehicles
            .get(&vehicle_type_id)
            .cloned()
            .ok_or_else(|| ServiceError::Lookup(format!("unknown vehicle type {vehicle_type_id}")))
    }

    async fn effective_capacity(
        &self,
        vehicle_type_id: u32,
        skills: &SkillSet,
    ) -> Result<CapacityBreakdown, ServiceError> {
        let vehicle = self.vehicle(vehicle_type_id)?;
        let bonus_pct =
            CARGO_SKILL_PCT_PER_LEVEL * skills.cargo_handling.min(MAX_SKILL_LEVEL) as f64;
        let fitting_bonus_volume = self
            .fitting_bonus
            .get(&vehicle_type_id)
            .copied()
            .unwrap_or(0.0);
        let effective =
            vehicle.base_capacity * (1.0 + bonus_pct / 100.0) + fitting_bonus_volume;
        Ok(CapacityBreakdown {
            base: vehicle.base_capacity,
            bonus_pct,
            fitting_bonus_volume,
            effective,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_vehicles_fail_the_lookup() {
        let service = CapacityService::with_stock_vehicles();
        assert!(service.vehicle(1).is_err());
        assert!(service.vehicle(648).is_ok());
    }

    #[tokio::test]
    async fn skills_and_fittings_raise_the_base_figure() {
        let service = CapacityService::with_stock_vehicles().with_fitting_bonus(648, 500.0);
        let skills = SkillSet {
            cargo_handling: 4,
            ..SkillSet::worst_case()
        };

        let breakdown = service.effective_capacity(648, &skills).await.unwrap();

        assert_eq!(breakdown.base, 3_900.0);
        assert_eq!(breakdown.bonus_pct, 20.0);
        assert_eq!(breakdown.fitting_bonus_volume, 500.0);
        assert!((breakdown.effective - (3_900.0 * 1.20 + 500.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn worst_case_skills_leave_the_base_untouched() {
        let service = CapacityService::with_stock_vehicles();
        let breakdown = service
            .effective_capacity(650, &SkillSet::worst_case())
            .await
            .unwrap();

        assert_eq!(breakdown.effective, breakdown.base);
        assert_eq!(breakdown.bonus_pct, 0.0);
    }
}
