//! Persistent on-disk caching for order-book snapshots and the item
//! catalog, with TTL tracking.

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::OnceLock,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::Order;

const APP_DIR: &str = "trade-route-planner";
const CATALOG_FILENAME: &str = "item_catalog.json";

/// Order books go stale fast; snapshots only bridge rapid re-queries.
pub const ORDER_BOOK_TTL: Duration = Duration::from_secs(5 * 60);

/// Item names and volumes only change with major patches.
pub const ITEM_CATALOG_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn age_label(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

fn cache_dir() -> PathBuf {
    static PATH: OnceLock<PathBuf> = OnceLock::new();
    PATH.get_or_init(|| {
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        let _ = fs::create_dir_all(&base);
        base
    })
    .clone()
}

/// A cached regional order book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub region_id: u32,
    /// Unix timestamp (seconds) when this snapshot was taken.
    pub cached_at: u64,
    pub orders: Vec<Order>,
}

impl OrderBookSnapshot {
    pub fn new(region_id: u32, orders: Vec<Order>) -> Self {
        Self {
            region_id,
            cached_at: unix_now(),
            orders,
        }
    }

    pub fn age(&self) -> Duration {
        Duration::from_secs(unix_now().saturating_sub(self.cached_at))
    }

    pub fn is_expired(&self) -> bool {
        self.age() > ORDER_BOOK_TTL
    }

    pub fn age_string(&self) -> String {
        age_label(self.age().as_secs())
    }
}

fn order_book_path(region_id: u32) -> PathBuf {
    cache_dir().join(format!("orders_{region_id}.json"))
}

/// Load a region's snapshot from disk if present and not expired.
pub fn load_order_book(region_id: u32) -> Option<OrderBookSnapshot> {
    let path = order_book_path(region_id);
    if !path.exists() {
        return None;
    }

    match fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str::<OrderBookSnapshot>(&content) {
            Ok(snapshot) => {
                if snapshot.is_expired() {
                    debug!(region_id, age = %snapshot.age_string(), "order-book snapshot expired");
                    return None;
                }
                debug!(
                    region_id,
                    orders = snapshot.orders.len(),
                    age = %snapshot.age_string(),
                    "loaded order-book snapshot"
                );
                Some(snapshot)
            }
            Err(err) => {
                warn!(region_id, %err, "failed to parse order-book snapshot");
                None
            }
        },
        Err(err) => {
            warn!(region_id, %err, "failed to read order-book snapshot");
            None
        }
    }
}

/// Save a region's snapshot to disk. Compact encoding, books can be large.
pub fn save_order_book(snapshot: &OrderBookSnapshot) -> Result<(), std::io::Error> {
    let path = order_book_path(snapshot.region_id);
    let content = serde_json::to_string(snapshot)?;
    fs::write(&path, content)?;
    debug!(
        region_id = snapshot.region_id,
        orders = snapshot.orders.len(),
        "saved order-book snapshot"
    );
    Ok(())
}

/// Cached item master data: names and packaged volumes by type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemCatalog {
    pub cached_at: u64,
    pub names: HashMap<u32, String>,
    pub volumes: HashMap<u32, f64>,
}

impl Default for ItemCatalog {
    fn default() -> Self {
        Self {
            cached_at: unix_now(),
            names: HashMap::new(),
            volumes: HashMap::new(),
        }
    }
}

impl ItemCatalog {
    pub fn age(&self) -> Duration {
        Duration::from_secs(unix_now().saturating_sub(self.cached_at))
    }

    pub fn is_expired(&self) -> bool {
        self.age() > ITEM_CATALOG_TTL
    }

    pub fn insert(&mut self, type_id: u32, name: String, volume: f64) {
        self.names.insert(type_id, name);
        self.volumes.insert(type_id, volume);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn catalog_path() -> PathBuf {
    cache_dir().join(CATALOG_FILENAME)
}

/// Load the item catalog from disk; an expired catalog starts fresh.
pub fn load_item_catalog() -> ItemCatalog {
    let path = catalog_path();
    if !path.exists() {
        return ItemCatalog::default();
    }

    match fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str::<ItemCatalog>(&content) {
            Ok(catalog) if !catalog.is_expired() => {
                debug!(entries = catalog.len(), age = %age_label(catalog.age().as_secs()), "loaded item catalog");
                catalog
            }
            Ok(catalog) => {
                debug!(age = %age_label(catalog.age().as_secs()), "item catalog expired, starting fresh");
                ItemCatalog::default()
            }
            Err(err) => {
                warn!(%err, "failed to parse item catalog");
                ItemCatalog::default()
            }
        },
        Err(err) => {
            warn!(%err, "failed to read item catalog");
            ItemCatalog::default()
        }
    }
}

pub fn save_item_catalog(catalog: &ItemCatalog) -> Result<(), std::io::Error> {
    let path = catalog_path();
    let content = serde_json::to_string(catalog)?;
    fs::write(&path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_snapshots_are_not_expired() {
        let snapshot = OrderBookSnapshot::new(10000002, Vec::new());
        assert!(!snapshot.is_expired());
        assert_eq!(snapshot.age_string(), "0s");
    }

    #[test]
    fn old_snapshots_expire() {
        let snapshot = OrderBookSnapshot {
            region_id: 10000002,
            cached_at: unix_now() - ORDER_BOOK_TTL.as_secs() - 60,
            orders: Vec::new(),
        };
        assert!(snapshot.is_expired());
    }

    #[test]
    fn age_labels_scale_with_magnitude() {
        assert_eq!(age_label(42), "42s");
        assert_eq!(age_label(150), "2m");
        assert_eq!(age_label(7200), "2h");
        assert_eq!(age_label(200_000), "2d");
    }

    #[test]
    fn catalog_tracks_both_maps() {
        let mut catalog = ItemCatalog::default();
        assert!(catalog.is_empty());

        catalog.insert(34, "Tritanium".to_string(), 0.01);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.volumes.get(&34), Some(&0.01));
        assert!(!catalog.is_expired());
    }
}
