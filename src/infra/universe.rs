#![allow(dead_code)]

//! Thin asynchronous client for the universe market API.
//!
//! - Typed accessors for regional order books and item master data.
//! - Short in-memory cache with stale fallbacks, backed by the on-disk
//!   snapshots in [`crate::infra::cache`].
//! - Order books are paginated upstream; the client walks every page.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use itertools::Itertools;
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{
    ItemMasterData, Order, OrderBookProvider, OrderSide, ServiceError, TypeInfo,
};
use crate::infra::cache::{
    load_item_catalog, load_order_book, save_item_catalog, save_order_book, ItemCatalog,
    OrderBookSnapshot,
};
use crate::util::version::user_agent;

const DEFAULT_BASE_URL: &str = "https://esi.evetech.net/latest/";
const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum UniverseClientError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error: {0}")]
    Api(String),
}

impl From<UniverseClientError> for ServiceError {
    fn from(err: UniverseClientError) -> Self {
        ServiceError::Unavailable(err.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    Fresh,
    Cached,
    Stale,
}

#[derive(Clone, Debug)]
pub struct CachedPayload<T> {
    pub data: T,
    pub fetched_at: SystemTime,
    pub status: CacheStatus,
}

impl<T> CachedPayload<T> {
    fn new(data: T, fetched_at: SystemTime, status: CacheStatus) -> Self {
        Self {
            data,
            fetched_at,
            status,
        }
    }
}

#[derive(Default)]
struct UniverseCache {
    order_books: HashMap<u32, Cached<Vec<Order>>>,
}

#[derive(Clone)]
pub struct UniverseClient {
    http: Client,
    base_url: Url,
    cache: Arc<Mutex<UniverseCache>>,
    catalog: Arc<Mutex<ItemCatalog>>,
    ttl: Duration,
}

impl UniverseClient {
    pub fn new() -> Result<Self, UniverseClientError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base: &str) -> Result<Self, UniverseClientError> {
        let base_url = Url::parse(base)?;
        let http = Client::builder().user_agent(user_agent()).build()?;
        Ok(Self {
            http,
            base_url,
            cache: Arc::new(Mutex::new(UniverseCache::default())),
            catalog: Arc::new(Mutex::new(load_item_catalog())),
            ttl: DEFAULT_TTL,
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Regional order book: memory, then disk snapshot, then the API.
    /// Upstream failures fall back to a stale in-memory book when one
    /// exists.
    pub async fn get_orders(
        &self,
        region_id: u32,
    ) -> Result<CachedPayload<Vec<Order>>, UniverseClientError> {
        if let Some(payload) = self.cached_orders(region_id).await {
            return Ok(payload);
        }

        if let Some(snapshot) = load_order_book(region_id) {
            return Ok(self
                .store_orders(region_id, snapshot.orders, CacheStatus::Cached)
                .await);
        }

        match self.fetch_all_order_pages(region_id).await {
            Ok(orders) => {
                if let Err(err) = save_order_book(&OrderBookSnapshot::new(region_id, orders.clone()))
                {
                    warn!(region_id, %err, "failed to save order-book snapshot");
                }
                Ok(self
                    .store_orders(region_id, orders, CacheStatus::Fresh)
                    .await)
            }
            Err(error) => {
                if let Some(stale) = self.cached_orders_stale(region_id).await {
                    warn!(region_id, %error, "order fetch failed, serving stale book");
                    return Ok(stale);
                }
                Err(error)
            }
        }
    }

    async fn fetch_all_order_pages(
        &self,
        region_id: u32,
    ) -> Result<Vec<Order>, UniverseClientError> {
        let (first, pages) = self.fetch_orders_page(region_id, 1).await?;
        let mut dtos = first;
        for page in 2..=pages {
            let (more, _) = self.fetch_orders_page(region_id, page).await?;
            dtos.extend(more);
        }
        debug!(region_id, pages, orders = dtos.len(), "fetched order book");

        // Pages can shift between requests; keep each order once.
        Ok(dtos
            .into_iter()
            .unique_by(|dto| dto.order_id)
            .map(Order::from)
            .collect())
    }

    async fn fetch_orders_page(
        &self,
        region_id: u32,
        page: u32,
    ) -> Result<(Vec<OrderDto>, u32), UniverseClientError> {
        let mut url = self.url(&format!("markets/{region_id}/orders/"))?;
        url.query_pairs_mut()
            .append_pair("order_type", "all")
            .append_pair("page", &page.to_string());

        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<ApiError>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(UniverseClientError::Api(message));
        }

        let pages = response
            .headers()
            .get("x-pages")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .unwrap_or(1);
        let dtos = response.json::<Vec<OrderDto>>().await?;
        Ok((dtos, pages))
    }

    /// Name and packaged volume for a type, fetched once and kept in the
    /// persistent catalog.
    async fn ensure_type(&self, type_id: u32) -> Result<(String, f64), UniverseClientError> {
        {
            let catalog = self.catalog.lock().await;
            if let (Some(name), Some(volume)) = (
                catalog.names.get(&type_id),
                catalog.volumes.get(&type_id),
            ) {
                return Ok((name.clone(), *volume));
            }
        }

        let url = self.url(&format!("universe/types/{type_id}/"))?;
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<ApiError>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(UniverseClientError::Api(message));
        }
        let dto: TypeDto = response.json().await?;
        let name = dto.name.clone();
        let volume = dto.effective_volume();

        let mut catalog = self.catalog.lock().await;
        catalog.insert(type_id, dto.name, volume);
        if let Err(err) = save_item_catalog(&catalog) {
            warn!(type_id, %err, "failed to persist item catalog");
        }

        Ok((name, volume))
    }

    async fn cached_orders(&self, region_id: u32) -> Option<CachedPayload<Vec<Order>>> {
        let cache = self.cache.lock().await;
        let payload = cache
            .order_books
            .get(&region_id)
            .and_then(|entry| entry.if_fresh(self.ttl));
        if payload.is_some() {
            debug!(region_id, "serving in-memory order book");
        }
        payload
    }

    async fn cached_orders_stale(&self, region_id: u32) -> Option<CachedPayload<Vec<Order>>> {
        let cache = self.cache.lock().await;
        cache.order_books.get(&region_id).map(Cached::stale)
    }

    async fn store_orders(
        &self,
        region_id: u32,
        orders: Vec<Order>,
        status: CacheStatus,
    ) -> CachedPayload<Vec<Order>> {
        let fetched_at = SystemTime::now();
        let payload = CachedPayload::new(orders.clone(), fetched_at, status);
        let mut cache = self.cache.lock().await;
        cache
            .order_books
            .insert(region_id, Cached::new(orders, fetched_at));
        payload
    }

    fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }
}

#[async_trait]
impl OrderBookProvider for UniverseClient {
    async fn fetch_orders(&self, region_id: u32) -> Result<Vec<Order>, ServiceError> {
        Ok(self.get_orders(region_id).await?.data)
    }
}

#[async_trait]
impl ItemMasterData for UniverseClient {
    async fn type_info(&self, type_id: u32) -> Result<TypeInfo, ServiceError> {
        let (name, _) = self.ensure_type(type_id).await?;
        Ok(TypeInfo { type_id, name })
    }

    async fn item_volume(&self, type_id: u32) -> Result<f64, ServiceError> {
        let (_, volume) = self.ensure_type(type_id).await?;
        Ok(volume)
    }
}

struct Cached<T> {
    value: T,
    fetched_at: SystemTime,
}

impl<T: Clone> Cached<T> {
    fn new(value: T, fetched_at: SystemTime) -> Self {
        Self { value, fetched_at }
    }

    fn if_fresh(&self, ttl: Duration) -> Option<CachedPayload<T>> {
        if self
            .fetched_at
            .elapsed()
            .map(|elapsed| elapsed <= ttl)
            .unwrap_or(false)
        {
            Some(CachedPayload::new(
                self.value.clone(),
                self.fetched_at,
                CacheStatus::Cached,
            ))
        } else {
            None
        }
    }

    fn stale(&self) -> CachedPayload<T> {
        CachedPayload::new(self.value.clone(), self.fetched_at, CacheStatus::Stale)
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

#[derive(Debug, Deserialize)]
struct OrderDto {
    order_id: u64,
    type_id: u32,
    location_id: u64,
    system_id: u32,
    is_buy_order: bool,
    price: f64,
    volume_total: u64,
    volume_remain: u64,
    #[serde(default)]
    min_volume: Option<u64>,
    #[serde(default)]
    issued: Option<String>,
    #[serde(default)]
    duration: u32,
}

impl From<OrderDto> for Order {
    fn from(dto: OrderDto) -> Self {
        Self {
            order_id: dto.order_id,
            type_id: dto.type_id,
            location_id: dto.location_id,
            system_id: dto.system_id,
            side: if dto.is_buy_order {
                OrderSide::Buy
            } else {
                OrderSide::Sell
            },
            price: dto.price,
            volume_total: dto.volume_total,
            volume_remain: dto.volume_remain,
            min_volume: dto.min_volume,
            issued: parse_timestamp_str(dto.issued.as_deref()),
            duration_days: dto.duration,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TypeDto {
    name: String,
    /// Hold-relevant volume; orders move packaged goods.
    #[serde(default)]
    packaged_volume: Option<f64>,
    #[serde(default)]
    volume: Option<f64>,
}

impl TypeDto {
    fn effective_volume(&self) -> f64 {
        self.packaged_volume.or(self.volume).unwrap_or(0.0)
    }
}

fn parse_timestamp_str(raw: Option<&str>) -> SystemTime {
    raw.and_then(|value| {
        OffsetDateTime::parse(value, &Rfc3339).ok().and_then(|dt| {
            if dt.unix_timestamp() >= 0 {
                let secs = dt.unix_timestamp() as u64;
                let nanos = dt.nanosecond() as u64;
                SystemTime::UNIX_EPOCH
                    .checked_add(Duration::from_secs(secs))
                    .and_then(|t| t.checked_add(Duration::from_nanos(nanos)))
            } else {
                None
            }
        })
    })
    .unwrap_or_else(SystemTime::now)
}
