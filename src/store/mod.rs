//! Order datastore collaborators
//!
//! Key lookup by order identifier. Store failures are collapsed to "not
//! found" before they reach the pipeline, so every downstream stage has a
//! defined order-present/absent branch. Backend selection mirrors startup
//! config: Postgres when DATABASE_URL is set, seeded in-memory otherwise.

use crate::models::{LineItem, Order, TaxVerifiedFlag};
use crate::Result;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Trait for order lookup and best-effort audit write-back
#[async_trait::async_trait]
pub trait OrderStore: Send + Sync {
    /// Exact-match lookup. Connectivity failures surface as None.
    async fn lookup(&self, order_id: &str) -> Option<Order>;

    /// Persist the tax-verification outcome on the order record.
    /// Called from a detached task; failures are logged, never awaited
    /// by the response path.
    async fn mark_tax_verified(&self, order_id: &str, flag: TaxVerifiedFlag) -> Result<()>;
}

//
// ================= In-Memory Store =================
//

/// In-memory order store for development and tests, seeded with demo
/// orders covering each tax-verification branch.
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<String, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn seeded() -> Self {
        let mut map = HashMap::new();
        for order in seed_orders() {
            map.insert(order.order_id.clone(), order);
        }
        Self {
            orders: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn insert(&self, order: Order) {
        let mut orders = self.orders.write().await;
        orders.insert(order.order_id.clone(), order);
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::seeded()
    }
}

#[async_trait::async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn lookup(&self, order_id: &str) -> Option<Order> {
        let orders = self.orders.read().await;
        orders.get(order_id).cloned()
    }

    async fn mark_tax_verified(&self, order_id: &str, flag: TaxVerifiedFlag) -> Result<()> {
        let mut orders = self.orders.write().await;
        if let Some(order) = orders.get_mut(order_id) {
            order.tax_verified = flag;
        }
        Ok(())
    }
}

fn seed_orders() -> Vec<Order> {
    vec![
        Order {
            order_id: "CERT-123456".to_string(),
            customer_name: "Jordan Li".to_string(),
            state: "NC".to_string(),
            county: "Wake".to_string(),
            status: "shipped".to_string(),
            tracking_number: Some("9400111899560001".to_string()),
            carrier: Some("USPS".to_string()),
            estimated_delivery: Some("2026-09-01".to_string()),
            items: vec![
                LineItem {
                    name: "Trail Stove".to_string(),
                    quantity: 1,
                    sku: "STV-220".to_string(),
                },
                LineItem {
                    name: "Fuel Canister".to_string(),
                    quantity: 2,
                    sku: "FUE-008".to_string(),
                },
            ],
            return_eligible: true,
            subtotal: 189.99,
            tax_rate: 0.0725,
            tax_collected: 13.77,
            tax_verified: TaxVerifiedFlag::Unverified,
            created_at: Utc.with_ymd_and_hms(2026, 8, 18, 14, 30, 0).unwrap(),
        },
        Order {
            order_id: "CERT-223344".to_string(),
            customer_name: "Sam Okafor".to_string(),
            state: "NC".to_string(),
            county: "Durham".to_string(),
            status: "processing".to_string(),
            tracking_number: None,
            carrier: None,
            estimated_delivery: None,
            items: vec![LineItem {
                name: "Backpacking Tent".to_string(),
                quantity: 1,
                sku: "TNT-410".to_string(),
            }],
            return_eligible: true,
            subtotal: 212.75,
            tax_rate: 0.065,
            tax_collected: 13.83,
            tax_verified: TaxVerifiedFlag::Unverified,
            created_at: Utc.with_ymd_and_hms(2026, 8, 24, 9, 5, 0).unwrap(),
        },
        Order {
            order_id: "CERT-765432".to_string(),
            customer_name: "Riley Fontaine".to_string(),
            state: "CA".to_string(),
            county: "Alameda".to_string(),
            status: "delivered".to_string(),
            tracking_number: Some("1Z58843W0398765432".to_string()),
            carrier: Some("UPS".to_string()),
            estimated_delivery: Some("2026-08-20".to_string()),
            items: vec![LineItem {
                name: "Headlamp Kit".to_string(),
                quantity: 1,
                sku: "LMP-102".to_string(),
            }],
            return_eligible: false,
            subtotal: 159.00,
            tax_rate: 0.0725,
            tax_collected: 11.53,
            tax_verified: TaxVerifiedFlag::Unverified,
            created_at: Utc.with_ymd_and_hms(2026, 8, 12, 17, 45, 0).unwrap(),
        },
        Order {
            order_id: "CERT-555123".to_string(),
            customer_name: "Casey Bruner".to_string(),
            state: "NC".to_string(),
            county: "Dare".to_string(),
            status: "shipped".to_string(),
            tracking_number: Some("7812039485761123".to_string()),
            carrier: Some("FedEx".to_string()),
            estimated_delivery: Some("2026-08-30".to_string()),
            items: vec![LineItem {
                name: "Surf Fishing Rod".to_string(),
                quantity: 1,
                sku: "ROD-330".to_string(),
            }],
            return_eligible: true,
            subtotal: 84.50,
            tax_rate: 0.0475,
            tax_collected: 5.92,
            tax_verified: TaxVerifiedFlag::Unverified,
            created_at: Utc.with_ymd_and_hms(2026, 8, 25, 11, 20, 0).unwrap(),
        },
    ]
}

//
// ================= Postgres Store =================
//

/// Postgres-backed order store. Lookups that fail for any reason degrade
/// to None so the pipeline always has a defined branch.
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    fn row_to_order(row: &sqlx::postgres::PgRow) -> Option<Order> {
        // Items are stored as a JSON text column; a malformed list is
        // treated as empty rather than failing the lookup.
        let items: Vec<LineItem> = row
            .try_get::<String, _>("items")
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        let tax_verified = match row.try_get::<String, _>("tax_verified").ok()?.as_str() {
            "verified" => TaxVerifiedFlag::Verified,
            "discrepancy" => TaxVerifiedFlag::Discrepancy,
            _ => TaxVerifiedFlag::Unverified,
        };

        Some(Order {
            order_id: row.try_get("order_id").ok()?,
            customer_name: row.try_get("customer_name").ok()?,
            state: row.try_get("state").ok()?,
            county: row.try_get("county").ok()?,
            status: row.try_get("status").ok()?,
            tracking_number: row.try_get("tracking_number").ok(),
            carrier: row.try_get("carrier").ok(),
            estimated_delivery: row.try_get("estimated_delivery").ok(),
            items,
            return_eligible: row.try_get("return_eligible").ok()?,
            subtotal: row.try_get("subtotal").ok()?,
            tax_rate: row.try_get("tax_rate").ok()?,
            tax_collected: row.try_get("tax_collected").ok()?,
            tax_verified,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at").ok()?,
        })
    }
}

#[async_trait::async_trait]
impl OrderStore for PgOrderStore {
    async fn lookup(&self, order_id: &str) -> Option<Order> {
        let result = sqlx::query(
            "SELECT order_id, customer_name, state, county, status, tracking_number, \
             carrier, estimated_delivery, items, return_eligible, subtotal, tax_rate, \
             tax_collected, tax_verified, created_at \
             FROM orders WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => Self::row_to_order(&row),
            Ok(None) => None,
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "order lookup failed, treating as not found");
                None
            }
        }
    }

    async fn mark_tax_verified(&self, order_id: &str, flag: TaxVerifiedFlag) -> Result<()> {
        sqlx::query("UPDATE orders SET tax_verified = $1 WHERE order_id = $2")
            .bind(flag.as_str())
            .bind(order_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

//
// ================= Backend Selection =================
//

/// Pick the store backend from the environment: Postgres when
/// DATABASE_URL is set and reachable, seeded in-memory otherwise.
pub async fn build_order_store() -> Arc<dyn OrderStore> {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        match PgOrderStore::connect(&url).await {
            Ok(store) => {
                info!("Order store: Postgres");
                return Arc::new(store);
            }
            Err(e) => {
                warn!(error = %e, "Postgres unavailable, falling back to in-memory order store");
            }
        }
    }

    info!("Order store: in-memory (seeded)");
    Arc::new(InMemoryOrderStore::seeded())
}
