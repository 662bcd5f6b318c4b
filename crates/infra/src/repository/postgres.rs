//! Postgres-backed warehouse store.
//!
//! Schema lives in `migrations/0001_init.sql` and is applied by
//! [`PostgresWarehouseStore::migrate`]. Queries are built at runtime (no
//! compile-time database access needed).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use smartwh_ai::{InventorySnapshot, ProductSnapshot, StockSample};
use smartwh_core::{Location, ProductId, RobotId, StockStatus};
use smartwh_events::{Prediction, RobotScanEvent};
use smartwh_inventory::{HistoryRecord, InventoryLookup, LookupError, ProductRecord};

use super::in_memory::{demo_products, demo_robots};
use super::{
    DashboardStore, PredictionStore, RepositoryError, RobotRecord, RobotRegistry, ScanStore,
};

const INIT_SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

pub struct PostgresWarehouseStore {
    pool: Arc<PgPool>,
}

impl PostgresWarehouseStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply the schema. Idempotent.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::raw_sql(INIT_SCHEMA).execute(&*self.pool).await?;
        Ok(())
    }

    /// Insert demo robots and products unless they already exist.
    pub async fn seed_demo_fixtures(&self) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for robot in demo_robots()? {
            let location = robot.location.unwrap_or_else(|| Location::new("A", 0, 0));
            sqlx::query(
                r#"
                INSERT INTO robots (id, status, battery_level, current_zone, current_row, current_shelf)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(robot.id.as_str())
            .bind(&robot.status)
            .bind(robot.battery_level)
            .bind(&location.zone)
            .bind(location.row)
            .bind(location.shelf)
            .execute(&mut *tx)
            .await?;
        }

        for product in demo_products()? {
            sqlx::query(
                r#"
                INSERT INTO products (id, name, category, min_stock, optimal_stock)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(product.id.as_str())
            .bind(&product.name)
            .bind(&product.category)
            .bind(product.min_stock)
            .bind(product.optimal_stock)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn bad_row(msg: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Database(format!("malformed row: {msg}"))
}

fn history_from_row(row: &PgRow) -> Result<HistoryRecord, RepositoryError> {
    let status: String = row.try_get("status")?;
    Ok(HistoryRecord {
        robot_id: RobotId::new(row.try_get::<String, _>("robot_id")?).map_err(bad_row)?,
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?).map_err(bad_row)?,
        product_name: row.try_get("product_name")?,
        quantity: row.try_get("quantity")?,
        location: Location::new(
            row.try_get::<String, _>("zone")?,
            row.try_get("row_number")?,
            row.try_get("shelf_number")?,
        ),
        status: status.parse::<StockStatus>().map_err(bad_row)?,
        scanned_at: row.try_get("scanned_at")?,
    })
}

fn product_from_row(row: &PgRow) -> Result<ProductRecord, RepositoryError> {
    Ok(ProductRecord {
        id: ProductId::new(row.try_get::<String, _>("id")?).map_err(bad_row)?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        min_stock: row.try_get("min_stock")?,
        optimal_stock: row.try_get("optimal_stock")?,
    })
}

fn robot_from_row(row: &PgRow) -> Result<RobotRecord, RepositoryError> {
    let zone: Option<String> = row.try_get("current_zone")?;
    let r: Option<i32> = row.try_get("current_row")?;
    let s: Option<i32> = row.try_get("current_shelf")?;
    let location = match (zone, r, s) {
        (Some(zone), Some(r), Some(s)) => Some(Location::new(zone, r, s)),
        _ => None,
    };

    Ok(RobotRecord {
        id: RobotId::new(row.try_get::<String, _>("id")?).map_err(bad_row)?,
        status: row.try_get("status")?,
        battery_level: row.try_get("battery_level")?,
        location,
        last_update: row.try_get("last_update")?,
    })
}

fn count_from_row(row: &PgRow) -> Result<u64, RepositoryError> {
    let n: i64 = row.try_get("n")?;
    u64::try_from(n).map_err(bad_row)
}

#[async_trait]
impl RobotRegistry for PostgresWarehouseStore {
    async fn robot_exists(&self, id: &RobotId) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM robots WHERE id = $1) AS present")
            .bind(id.as_str())
            .fetch_one(&*self.pool)
            .await?;
        Ok(row.try_get("present")?)
    }

    async fn find_robot(&self, id: &RobotId) -> Result<Option<RobotRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, status, battery_level, last_update, current_zone, current_row, current_shelf
            FROM robots
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&*self.pool)
        .await?;

        row.as_ref().map(robot_from_row).transpose()
    }

    async fn list_robots(&self) -> Result<Vec<RobotRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, status, battery_level, last_update, current_zone, current_row, current_shelf
            FROM robots
            ORDER BY id
            "#,
        )
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(robot_from_row).collect()
    }
}

#[async_trait]
impl ScanStore for PostgresWarehouseStore {
    async fn record_scan(
        &self,
        scan: &RobotScanEvent,
        next: &Location,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for result in &scan.scan_results {
            let known = sqlx::query("SELECT 1 FROM products WHERE id = $1")
                .bind(result.product_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
            if known.is_none() {
                return Err(RepositoryError::UnknownProduct(result.product_id.clone()));
            }

            sqlx::query(
                r#"
                INSERT INTO inventory_history
                    (robot_id, product_id, quantity, zone, row_number, shelf_number, status, scanned_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(scan.robot_id.as_str())
            .bind(result.product_id.as_str())
            .bind(result.quantity)
            .bind(&scan.location.zone)
            .bind(scan.location.row)
            .bind(scan.location.shelf)
            .bind(result.status.as_str())
            .bind(scan.timestamp)
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query(
            r#"
            UPDATE robots
            SET status = 'active',
                battery_level = $2,
                last_update = $3,
                current_zone = $4,
                current_row = $5,
                current_shelf = $6
            WHERE id = $1
            "#,
        )
        .bind(scan.robot_id.as_str())
        .bind(scan.battery_level)
        .bind(scan.timestamp)
        .bind(&next.zone)
        .bind(next.row)
        .bind(next.shelf)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::UnknownRobot(scan.robot_id.clone()));
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl PredictionStore for PostgresWarehouseStore {
    async fn inventory_snapshot(
        &self,
        product_ids: &[ProductId],
        as_of: DateTime<Utc>,
        period_days: u32,
    ) -> Result<InventorySnapshot, RepositoryError> {
        let rows = if product_ids.is_empty() {
            sqlx::query(
                "SELECT id, name, category, min_stock, optimal_stock FROM products ORDER BY id",
            )
            .fetch_all(&*self.pool)
            .await?
        } else {
            let ids: Vec<&str> = product_ids.iter().map(ProductId::as_str).collect();
            sqlx::query(
                r#"
                SELECT id, name, category, min_stock, optimal_stock
                FROM products
                WHERE id = ANY($1)
                ORDER BY id
                "#,
            )
            .bind(&ids)
            .fetch_all(&*self.pool)
            .await?
        };

        let products = rows
            .iter()
            .map(product_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(missing) = product_ids
            .iter()
            .find(|id| !products.iter().any(|p| &p.id == *id))
        {
            return Err(RepositoryError::UnknownProduct(missing.clone()));
        }

        let ids: Vec<&str> = products.iter().map(|p| p.id.as_str()).collect();
        let history_rows = sqlx::query(
            r#"
            SELECT product_id, quantity, scanned_at
            FROM inventory_history
            WHERE product_id = ANY($1) AND scanned_at <= $2
            ORDER BY scanned_at
            "#,
        )
        .bind(&ids)
        .bind(as_of)
        .fetch_all(&*self.pool)
        .await?;

        let mut history: HashMap<String, Vec<StockSample>> = HashMap::new();
        for row in &history_rows {
            history
                .entry(row.try_get("product_id")?)
                .or_default()
                .push(StockSample {
                    at: row.try_get("scanned_at")?,
                    quantity: row.try_get("quantity")?,
                });
        }

        let products = products
            .into_iter()
            .map(|p| ProductSnapshot {
                history: history.remove(p.id.as_str()).unwrap_or_default(),
                product_id: p.id,
                name: p.name,
                min_stock: p.min_stock,
                optimal_stock: p.optimal_stock,
            })
            .collect();

        Ok(InventorySnapshot {
            as_of,
            period_days,
            products,
        })
    }

    async fn save_predictions(
        &self,
        predictions: &[Prediction],
        generated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for p in predictions {
            sqlx::query(
                r#"
                INSERT INTO ai_predictions
                    (product_id, prediction_date, days_until_stockout, recommended_order, confidence_score, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(p.product_id.as_str())
            .bind(p.predicted_date)
            .bind(p.days_until_stockout)
            .bind(p.recommended_order_qty)
            .bind(p.confidence_score)
            .bind(generated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl DashboardStore for PostgresWarehouseStore {
    async fn recent_scans(&self, limit: usize) -> Result<Vec<HistoryRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT h.robot_id, h.product_id, p.name AS product_name, h.quantity,
                   h.zone, h.row_number, h.shelf_number, h.status, h.scanned_at
            FROM inventory_history h
            JOIN products p ON p.id = h.product_id
            ORDER BY h.scanned_at DESC, h.id DESC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(history_from_row).collect()
    }

    async fn count_scans_since(&self, since: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM inventory_history WHERE scanned_at >= $1")
            .bind(since)
            .fetch_one(&*self.pool)
            .await?;
        count_from_row(&row)
    }

    async fn count_flagged_products(&self) -> Result<u64, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(DISTINCT product_id) AS n
            FROM inventory_history
            WHERE status IN ($1, $2)
            "#,
        )
        .bind(StockStatus::LowStock.as_str())
        .bind(StockStatus::Critical.as_str())
        .fetch_one(&*self.pool)
        .await?;
        count_from_row(&row)
    }
}

#[async_trait]
impl InventoryLookup for PostgresWarehouseStore {
    async fn find_history_at(
        &self,
        scanned_at: DateTime<Utc>,
        product_id: &ProductId,
    ) -> Result<Option<HistoryRecord>, LookupError> {
        let row = sqlx::query(
            r#"
            SELECT h.robot_id, h.product_id, p.name AS product_name, h.quantity,
                   h.zone, h.row_number, h.shelf_number, h.status, h.scanned_at
            FROM inventory_history h
            JOIN products p ON p.id = h.product_id
            WHERE h.scanned_at = $1 AND h.product_id = $2
            ORDER BY h.id DESC
            LIMIT 1
            "#,
        )
        .bind(scanned_at)
        .bind(product_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.as_ref().map(history_from_row).transpose()?)
    }

    async fn find_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<ProductRecord>, LookupError> {
        let row = sqlx::query(
            "SELECT id, name, category, min_stock, optimal_stock FROM products WHERE id = $1",
        )
        .bind(product_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.as_ref().map(product_from_row).transpose()?)
    }

    async fn latest_quantity(&self, product_id: &ProductId) -> Result<Option<i64>, LookupError> {
        let row = sqlx::query(
            r#"
            SELECT quantity
            FROM inventory_history
            WHERE product_id = $1
            ORDER BY scanned_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(product_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(RepositoryError::from)?;

        match row {
            Some(row) => Ok(Some(row.try_get("quantity").map_err(RepositoryError::from)?)),
            None => Ok(None),
        }
    }
}
