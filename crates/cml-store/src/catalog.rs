//! Metadata store (C1), backed by PostgreSQL.
//!
//! Joins the `links` table against two `sites` rows per link and the
//! technology-to-measurement-name mapping, and tracks realtime-run
//! parameters and produced rain-grid frames.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value as Json;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use cml_common::{BoundingBox, CmlDescriptor, CmlError, CmlResult, RainGrid, RealtimeRun};

/// Connection pool plus the connection-state machine shared by every store
/// client (§4.1: "identical connection-state machine for the sample
/// store"): a persistent connection, reconnected once on a failed ping.
pub struct Catalog {
    pool: PgPool,
    database_url: String,
    healthy: AtomicBool,
}

impl Catalog {
    pub async fn connect(database_url: &str) -> CmlResult<Self> {
        Self::connect_with_pool_size(database_url, 10).await
    }

    pub async fn connect_with_pool_size(database_url: &str, max_connections: u32) -> CmlResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| CmlError::StoreUnavailable(format!("metadata store connect: {e}")))?;

        Ok(Self {
            pool,
            database_url: database_url.to_string(),
            healthy: AtomicBool::new(true),
        })
    }

    /// Ping the pool before an operation, reconnecting once if the ping
    /// fails. Marks the store unhealthy on persistent failure so the
    /// scheduler's realtime precondition (§4.8) can refuse the next tick.
    pub async fn check_connection(&self) -> CmlResult<()> {
        if sqlx::query("SELECT 1").execute(&self.pool).await.is_ok() {
            self.healthy.store(true, Ordering::SeqCst);
            return Ok(());
        }

        let reconnected = PgPoolOptions::new()
            .max_connections(1)
            .connect(&self.database_url)
            .await;

        match reconnected {
            Ok(_) => {
                self.healthy.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                self.healthy.store(false, Ordering::SeqCst);
                Err(CmlError::StoreUnavailable(format!("metadata store ping: {e}")))
            }
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    /// Run schema migrations, splitting the embedded DDL on `;` like the
    /// catalog this is modeled on.
    pub async fn migrate(&self) -> CmlResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| CmlError::StoreUnavailable(format!("migration failed: {e}")))?;
            }
        }
        Ok(())
    }

    /// Load every CML descriptor, joining `links` with its two `sites` rows.
    /// Returns whatever was read on a partial failure (the caller treats an
    /// empty map as fatal, per §4.1).
    pub async fn load_descriptors(&self) -> CmlResult<HashMap<i64, CmlDescriptor>> {
        let rows = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT
                l.id AS link_id,
                sa.ip AS ip_a, sb.ip AS ip_b,
                sa.display_addr AS display_addr_a, sb.display_addr AS display_addr_b,
                l.tech AS tech,
                l.freq_a_mhz AS freq_a_mhz, l.freq_b_mhz AS freq_b_mhz,
                l.polarization AS polarization,
                sa.lat AS lat_a, sa.lon AS lon_a, sb.lat AS lat_b, sb.lon AS lon_b,
                sa.dummy_lat AS dummy_lat_a, sa.dummy_lon AS dummy_lon_a,
                sb.dummy_lat AS dummy_lat_b, sb.dummy_lon AS dummy_lon_b
            FROM links l
            JOIN sites sa ON sa.id = l.site_a_id
            JOIN sites sb ON sb.id = l.site_b_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CmlError::StoreUnavailable(format!("load_descriptors: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let polarization = r.polarization.chars().next().unwrap_or('V');
                let descriptor = CmlDescriptor::new(
                    r.link_id,
                    r.ip_a,
                    r.ip_b,
                    r.display_addr_a,
                    r.display_addr_b,
                    r.tech,
                    r.freq_a_mhz,
                    r.freq_b_mhz,
                    polarization,
                    r.lat_a,
                    r.lon_a,
                    r.lat_b,
                    r.lon_b,
                    r.dummy_lat_a,
                    r.dummy_lon_a,
                    r.dummy_lat_b,
                    r.dummy_lon_b,
                );
                (r.link_id, descriptor)
            })
            .collect())
    }

    /// Most recent realtime run, or `None` if no run has ever been started.
    pub async fn get_last_run(&self) -> CmlResult<Option<RealtimeRun>> {
        let row = sqlx::query_as::<_, RunRow>(
            "SELECT id, start_time, retention_minutes, step_minutes, resolution_deg, \
             bbox_min_x, bbox_min_y, bbox_max_x, bbox_max_y, cols, rows, viewer_url \
             FROM realtime_rain_parameters ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CmlError::StoreUnavailable(format!("get_last_run: {e}")))?;

        Ok(row.map(RealtimeRun::from))
    }

    /// Allocate and persist a new run, returning its ID. Column/row counts
    /// are computed from the bbox and resolution per §4.1.
    pub async fn insert_run(
        &self,
        start: DateTime<Utc>,
        retention_minutes: i64,
        step_minutes: i64,
        resolution_deg: f64,
        bbox: BoundingBox,
        viewer_url: Option<&str>,
    ) -> CmlResult<i64> {
        let (cols, rows) = RealtimeRun::compute_dims(resolution_deg, &bbox);

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO realtime_rain_parameters \
             (start_time, retention_minutes, step_minutes, resolution_deg, \
              bbox_min_x, bbox_min_y, bbox_max_x, bbox_max_y, cols, rows, viewer_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING id",
        )
        .bind(start)
        .bind(retention_minutes)
        .bind(step_minutes)
        .bind(resolution_deg)
        .bind(bbox.min_x)
        .bind(bbox.min_y)
        .bind(bbox.max_x)
        .bind(bbox.max_y)
        .bind(cols)
        .bind(rows)
        .bind(viewer_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CmlError::StoreUnavailable(format!("insert_run: {e}")))?;

        Ok(id)
    }

    /// Most recent persisted frame timestamp, or the epoch minimum if none.
    pub async fn get_last_raingrid_time(&self, run_id: i64) -> CmlResult<DateTime<Utc>> {
        let row: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT time FROM realtime_rain_grids WHERE run_id = $1 ORDER BY time DESC LIMIT 1",
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CmlError::StoreUnavailable(format!("get_last_raingrid_time: {e}")))?;

        Ok(row.unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap()))
    }

    /// Persist a produced frame's metadata row.
    pub async fn insert_raingrid(&self, run_id: i64, grid: &RainGrid) -> CmlResult<()> {
        let cml_ids = Json::from(grid.cml_ids.clone());

        sqlx::query(
            "INSERT INTO realtime_rain_grids (run_id, time, cml_ids, filename, median, mean, max) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(run_id)
        .bind(grid.time)
        .bind(cml_ids)
        .bind(&grid.filename)
        .bind(grid.median)
        .bind(grid.mean)
        .bind(grid.max)
        .execute(&self.pool)
        .await
        .map_err(|e| CmlError::WriterFailure(format!("insert_raingrid: {e}")))?;

        Ok(())
    }

    /// A specific run's parameters by ID, for the `/api/gridvalue` endpoint
    /// (§4.8), which addresses a run by its `parameters` query value rather
    /// than always meaning "the latest run".
    pub async fn get_run(&self, run_id: i64) -> CmlResult<Option<RealtimeRun>> {
        let row = sqlx::query_as::<_, RunRow>(
            "SELECT id, start_time, retention_minutes, step_minutes, resolution_deg, \
             bbox_min_x, bbox_min_y, bbox_max_x, bbox_max_y, cols, rows, viewer_url \
             FROM realtime_rain_parameters WHERE id = $1",
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CmlError::StoreUnavailable(format!("get_run: {e}")))?;

        Ok(row.map(RealtimeRun::from))
    }

    /// Whether a frame exists for `(run_id, time)`, for the `/api/gridvalue`
    /// endpoint (§4.8).
    pub async fn verify_raingrid(&self, run_id: i64, time: DateTime<Utc>) -> CmlResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM realtime_rain_grids WHERE run_id = $1 AND time = $2)",
        )
        .bind(run_id)
        .bind(time)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CmlError::StoreUnavailable(format!("verify_raingrid: {e}")))?;

        Ok(exists)
    }

    /// Truncate both output tables, disabling foreign keys for the duration
    /// of the operation (§4.1).
    pub async fn wipe_realtime(&self) -> CmlResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CmlError::StoreUnavailable(format!("wipe_realtime begin: {e}")))?;

        sqlx::query("SET CONSTRAINTS ALL DEFERRED")
            .execute(&mut *tx)
            .await
            .map_err(|e| CmlError::StoreUnavailable(format!("wipe_realtime: {e}")))?;
        sqlx::query("TRUNCATE realtime_rain_grids, realtime_rain_parameters RESTART IDENTITY")
            .execute(&mut *tx)
            .await
            .map_err(|e| CmlError::StoreUnavailable(format!("wipe_realtime: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| CmlError::StoreUnavailable(format!("wipe_realtime commit: {e}")))?;

        Ok(())
    }
}

#[derive(FromRow)]
struct LinkRow {
    link_id: i64,
    ip_a: String,
    ip_b: String,
    display_addr_a: String,
    display_addr_b: String,
    tech: String,
    freq_a_mhz: i64,
    freq_b_mhz: i64,
    polarization: String,
    lat_a: f64,
    lon_a: f64,
    lat_b: f64,
    lon_b: f64,
    dummy_lat_a: f64,
    dummy_lon_a: f64,
    dummy_lat_b: f64,
    dummy_lon_b: f64,
}

#[derive(FromRow)]
struct RunRow {
    id: i64,
    start_time: DateTime<Utc>,
    retention_minutes: i64,
    step_minutes: i64,
    resolution_deg: f64,
    bbox_min_x: f64,
    bbox_min_y: f64,
    bbox_max_x: f64,
    bbox_max_y: f64,
    cols: i64,
    rows: i64,
    viewer_url: Option<String>,
}

impl From<RunRow> for RealtimeRun {
    fn from(r: RunRow) -> Self {
        RealtimeRun {
            id: r.id,
            start: r.start_time,
            retention_minutes: r.retention_minutes,
            step_minutes: r.step_minutes,
            resolution_deg: r.resolution_deg,
            bbox: BoundingBox::new(r.bbox_min_x, r.bbox_min_y, r.bbox_max_x, r.bbox_max_y),
            cols: r.cols,
            rows: r.rows,
            viewer_url: r.viewer_url,
        }
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sites (
    id BIGINT PRIMARY KEY,
    ip TEXT NOT NULL,
    display_addr TEXT NOT NULL,
    lat DOUBLE PRECISION NOT NULL,
    lon DOUBLE PRECISION NOT NULL,
    dummy_lat DOUBLE PRECISION NOT NULL,
    dummy_lon DOUBLE PRECISION NOT NULL
);

CREATE TABLE IF NOT EXISTS technologies (
    name TEXT PRIMARY KEY,
    is_const_tx_power BOOLEAN NOT NULL DEFAULT FALSE,
    is_buggy_tx_power BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE TABLE IF NOT EXISTS technologies_influx_mapping (
    tech TEXT PRIMARY KEY REFERENCES technologies(name),
    rx_power_field TEXT NOT NULL,
    tx_power_field TEXT NOT NULL,
    temperature_field TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS links (
    id BIGINT PRIMARY KEY,
    site_a_id BIGINT NOT NULL REFERENCES sites(id),
    site_b_id BIGINT NOT NULL REFERENCES sites(id),
    tech TEXT NOT NULL REFERENCES technologies(name),
    freq_a_mhz BIGINT NOT NULL,
    freq_b_mhz BIGINT NOT NULL,
    polarization CHAR(1) NOT NULL
);

CREATE TABLE IF NOT EXISTS realtime_rain_parameters (
    id BIGSERIAL PRIMARY KEY,
    start_time TIMESTAMPTZ NOT NULL,
    retention_minutes BIGINT NOT NULL,
    step_minutes BIGINT NOT NULL,
    resolution_deg DOUBLE PRECISION NOT NULL,
    bbox_min_x DOUBLE PRECISION NOT NULL,
    bbox_min_y DOUBLE PRECISION NOT NULL,
    bbox_max_x DOUBLE PRECISION NOT NULL,
    bbox_max_y DOUBLE PRECISION NOT NULL,
    cols BIGINT NOT NULL,
    rows BIGINT NOT NULL,
    viewer_url TEXT
);

CREATE TABLE IF NOT EXISTS realtime_rain_grids (
    id BIGSERIAL PRIMARY KEY,
    run_id BIGINT NOT NULL REFERENCES realtime_rain_parameters(id),
    time TIMESTAMPTZ NOT NULL,
    cml_ids JSONB NOT NULL,
    filename TEXT NOT NULL,
    median DOUBLE PRECISION NOT NULL,
    mean DOUBLE PRECISION NOT NULL,
    max DOUBLE PRECISION NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_raingrids_run_time ON realtime_rain_grids (run_id, time)
"#;
