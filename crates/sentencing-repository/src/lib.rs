//! Postgres storage for imported sentencing entities.
//!
//! Every `replace_*` call reconciles one entity type for one jurisdiction:
//! the rows passed in are upserted and every other row of that type in that
//! jurisdiction is pruned, all inside a single transaction.

use async_trait::async_trait;
use serde::Serialize;
use sentencing_parser::StateCode;
use sqlx::PgPool;
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

mod memory;
mod postgres;
pub mod rows;

pub use memory::InMemoryRepository;
pub use rows::{
    CaseRecommendation, CaseRow, ClientRow, DataPointRow, DispositionRow, InsightKey, InsightRow,
    OffenseRow, OpportunityRow, RecidivismSeriesRow, ReportType, RollupRow, StaffRow,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] MigrateError),
}

/// Counts produced by one upsert-and-prune pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Natural keys of the pruned rows.
    pub deleted_keys: Vec<String>,
}

impl ReconcileSummary {
    pub(crate) fn record_upsert(&mut self, inserted: bool) {
        if inserted {
            self.inserted += 1;
        } else {
            self.updated += 1;
        }
    }

    pub(crate) fn record_pruned(&mut self, keys: Vec<String>) {
        self.deleted += keys.len();
        self.deleted_keys.extend(keys);
    }
}

#[async_trait]
pub trait ImportRepository: Send + Sync {
    /// Upserts staff, attaches their already-loaded cases, prunes the rest
    /// and clears case links to pruned staff.
    async fn replace_staff(
        &self,
        state_code: StateCode,
        rows: &[StaffRow],
    ) -> Result<ReconcileSummary, RepositoryError>;

    /// As [`ImportRepository::replace_staff`]; a client's gender is only
    /// overwritten when the incoming row carries a known gender.
    async fn replace_clients(
        &self,
        state_code: StateCode,
        rows: &[ClientRow],
    ) -> Result<ReconcileSummary, RepositoryError>;

    /// Upserts cases, linking staff and clients that exist at load time.
    async fn replace_cases(
        &self,
        state_code: StateCode,
        rows: &[CaseRow],
    ) -> Result<ReconcileSummary, RepositoryError>;

    async fn replace_opportunities(
        &self,
        state_code: StateCode,
        rows: &[OpportunityRow],
    ) -> Result<ReconcileSummary, RepositoryError>;

    /// Upserts insights together with their series and dispositions, creating
    /// any offense they name that is not loaded yet.
    async fn replace_insights(
        &self,
        state_code: StateCode,
        rows: &[InsightRow],
    ) -> Result<ReconcileSummary, RepositoryError>;

    async fn replace_offenses(
        &self,
        state_code: StateCode,
        rows: &[OffenseRow],
    ) -> Result<ReconcileSummary, RepositoryError>;
}

#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
    ) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}
