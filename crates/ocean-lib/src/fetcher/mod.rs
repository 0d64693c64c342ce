//! Observation acquisition with fallback strategies
//!
//! For each requested year the fetcher tries, in order:
//! 1. one narrow window per requested month
//! 2. one window covering the whole year
//! 3. synthetic profiles
//!
//! and keeps the first strategy that yields rows. Upstream failures are
//! logged and counted, never propagated.

pub mod cleaning;
mod erddap;
mod synthetic;
mod windows;


pub use cleaning::{clean, COLUMN_MAP, REQUIRED_FIELDS};
pub use erddap::{ErddapSource, ARGO_DATASET};
pub use synthetic::{SyntheticGenerator, DEPTH_LEVELS, MIN_SALINITY, MIN_TEMPERATURE};
pub use windows::{broad_window, monthly_window, DateWindow};

use crate::clock::Clock;
use crate::models::{BoundingBox, RegionSpec};
use crate::observability::{PipelineMetrics, StructuredLogger};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Upstream column names, in request order
pub const SOURCE_COLUMNS: [&str; 8] = [
    "platform_number",
    "cycle_number",
    "time",
    "latitude",
    "longitude",
    "pres",
    "temp",
    "psal",
];

/// Raw tabular rows as returned by the upstream source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-insensitive column lookup
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Concatenate `other`, aligning its columns to this table by name.
    /// Columns this table lacks are dropped from `other`.
    pub fn append(&mut self, other: RawTable) {
        if other.is_empty() {
            return;
        }
        if self.columns.is_empty() {
            *self = other;
            return;
        }

        let mapping: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|c| other.column_index(c))
            .collect();

        for row in other.rows {
            let aligned = mapping
                .iter()
                .map(|idx| idx.and_then(|i| row.get(i).cloned()).unwrap_or(Value::Null))
                .collect();
            self.rows.push(aligned);
        }
    }
}

/// One bounded request against the upstream source
#[derive(Debug, Clone, PartialEq)]
pub struct WindowRequest {
    pub bounds: BoundingBox,
    pub max_depth: f64,
    pub window: DateWindow,
}

/// Trait for upstream observation sources
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Fetch every observation inside the request window. No matching
    /// data is an empty table, not an error.
    async fn fetch_window(&self, request: &WindowRequest) -> Result<RawTable>;
}

/// Fetch strategies in fallback order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStrategy {
    Monthly,
    BroadRange,
    Synthetic,
}

impl FetchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStrategy::Monthly => "monthly",
            FetchStrategy::BroadRange => "broad_range",
            FetchStrategy::Synthetic => "synthetic",
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one strategy produced for one year. `Empty` and `Failed` both
/// mean "try the next strategy".
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Data(RawTable),
    Empty,
    Failed(String),
}

impl StrategyOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            StrategyOutcome::Data(_) => "data",
            StrategyOutcome::Empty => "empty",
            StrategyOutcome::Failed(_) => "failed",
        }
    }

    fn rows(&self) -> usize {
        match self {
            StrategyOutcome::Data(table) => table.len(),
            _ => 0,
        }
    }
}

/// Which strategy served a year
#[derive(Debug, Clone, PartialEq)]
pub struct YearProvenance {
    pub year: i32,
    pub strategy: FetchStrategy,
    pub rows: usize,
}

/// Raw rows for all requested years plus where they came from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    pub table: RawTable,
    pub provenance: Vec<YearProvenance>,
}

impl FetchResult {
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// True when every year fell back to synthetic profiles
    pub fn is_synthetic_only(&self) -> bool {
        !self.provenance.is_empty()
            && self
                .provenance
                .iter()
                .all(|p| p.strategy == FetchStrategy::Synthetic)
    }

    pub fn used_synthetic(&self) -> bool {
        self.provenance
            .iter()
            .any(|p| p.strategy == FetchStrategy::Synthetic)
    }
}

/// Fetcher running the fallback cascade against one upstream source
pub struct MultiStrategyFetcher {
    source: Arc<dyn ObservationSource>,
    synthetic: Option<SyntheticGenerator>,
    clock: Arc<dyn Clock>,
    max_depth: f64,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
}

impl MultiStrategyFetcher {
    pub fn new(source: Arc<dyn ObservationSource>, max_depth: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            synthetic: Some(SyntheticGenerator::new()),
            clock,
            max_depth,
            metrics: PipelineMetrics::new(),
            logger: StructuredLogger::new("local"),
        }
    }

    /// Replace the synthetic generator, e.g. with a seeded one
    pub fn with_synthetic(mut self, generator: SyntheticGenerator) -> Self {
        self.synthetic = Some(generator);
        self
    }

    /// Disable the synthetic fallback so only real data is returned
    pub fn without_synthetic(mut self) -> Self {
        self.synthetic = None;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Fetch raw observations for every year, concatenated in year order
    pub async fn fetch(&self, region: &RegionSpec, years: &[i32], months: &[u32]) -> FetchResult {
        let mut result = FetchResult::default();

        for &year in years {
            debug!(region = %region.key, year = year, "Fetching year");

            let monthly = self.fetch_monthly(&region.bounds, year, months).await;
            if self.accept(region, year, FetchStrategy::Monthly, monthly, &mut result) {
                continue;
            }

            let broad = self.fetch_broad(&region.bounds, year).await;
            if self.accept(region, year, FetchStrategy::BroadRange, broad, &mut result) {
                continue;
            }

            if let Some(generator) = &self.synthetic {
                info!(region = %region.key, year = year, "No real data found, generating synthetic profiles");
                let table = generator.generate(&region.bounds, year, months);
                let outcome = if table.is_empty() {
                    StrategyOutcome::Empty
                } else {
                    StrategyOutcome::Data(table)
                };
                self.accept(region, year, FetchStrategy::Synthetic, outcome, &mut result);
            }
        }

        if result.is_empty() {
            warn!(region = %region.key, years = ?years, "No data could be fetched or generated");
        } else {
            info!(region = %region.key, rows = result.table.len(), "Total data points collected");
        }
        result
    }

    /// Record an outcome; returns true if it supplied data for the year
    fn accept(
        &self,
        region: &RegionSpec,
        year: i32,
        strategy: FetchStrategy,
        outcome: StrategyOutcome,
        result: &mut FetchResult,
    ) -> bool {
        self.metrics
            .inc_strategy_outcome(strategy.as_str(), outcome.label());
        self.logger.log_fetch_strategy_result(
            &region.key,
            year,
            strategy.as_str(),
            outcome.label(),
            outcome.rows(),
        );

        match outcome {
            StrategyOutcome::Data(table) => {
                self.metrics.add_records_fetched(table.len());
                result.provenance.push(YearProvenance {
                    year,
                    strategy,
                    rows: table.len(),
                });
                result.table.append(table);
                true
            }
            StrategyOutcome::Empty => false,
            StrategyOutcome::Failed(reason) => {
                debug!(year = year, strategy = %strategy, reason = %reason, "Strategy failed");
                false
            }
        }
    }

    async fn fetch_monthly(&self, bounds: &BoundingBox, year: i32, months: &[u32]) -> StrategyOutcome {
        let today = self.clock.now().date_naive();
        let mut collected = RawTable::default();
        let mut attempted = 0;
        let mut errors = Vec::new();

        for &month in months {
            let Some(window) = monthly_window(year, month, today) else {
                continue;
            };
            attempted += 1;

            match self.fetch_one(bounds, window).await {
                Ok(table) if !table.is_empty() => {
                    debug!(year = year, month = month, rows = table.len(), "Found monthly data");
                    collected.append(table);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(year = year, month = month, error = %e, "Monthly fetch failed");
                    errors.push(format!("{:02}: {}", month, e));
                }
            }
        }

        if !collected.is_empty() {
            StrategyOutcome::Data(collected)
        } else if attempted > 0 && errors.len() == attempted {
            StrategyOutcome::Failed(errors.join("; "))
        } else {
            StrategyOutcome::Empty
        }
    }

    async fn fetch_broad(&self, bounds: &BoundingBox, year: i32) -> StrategyOutcome {
        let today = self.clock.now().date_naive();
        let Some(window) = broad_window(year, today) else {
            return StrategyOutcome::Empty;
        };

        match self.fetch_one(bounds, window).await {
            Ok(table) if !table.is_empty() => StrategyOutcome::Data(table),
            Ok(_) => StrategyOutcome::Empty,
            Err(e) => {
                warn!(year = year, error = %e, "Broad range fetch failed");
                StrategyOutcome::Failed(e.to_string())
            }
        }
    }

    async fn fetch_one(&self, bounds: &BoundingBox, window: DateWindow) -> Result<RawTable> {
        let request = WindowRequest {
            bounds: *bounds,
            max_depth: self.max_depth,
            window,
        };

        let started = Instant::now();
        let result = self.source.fetch_window(&request).await;
        self.metrics
            .observe_fetch_latency(started.elapsed().as_secs_f64());
        result
    }
}
