// OD Migration - Core Library
// Year-over-year origin-destination migration engine plus the
// geometry ↔ administrative region crosswalk. Used by the CLI and tests.

pub mod error;
pub mod region;
pub mod records;
pub mod aggregation;
pub mod rules;
pub mod reconciliation;
pub mod merge;
pub mod adjacency;
pub mod registry;
pub mod geometry;
pub mod crosswalk;
pub mod config;
pub mod pipeline;

// Re-export commonly used types
pub use error::{OdError, OdResult};
pub use region::{ProvinceTable, RegionCode};
pub use records::{
    load_migration_csv, LoadedRecords, MigrationLayout, MigrationRecord, RejectedRow,
};
pub use aggregation::{aggregate, group_and_sum, OdAggregate};
pub use rules::{ReconciliationRule, RuleSet, RuleTable, SplitShare};
pub use reconciliation::{CodeReconciler, ReconciliationReport};
pub use merge::{merge, MergedEdge};
pub use adjacency::{AdjacencyDocument, EdgeStats, RegionFlows};
pub use registry::{load_registry_csv, AdminNameTable, RegistryLayout, RegistryRow};
pub use geometry::{FeatureCollection, GeometryLayout, RegionFeature};
pub use crosswalk::{Crosswalk, CrosswalkBuilder, UnmatchedRegion, UnmatchedReport};
pub use config::EngineConfig;
pub use pipeline::{Pipeline, PipelinePaths, RunSummary, Stage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
