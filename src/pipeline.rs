// 🚚 Pipeline - Load → aggregate → reconcile → merge → emit
//
// Everything is computed in memory first; artifacts are written only once
// every stage that feeds them has succeeded. Crosswalk failures are logged
// and never block the OD artifact; run alone, the crosswalk stage fails
// the run instead.

use crate::adjacency::AdjacencyDocument;
use crate::aggregation::{aggregate, OdAggregate};
use crate::config::EngineConfig;
use crate::crosswalk::{Crosswalk, CrosswalkBuilder, UnmatchedReport};
use crate::geometry::FeatureCollection;
use crate::merge::{merge, MergedEdge};
use crate::reconciliation::{CodeReconciler, ReconciliationReport};
use crate::records::{load_migration_csv, LoadedRecords};
use crate::registry::{load_registry_csv, AdminNameTable};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub const OD_ARTIFACT: &str = "od_data.json";
pub const CROSSWALK_ARTIFACT: &str = "code_mapping.json";
pub const PROVINCE_ARTIFACT: &str = "sido_mapping.json";

// ============================================================================
// INPUTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct PipelinePaths {
    /// Directory holding `{year}.csv` migration files
    pub data_dir: PathBuf,
    pub previous_year: u16,
    pub current_year: u16,
    pub registry: PathBuf,
    pub geometry: PathBuf,
    pub out_dir: PathBuf,
}

impl PipelinePaths {
    pub fn migration_file(&self, year: u16) -> PathBuf {
        self.data_dir.join(format!("{}.csv", year))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    All,
    Od,
    Crosswalk,
    Provinces,
}

impl Stage {
    fn includes_od(self) -> bool {
        matches!(self, Stage::All | Stage::Od)
    }

    fn includes_crosswalk(self) -> bool {
        matches!(self, Stage::All | Stage::Crosswalk)
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

#[derive(Debug, Clone)]
pub struct OdOutcome {
    pub previous_records: usize,
    pub current_records: usize,
    pub rejected_records: usize,
    pub previous_edges: usize,
    pub current_edges: usize,
    pub reconciliation: ReconciliationReport,
    pub edges: Vec<MergedEdge>,
    pub document: AdjacencyDocument,
}

#[derive(Debug, Clone)]
pub struct CrosswalkOutcome {
    pub admin_names: usize,
    pub registry_rows_skipped: usize,
    pub crosswalk: Crosswalk,
    pub report: UnmatchedReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct WrittenArtifact {
    pub path: PathBuf,
    pub bytes: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub od: Option<OdOutcome>,
    pub crosswalk: Option<CrosswalkOutcome>,

    /// Crosswalk stage failure, reported but not fatal
    pub crosswalk_error: Option<String>,
    pub artifacts: Vec<WrittenArtifact>,
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline {
    config: EngineConfig,
    paths: PipelinePaths,
}

impl Pipeline {
    pub fn new(config: EngineConfig, paths: PipelinePaths) -> Result<Self> {
        config.validate()?;
        Ok(Pipeline { config, paths })
    }

    pub fn run(&self, stage: Stage) -> Result<RunSummary> {
        let mut pending: Vec<(&str, Vec<u8>)> = Vec::new();

        let od = if stage.includes_od() {
            let outcome = self.build_od()?;
            pending.push((OD_ARTIFACT, outcome.document.to_json()?.into_bytes()));
            Some(outcome)
        } else {
            None
        };

        let (crosswalk, crosswalk_error) = if stage.includes_crosswalk() {
            match self.build_crosswalk() {
                Ok(outcome) => {
                    pending.push((
                        CROSSWALK_ARTIFACT,
                        to_pretty_json(outcome.crosswalk.entries())?,
                    ));
                    (Some(outcome), None)
                }
                Err(e) if stage == Stage::Crosswalk => {
                    return Err(e.context("Crosswalk stage failed"));
                }
                Err(e) => {
                    log::error!("Crosswalk stage failed: {:#}", e);
                    (None, Some(format!("{:#}", e)))
                }
            }
        } else {
            (None, None)
        };

        pending.push((
            PROVINCE_ARTIFACT,
            to_pretty_json(self.config.provinces.entries())?,
        ));

        let artifacts = pending
            .into_iter()
            .map(|(name, bytes)| write_artifact(&self.paths.out_dir, name, &bytes))
            .collect::<Result<Vec<_>>>()?;

        Ok(RunSummary {
            generated_at: Utc::now(),
            od,
            crosswalk,
            crosswalk_error,
            artifacts,
        })
    }

    // ------------------------------------------------------------------------
    // OD stage
    // ------------------------------------------------------------------------

    pub fn build_od(&self) -> Result<OdOutcome> {
        let previous_path = self.paths.migration_file(self.paths.previous_year);
        let current_path = self.paths.migration_file(self.paths.current_year);

        // Both files must exist before anything is loaded
        for path in [&previous_path, &current_path] {
            if !path.exists() {
                bail!("Required migration file not found: {}", path.display());
            }
        }

        let previous = self.load_year(&previous_path)?;
        let current = self.load_year(&current_path)?;

        let previous_aggs = aggregate(&previous.records)
            .with_context(|| format!("Failed to aggregate {}", previous_path.display()))?;
        let current_aggs = aggregate(&current.records)
            .with_context(|| format!("Failed to aggregate {}", current_path.display()))?;

        let (edges, reconciliation) = self.reconcile_and_merge(&previous_aggs, &current_aggs)?;
        let document = AdjacencyDocument::build(&edges);

        Ok(OdOutcome {
            previous_records: previous.records.len(),
            current_records: current.records.len(),
            rejected_records: previous.rejected.len() + current.rejected.len(),
            previous_edges: previous_aggs.len(),
            current_edges: current_aggs.len(),
            reconciliation,
            edges,
            document,
        })
    }

    fn load_year(&self, path: &Path) -> Result<LoadedRecords> {
        let loaded = load_migration_csv(path, &self.config.migration)?;
        if self.config.allow_rejected_records {
            if !loaded.rejected.is_empty() {
                log::warn!(
                    "Excluded {} malformed records from {}",
                    loaded.rejected.len(),
                    path.display()
                );
            }
        } else {
            loaded.ensure_clean(&path.display().to_string())?;
        }
        Ok(loaded)
    }

    /// Reconcile the legacy year onto current codes and join
    pub fn reconcile_and_merge(
        &self,
        legacy: &[OdAggregate],
        current: &[OdAggregate],
    ) -> Result<(Vec<MergedEdge>, ReconciliationReport)> {
        let rules = self
            .config
            .rules
            .resolve(current)
            .context("Failed to resolve reconciliation rules")?;

        let (reconciled, report) = CodeReconciler::new(&rules)
            .reconcile(legacy)
            .context("Failed to reconcile legacy-year codes")?;

        Ok((merge(current, &reconciled), report))
    }

    // ------------------------------------------------------------------------
    // Crosswalk stage
    // ------------------------------------------------------------------------

    pub fn build_crosswalk(&self) -> Result<CrosswalkOutcome> {
        let registry = load_registry_csv(&self.paths.registry, &self.config.registry)?;
        let admin = AdminNameTable::build(&registry.rows, &self.config.overrides);

        let features = FeatureCollection::from_file(&self.paths.geometry)?
            .region_features(&self.config.geometry);

        let builder = CrosswalkBuilder::new(&self.config.provinces, &admin);
        let crosswalk = builder.build(&features);
        let report = builder.validate(&features, &crosswalk);

        Ok(CrosswalkOutcome {
            admin_names: admin.len(),
            registry_rows_skipped: registry.skipped,
            crosswalk,
            report,
        })
    }
}

// ============================================================================
// ARTIFACTS
// ============================================================================

/// Pretty JSON with 4-space indentation, non-ASCII kept as-is
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
    value
        .serialize(&mut serializer)
        .context("Failed to serialize artifact")?;
    Ok(bytes)
}

pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn write_artifact(out_dir: &Path, name: &str, bytes: &[u8]) -> Result<WrittenArtifact> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

    let path = out_dir.join(name);
    fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;

    let artifact = WrittenArtifact {
        path,
        bytes: bytes.len(),
        sha256: fingerprint(bytes),
    };
    log::info!(
        "Wrote {} ({} bytes, sha256 {})",
        artifact.path.display(),
        artifact.bytes,
        artifact.sha256
    );
    Ok(artifact)
}

// ============================================================================
// TESTS
// ============================================================================
