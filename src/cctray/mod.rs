mod cache;
mod links;
mod loader;
mod names;
mod reconcile;
mod trigger;
mod types;

pub use cache::{Snapshot, StatusCache};
pub use loader::{HistoryStore, JobRun, RunState, StageRun, StageStatusLoader};
pub use names::{enumerate, job_identifier, stage_identifier};
pub use reconcile::ReconciliationEngine;
pub use trigger::{spawn_reconciler, TopologyNotifier};
pub use types::{JobConfig, PipelineConfig, ProjectStatus, StageConfig, Topology};
