use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{CCTrayError, Result};

use super::links::{job_url, stage_url};
use super::names::{job_identifier, stage_identifier};
use super::types::{PipelineConfig, ProjectStatus, StageConfig};

const ACTIVITY_BUILDING: &str = "Building";
const ACTIVITY_SLEEPING: &str = "Sleeping";
const RESULT_FAILURE: &str = "Failure";

/// Source of persisted statuses for stages missing from the cache.
pub trait StageStatusLoader: Send + Sync {
    /// Loads the latest recorded statuses of a stage and its jobs.
    ///
    /// The stage status comes first, followed by job statuses in the stage's
    /// current job order. Jobs without recorded history are left out, and a
    /// stage that never ran yields an empty list. Job statuses whose names are
    /// not jobs of `stage` are ignored by the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    fn statuses_for_stage_and_jobs(
        &self,
        pipeline: &PipelineConfig,
        stage: &StageConfig,
    ) -> Result<Vec<ProjectStatus>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Building,
    #[default]
    Completed,
}

impl RunState {
    fn activity(self) -> &'static str {
        match self {
            RunState::Building => ACTIVITY_BUILDING,
            RunState::Completed => ACTIVITY_SLEEPING,
        }
    }
}

/// Latest recorded run of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRun {
    /// Label of the pipeline run this stage belongs to
    pub pipeline_label: String,
    pub pipeline_counter: u64,
    /// Incremented each time the stage is rerun within the same pipeline run
    pub stage_counter: u64,
    #[serde(default)]
    pub state: RunState,
    /// Outcome (e.g., "Success", "Failure", "Cancelled")
    pub result: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub breakers: Vec<String>,
    #[serde(default)]
    pub jobs: Vec<JobRun>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
    pub name: String,
    #[serde(default)]
    pub state: RunState,
    pub result: String,
    pub updated_at: DateTime<Utc>,
}

impl StageRun {
    /// Feed label of the run; reruns carry the stage counter as a suffix.
    pub fn label(&self) -> String {
        if self.stage_counter > 1 {
            format!("{} :: {}", self.pipeline_label, self.stage_counter)
        } else {
            self.pipeline_label.clone()
        }
    }
}

type StoredRuns = HashMap<String, HashMap<String, StageRun>>;

/// Modification time and size of the history file when it was last parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

struct ParsedRuns {
    stamp: FileStamp,
    runs: Arc<StoredRuns>,
}

/// File-backed history of the latest run of every stage.
///
/// Runs are kept in a single JSON document keyed by pipeline then stage name:
/// - Linux: `~/.local/share/cctray/history.json`
/// - macOS: `~/Library/Application Support/cctray/history.json`
///
/// The parsed document is reused until the file's modification time or size
/// changes, so runs recorded by other writers are still picked up. A missing
/// file is treated as an empty history.
///
/// Writes go to a sibling temporary file that is renamed over the history, so
/// readers always see a complete document. Writers sharing a store are
/// serialized; separate processes writing the same file are not.
pub struct HistoryStore {
    path: PathBuf,
    site_url: String,
    parsed: Mutex<Option<ParsedRuns>>,
    writer: Mutex<()>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, site_url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            site_url: site_url.into(),
            parsed: Mutex::new(None),
            writer: Mutex::new(()),
        }
    }

    /// Platform-specific default location of the history file.
    ///
    /// # Errors
    ///
    /// Returns error if no data directory can be determined.
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| CCTrayError::Config("No data directory found".into()))?;
        Ok(data_dir.join("cctray").join("history.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Latest recorded run of a stage, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the history file exists but cannot be read or parsed.
    pub fn latest_run(&self, pipeline: &str, stage: &str) -> Result<Option<StageRun>> {
        let runs = self.read_runs()?;
        Ok(runs
            .get(pipeline)
            .and_then(|stages| stages.get(stage))
            .cloned())
    }

    /// Records `run` as the latest run of a stage and persists the history.
    ///
    /// # Errors
    ///
    /// Returns error if the history file cannot be read, parsed or written.
    pub fn record_stage_run(&self, pipeline: &str, stage: &str, run: StageRun) -> Result<()> {
        let _guard = self.writer.lock();

        let mut runs = (*self.read_runs()?).clone();
        runs.entry(pipeline.to_string())
            .or_default()
            .insert(stage.to_string(), run);

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut file = NamedTempFile::new_in(parent)?;
        file.write_all(&serde_json::to_vec(&runs)?)?;
        file.persist(&self.path)
            .map_err(|e| self.history_error(e.error))?;

        debug!(
            "Recorded run of {} in history: {}",
            stage_identifier(pipeline, stage),
            self.path.display()
        );

        Ok(())
    }

    fn read_runs(&self) -> Result<Arc<StoredRuns>> {
        let stamp = match fs::metadata(&self.path) {
            Ok(metadata) => FileStamp {
                modified: metadata.modified().map_err(|e| self.history_error(e))?,
                len: metadata.len(),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No history file at {}", self.path.display());
                return Ok(Arc::default());
            }
            Err(e) => return Err(self.history_error(e)),
        };

        if let Some(parsed) = self.parsed.lock().as_ref() {
            if parsed.stamp == stamp {
                return Ok(Arc::clone(&parsed.runs));
            }
        }

        let content = fs::read_to_string(&self.path).map_err(|e| self.history_error(e))?;
        let runs: Arc<StoredRuns> = Arc::new(serde_json::from_str(&content)?);
        debug!("Parsed stage history from {}", self.path.display());

        *self.parsed.lock() = Some(ParsedRuns {
            stamp,
            runs: Arc::clone(&runs),
        });
        Ok(runs)
    }

    fn history_error(&self, source: std::io::Error) -> CCTrayError {
        CCTrayError::History {
            path: self.path.clone(),
            source,
        }
    }

    fn statuses_from_run(
        &self,
        pipeline: &PipelineConfig,
        stage: &StageConfig,
        run: &StageRun,
    ) -> Vec<ProjectStatus> {
        let label = run.label();
        let stage_status = ProjectStatus::new(
            stage_identifier(&pipeline.name, &stage.name),
            run.state.activity(),
            run.result.as_str(),
            label.as_str(),
            run.updated_at,
            stage_url(
                &self.site_url,
                &pipeline.name,
                run.pipeline_counter,
                &stage.name,
                run.stage_counter,
            ),
        )
        .with_breakers(breakers_for(&run.result, &run.breakers));

        let job_statuses = stage.jobs.iter().filter_map(|job| {
            let job_run = run.jobs.iter().find(|j| j.name == job.name)?;
            Some(
                ProjectStatus::new(
                    job_identifier(&pipeline.name, &stage.name, &job.name),
                    job_run.state.activity(),
                    job_run.result.as_str(),
                    label.as_str(),
                    job_run.updated_at,
                    job_url(
                        &self.site_url,
                        &pipeline.name,
                        run.pipeline_counter,
                        &stage.name,
                        run.stage_counter,
                        &job.name,
                    ),
                )
                .with_breakers(breakers_for(&job_run.result, &run.breakers)),
            )
        });

        std::iter::once(stage_status).chain(job_statuses).collect()
    }
}

fn breakers_for<'a>(result: &str, breakers: &'a [String]) -> &'a [String] {
    if result == RESULT_FAILURE {
        breakers
    } else {
        &[]
    }
}

impl StageStatusLoader for HistoryStore {
    fn statuses_for_stage_and_jobs(
        &self,
        pipeline: &PipelineConfig,
        stage: &StageConfig,
    ) -> Result<Vec<ProjectStatus>> {
        let Some(run) = self.latest_run(&pipeline.name, &stage.name)? else {
            debug!(
                "Stage {} has never run",
                stage_identifier(&pipeline.name, &stage.name)
            );
            return Ok(Vec::new());
        };

        Ok(self.statuses_from_run(pipeline, stage, &run))
    }
}
