use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

use crate::error::Result;

use super::cache::{Snapshot, StatusCache};
use super::loader::StageStatusLoader;
use super::names::{job_identifier, stage_identifier};
use super::types::{PipelineConfig, ProjectStatus, StageConfig, Topology};

/// Where the status of a stage comes from during a rebuild.
enum StageSource {
    /// Stage is already tracked; its jobs are resolved from the cache alone.
    Cached(ProjectStatus),
    /// Stage missed the cache but has recorded history.
    History {
        stage: ProjectStatus,
        jobs: Vec<ProjectStatus>,
    },
    /// Stage missed the cache and has never run.
    NeverRun,
}

enum JobSource {
    Cached(ProjectStatus),
    History(ProjectStatus),
    Placeholder,
}

#[derive(Debug, Default)]
struct Tally {
    cached: usize,
    loaded: usize,
    placeholders: usize,
}

impl Tally {
    fn record(&mut self, source: JobSource, name: String) -> ProjectStatus {
        match source {
            JobSource::Cached(status) => {
                self.cached += 1;
                status
            }
            JobSource::History(status) => {
                self.loaded += 1;
                status
            }
            JobSource::Placeholder => {
                self.placeholders += 1;
                ProjectStatus::placeholder(name)
            }
        }
    }
}

/// Rebuilds the status cache whenever the build topology changes.
///
/// Each stage is resolved from the current cache first, then from the
/// history loader, and finally as a placeholder. The complete result is
/// installed with a single replacement, so readers never observe a partial
/// rebuild. Rebuilds are serialized: a slower rebuild can never overwrite
/// the result of one that started after it.
pub struct ReconciliationEngine<L> {
    cache: Arc<StatusCache>,
    loader: L,
    rebuild: Mutex<()>,
}

impl<L: StageStatusLoader> ReconciliationEngine<L> {
    pub fn new(cache: Arc<StatusCache>, loader: L) -> Self {
        Self {
            cache,
            loader,
            rebuild: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &Arc<StatusCache> {
        &self.cache
    }

    /// Replaces the cache content with one entry per stage and job of `topology`,
    /// in topology order.
    ///
    /// # Errors
    ///
    /// Returns an error if the history loader fails. The cache is left
    /// untouched in that case.
    pub fn reconcile(&self, topology: &Topology) -> Result<()> {
        let _guard = self.rebuild.lock();
        let snapshot = self.cache.snapshot();

        let mut statuses = Vec::with_capacity(snapshot.len());
        let mut tally = Tally::default();
        for pipeline in &topology.pipelines {
            self.collect_pipeline(&snapshot, pipeline, &mut statuses, &mut tally)?;
        }

        info!(
            "Reconciled {} pipelines into {} cache entries ({} cached, {} from history, {} placeholders)",
            topology.pipelines.len(),
            statuses.len(),
            tally.cached,
            tally.loaded,
            tally.placeholders
        );

        self.cache.replace_all_entries_in_cache_with(statuses);
        Ok(())
    }

    /// Refreshes the entries of a single pipeline, leaving all other entries
    /// as they are.
    ///
    /// Entries of stages or jobs removed from the pipeline are not purged
    /// until the next full [`reconcile`](Self::reconcile).
    ///
    /// # Errors
    ///
    /// Returns an error if the history loader fails. The cache is left
    /// untouched in that case.
    pub fn pipeline_changed(&self, pipeline: &PipelineConfig) -> Result<()> {
        let _guard = self.rebuild.lock();
        let snapshot = self.cache.snapshot();

        let mut statuses = Vec::new();
        let mut tally = Tally::default();
        self.collect_pipeline(&snapshot, pipeline, &mut statuses, &mut tally)?;

        debug!(
            "Refreshed {} cache entries of pipeline {}",
            statuses.len(),
            pipeline.name
        );

        self.cache.put_all(statuses);
        Ok(())
    }

    fn collect_pipeline(
        &self,
        snapshot: &Snapshot,
        pipeline: &PipelineConfig,
        statuses: &mut Vec<ProjectStatus>,
        tally: &mut Tally,
    ) -> Result<()> {
        for stage in &pipeline.stages {
            let source = self.resolve_stage(snapshot, pipeline, stage)?;
            collect_stage(snapshot, pipeline, stage, source, statuses, tally);
        }
        Ok(())
    }

    fn resolve_stage(
        &self,
        snapshot: &Snapshot,
        pipeline: &PipelineConfig,
        stage: &StageConfig,
    ) -> Result<StageSource> {
        let stage_id = stage_identifier(&pipeline.name, &stage.name);
        if let Some(cached) = snapshot.get(&stage_id) {
            return Ok(StageSource::Cached(cached.clone()));
        }

        debug!("Cache miss for {stage_id}, loading from history");
        let mut loaded = self
            .loader
            .statuses_for_stage_and_jobs(pipeline, stage)?
            .into_iter();

        Ok(match loaded.next() {
            Some(stage_status) => StageSource::History {
                stage: stage_status,
                jobs: loaded.collect(),
            },
            None => StageSource::NeverRun,
        })
    }
}

fn collect_stage(
    snapshot: &Snapshot,
    pipeline: &PipelineConfig,
    stage: &StageConfig,
    source: StageSource,
    statuses: &mut Vec<ProjectStatus>,
    tally: &mut Tally,
) {
    let job_ids = stage
        .jobs
        .iter()
        .map(|job| job_identifier(&pipeline.name, &stage.name, &job.name));

    match source {
        StageSource::Cached(stage_status) => {
            tally.cached += 1;
            statuses.push(stage_status);
            for job_id in job_ids {
                let source = match snapshot.get(&job_id) {
                    Some(cached) => JobSource::Cached(cached.clone()),
                    None => JobSource::Placeholder,
                };
                statuses.push(tally.record(source, job_id));
            }
        }
        StageSource::History {
            stage: stage_status,
            jobs,
        } => {
            tally.loaded += 1;
            statuses.push(stage_status);
            let job_ids: Vec<String> = job_ids.collect();
            let current: HashSet<&str> = job_ids.iter().map(String::as_str).collect();
            let jobs: Vec<ProjectStatus> = jobs
                .into_iter()
                .filter(|status| current.contains(status.name.as_str()))
                .collect();

            // Loaded jobs follow topology order, so a cursor is enough to pair them up.
            let mut loaded = jobs.into_iter().peekable();
            for job_id in job_ids {
                let source = match loaded.next_if(|status| status.name == job_id) {
                    Some(status) => JobSource::History(status),
                    None => JobSource::Placeholder,
                };
                statuses.push(tally.record(source, job_id));
            }
        }
        StageSource::NeverRun => {
            tally.placeholders += 1;
            statuses.push(ProjectStatus::placeholder(stage_identifier(
                &pipeline.name,
                &stage.name,
            )));
            for job_id in job_ids {
                statuses.push(tally.record(JobSource::Placeholder, job_id));
            }
        }
    }
}
