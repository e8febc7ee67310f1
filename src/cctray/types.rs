use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last known build outcome of one stage or job, as served on the CCTray feed.
///
/// A status whose `last_build_time` is `None` is a placeholder: the entity
/// exists in the topology but has never produced a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStatus {
    /// Flat identifier (e.g., "pipeline :: stage :: job")
    pub name: String,
    /// Current activity (e.g., "Sleeping", "Building")
    pub activity: String,
    /// Outcome of the last build (e.g., "Success", "Failure")
    pub last_build_status: String,
    /// Label of the last build
    pub last_build_label: String,
    /// When the last build finished
    pub last_build_time: Option<DateTime<Utc>>,
    /// Link to the stage or job details page
    pub web_url: String,
    /// Users blamed for breaking the build
    #[serde(default)]
    pub breakers: BTreeSet<String>,
}

impl ProjectStatus {
    pub fn new(
        name: impl Into<String>,
        activity: impl Into<String>,
        last_build_status: impl Into<String>,
        last_build_label: impl Into<String>,
        last_build_time: DateTime<Utc>,
        web_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            activity: activity.into(),
            last_build_status: last_build_status.into(),
            last_build_label: last_build_label.into(),
            last_build_time: Some(last_build_time),
            web_url: web_url.into(),
            breakers: BTreeSet::new(),
        }
    }

    /// Status for an entity that has never been built.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            activity: String::new(),
            last_build_status: String::new(),
            last_build_label: String::new(),
            last_build_time: None,
            web_url: String::new(),
            breakers: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_breakers<I, S>(mut self, breakers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.breakers = breakers.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.last_build_time.is_none()
    }
}

/// Declared build topology: ordered pipelines, each with ordered stages and jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
}

impl Topology {
    pub fn new(pipelines: Vec<PipelineConfig>) -> Self {
        Self { pipelines }
    }

    pub fn pipeline(&self, name: &str) -> Option<&PipelineConfig> {
        self.pipelines.iter().find(|p| p.name == name)
    }
}

impl PipelineConfig {
    pub fn new(name: impl Into<String>, stages: Vec<StageConfig>) -> Self {
        Self {
            name: name.into(),
            stages,
        }
    }

    pub fn stage(&self, name: &str) -> Option<&StageConfig> {
        self.stages.iter().find(|s| s.name == name)
    }
}

impl StageConfig {
    pub fn new<I, S>(name: impl Into<String>, jobs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            jobs: jobs.into_iter().map(|j| JobConfig { name: j.into() }).collect(),
        }
    }
}
