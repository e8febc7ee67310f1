use super::types::Topology;

const SEPARATOR: &str = " :: ";

/// Identifier of a stage's feed entry (e.g., "pipeline :: stage").
pub fn stage_identifier(pipeline: &str, stage: &str) -> String {
    format!("{pipeline}{SEPARATOR}{stage}")
}

/// Identifier of a job's feed entry (e.g., "pipeline :: stage :: job").
pub fn job_identifier(pipeline: &str, stage: &str, job: &str) -> String {
    format!("{pipeline}{SEPARATOR}{stage}{SEPARATOR}{job}")
}

/// Lists every identifier in the topology in feed order.
///
/// Pipelines and stages are visited in declaration order; each stage
/// identifier is immediately followed by the identifiers of its jobs.
pub fn enumerate(topology: &Topology) -> Vec<String> {
    topology
        .pipelines
        .iter()
        .flat_map(|pipeline| {
            pipeline.stages.iter().flat_map(move |stage| {
                std::iter::once(stage_identifier(&pipeline.name, &stage.name)).chain(
                    stage
                        .jobs
                        .iter()
                        .map(move |job| job_identifier(&pipeline.name, &stage.name, &job.name)),
                )
            })
        })
        .collect()
}
