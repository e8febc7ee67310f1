/// Builds the web URL of a stage run's details page.
///
/// # Arguments
///
/// * `site_url` - Server base URL (e.g., <https://ci.example.com>)
/// * `pipeline` - Pipeline name
/// * `pipeline_counter` - Pipeline run number
/// * `stage` - Stage name
/// * `stage_counter` - Stage run number within the pipeline run
///
/// # Returns
///
/// URL such as <https://ci.example.com/go/pipelines/build/12/test/1>
pub fn stage_url(
    site_url: &str,
    pipeline: &str,
    pipeline_counter: u64,
    stage: &str,
    stage_counter: u64,
) -> String {
    let base = trim_base(site_url);
    format!("{base}/go/pipelines/{pipeline}/{pipeline_counter}/{stage}/{stage_counter}")
}

/// Builds the web URL of a job run's details page.
///
/// # Returns
///
/// URL such as <https://ci.example.com/go/tab/build/detail/build/12/test/1/unit>
pub fn job_url(
    site_url: &str,
    pipeline: &str,
    pipeline_counter: u64,
    stage: &str,
    stage_counter: u64,
    job: &str,
) -> String {
    let base = trim_base(site_url);
    format!(
        "{base}/go/tab/build/detail/{pipeline}/{pipeline_counter}/{stage}/{stage_counter}/{job}"
    )
}

fn trim_base(site_url: &str) -> &str {
    site_url.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_url() {
        let url = stage_url("https://ci.example.com", "build", 12, "test", 1);
        assert_eq!(url, "https://ci.example.com/go/pipelines/build/12/test/1");
    }

    #[test]
    fn test_job_url() {
        let url = job_url("https://ci.example.com", "build", 12, "test", 2, "unit");
        assert_eq!(
            url,
            "https://ci.example.com/go/tab/build/detail/build/12/test/2/unit"
        );
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        let url = stage_url("https://ci.example.com/", "p", 1, "s", 1);
        assert_eq!(url, "https://ci.example.com/go/pipelines/p/1/s/1");
    }
}
