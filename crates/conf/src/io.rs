use anyhow::{Context, Result};
use async_std::{fs, path::Path};
use tracing::info;

use crate::{conf, persisted};

/// Reads, parses and validates the YAML configuration at `path`. A missing
/// file is not an error: default configuration is used instead.
pub async fn load_conf(path: &Path) -> Result<conf::Configuration> {
    let Some(text) = read_if_exists(path).await? else {
        info!("No configuration at {}, using defaults", path.display());
        return Ok(conf::Configuration::default());
    };

    let raw: persisted::Configuration = serde_yaml::from_str(text.as_str())
        .with_context(|| format!("Invalid YAML in {}", path.display()))?;
    conf::Configuration::try_from(raw)
        .with_context(|| format!("Invalid configuration in {}", path.display()))
}

async fn read_if_exists(path: &Path) -> Result<Option<String>> {
    if !path.is_file().await {
        return Ok(None);
    }

    info!("Reading configuration from {}", path.display());
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Some(text))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_std::{path::PathBuf, task};

    use super::*;

    fn fixture(name: &str) -> PathBuf {
        [env!("CARGO_MANIFEST_DIR"), "tests", name]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_load_fixture() {
        let conf = task::block_on(load_conf(fixture("conf.yaml").as_path())).unwrap();

        let settings = conf.navigator().settings();
        assert_eq!(settings.max_path_age, Duration::from_secs(30));
        assert_eq!(settings.max_processing_timeslice, Duration::from_millis(4));
        assert_eq!(settings.repair_search_depth, 6);
        assert_eq!(settings.max_search_iterations, 20);
        // Not present in the file.
        assert_eq!(settings.max_job_pool_size, 30);
        assert_eq!(settings.offset_factor, 0.2);

        assert_eq!(conf.simulation().grid_cols(), 48);
        assert_eq!(conf.simulation().grid_rows(), 24);
        assert_eq!(conf.simulation().agents(), 64);
        assert_eq!(conf.simulation().frame_time(), Duration::from_millis(10));
    }

    #[test]
    fn test_missing_conf() {
        let conf = task::block_on(load_conf(fixture("missing.yaml").as_path())).unwrap();
        assert_eq!(conf.simulation().grid_cols(), 32);
    }
}
