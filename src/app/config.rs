use std::path::Path;

use crate::config::ResolvedConfig;
use crate::duration::format_duration;

pub fn config_output(config_path: &Path, config: &ResolvedConfig) -> serde_json::Value {
    let ingestion = &config.ingestion;
    serde_json::json!({
        "config_file": config_path.display().to_string(),
        "data_directory": config.data_dir.display().to_string(),
        "owner": config.owner.to_string(),
        "ingestion": {
            "freshness_window": format_duration(ingestion.freshness_window),
            "interval": format_duration(ingestion.interval),
            "jitter": format_duration(ingestion.jitter),
            "run_on_start": ingestion.run_on_start,
            "target": ingestion.target.base_url,
            "max_attempts": ingestion.retry.max_attempts
        }
    })
}
