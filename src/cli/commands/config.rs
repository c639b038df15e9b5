//! Print the effective configuration.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ConfigOutput<'a> {
    pub config: &'a Config,
}

impl CommandOutput for ConfigOutput<'_> {
    fn to_human(&self) -> String {
        serde_yaml::to_string(self.config)
            .unwrap_or_else(|e| format!("Failed to render configuration: {e}"))
    }
}

pub fn execute(config: &Config, json_mode: bool) -> Result<()> {
    output(&ConfigOutput { config }, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_output_formats() {
        let config = Config::default();
        let out = ConfigOutput { config: &config };

        let json = out.to_json();
        assert_eq!(json["server"]["max_concurrent_requests"], 50);
        assert_eq!(json["registry"]["policy"]["allow_delete"], true);

        let human = out.to_human();
        assert!(human.contains("manifest_path: registries/manifest.hocon"));
    }
}
