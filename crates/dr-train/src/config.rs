use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};

/// Training hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Peak learning rate reached at the end of warmup.
    pub lr: f32,
    /// Max global gradient norm.
    pub grad_clip: f32,
    /// Padding id, ignored by the loss.
    pub pad_id: u32,
    pub warmup_steps: usize,
    pub total_steps: usize,
    /// Comma separated device ids, e.g. `"0,1,2"`.
    pub devices: String,
    /// Samples given to device 0 when splitting a batch.
    pub gpu0_share: usize,
    pub batch_size: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            lr: 1.5e-4,
            grad_clip: 1.0,
            pad_id: 0,
            warmup_steps: 2000,
            total_steps: 100_000,
            devices: "0".to_string(),
            gpu0_share: 2,
            batch_size: 16,
        }
    }
}

impl TrainConfig {
    /// Load a config from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<TrainConfig> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Parse `devices` into a list of device ids.
    pub fn device_ids(&self) -> Result<Vec<usize>> {
        parse_devices(&self.devices)
    }
}

/// Parse a comma separated device list. Empty entries, non-numeric entries
/// and repeated ids are configuration errors.
pub fn parse_devices(list: &str) -> Result<Vec<usize>> {
    let mut ids = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        let id: usize = part.parse().map_err(|_| {
            TrainError::Config(format!("invalid device id {:?} in {:?}", part, list))
        })?;
        if ids.contains(&id) {
            return Err(TrainError::Config(format!(
                "device {} listed twice in {:?}",
                id, list
            )));
        }
        ids.push(id);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_devices() {
        assert_eq!(parse_devices("0, 1,2").unwrap(), vec![0, 1, 2]);
        assert!(parse_devices("").is_err());
        assert!(parse_devices("0,,1").is_err());
        assert!(parse_devices("0,gpu1").is_err());
        assert!(parse_devices("1,1").is_err());
    }

    #[test]
    fn test_from_json_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"devices": "0,1,2,3", "gpu0_share": 1, "lr": 0.001}}"#).unwrap();

        let cfg = TrainConfig::from_json_file(f.path()).unwrap();
        assert_eq!(cfg.device_ids().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(cfg.gpu0_share, 1);
        assert_eq!(cfg.warmup_steps, 2000);
    }
}
