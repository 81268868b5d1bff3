use serde::Deserialize;
use std::path::Path;

/// Server-side settings that live in a TOML file rather than on the
/// command line. Every field has a default, so an empty file (or no file
/// at all) yields a working configuration.
#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct GabbroConfig {
    /// Path of the file backing the shared request ring.
    pub shm_file_path: String,
    /// Slot count of the request ring (usable capacity is one less).
    pub ring_capacity: u32,
    /// Number of descriptor-sized reply slots appended after the ring.
    pub reply_slots: usize,
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

impl Default for GabbroConfig {
    fn default() -> Self {
        GabbroConfig {
            shm_file_path: "/tmp/gabbro_req_ring".into(),
            ring_capacity: 1024,
            reply_slots: 1024,
            log_level: "info".into(),
        }
    }
}

impl GabbroConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: GabbroConfig = toml::from_str(&raw)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_falls_back_to_defaults() {
        let cfg: GabbroConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.shm_file_path, "/tmp/gabbro_req_ring");
        assert_eq!(cfg.ring_capacity, 1024);
        assert_eq!(cfg.reply_slots, 1024);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn fields_override_individually() {
        let cfg: GabbroConfig = toml::from_str(
            r#"
            shm_file_path = "/dev/shm/ring"
            ring_capacity = 64
            "#,
        )
        .unwrap();
        assert_eq!(cfg.shm_file_path, "/dev/shm/ring");
        assert_eq!(cfg.ring_capacity, 64);
        assert_eq!(cfg.reply_slots, 1024);
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = GabbroConfig::load("/nonexistent/gabbro.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/gabbro.toml"));
    }
}
