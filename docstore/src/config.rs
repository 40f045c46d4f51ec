use crate::snapshot::{FilesystemSnapshotProvider, NoopSnapshotProvider, SnapshotProvider};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum SnapshotStoreType {
    Memory,
    Filesystem { base_dir: String, filename: String },
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct StoreConfig {
    #[serde(flatten)]
    pub r#type: SnapshotStoreType,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// zstd level of filesystem snapshots.
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

fn default_flush_interval_secs() -> u64 {
    30
}

fn default_compression_level() -> i32 {
    3
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            r#type: SnapshotStoreType::Memory,
            flush_interval_secs: default_flush_interval_secs(),
            compression_level: default_compression_level(),
        }
    }
}

impl StoreConfig {
    pub fn provider(&self) -> Arc<dyn SnapshotProvider> {
        match &self.r#type {
            SnapshotStoreType::Memory => Arc::new(NoopSnapshotProvider),
            SnapshotStoreType::Filesystem { base_dir, filename } => {
                Arc::new(FilesystemSnapshotProvider::new(
                    base_dir,
                    filename,
                    self.compression_level,
                ))
            }
        }
    }

    /// Memory stores have nothing to flush. A zero interval disables periodic
    /// flushing; snapshots are then only written at shutdown.
    pub fn flush_interval(&self) -> Option<Duration> {
        match self.r#type {
            SnapshotStoreType::Memory => None,
            SnapshotStoreType::Filesystem { .. } if self.flush_interval_secs == 0 => None,
            SnapshotStoreType::Filesystem { .. } => {
                Some(Duration::from_secs(self.flush_interval_secs))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_store_config() {
        let config: StoreConfig = serde_yaml::from_str(
            r#"
            type: filesystem
            base_dir: /var/lib/tablemate
            filename: store.bin
            "#,
        )
        .unwrap();
        assert_eq!(
            config.r#type,
            SnapshotStoreType::Filesystem {
                base_dir: "/var/lib/tablemate".into(),
                filename: "store.bin".into(),
            }
        );
        assert_eq!(config.flush_interval(), Some(Duration::from_secs(30)));
        assert_eq!(config.compression_level, 3);

        let config: StoreConfig = serde_yaml::from_str(
            r#"
            type: filesystem
            base_dir: /var/lib/tablemate
            filename: store.bin
            compression_level: 19
            "#,
        )
        .unwrap();
        assert_eq!(config.compression_level, 19);

        let config: StoreConfig = serde_yaml::from_str("type: memory").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.flush_interval(), None);
    }
}
