// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Attendance Ledger project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config as config_rs;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    /// Primary chain document, relative to `data_dir` unless absolute.
    pub blockchain_file: PathBuf,
    /// Backup directory, relative to `data_dir` unless absolute.
    pub backup_dir: PathBuf,
    /// Rolling retention: backups kept after each cleanup pass.
    pub backup_keep_count: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            blockchain_file: PathBuf::from("blockchain_data.json"),
            backup_dir: PathBuf::from("blockchain_backups"),
            backup_keep_count: 10,
        }
    }
}

impl ServiceConfig {
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("attendance-node.toml")
    }

    pub fn primary_path(&self) -> PathBuf {
        self.resolve(&self.blockchain_file)
    }

    pub fn backup_dir_path(&self) -> PathBuf {
        self.resolve(&self.backup_dir)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let format = if ext == "toml" {
            config_rs::FileFormat::Toml
        } else {
            config_rs::FileFormat::Json
        };

        let cfg = config_rs::Config::builder()
            .add_source(config_rs::File::from(path).format(format))
            .build()
            .with_context(|| format!("failed to load config file: {}", path.display()))?;

        cfg.try_deserialize::<ServiceConfig>()
            .with_context(|| format!("failed to deserialize config: {}", path.display()))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "failed to create config parent directory: {}",
                        parent.display()
                    )
                })?;
            }
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let out = if ext == "toml" {
            toml::to_string_pretty(self).context("failed to serialize config as toml")?
        } else {
            serde_json::to_string_pretty(self).context("failed to serialize config as json")?
        };

        std::fs::write(path, out)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }
}
