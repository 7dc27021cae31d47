use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::data::model::Split;

pub const BASE_ROOT_ENV: &str = "CHEXPERT_BASE_ROOT";
pub const SPLIT_ENV: &str = "CHEXPERT_SPLIT";

/// Construction parameters for [`crate::ChexpertFull`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Directory that contains `chest_xray/chexpert_full`.
    pub base_root: PathBuf,
    pub split: Split,
    /// Accepted for parity with other datasets; the data must be downloaded by hand.
    #[serde(default)]
    pub download: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            base_root: PathBuf::from("data"),
            split: Split::Train,
            download: false,
        }
    }
}

impl DatasetConfig {
    /// Defaults overridden by `CHEXPERT_BASE_ROOT` and `CHEXPERT_SPLIT`.
    /// An unparseable split falls back to the default.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(root) = std::env::var(BASE_ROOT_ENV) {
            if !root.trim().is_empty() {
                cfg.base_root = PathBuf::from(root);
            }
        }
        if let Some(split) = std::env::var(SPLIT_ENV).ok().and_then(|s| s.parse().ok()) {
            cfg.split = split;
        }
        cfg
    }

    pub fn with_base_root(mut self, base_root: impl Into<PathBuf>) -> Self {
        self.base_root = base_root.into();
        self
    }

    pub fn with_split(mut self, split: Split) -> Self {
        self.split = split;
        self
    }

    pub fn is_train(&self) -> bool {
        self.split == Split::Train
    }
}
