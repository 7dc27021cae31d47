//! CheXpert chest X-ray indexing and sample materialization.
//!
//! This crate provides:
//! - Layout resolution and one-time archive extraction under a base root
//! - Manifest indexing with missing-label imputation and uncertain-label clamping
//! - Per-sample grayscale resize, square padding and normalization
//! - A [`VisionDataset`] trait for training harnesses to consume

pub mod config;
pub mod data;
pub mod dataset;
pub mod error;
pub mod transform;

pub use config::DatasetConfig;
pub use data::layout::{resolve, ResolvedLayout};
pub use data::manifest::build_index;
pub use data::model::{
    DatasetIndex, Input2dSpec, RawClass, RawLabel, Sample, Split, CANONICAL_ORDER, NUM_CLASSES,
};
pub use data::stats::{class_prevalence, ClassPrevalence};
pub use dataset::{ChexpertFull, VisionDataset};
pub use error::{ChexpertError, ChexpertResult};
