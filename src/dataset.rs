//! The CheXpert (full resolution) dataset and the capability trait that
//! training harnesses consume.

use std::path::{Path, PathBuf};

use log::debug;

use crate::config::DatasetConfig;
use crate::data::layout::{self, ResolvedLayout};
use crate::data::manifest;
use crate::data::model::{DatasetIndex, Input2dSpec, Sample, Split, NUM_CLASSES};
use crate::error::{ChexpertError, ChexpertResult};
use crate::transform;

/// An indexed collection of ready-to-batch samples.
///
/// Implementations must be `Send + Sync`: loaders call [`VisionDataset::get`]
/// from several worker threads at once without locking.
pub trait VisionDataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize the sample at `index`. Fails for `index >= len()`.
    fn get(&self, index: usize) -> ChexpertResult<Sample>;

    fn num_classes(&self) -> usize;

    fn input_spec(&self) -> Input2dSpec;

    fn name(&self) -> &str {
        "dataset"
    }
}

/// CheXpert full-resolution chest radiographs.
///
/// The data requires registration and must be placed under
/// `<base_root>/chest_xray/chexpert_full/` by hand, either extracted or as
/// the release zip.
#[derive(Debug, Clone)]
pub struct ChexpertFull {
    layout: ResolvedLayout,
    split: Split,
    index: DatasetIndex,
}

impl ChexpertFull {
    pub const NUM_CLASSES: usize = NUM_CLASSES;
    pub const INPUT_SIZE: (u32, u32) = (transform::TARGET_SIZE, transform::TARGET_SIZE);
    pub const PATCH_SIZE: (u32, u32) = (16, 16);
    pub const IN_CHANNELS: u32 = 1;

    /// Resolve the layout under `base_root` and index the train or valid split.
    ///
    /// `download` is accepted for interface parity and ignored.
    pub fn new(base_root: impl AsRef<Path>, download: bool, train: bool) -> ChexpertResult<Self> {
        if download {
            debug!("download requested but CheXpert must be fetched manually; ignoring");
        }
        let layout = layout::resolve(base_root.as_ref())?;
        let split = Split::from_train_flag(train);
        let index = manifest::build_index(&layout.index_location, split)?;
        Ok(ChexpertFull {
            layout,
            split,
            index,
        })
    }

    pub fn from_config(cfg: &DatasetConfig) -> ChexpertResult<Self> {
        Self::new(&cfg.base_root, cfg.download, cfg.is_train())
    }

    pub fn spec() -> Input2dSpec {
        Input2dSpec {
            input_size: Self::INPUT_SIZE,
            patch_size: Self::PATCH_SIZE,
            in_channels: Self::IN_CHANNELS,
        }
    }

    pub fn layout(&self) -> &ResolvedLayout {
        &self.layout
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn index(&self) -> &DatasetIndex {
        &self.index
    }

    /// Absolute path of the image at `position`.
    pub fn image_path(&self, position: usize) -> Option<PathBuf> {
        self.index.path(position).map(|rel| self.layout.root.join(rel))
    }

    /// Like [`VisionDataset::get`] but takes a signed position, so callers
    /// holding a user-supplied integer get `IndexOutOfRange` for negatives.
    pub fn get_signed(&self, position: i64) -> ChexpertResult<Sample> {
        let index = usize::try_from(position).map_err(|_| self.out_of_range(position))?;
        self.get(index)
    }

    fn out_of_range(&self, index: i64) -> ChexpertError {
        ChexpertError::IndexOutOfRange {
            index,
            len: self.index.len(),
        }
    }
}

impl VisionDataset for ChexpertFull {
    fn len(&self) -> usize {
        self.index.len()
    }

    fn get(&self, index: usize) -> ChexpertResult<Sample> {
        let out_of_range = || self.out_of_range(i64::try_from(index).unwrap_or(i64::MAX));
        let path = self.image_path(index).ok_or_else(out_of_range)?;
        let labels = self.index.canonical_labels(index).ok_or_else(out_of_range)?;

        debug!("loading sample {index} from {}", path.display());
        let img = image::open(&path).map_err(|source| ChexpertError::SampleLoad {
            path: path.clone(),
            source,
        })?;
        let image = transform::prepare(&img)?;

        let (h, w) = Self::INPUT_SIZE;
        Ok(Sample {
            index,
            image,
            shape: [Self::IN_CHANNELS as usize, h as usize, w as usize],
            labels,
        })
    }

    fn num_classes(&self) -> usize {
        Self::NUM_CLASSES
    }

    fn input_spec(&self) -> Input2dSpec {
        Self::spec()
    }

    fn name(&self) -> &str {
        "chexpert_full"
    }
}
