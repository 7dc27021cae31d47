//! Error taxonomy for layout resolution, index building and sample loading.

use std::path::PathBuf;

use thiserror::Error;

pub type ChexpertResult<T> = Result<T, ChexpertError>;

#[derive(Debug, Error)]
pub enum ChexpertError {
    #[error(
        "CheXpert data not found under {root}: visit https://stanfordmlgroup.github.io/competitions/chexpert/ \
         to download the data, then place the full-resolution zip file in {root}"
    )]
    DataNotFound { root: PathBuf },
    #[error("failed to extract {archive}: {source}")]
    Extraction {
        archive: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("extracting {archive} produced no usable directory at {expected}")]
    ExtractionIncomplete { archive: PathBuf, expected: PathBuf },
    #[error("malformed manifest {path}: {msg}")]
    Manifest { path: PathBuf, msg: String },
    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("unreadable image {path}: {source}")]
    SampleLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("index {index} out of bounds for dataset of length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("padded image is {height}x{width}, expected a square canvas")]
    Geometry { height: u32, width: u32 },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ChexpertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ChexpertError::Io {
            path: path.into(),
            source,
        }
    }
}
