use std::fs::File;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{ChexpertError, ChexpertResult};

/// Subdirectory of the base root that holds this dataset.
pub const DATASET_SUBDIR: [&str; 2] = ["chest_xray", "chexpert_full"];

/// Name of the extracted directory; the archive is this plus `.zip`.
pub const VERSION_PREFIX: &str = "CheXpert-v1.0";

// ---------------------------------------------------------------------------
// ResolvedLayout
// ---------------------------------------------------------------------------

/// Where the dataset lives on disk once resolution succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLayout {
    /// `<base>/chest_xray/chexpert_full`; manifest image paths are relative to it.
    pub root: PathBuf,
    /// The extracted directory holding `train.csv` / `valid.csv`.
    pub index_location: PathBuf,
    /// Whether this call performed the archive extraction.
    pub extracted: bool,
}

/// Dataset root for a given base directory.
pub fn dataset_root(base_root: &Path) -> PathBuf {
    DATASET_SUBDIR
        .iter()
        .fold(base_root.to_path_buf(), |acc, part| acc.join(part))
}

pub fn extracted_dir(root: &Path) -> PathBuf {
    root.join(VERSION_PREFIX)
}

pub fn archive_path(root: &Path) -> PathBuf {
    root.join(format!("{VERSION_PREFIX}.zip"))
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Make sure the dataset directory exists under `base_root`, extracting the
/// archive once if only the archive is present.
///
/// A partially extracted directory left behind by an interrupted run is
/// accepted as-is; its contents are not re-verified.
pub fn resolve(base_root: &Path) -> ChexpertResult<ResolvedLayout> {
    let root = dataset_root(base_root);
    std::fs::create_dir_all(&root).map_err(|e| ChexpertError::io(&root, e))?;

    let dir = extracted_dir(&root);
    let archive = archive_path(&root);

    if !dir.is_dir() && !archive.is_file() {
        return Err(ChexpertError::DataNotFound { root });
    }

    let mut extracted = false;
    if !dir.is_dir() {
        info!("Extracting data from {}...", archive.display());
        extract_archive(&archive, &root)?;
        info!("Done");
        extracted = true;
    }

    if !dir.is_dir() {
        return Err(ChexpertError::ExtractionIncomplete {
            archive,
            expected: dir,
        });
    }

    Ok(ResolvedLayout {
        root,
        index_location: dir,
        extracted,
    })
}

/// Unpack a zip archive into `dest`.
fn extract_archive(archive: &Path, dest: &Path) -> ChexpertResult<()> {
    let file = File::open(archive).map_err(|e| ChexpertError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|source| ChexpertError::Extraction {
        archive: archive.to_path_buf(),
        source,
    })?;
    zip.extract(dest).map_err(|source| ChexpertError::Extraction {
        archive: archive.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_data_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let err = resolve(tmp.path()).unwrap_err();
        assert!(matches!(err, ChexpertError::DataNotFound { .. }));
        // the dataset root is created even when nothing is found
        assert!(dataset_root(tmp.path()).is_dir());
    }

    #[test]
    fn extracted_directory_is_used_directly() {
        let tmp = tempfile::tempdir().unwrap();
        let root = dataset_root(tmp.path());
        std::fs::create_dir_all(extracted_dir(&root)).unwrap();

        let layout = resolve(tmp.path()).unwrap();
        assert_eq!(layout.root, root);
        assert_eq!(layout.index_location, root.join("CheXpert-v1.0"));
        assert!(!layout.extracted);
    }

    #[test]
    fn stray_files_do_not_count_as_data() {
        let tmp = tempfile::tempdir().unwrap();
        let root = dataset_root(tmp.path());
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(extracted_dir(&root), b"").unwrap();
        std::fs::create_dir_all(archive_path(&root)).unwrap();

        let err = resolve(tmp.path()).unwrap_err();
        assert!(matches!(err, ChexpertError::DataNotFound { .. }));
    }

    #[test]
    fn corrupt_archive_fails_extraction() {
        let tmp = tempfile::tempdir().unwrap();
        let root = dataset_root(tmp.path());
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(archive_path(&root), b"not a zip").unwrap();

        let err = resolve(tmp.path()).unwrap_err();
        assert!(matches!(err, ChexpertError::Extraction { .. }));
    }
}
