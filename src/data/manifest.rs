use std::io::Read;
use std::path::Path;

use log::{debug, info, warn};

use super::model::{DatasetIndex, RawLabel, Split, NUM_RAW_LABELS};
use crate::error::{ChexpertError, ChexpertResult};

/// First column of the raw label block.
pub const LABELS_COL: usize = 5;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Build the index for `split` from `<index_location>/<split>.csv`.
pub fn build_index(index_location: &Path, split: Split) -> ChexpertResult<DatasetIndex> {
    let path = index_location.join(split.manifest_name());
    if !path.is_file() {
        return Err(ChexpertError::Manifest {
            path,
            msg: format!("no manifest for split '{split}'"),
        });
    }
    info!("Building index from {}...", path.display());
    let file = std::fs::File::open(&path).map_err(|e| ChexpertError::io(&path, e))?;
    let index = parse_manifest(file, &path)?;
    info!("Done: {} rows", index.len());
    Ok(index)
}

// ---------------------------------------------------------------------------
// CSV parsing
// ---------------------------------------------------------------------------

/// Manifest layout: one header row, column 0 holds the image path relative
/// to the dataset root, columns `[LABELS_COL, LABELS_COL + 14)` hold label
/// codes in {-1, 0, 1} or empty. Other columns (sex, age, view) are ignored.
///
/// `source` is only used to name the manifest in errors.
pub fn parse_manifest<R: Read>(reader: R, source: &Path) -> ChexpertResult<DatasetIndex> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let end_col = LABELS_COL + NUM_RAW_LABELS;
    let mut paths = Vec::new();
    let mut labels = Vec::new();
    let mut missing_cells = 0usize;

    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(|source_err| ChexpertError::Csv {
            path: source.to_path_buf(),
            source: source_err,
        })?;

        if record.len() < end_col {
            return Err(ChexpertError::Manifest {
                path: source.to_path_buf(),
                msg: format!(
                    "row {row_no} has {} columns, expected at least {end_col}",
                    record.len()
                ),
            });
        }

        paths.push(record.get(0).unwrap_or_default().to_string());

        let mut row = [0.0f64; NUM_RAW_LABELS];
        for (slot, cell) in row.iter_mut().zip(record.iter().skip(LABELS_COL)) {
            let raw = RawLabel::parse(cell);
            if raw.is_missing() {
                missing_cells += 1;
                if !cell.trim().is_empty() {
                    warn!("row {row_no}: label cell '{cell}' is not a number, treating as missing");
                }
            }
            *slot = raw.stored();
        }
        labels.push(row);
    }

    debug!("{missing_cells} missing label cells imputed to 0");
    DatasetIndex::from_parts(paths, labels, source)
}
