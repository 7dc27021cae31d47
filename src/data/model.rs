use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChexpertError, ChexpertResult};

/// Number of raw label columns in a manifest row.
pub const NUM_RAW_LABELS: usize = 14;

/// Number of slots in the canonical label vector.
pub const NUM_CLASSES: usize = 14;

// ---------------------------------------------------------------------------
// RawClass – the diagnosis columns of a manifest, in file order
// ---------------------------------------------------------------------------

/// A diagnosis column of the manifest. Discriminants are offsets into the
/// 14-wide raw label block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RawClass {
    NoFinding = 0,
    EnlargedCardiomediastinum = 1,
    Cardiomegaly = 2,
    LungOpacity = 3,
    LungLesion = 4,
    Edema = 5,
    Consolidation = 6,
    Pneumonia = 7,
    Atelectasis = 8,
    Pneumothorax = 9,
    PleuralEffusion = 10,
    PleuralOther = 11,
    Fracture = 12,
    SupportDevices = 13,
}

impl RawClass {
    /// All raw classes in manifest column order.
    pub const ALL: [RawClass; NUM_RAW_LABELS] = [
        RawClass::NoFinding,
        RawClass::EnlargedCardiomediastinum,
        RawClass::Cardiomegaly,
        RawClass::LungOpacity,
        RawClass::LungLesion,
        RawClass::Edema,
        RawClass::Consolidation,
        RawClass::Pneumonia,
        RawClass::Atelectasis,
        RawClass::Pneumothorax,
        RawClass::PleuralEffusion,
        RawClass::PleuralOther,
        RawClass::Fracture,
        RawClass::SupportDevices,
    ];

    /// Offset of this class inside the raw label block.
    pub fn column(self) -> usize {
        self as usize
    }

    /// Header name as it appears in the manifest.
    pub fn name(self) -> &'static str {
        match self {
            RawClass::NoFinding => "No Finding",
            RawClass::EnlargedCardiomediastinum => "Enlarged Cardiomediastinum",
            RawClass::Cardiomegaly => "Cardiomegaly",
            RawClass::LungOpacity => "Lung Opacity",
            RawClass::LungLesion => "Lung Lesion",
            RawClass::Edema => "Edema",
            RawClass::Consolidation => "Consolidation",
            RawClass::Pneumonia => "Pneumonia",
            RawClass::Atelectasis => "Atelectasis",
            RawClass::Pneumothorax => "Pneumothorax",
            RawClass::PleuralEffusion => "Pleural Effusion",
            RawClass::PleuralOther => "Pleural Other",
            RawClass::Fracture => "Fracture",
            RawClass::SupportDevices => "Support Devices",
        }
    }
}

impl fmt::Display for RawClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output slot → raw class. Atelectasis fills both slot 0 and slot 8 and
/// "No Finding" is never emitted; downstream checkpoints depend on this
/// exact layout.
pub const CANONICAL_ORDER: [RawClass; NUM_CLASSES] = [
    RawClass::Atelectasis,
    RawClass::EnlargedCardiomediastinum,
    RawClass::Cardiomegaly,
    RawClass::LungOpacity,
    RawClass::LungLesion,
    RawClass::Edema,
    RawClass::Consolidation,
    RawClass::Pneumonia,
    RawClass::Atelectasis,
    RawClass::Pneumothorax,
    RawClass::PleuralEffusion,
    RawClass::PleuralOther,
    RawClass::Fracture,
    RawClass::SupportDevices,
];

// ---------------------------------------------------------------------------
// RawLabel – one label cell before imputation
// ---------------------------------------------------------------------------

/// A label cell as read from the manifest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawLabel {
    Code(f64),
    /// Empty, non-numeric or NaN cell: the report did not mention the finding.
    Missing,
}

impl RawLabel {
    pub fn parse(cell: &str) -> Self {
        match cell.trim().parse::<f64>() {
            Ok(v) if !v.is_nan() => RawLabel::Code(v),
            _ => RawLabel::Missing,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawLabel::Missing)
    }

    /// Missing cells count as a negative diagnosis.
    pub fn imputed(self) -> f64 {
        match self {
            RawLabel::Code(v) => v,
            RawLabel::Missing => 0.0,
        }
    }

    /// Impute, then clamp: uncertain (-1) and any other negative code become 0.
    pub fn stored(self) -> f64 {
        self.imputed().max(0.0)
    }
}

// ---------------------------------------------------------------------------
// Split
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Valid,
}

impl Split {
    pub fn from_train_flag(train: bool) -> Self {
        if train {
            Split::Train
        } else {
            Split::Valid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
        }
    }

    /// Manifest file name for this split.
    pub fn manifest_name(&self) -> String {
        format!("{}.csv", self.as_str())
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(Split::Train),
            "valid" | "validation" => Ok(Split::Valid),
            other => Err(format!("unknown split '{other}', expected 'train' or 'valid'")),
        }
    }
}

// ---------------------------------------------------------------------------
// DatasetIndex – paths + stored label matrix for one split
// ---------------------------------------------------------------------------

/// Immutable in-memory index of one split. Row `i` of `labels` belongs to
/// `paths[i]`; both follow manifest row order.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetIndex {
    paths: Vec<String>,
    labels: Vec<[f64; NUM_RAW_LABELS]>,
}

impl DatasetIndex {
    /// Pair paths with label rows. `source` names the manifest for error reporting.
    pub fn from_parts(
        paths: Vec<String>,
        labels: Vec<[f64; NUM_RAW_LABELS]>,
        source: &Path,
    ) -> ChexpertResult<Self> {
        if paths.len() != labels.len() {
            return Err(ChexpertError::Manifest {
                path: source.to_path_buf(),
                msg: format!(
                    "{} paths but {} label rows",
                    paths.len(),
                    labels.len()
                ),
            });
        }
        Ok(DatasetIndex { paths, labels })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn path(&self, position: usize) -> Option<&str> {
        self.paths.get(position).map(String::as_str)
    }

    /// Stored (imputed and clamped) raw label row.
    pub fn raw_labels(&self, position: usize) -> Option<&[f64; NUM_RAW_LABELS]> {
        self.labels.get(position)
    }

    /// Label row reordered into [`CANONICAL_ORDER`] and truncated to integers.
    pub fn canonical_labels(&self, position: usize) -> Option<[i64; NUM_CLASSES]> {
        let row = self.labels.get(position)?;
        Some(CANONICAL_ORDER.map(|class| row[class.column()] as i64))
    }
}

// ---------------------------------------------------------------------------
// Sample – one materialized training example
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub index: usize,
    /// Normalized pixels in CHW layout.
    pub image: Vec<f32>,
    /// `[channels, height, width]`.
    pub shape: [usize; 3],
    pub labels: [i64; NUM_CLASSES],
}

/// Input geometry advertised to model builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Input2dSpec {
    pub input_size: (u32, u32),
    pub patch_size: (u32, u32),
    pub in_channels: u32,
}
