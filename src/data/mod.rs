/// Data layer: on-disk layout, manifest indexing, and class tables.
///
/// Architecture:
/// ```text
///  <base>/chest_xray/chexpert_full/
///        │
///        ▼
///   ┌──────────┐
///   │  layout   │  find or extract CheXpert-v1.0/
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ manifest  │  <split>.csv → DatasetIndex (paths + clamped labels)
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ DatasetIndex  │  canonical label rows, prevalence stats
///   └──────────────┘
/// ```

pub mod layout;
pub mod manifest;
pub mod model;
pub mod stats;
