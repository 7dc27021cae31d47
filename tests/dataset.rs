//! End-to-end tests: layout resolution, indexing and sample materialization
//! against synthetic dataset trees.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chexpert_full::data::layout::{archive_path, dataset_root, extracted_dir};
use chexpert_full::transform::{denormalize, MEAN, STD};
use chexpert_full::{ChexpertError, ChexpertFull, DatasetConfig, Split, VisionDataset};
use image::{GrayImage, Luma, Rgb, RgbImage};
use zip::write::SimpleFileOptions;

const HEADER: &str = "Path,Sex,Age,Frontal/Lateral,AP/PA,No Finding,Enlarged Cardiomediastinum,\
Cardiomegaly,Lung Opacity,Lung Lesion,Edema,Consolidation,Pneumonia,Atelectasis,Pneumothorax,\
Pleural Effusion,Pleural Other,Fracture,Support Devices";

/// One manifest row: image size and the 14 raw label cells.
struct Row {
    width: u32,
    height: u32,
    labels: [&'static str; 14],
}

fn rows() -> Vec<Row> {
    vec![
        Row {
            width: 320,
            height: 390,
            labels: ["1.0", "", "", "", "", "", "", "", "", "", "", "", "", "1.0"],
        },
        Row {
            width: 390,
            height: 320,
            labels: ["", "-1.0", "1.0", "0.0", "", "", "", "", "1.0", "", "-1.0", "", "", ""],
        },
        Row {
            width: 300,
            height: 300,
            labels: ["", "", "", "1.0", "", "1.0", "", "-1.0", "", "1.0", "", "", "1.0", ""],
        },
    ]
}

/// Write `<base>/chest_xray/chexpert_full/CheXpert-v1.0/{train,valid}.csv`
/// plus PNG images. Returns the extracted directory.
fn create_dataset(base: &Path, rows: &[Row]) -> anyhow::Result<PathBuf> {
    let root = dataset_root(base);
    let dir = extracted_dir(&root);
    for split in [Split::Train, Split::Valid] {
        let mut csv = String::from(HEADER);
        csv.push('\n');
        for (i, row) in rows.iter().enumerate() {
            let rel = format!(
                "CheXpert-v1.0/{split}/patient{:05}/study1/view1_frontal.png",
                i + 1
            );
            let path = root.join(&rel);
            fs::create_dir_all(path.parent().unwrap())?;
            let img =
                GrayImage::from_fn(row.width, row.height, |x, y| Luma([((x + y) % 256) as u8]));
            img.save(&path)?;
            csv.push_str(&format!("{rel},Female,55,Frontal,AP,{}\n", row.labels.join(",")));
        }
        fs::write(dir.join(split.manifest_name()), csv)?;
    }
    Ok(dir)
}

fn zip_dir(root: &Path, dir: &Path) -> anyhow::Result<PathBuf> {
    fn collect(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                collect(&path, out)?;
            } else {
                out.push(path);
            }
        }
        Ok(())
    }
    let mut files = Vec::new();
    collect(dir, &mut files)?;

    let archive = archive_path(root);
    let mut zip = zip::ZipWriter::new(File::create(&archive)?);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for file in files {
        let rel = file.strip_prefix(root)?;
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        zip.start_file(name, options)?;
        zip.write_all(&fs::read(&file)?)?;
    }
    zip.finish()?;
    Ok(archive)
}

#[test]
fn every_sample_has_fixed_shape_and_binary_labels() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_dataset(tmp.path(), &rows())?;

    let ds = ChexpertFull::new(tmp.path(), false, true)?;
    assert_eq!(ds.len(), 3);
    assert_eq!(ds.num_classes(), 14);
    assert_eq!(ds.split(), Split::Train);

    for p in 0..ds.len() {
        let sample = ds.get(p)?;
        assert_eq!(sample.index, p);
        assert_eq!(sample.shape, [1, 224, 224]);
        assert_eq!(sample.image.len(), 224 * 224);
        assert!(sample.labels.iter().all(|l| *l == 0 || *l == 1));
    }
    Ok(())
}

#[test]
fn labels_use_canonical_order() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_dataset(tmp.path(), &rows())?;
    let ds = ChexpertFull::new(tmp.path(), false, true)?;

    // row 0: No Finding + Support Devices; No Finding is never emitted
    assert_eq!(ds.get(0)?.labels, [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
    // row 1: Cardiomegaly + Atelectasis (twice); uncertain codes clamp to 0
    assert_eq!(ds.get(1)?.labels, [1, 0, 1, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0]);
    // row 2: Lung Opacity, Edema, Pneumothorax, Fracture
    assert_eq!(ds.get(2)?.labels, [0, 0, 0, 1, 0, 1, 0, 0, 0, 1, 0, 0, 1, 0]);
    Ok(())
}

#[test]
fn index_preserves_manifest_order() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_dataset(tmp.path(), &rows())?;
    let ds = ChexpertFull::new(tmp.path(), true, false)?;

    assert_eq!(ds.split(), Split::Valid);
    let paths = ds.index().paths();
    assert_eq!(paths.len(), 3);
    for (i, path) in paths.iter().enumerate() {
        assert_eq!(
            path,
            &format!("CheXpert-v1.0/valid/patient{:05}/study1/view1_frontal.png", i + 1)
        );
    }
    Ok(())
}

#[test]
fn repeated_access_is_bit_identical() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_dataset(tmp.path(), &rows())?;
    let ds = ChexpertFull::new(tmp.path(), false, true)?;

    for p in 0..ds.len() {
        assert_eq!(ds.get(p)?, ds.get(p)?);
    }
    Ok(())
}

#[test]
fn square_image_is_offset_toward_bottom_right() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_dataset(tmp.path(), &rows())?;
    let ds = ChexpertFull::new(tmp.path(), false, true)?;

    let sample = ds.get(2)?;
    let size = 224;
    assert!(sample.image[..size].iter().all(|v| *v == 0.0));
    assert!((0..size).all(|y| sample.image[y * size] == 0.0));
    Ok(())
}

#[test]
fn out_of_range_positions_fail() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_dataset(tmp.path(), &rows())?;
    let ds = ChexpertFull::new(tmp.path(), false, true)?;

    let err = ds.get(ds.len()).unwrap_err();
    assert!(matches!(err, ChexpertError::IndexOutOfRange { index: 3, len: 3 }));
    let err = ds.get_signed(-1).unwrap_err();
    assert!(matches!(err, ChexpertError::IndexOutOfRange { index: -1, len: 3 }));
    assert!(ds.get_signed(0).is_ok());
    Ok(())
}

#[test]
fn missing_image_is_a_hard_failure() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_dataset(tmp.path(), &rows())?;
    let ds = ChexpertFull::new(tmp.path(), false, true)?;

    fs::remove_file(ds.image_path(1).unwrap())?;
    let err = ds.get(1).unwrap_err();
    assert!(matches!(err, ChexpertError::SampleLoad { .. }));
    // neighbours are unaffected
    assert!(ds.get(0).is_ok());
    Ok(())
}

#[test]
fn undecodable_image_is_a_hard_failure() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_dataset(tmp.path(), &rows())?;
    let ds = ChexpertFull::new(tmp.path(), false, true)?;

    fs::write(ds.image_path(0).unwrap(), b"definitely not a png")?;
    let err = ds.get(0).unwrap_err();
    assert!(matches!(err, ChexpertError::SampleLoad { .. }));
    assert!(ds.get(1).is_ok());
    Ok(())
}

#[test]
fn rgb_images_are_converted_to_one_channel() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_dataset(tmp.path(), &rows())?;
    let ds = ChexpertFull::new(tmp.path(), false, true)?;

    let path = ds.image_path(0).unwrap();
    RgbImage::from_pixel(100, 140, Rgb([10, 200, 30])).save(&path)?;
    let sample = ds.get(0)?;
    assert_eq!(sample.shape, [1, 224, 224]);
    assert_eq!(sample.image.len(), 224 * 224);

    // (10, 200, 30) has Rec. 601 luma 124; the centre of the canvas is image content
    let centre = sample.image[112 * 224 + 112];
    assert_eq!(denormalize(&[centre], MEAN, STD), vec![124]);
    Ok(())
}

#[test]
fn archive_is_extracted_once() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = create_dataset(tmp.path(), &rows())?;
    let root = dataset_root(tmp.path());
    zip_dir(&root, &dir)?;
    fs::remove_dir_all(&dir)?;
    assert!(!dir.exists());

    let first = ChexpertFull::new(tmp.path(), false, true)?;
    assert!(first.layout().extracted);
    assert!(dir.is_dir());

    let second = ChexpertFull::new(tmp.path(), false, true)?;
    assert!(!second.layout().extracted);
    assert_eq!(first.index(), second.index());
    assert_eq!(first.get(1)?, second.get(1)?);
    Ok(())
}

#[test]
fn archive_without_dataset_directory_is_an_extraction_error() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = dataset_root(tmp.path());
    fs::create_dir_all(&root)?;

    let mut zip = zip::ZipWriter::new(File::create(archive_path(&root))?);
    zip.start_file("README.txt", SimpleFileOptions::default())?;
    zip.write_all(b"wrong archive")?;
    zip.finish()?;

    let err = ChexpertFull::new(tmp.path(), false, true).unwrap_err();
    assert!(matches!(err, ChexpertError::ExtractionIncomplete { .. }));
    Ok(())
}

#[test]
fn empty_base_root_reports_missing_data() {
    let tmp = tempfile::tempdir().unwrap();
    let err = ChexpertFull::new(tmp.path().join("nested/base"), false, true).unwrap_err();
    assert!(matches!(err, ChexpertError::DataNotFound { .. }));
    assert!(err.to_string().contains("download"));
}

#[test]
fn missing_split_manifest_is_malformed() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = create_dataset(tmp.path(), &rows())?;
    fs::remove_file(dir.join("valid.csv"))?;

    assert!(ChexpertFull::new(tmp.path(), false, true).is_ok());
    let err = ChexpertFull::new(tmp.path(), false, false).unwrap_err();
    assert!(matches!(err, ChexpertError::Manifest { .. }));
    Ok(())
}

#[test]
fn config_and_static_spec() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_dataset(tmp.path(), &rows())?;
    let cfg = DatasetConfig::default()
        .with_base_root(tmp.path())
        .with_split(Split::Valid);
    let ds = ChexpertFull::from_config(&cfg)?;

    let spec = ds.input_spec();
    assert_eq!(spec, ChexpertFull::spec());
    assert_eq!(spec.input_size, (224, 224));
    assert_eq!(spec.patch_size, (16, 16));
    assert_eq!(spec.in_channels, 1);
    assert_eq!(ChexpertFull::NUM_CLASSES, 14);
    assert_eq!(ds.name(), "chexpert_full");
    Ok(())
}

#[test]
fn concurrent_access_without_locking() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_dataset(tmp.path(), &rows())?;
    let ds = ChexpertFull::new(tmp.path(), false, true)?;
    let expected: Vec<_> = (0..ds.len()).map(|p| ds.get(p)).collect::<Result<_, _>>()?;

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let ds = &ds;
                s.spawn(move || ds.get(t % ds.len()))
            })
            .collect();
        for (t, handle) in handles.into_iter().enumerate() {
            let sample = handle.join().unwrap().unwrap();
            assert_eq!(sample, expected[t % expected.len()]);
        }
    });
    Ok(())
}
