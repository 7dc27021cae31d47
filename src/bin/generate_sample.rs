use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use image::{GrayImage, Luma};
use zip::write::SimpleFileOptions;

use chexpert_full::data::layout::{archive_path, dataset_root, extracted_dir, VERSION_PREFIX};
use chexpert_full::{RawClass, Split};

/// Write a small synthetic CheXpert tree for demos and smoke tests.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Base root; data lands in `<base-root>/chest_xray/chexpert_full`.
    #[arg(long, default_value = "data")]
    base_root: PathBuf,
    /// Number of training rows.
    #[arg(long, default_value_t = 32)]
    train: usize,
    /// Number of validation rows.
    #[arg(long, default_value_t = 8)]
    valid: usize,
    /// Pack the tree into the release zip and remove the extracted directory.
    #[arg(long, default_value_t = false)]
    zip: bool,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }
}

/// Label cell drawn from {missing, -1, 0, 1}, weighted toward missing like
/// real radiology reports.
fn label_cell(rng: &mut SimpleRng) -> &'static str {
    match rng.below(10) {
        0..=4 => "",
        5 => "-1.0",
        6 | 7 => "0.0",
        _ => "1.0",
    }
}

/// Portrait, landscape and square frames so every padding branch is hit.
const SHAPES: [(u32, u32); 4] = [(320, 390), (390, 320), (300, 300), (256, 512)];

fn synthetic_radiograph(width: u32, height: u32, rng: &mut SimpleRng) -> GrayImage {
    let cx = width as f64 / 2.0;
    let cy = height as f64 / 2.0;
    let radius = cx.min(cy);
    GrayImage::from_fn(width, height, |x, y| {
        let d = ((x as f64 - cx).powi(2) + (y as f64 - cy).powi(2)).sqrt() / radius;
        let base = 200.0 * (1.0 - d.min(1.0)) + 20.0;
        let noise = rng.below(16) as f64;
        Luma([(base + noise).min(255.0) as u8])
    })
}

fn write_split(index_dir: &Path, split: Split, rows: usize, rng: &mut SimpleRng) -> Result<()> {
    let csv_path = index_dir.join(split.manifest_name());
    let mut writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("creating {}", csv_path.display()))?;

    let mut header = vec!["Path", "Sex", "Age", "Frontal/Lateral", "AP/PA"];
    header.extend(RawClass::ALL.iter().map(|c| c.name()));
    writer.write_record(&header)?;

    for row in 0..rows {
        let rel = format!(
            "{VERSION_PREFIX}/{split}/patient{:05}/study1/view1_frontal.png",
            row + 1
        );
        let (w, h) = SHAPES[row % SHAPES.len()];
        let img_path = index_dir
            .parent()
            .context("index directory has no parent")?
            .join(&rel);
        if let Some(dir) = img_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        synthetic_radiograph(w, h, rng)
            .save(&img_path)
            .with_context(|| format!("writing {}", img_path.display()))?;

        let sex = if rng.below(2) == 0 { "Female" } else { "Male" };
        let age = (18 + rng.below(70)).to_string();
        let mut record = vec![rel, sex.to_string(), age, "Frontal".into(), "AP".into()];
        record.extend((0..RawClass::ALL.len()).map(|_| label_cell(rng).to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Zip `<root>/CheXpert-v1.0` into `<root>/CheXpert-v1.0.zip`, entries
/// relative to `root`.
fn pack(root: &Path) -> Result<PathBuf> {
    let mut files = Vec::new();
    collect_files(&extracted_dir(root), &mut files)?;
    files.sort();

    let archive = archive_path(root);
    let mut zip = zip::ZipWriter::new(File::create(&archive)?);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for file in files {
        let name = file
            .strip_prefix(root)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        zip.start_file(name, options)?;
        zip.write_all(&std::fs::read(&file)?)?;
    }
    zip.finish()?;
    Ok(archive)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    let root = dataset_root(&args.base_root);
    let index_dir = extracted_dir(&root);
    std::fs::create_dir_all(&index_dir)
        .with_context(|| format!("creating {}", index_dir.display()))?;

    write_split(&index_dir, Split::Train, args.train, &mut rng)?;
    write_split(&index_dir, Split::Valid, args.valid, &mut rng)?;

    if args.zip {
        let archive = pack(&root)?;
        std::fs::remove_dir_all(&index_dir)?;
        println!("Wrote {} + {} rows to {}", args.train, args.valid, archive.display());
    } else {
        println!("Wrote {} + {} rows to {}", args.train, args.valid, index_dir.display());
    }
    Ok(())
}
