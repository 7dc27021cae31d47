use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use chexpert_full::data::layout;
use chexpert_full::transform::{self, MEAN, STD};
use chexpert_full::{
    class_prevalence, ChexpertFull, ClassPrevalence, DatasetConfig, Input2dSpec, Split,
    VisionDataset, CANONICAL_ORDER,
};

/// Inspect a local CheXpert installation: resolve, index and materialize samples.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Directory containing `chest_xray/chexpert_full` (overrides CHEXPERT_BASE_ROOT).
    #[arg(long, global = true)]
    base_root: Option<PathBuf>,
    /// Split to index (overrides CHEXPERT_SPLIT).
    #[arg(long, value_enum, global = true)]
    split: Option<Split>,
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Locate the dataset, extracting the archive if needed.
    Resolve,
    /// Build the split index and report per-class prevalence.
    Index,
    /// Materialize one sample.
    Sample {
        /// Position in the split index.
        #[arg(allow_negative_numbers = true)]
        position: i64,
        /// Write the padded 224x224 canvas to this PNG.
        #[arg(long)]
        dump: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct ResolveReport {
    root: PathBuf,
    index_location: PathBuf,
    extracted: bool,
}

#[derive(Serialize)]
struct IndexReport {
    split: Split,
    rows: usize,
    num_classes: usize,
    input_spec: Input2dSpec,
    prevalence: Vec<ClassPrevalence>,
}

#[derive(Serialize)]
struct SampleReport {
    index: usize,
    path: PathBuf,
    shape: [usize; 3],
    labels: Vec<(&'static str, i64)>,
    min: f32,
    max: f32,
    mean: f32,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut cfg = DatasetConfig::from_env();
    if let Some(root) = &cli.base_root {
        cfg = cfg.with_base_root(root);
    }
    if let Some(split) = cli.split {
        cfg = cfg.with_split(split);
    }

    match &cli.command {
        Command::Resolve => {
            let resolved = layout::resolve(&cfg.base_root)
                .with_context(|| format!("resolving dataset under {}", cfg.base_root.display()))?;
            let report = ResolveReport {
                root: resolved.root,
                index_location: resolved.index_location,
                extracted: resolved.extracted,
            };
            if cli.json {
                print_json(&report)?;
            } else {
                println!("root:           {}", report.root.display());
                println!("index location: {}", report.index_location.display());
                println!("extracted now:  {}", report.extracted);
            }
        }
        Command::Index => {
            let ds = open(&cfg)?;
            let report = IndexReport {
                split: ds.split(),
                rows: ds.len(),
                num_classes: ds.num_classes(),
                input_spec: ds.input_spec(),
                prevalence: class_prevalence(ds.index()),
            };
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "{} split: {} rows, {} classes",
                    report.split, report.rows, report.num_classes
                );
                for p in &report.prevalence {
                    println!(
                        "  [{:>2}] {:<28} {:>8}  {:>6.2}%",
                        p.slot,
                        p.name,
                        p.positives,
                        p.ratio * 100.0
                    );
                }
            }
        }
        Command::Sample { position, dump } => {
            let ds = open(&cfg)?;
            let sample = ds
                .get_signed(*position)
                .with_context(|| format!("materializing sample {position}"))?;

            if let Some(out) = dump {
                let (w, h) = ChexpertFull::INPUT_SIZE;
                let pixels = transform::denormalize(&sample.image, MEAN, STD);
                let canvas = image::GrayImage::from_raw(w, h, pixels)
                    .context("canvas size does not match sample shape")?;
                canvas
                    .save(out)
                    .with_context(|| format!("writing {}", out.display()))?;
            }

            let n = sample.image.len().max(1) as f32;
            let report = SampleReport {
                index: sample.index,
                path: ds.image_path(sample.index).unwrap_or_default(),
                shape: sample.shape,
                labels: CANONICAL_ORDER
                    .iter()
                    .map(|c| c.name())
                    .zip(sample.labels)
                    .collect(),
                min: sample.image.iter().copied().fold(f32::INFINITY, f32::min),
                max: sample.image.iter().copied().fold(f32::NEG_INFINITY, f32::max),
                mean: sample.image.iter().sum::<f32>() / n,
            };
            if cli.json {
                print_json(&report)?;
            } else {
                println!("sample {} ({})", report.index, report.path.display());
                println!(
                    "  shape {:?}  min {:.4}  max {:.4}  mean {:.4}",
                    report.shape, report.min, report.max, report.mean
                );
                for (name, label) in &report.labels {
                    println!("  {name:<28} {label}");
                }
            }
        }
    }
    Ok(())
}

fn open(cfg: &DatasetConfig) -> Result<ChexpertFull> {
    ChexpertFull::from_config(cfg).with_context(|| {
        format!(
            "opening {} split under {}",
            cfg.split,
            cfg.base_root.display()
        )
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serializing report")?;
    println!("{text}");
    Ok(())
}
