use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{debug, info};
use std::path::{Path, PathBuf};

use voxel_features::{
    ChannelSplitter, FeatureNameTable, FeatureSet, FeatureTableExporter, LabelMapBuilder,
    LabelTable, VolumeLoader, VolumeWriter, channel_splitter::DEFAULT_EXTENSION,
};

/// Convert feature volumes to CSV tables and per-feature volumes, and build label maps from CSV
#[derive(Parser, Debug)]
#[command(name = "voxel-features", version, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a label volume from `x,y,z,label` rows
    LabelMap {
        /// Volume whose grid and placement the label map copies
        #[arg(long)]
        input_volume: PathBuf,

        /// CSV file of `x,y,z,label` rows
        #[arg(long)]
        input_csv: PathBuf,

        /// Label map to write
        #[arg(short, long)]
        output: PathBuf,

        /// Label text written as 1
        #[arg(long)]
        label1: Option<String>,

        /// Label text written as 2
        #[arg(long)]
        label2: Option<String>,

        /// Label text written as 3
        #[arg(long)]
        label3: Option<String>,

        /// Label text written as 4
        #[arg(long)]
        label4: Option<String>,

        /// Label text written as 5
        #[arg(long)]
        label5: Option<String>,
    },

    /// Export a multi-channel volume as a CSV feature table
    ToCsv {
        /// Multi-channel feature volume
        #[arg(long)]
        input_volume: PathBuf,

        /// Only export voxels where this volume is non-zero (empty = no mask)
        #[arg(long)]
        mask: Option<String>,

        /// Second feature volume whose channels are appended to each row (empty = none)
        #[arg(long)]
        additional: Option<String>,

        /// CSV file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Write the fixed column-name header first
        #[arg(long, default_value_t = false)]
        header: bool,
    },

    /// Write each channel of a multi-channel volume to its own file
    Split {
        /// Multi-channel feature volume
        #[arg(long)]
        input_volume: PathBuf,

        /// Outputs are written as `<base>_<feature>.<extension>`
        #[arg(long)]
        output_base: PathBuf,

        /// Output file extension
        #[arg(long, default_value = DEFAULT_EXTENSION)]
        extension: String,

        /// Feature family of the input (bm, glcm, glrlm), overriding the file's tag
        #[arg(long)]
        feature_set: Option<FeatureSet>,
    },
}

/// Empty paths on the command line mean "not given"
fn given(path: Option<String>) -> Option<PathBuf> {
    path.filter(|path| !path.is_empty()).map(PathBuf::from)
}

fn load(path: &Path) -> anyhow::Result<voxel_features::Volume<f64>> {
    VolumeLoader::load(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    debug!("{args:?}");
    let names = FeatureNameTable::default();

    match args.command {
        Command::LabelMap {
            input_volume,
            input_csv,
            output,
            label1,
            label2,
            label3,
            label4,
            label5,
        } => {
            let table = LabelTable::from_slots([label1, label2, label3, label4, label5])?;
            if table.is_empty() {
                log::warn!("No labels configured, every voxel will be background");
            }
            let reference = load(&input_volume)?;
            let labels = LabelMapBuilder::new(&table)
                .build_from_path(&reference, &input_csv)
                .with_context(|| format!("Failed to build label map from {}", input_csv.display()))?;
            VolumeWriter::write(&labels, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("Label map written to {}", output.display());
        }

        Command::ToCsv {
            input_volume,
            mask,
            additional,
            output,
            header,
        } => {
            let primary = load(&input_volume)?;
            let mask = match given(mask) {
                Some(path) => Some(
                    VolumeLoader::load_scalar(&path)
                        .with_context(|| format!("Failed to read mask {}", path.display()))?,
                ),
                None => None,
            };
            let additional = given(additional).map(|path| load(&path)).transpose()?;

            let mut exporter = FeatureTableExporter::new(&primary);
            if let Some(mask) = &mask {
                exporter = exporter.with_mask(mask)?;
            }
            if let Some(additional) = &additional {
                exporter = exporter.with_additional(additional)?;
            }
            if header {
                exporter = exporter.with_header(names.table_header());
            }
            exporter
                .write_to_path(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
        }

        Command::Split {
            input_volume,
            output_base,
            extension,
            feature_set,
        } => {
            let mut volume = load(&input_volume)?;
            if feature_set.is_some() {
                volume.provenance = feature_set;
            }
            ChannelSplitter::new(&names)
                .with_extension(extension)
                .split_to_files(&volume, &output_base)?;
        }
    }

    Ok(())
}
