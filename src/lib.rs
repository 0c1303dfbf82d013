//! # Voxel-features library
//!
//! This crate converts per-voxel measurements of 3D scans between a
//! multi-channel volume and the flat forms external tools consume.
//!
//! Texture and morphometry filters (co-occurrence, run-length, bone
//! morphometry) produce volumes holding a vector of feature values per
//! voxel. This library takes those volumes the rest of the way:
//!  - Export to a CSV feature table, one row of `x, y, z, features...` per
//!    voxel, optionally restricted by a mask and optionally joined with a
//!    second feature volume
//!  - Split into one single-channel volume per feature, named after the
//!    feature when the channel count (or the volume's provenance tag)
//!    identifies the filter family
//!  - Build a label volume from a CSV of `x, y, z, label` rows
//!
//! Volumes are read from and written to NIfTI files (`.nii`, `.nii.gz`).
//! Spacing, origin and direction are carried from input to output unchanged.
//!
//! # Examples
//!
//! ## Exporting masked features to CSV
//!
//! ```no_run
//! # use voxel_features::{FeatureNameTable, FeatureTableExporter, VolumeLoader};
//! let features = VolumeLoader::load("glcm_features.nii.gz")
//!     .expect("should have loaded the feature volume");
//! let mask = VolumeLoader::load_scalar("segmentation.nii.gz")
//!     .expect("should have loaded the mask");
//! let rows = FeatureTableExporter::new(&features)
//!     .with_mask(&mask)
//!     .expect("mask should cover the same grid")
//!     .with_header(FeatureNameTable::default().table_header())
//!     .write_to_path("features.csv")
//!     .expect("should have written the table");
//! println!("{rows} voxels exported");
//! ```
//!
//! ## Splitting a feature volume
//!
//! ```no_run
//! # use voxel_features::{ChannelSplitter, FeatureNameTable, VolumeLoader};
//! let names = FeatureNameTable::default();
//! let features = VolumeLoader::load("glcm_features.nii.gz")
//!     .expect("should have loaded the feature volume");
//! // Writes case01_Energy.nii.gz, case01_Entropy.nii.gz, ...
//! ChannelSplitter::new(&names)
//!     .split_to_files(&features, "case01")
//!     .expect("should have written one file per channel");
//! ```

pub mod channel_splitter;
pub mod enums;
pub mod feature_names;
pub mod feature_table;
pub mod label_map;
pub mod volume;
pub mod volume_loader;
pub mod volume_writer;

pub use channel_splitter::ChannelSplitter;
pub use enums::FeatureSet;
pub use feature_names::FeatureNameTable;
pub use feature_table::FeatureTableExporter;
pub use label_map::{LabelMapBuilder, LabelTable};
pub use volume::{Geometry, Volume};
pub use volume_loader::VolumeLoader;
pub use volume_writer::VolumeWriter;
