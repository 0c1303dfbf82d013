use crate::{
    feature_names::FeatureNameTable,
    volume::{Volume, VolumeError},
    volume_writer::{NiftiScalar, VolumeWriter, VolumeWriterError},
};

use log::{debug, info};
use rayon::prelude::*;
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const DEFAULT_EXTENSION: &str = "nii.gz";

#[derive(Debug, Error)]
pub enum ChannelSplitError {
    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error("Failed to write channel {channel} ({name}): {source}")]
    Write {
        channel: usize,
        name: String,
        #[source]
        source: VolumeWriterError,
    },
}

/// Splits a multi-channel volume into one single-channel volume per channel
pub struct ChannelSplitter<'a> {
    names: &'a FeatureNameTable,
    extension: String,
}

impl<'a> ChannelSplitter<'a> {
    pub fn new(names: &'a FeatureNameTable) -> Self {
        Self {
            names,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// File extension of the outputs, without the leading dot
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Names of the channels of `volume`, index-aligned
    pub fn channel_names<T>(&self, volume: &Volume<T>) -> Vec<String> {
        self.names
            .channel_names(volume.provenance, volume.components())
    }

    /// `<base>_<name>.<extension>` for every channel
    pub fn output_paths<T>(&self, volume: &Volume<T>, base: impl AsRef<Path>) -> Vec<PathBuf> {
        self.channel_names(volume)
            .iter()
            .map(|name| self.output_path(base.as_ref(), name))
            .collect()
    }

    fn output_path(&self, base: &Path, name: &str) -> PathBuf {
        let mut file = OsString::from(base.as_os_str());
        file.push("_");
        file.push(name);
        file.push(".");
        file.push(&self.extension);
        PathBuf::from(file)
    }

    /// Every channel as its own volume, paired with its name, in channel order
    pub fn split<T>(&self, volume: &Volume<T>) -> Result<Vec<(String, Volume<T>)>, ChannelSplitError>
    where
        T: Clone + Send + Sync,
    {
        let channels: Vec<Volume<T>> = (0..volume.components())
            .into_par_iter()
            .map(|channel| volume.select_channel(channel))
            .collect::<Result<_, VolumeError>>()?;

        Ok(self.channel_names(volume).into_iter().zip(channels).collect())
    }

    /// Write every channel next to `base`, one file at a time.
    ///
    /// Each channel is extracted and written before the next one is touched,
    /// so only one extra channel is held in memory. Returns the written paths
    /// in channel order.
    pub fn split_to_files<T>(
        &self,
        volume: &Volume<T>,
        base: impl AsRef<Path>,
    ) -> Result<Vec<PathBuf>, ChannelSplitError>
    where
        T: NiftiScalar,
    {
        let names = self.channel_names(volume);
        let mut written = Vec::with_capacity(names.len());

        for (channel, name) in names.into_iter().enumerate() {
            let path = self.output_path(base.as_ref(), &name);
            let single = volume.select_channel(channel)?;
            VolumeWriter::write(&single, &path).map_err(|source| ChannelSplitError::Write {
                channel,
                name,
                source,
            })?;
            debug!("Channel {channel} -> {}", path.display());
            written.push(path);
        }

        info!(
            "Split {} channel(s) into {}_*.{}",
            written.len(),
            base.as_ref().display(),
            self.extension
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::FeatureSet;
    use crate::volume::Geometry;
    use crate::volume_loader::VolumeLoader;
    use ndarray::Array4;

    fn channels(count: usize) -> Volume<f32> {
        let data = Array4::from_shape_fn((1, 2, 2, count), |(_, y, x, c)| {
            (c * 100 + y * 10 + x) as f32
        });
        Volume::new(data, Geometry::default())
    }

    fn file_names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn eight_channels_are_named_as_co_occurrence_features() {
        let table = FeatureNameTable::default();
        let splitter = ChannelSplitter::new(&table).with_extension("nrrd");
        let paths = splitter.output_paths(&channels(8), "out/case");
        assert_eq!(
            file_names(&paths),
            [
                "case_Energy.nrrd",
                "case_Entropy.nrrd",
                "case_Correlation.nrrd",
                "case_InverseDifferenceMoment.nrrd",
                "case_Inertia.nrrd",
                "case_ClusterShade.nrrd",
                "case_ClusterProminence.nrrd",
                "case_HaralickCorrelation.nrrd"
            ]
        );
        assert_eq!(paths[0].parent(), Some(Path::new("out")));
    }

    #[test]
    fn other_channel_counts_are_numbered() {
        let table = FeatureNameTable::default();
        let splitter = ChannelSplitter::new(&table);
        let paths = splitter.output_paths(&channels(7), "case");
        assert_eq!(paths.len(), 7);
        assert_eq!(paths[0], PathBuf::from("case_1.nii.gz"));
        assert_eq!(paths[6], PathBuf::from("case_7.nii.gz"));
    }

    #[test]
    fn provenance_picks_names_when_count_agrees() {
        let table = FeatureNameTable::default();
        let splitter = ChannelSplitter::new(&table);
        let volume = channels(5).with_provenance(Some(FeatureSet::BoneMorphometry));
        assert_eq!(splitter.channel_names(&volume)[1], "TrabecularThickness");
    }

    #[test]
    fn split_keeps_channel_order_and_values() {
        let table = FeatureNameTable::default();
        let splitter = ChannelSplitter::new(&table);
        let parts = splitter.split(&channels(10)).unwrap();
        assert_eq!(parts.len(), 10);
        for (channel, (name, part)) in parts.iter().enumerate() {
            assert_eq!(name, &table.names(FeatureSet::RunLength)[channel]);
            assert_eq!(part.components(), 1);
            assert_eq!(part.extent(), (2, 2, 1));
            assert_eq!(part.value((1, 1, 0)), Some((channel * 100 + 11) as f32));
        }
    }

    #[test]
    fn split_to_files_writes_one_volume_per_channel() {
        let dir = tempfile::tempdir().unwrap();
        let table = FeatureNameTable::default();
        let splitter = ChannelSplitter::new(&table).with_extension(".nii");
        let volume = channels(3);

        let written = splitter
            .split_to_files(&volume, dir.path().join("scan"))
            .unwrap();
        assert_eq!(file_names(&written), ["scan_1.nii", "scan_2.nii", "scan_3.nii"]);

        let second = VolumeLoader::load(&written[1]).unwrap();
        assert_eq!(second.components(), 1);
        assert_eq!(second.value((1, 0, 0)), Some(101.0));
    }
}
