//! CSV export of multi-channel volumes, one row per selected voxel.
//!
//! A row is assembled from independent column providers (voxel position,
//! primary channels, optional additional channels) and emitted only for
//! voxels that pass the optional mask. All volumes are walked with one
//! shared cursor in the grid's traversal order.

use crate::volume::{Volume, VolumeError, VoxelIndex};

use log::{debug, info};
use std::{
    fmt::{Display, Write as _},
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeatureTableError {
    #[error("{role} volume does not line up with the input volume: {source}")]
    Shape {
        role: &'static str,
        #[source]
        source: VolumeError,
    },

    #[error("Failed to create '{}': {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write feature table: {0}")]
    Write(#[from] io::Error),
}

/// A CSV line under construction: fields are comma-separated with no
/// trailing comma.
#[derive(Debug, Default)]
pub struct Row {
    line: String,
    fields: usize,
}

impl Row {
    pub fn push(&mut self, value: impl Display) {
        if self.fields > 0 {
            self.line.push(',');
        }
        // Writing into a String cannot fail
        let _ = write!(self.line, "{value}");
        self.fields += 1;
    }

    pub fn len(&self) -> usize {
        self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields == 0
    }

    pub fn into_line(self) -> String {
        self.line
    }
}

/// Contributes a fixed number of columns to every row
pub trait ColumnProvider {
    fn width(&self) -> usize;

    fn append(&self, index: VoxelIndex, row: &mut Row);
}

/// The voxel's `x, y, z`
pub struct IndexColumns;

impl ColumnProvider for IndexColumns {
    fn width(&self) -> usize {
        3
    }

    fn append(&self, (x, y, z): VoxelIndex, row: &mut Row) {
        row.push(x);
        row.push(y);
        row.push(z);
    }
}

/// Every channel of one volume at the voxel
pub struct ChannelColumns<'a, T> {
    volume: &'a Volume<T>,
}

impl<'a, T> ChannelColumns<'a, T> {
    pub fn new(volume: &'a Volume<T>) -> Self {
        Self { volume }
    }
}

impl<T: Display> ColumnProvider for ChannelColumns<'_, T> {
    fn width(&self) -> usize {
        self.volume.components()
    }

    fn append(&self, index: VoxelIndex, row: &mut Row) {
        if let Some(values) = self.volume.voxel(index) {
            for value in values.iter() {
                row.push(value);
            }
        }
    }
}

/// Writes a primary volume, optionally masked and optionally joined with a
/// second volume, as a CSV feature table.
pub struct FeatureTableExporter<'a, T, M = T> {
    primary: &'a Volume<T>,
    mask: Option<&'a Volume<M>>,
    additional: Option<&'a Volume<T>>,
    header: Option<Vec<String>>,
}

impl<'a, T, M> FeatureTableExporter<'a, T, M>
where
    T: Display,
    M: Copy + Default + PartialEq,
{
    pub fn new(primary: &'a Volume<T>) -> Self {
        Self {
            primary,
            mask: None,
            additional: None,
            header: None,
        }
    }

    /// Only export voxels where `mask` is non-zero
    pub fn with_mask(mut self, mask: &'a Volume<M>) -> Result<Self, FeatureTableError> {
        self.primary
            .ensure_same_extent(mask)
            .map_err(|source| FeatureTableError::Shape {
                role: "Mask",
                source,
            })?;
        self.mask = Some(mask);
        Ok(self)
    }

    /// Append the channels of `additional` after the primary channels
    pub fn with_additional(
        mut self,
        additional: &'a Volume<T>,
    ) -> Result<Self, FeatureTableError> {
        self.primary
            .ensure_same_extent(additional)
            .map_err(|source| FeatureTableError::Shape {
                role: "Additional",
                source,
            })?;
        self.additional = Some(additional);
        Ok(self)
    }

    /// Emit `columns` as the first line
    pub fn with_header(mut self, columns: Vec<String>) -> Self {
        self.header = Some(columns);
        self
    }

    fn columns(&self) -> Vec<Box<dyn ColumnProvider + '_>> {
        let mut columns: Vec<Box<dyn ColumnProvider + '_>> = vec![
            Box::new(IndexColumns),
            Box::new(ChannelColumns::new(self.primary)),
        ];
        if let Some(additional) = self.additional {
            columns.push(Box::new(ChannelColumns::new(additional)));
        }
        columns
    }

    fn is_selected(&self, index: VoxelIndex) -> bool {
        self.mask
            .is_none_or(|mask| mask.value(index).is_some_and(|value| value != M::default()))
    }

    /// Data rows in traversal order, without the header
    pub fn rows(&self) -> impl Iterator<Item = String> + '_ {
        let columns = self.columns();
        (0..self.primary.len())
            .map(move |linear| self.primary.index_of(linear))
            .filter(move |&index| self.is_selected(index))
            .map(move |index| {
                let mut row = Row::default();
                for provider in &columns {
                    provider.append(index, &mut row);
                }
                row.into_line()
            })
    }

    /// Write the header (if any) and all rows, one per line.
    ///
    /// Returns the number of data rows written.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<usize, FeatureTableError> {
        if let Some(header) = &self.header {
            let mut row = Row::default();
            for column in header {
                row.push(column);
            }
            writeln!(writer, "{}", row.into_line())?;
        }

        let mut written = 0;
        for line in self.rows() {
            writeln!(writer, "{line}")?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }

    /// Create or truncate `path` and write the table into it
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<usize, FeatureTableError> {
        let path = path.as_ref();
        let create = |source| FeatureTableError::Create {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(create)?;
        }
        let file = File::create(path).map_err(create)?;

        let width: usize = self.columns().iter().map(|provider| provider.width()).sum();
        debug!(
            "Exporting {} column(s), mask: {}, additional volume: {}",
            width,
            self.mask.is_some(),
            self.additional.is_some()
        );

        let written = self.write(BufWriter::new(file))?;
        info!("Wrote {written} row(s) to {}", path.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_names::FeatureNameTable;
    use crate::volume::Geometry;
    use ndarray::Array4;

    fn volume(nx: usize, ny: usize, nz: usize, channels: usize, values: Vec<f32>) -> Volume<f32> {
        let data = Array4::from_shape_vec((nz, ny, nx, channels), values).unwrap();
        Volume::new(data, Geometry::default())
    }

    fn lines<M: Copy + Default + PartialEq>(exporter: &FeatureTableExporter<'_, f32, M>) -> Vec<String> {
        let mut out = Vec::new();
        exporter.write(&mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn plain_export_lists_every_voxel() {
        let primary = volume(2, 1, 1, 2, vec![1.0, 2.0, 3.0, 4.0]);
        let exporter = FeatureTableExporter::<f32>::new(&primary);
        assert_eq!(lines(&exporter), ["0,0,0,1,2", "1,0,0,3,4"]);
    }

    #[test]
    fn masked_export_keeps_nonzero_voxels_in_order() {
        let primary = volume(2, 2, 1, 1, vec![10.0, 11.0, 12.0, 13.0]);
        let mask = volume(2, 2, 1, 1, vec![0.0, 2.0, 0.0, 1.0]);
        let exporter = FeatureTableExporter::new(&primary).with_mask(&mask).unwrap();
        let rows = lines(&exporter);
        assert_eq!(rows, ["1,0,0,11", "1,1,0,13"]);

        let selected = mask.voxels().filter(|(_, m)| m[0] != 0.0).count();
        assert_eq!(rows.len(), selected);
    }

    #[test]
    fn additional_channels_follow_primary_by_position() {
        let primary = volume(3, 1, 1, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let additional = volume(3, 1, 1, 1, vec![0.5, 1.5, 2.5]);
        let exporter = FeatureTableExporter::<f32>::new(&primary)
            .with_additional(&additional)
            .unwrap();
        assert_eq!(lines(&exporter), ["0,0,0,1,2,0.5", "1,0,0,3,4,1.5", "2,0,0,5,6,2.5"]);
    }

    #[test]
    fn mask_and_additional_combine() {
        let primary = volume(2, 1, 2, 1, vec![1.0, 2.0, 3.0, 4.0]);
        let additional = volume(2, 1, 2, 2, vec![9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0]);
        let mask = Volume::from_scalar(
            ndarray::Array3::from_shape_vec((2, 1, 2), vec![0u8, 0, 1, 0]).unwrap(),
            Geometry::default(),
        );
        let exporter = FeatureTableExporter::new(&primary)
            .with_mask(&mask)
            .unwrap()
            .with_additional(&additional)
            .unwrap();
        assert_eq!(lines(&exporter), ["0,0,1,3,5,4"]);
    }

    #[test]
    fn header_comes_first_without_trailing_comma() {
        let primary = volume(1, 1, 1, 1, vec![0.25]);
        let header = FeatureNameTable::default().table_header();
        let exporter = FeatureTableExporter::<f32>::new(&primary).with_header(header);
        let rows = lines(&exporter);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("X,Y,Z,Energy,Entropy,"));
        assert!(rows[0].ends_with(",LongRunHighGreyLevelEmphasis"));
        assert_eq!(rows[1], "0,0,0,0.25");
    }

    #[test]
    fn mismatched_extents_are_rejected() {
        let primary = volume(2, 1, 1, 1, vec![1.0, 2.0]);
        let mask = volume(1, 2, 1, 1, vec![1.0, 1.0]);
        let result = FeatureTableExporter::new(&primary).with_mask(&mask);
        assert!(matches!(
            result,
            Err(FeatureTableError::Shape { role: "Mask", .. })
        ));

        let additional = volume(2, 1, 2, 1, vec![1.0; 4]);
        let result = FeatureTableExporter::<f32>::new(&primary).with_additional(&additional);
        assert!(matches!(
            result,
            Err(FeatureTableError::Shape { role: "Additional", .. })
        ));
    }

    #[test]
    fn write_to_path_truncates_and_counts_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("features.csv");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stale content that is longer than the table\n").unwrap();

        let primary = volume(2, 1, 1, 1, vec![1.0, 2.0]);
        let written = FeatureTableExporter::<f32>::new(&primary)
            .write_to_path(&path)
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0,0,0,1\n1,0,0,2\n");
    }
}
