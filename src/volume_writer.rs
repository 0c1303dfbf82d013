use crate::volume::{Geometry, Volume, VolumeError};

use log::debug;
use ndarray::ArrayView3;
use nifti::{NiftiHeader, writer::WriterOptions};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeWriterError {
    #[error("Failed to create directory '{}': {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Only single-channel volumes can be written, found {0} channels")]
    NotScalar(usize),

    #[error("Failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: nifti::error::NiftiError,
    },

    #[error(transparent)]
    Volume(#[from] VolumeError),
}

/// Voxel types the writer can persist
pub trait NiftiScalar: Copy {
    /// Write an `[x, y, z]` array using `header` for everything but the shape and datatype
    fn write_nifti(
        data: &ArrayView3<'_, Self>,
        header: &NiftiHeader,
        path: &Path,
    ) -> nifti::error::Result<()>;
}

macro_rules! impl_nifti_scalar {
    ($($t:ty),*) => {
        $(
            impl NiftiScalar for $t {
                fn write_nifti(
                    data: &ArrayView3<'_, Self>,
                    header: &NiftiHeader,
                    path: &Path,
                ) -> nifti::error::Result<()> {
                    WriterOptions::new(path)
                        .reference_header(header)
                        .write_nifti(data)
                }
            }
        )*
    };
}

impl_nifti_scalar!(f32, f64, u32);

pub struct VolumeWriter;

impl VolumeWriter {
    /// Persist a single-channel volume as NIfTI.
    ///
    /// A `.gz` suffix selects gzip compression. Missing parent directories
    /// are created.
    pub fn write<T: NiftiScalar>(
        volume: &Volume<T>,
        path: impl AsRef<Path>,
    ) -> Result<(), VolumeWriterError> {
        let path = path.as_ref();
        if volume.components() != 1 {
            return Err(VolumeWriterError::NotScalar(volume.components()));
        }
        Self::ensure_parent_dirs(path)?;

        // [z, y, x] -> [x, y, z]
        let data = volume.channel_view(0)?.permuted_axes([2, 1, 0]);
        let header = Self::header_for(&volume.geometry);
        T::write_nifti(&data, &header, path).map_err(|source| VolumeWriterError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Wrote {} ({:?})", path.display(), volume.extent());
        Ok(())
    }

    /// Header carrying `geometry` as an sform
    pub fn header_for(geometry: &Geometry) -> NiftiHeader {
        let Geometry {
            spacing,
            origin,
            direction,
        } = geometry;
        let row = |r: usize| {
            [
                direction[r][0] * spacing[0],
                direction[r][1] * spacing[1],
                direction[r][2] * spacing[2],
                origin[r],
            ]
        };

        NiftiHeader {
            pixdim: [1.0, spacing[0], spacing[1], spacing[2], 1.0, 1.0, 1.0, 1.0],
            sform_code: 1,
            qform_code: 0,
            srow_x: row(0),
            srow_y: row(1),
            srow_z: row(2),
            ..NiftiHeader::default()
        }
    }

    fn ensure_parent_dirs(path: &Path) -> Result<(), VolumeWriterError> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                fs::create_dir_all(parent).map_err(|source| VolumeWriterError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                })
            }
            _ => Ok(()),
        }
    }
}
