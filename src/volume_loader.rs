use crate::{
    enums::FeatureSet,
    volume::{Geometry, Volume},
};

use log::{debug, info};
use ndarray::{Array4, ArrayD, Axis, Ix4};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, NiftiType, ReaderOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("Volume file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported dimensionality {0:?}, expected 3 to 5 axes with a single time point")]
    UnsupportedDimensionality(Vec<usize>),

    #[error("Unsupported pixel encoding {0:?}")]
    UnsupportedPixelType(NiftiType),

    #[error("Expected a scalar volume, found {0} channels")]
    NotScalar(usize),

    #[error("Invalid array shape: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::error::NiftiError),
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a scalar or multi-channel volume from a NIfTI file.
    ///
    /// Values are widened to `f64`, which holds every integer pixel type up
    /// to 32 bits exactly.
    ///
    /// # Arguments
    ///
    /// * `path` - `.nii` or `.nii.gz` file
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing, cannot be decoded, has a
    /// non-numeric pixel type, or is not a 3D grid of scalars or vectors
    pub fn load(path: impl AsRef<Path>) -> Result<Volume<f64>, VolumeLoaderError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(VolumeLoaderError::NotFound(path.to_path_buf()));
        }

        let object = ReaderOptions::new().read_file(path)?;
        let header = object.header().clone();
        Self::check_pixel_type(&header)?;

        let array: ArrayD<f64> = object.into_volume().into_ndarray::<f64>()?;
        let data = Self::to_channels_last(array)?;
        let volume = Volume::new(data, Self::get_geometry(&header))
            .with_provenance(Self::get_provenance(&header));

        info!(
            "Loaded {}: extent {:?}, {} channel(s)",
            path.display(),
            volume.extent(),
            volume.components()
        );
        if let Some(set) = volume.provenance {
            debug!("{} is tagged as {} features", path.display(), set);
        }
        Ok(volume)
    }

    /// Load a volume that must hold one value per voxel, such as a mask
    pub fn load_scalar(path: impl AsRef<Path>) -> Result<Volume<f64>, VolumeLoaderError> {
        let volume = Self::load(path)?;
        match volume.components() {
            1 => Ok(volume),
            channels => Err(VolumeLoaderError::NotScalar(channels)),
        }
    }

    fn check_pixel_type(header: &NiftiHeader) -> Result<(), VolumeLoaderError> {
        let data_type = header.data_type()?;
        match data_type {
            NiftiType::Uint8
            | NiftiType::Int8
            | NiftiType::Uint16
            | NiftiType::Int16
            | NiftiType::Uint32
            | NiftiType::Int32
            | NiftiType::Uint64
            | NiftiType::Int64
            | NiftiType::Float32
            | NiftiType::Float64 => Ok(()),
            other => Err(VolumeLoaderError::UnsupportedPixelType(other)),
        }
    }

    /// Reorder an `[x, y, z, (t,) (c)]` array into `[z, y, x, c]`
    fn to_channels_last(array: ArrayD<f64>) -> Result<Array4<f64>, VolumeLoaderError> {
        let shape = array.shape().to_vec();
        let array = match shape.len() {
            3 => array.insert_axis(Axis(3)),
            4 => array,
            5 if shape[3] == 1 => array.index_axis_move(Axis(3), 0),
            _ => return Err(VolumeLoaderError::UnsupportedDimensionality(shape)),
        };
        let array = array.into_dimensionality::<Ix4>()?;
        Ok(array
            .permuted_axes([2, 1, 0, 3])
            .as_standard_layout()
            .into_owned())
    }

    fn get_geometry(header: &NiftiHeader) -> Geometry {
        let spacing = [1, 2, 3].map(|axis| match header.pixdim[axis].abs() {
            s if s > 0.0 => s,
            _ => 1.0,
        });

        if header.sform_code > 0 {
            let rows = [header.srow_x, header.srow_y, header.srow_z];
            let mut direction = [[0.0; 3]; 3];
            for (row, srow) in rows.iter().enumerate() {
                for col in 0..3 {
                    direction[row][col] = srow[col] / spacing[col];
                }
            }
            return Geometry {
                spacing,
                origin: [rows[0][3], rows[1][3], rows[2][3]],
                direction,
            };
        }

        if header.qform_code > 0 {
            return Geometry {
                spacing,
                origin: [header.quatern_x, header.quatern_y, header.quatern_z],
                direction: Self::quaternion_to_direction(header),
            };
        }

        Geometry {
            spacing,
            ..Geometry::default()
        }
    }

    fn quaternion_to_direction(header: &NiftiHeader) -> [[f32; 3]; 3] {
        let (b, c, d) = (header.quatern_b, header.quatern_c, header.quatern_d);
        let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
        let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };

        [
            [
                a * a + b * b - c * c - d * d,
                2.0 * (b * c - a * d),
                2.0 * (b * d + a * c) * qfac,
            ],
            [
                2.0 * (b * c + a * d),
                a * a + c * c - b * b - d * d,
                2.0 * (c * d - a * b) * qfac,
            ],
            [
                2.0 * (b * d - a * c),
                2.0 * (c * d + a * b),
                (a * a + d * d - c * c - b * b) * qfac,
            ],
        ]
    }

    fn get_provenance(header: &NiftiHeader) -> Option<FeatureSet> {
        let end = header
            .intent_name
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(header.intent_name.len());
        std::str::from_utf8(&header.intent_name[..end])
            .ok()
            .and_then(FeatureSet::from_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    #[test]
    fn missing_file_is_reported_before_decoding() {
        let result = VolumeLoader::load("does/not/exist.nii.gz");
        assert!(matches!(result, Err(VolumeLoaderError::NotFound(_))));
    }

    #[test]
    fn vector_images_move_channels_last() {
        // [x, y, z, t, c] with a single time point
        let array = Array::from_shape_fn(IxDyn(&[2, 3, 1, 1, 4]), |index| {
            (index[0] * 100 + index[1] * 10 + index[4]) as f64
        });
        let data = VolumeLoader::to_channels_last(array).unwrap();
        assert_eq!(data.dim(), (1, 3, 2, 4));
        assert_eq!(data[[0, 2, 1, 3]], 123.0);
        assert!(data.is_standard_layout());
    }

    #[test]
    fn scalar_images_gain_a_channel_axis() {
        let array = Array::from_shape_fn(IxDyn(&[2, 2, 2]), |index| {
            (index[0] + index[1] * 2 + index[2] * 4) as f64
        });
        let data = VolumeLoader::to_channels_last(array).unwrap();
        assert_eq!(data.dim(), (2, 2, 2, 1));
        let traversal: Vec<f64> = data.iter().copied().collect();
        assert_eq!(traversal, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn time_series_are_rejected() {
        let array = Array::zeros(IxDyn(&[2, 2, 2, 3, 4]));
        assert!(matches!(
            VolumeLoader::to_channels_last(array),
            Err(VolumeLoaderError::UnsupportedDimensionality(_))
        ));
        let array = Array::zeros(IxDyn(&[2, 2]));
        assert!(matches!(
            VolumeLoader::to_channels_last(array),
            Err(VolumeLoaderError::UnsupportedDimensionality(_))
        ));
    }

    #[test]
    fn sform_geometry_is_split_into_spacing_and_direction() {
        let mut header = NiftiHeader::default();
        header.pixdim = [1.0, 0.5, 0.5, 2.0, 1.0, 1.0, 1.0, 1.0];
        header.sform_code = 1;
        header.srow_x = [-0.5, 0.0, 0.0, 10.0];
        header.srow_y = [0.0, 0.5, 0.0, -4.0];
        header.srow_z = [0.0, 0.0, 2.0, 3.0];

        let geometry = VolumeLoader::get_geometry(&header);
        assert_eq!(geometry.spacing, [0.5, 0.5, 2.0]);
        assert_eq!(geometry.origin, [10.0, -4.0, 3.0]);
        assert_eq!(geometry.direction[0], [-1.0, 0.0, 0.0]);
        assert_eq!(geometry.direction[2], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn identity_quaternion_gives_identity_direction() {
        let mut header = NiftiHeader::default();
        header.pixdim = [1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        header.sform_code = 0;
        header.qform_code = 1;
        header.quatern_b = 0.0;
        header.quatern_c = 0.0;
        header.quatern_d = 0.0;
        header.quatern_x = 1.0;

        let geometry = VolumeLoader::get_geometry(&header);
        assert_eq!(geometry.direction, Geometry::default().direction);
        assert_eq!(geometry.origin, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn intent_name_carries_provenance() {
        let mut header = NiftiHeader::default();
        header.intent_name = [0; 16];
        header.intent_name[..4].copy_from_slice(b"GLCM");
        assert_eq!(
            VolumeLoader::get_provenance(&header),
            Some(FeatureSet::CoOccurrence)
        );

        header.intent_name = [0; 16];
        assert_eq!(VolumeLoader::get_provenance(&header), None);
    }
}
