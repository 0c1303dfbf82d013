use crate::enums::FeatureSet;

use ndarray::{Array3, Array4, ArrayView1, ArrayView3, Axis};
use thiserror::Error;

/// Voxel position `(x, y, z)`
pub type VoxelIndex = (usize, usize, usize);

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("Extent mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    },

    #[error("Voxel {index:?} lies outside extent {extent:?}")]
    OutOfBounds {
        index: VoxelIndex,
        extent: (usize, usize, usize),
    },

    #[error("Channel {channel} requested from a {channels}-channel volume")]
    ChannelOutOfRange { channel: usize, channels: usize },
}

/// Spatial placement of the grid, carried from input to output untouched
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    pub spacing: [f32; 3],
    pub origin: [f32; 3],
    /// Row-major direction cosines, one column per grid axis
    pub direction: [[f32; 3]; 3],
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            spacing: [1.0; 3],
            origin: [0.0; 3],
            direction: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }
}

/// A 3D grid holding `C` values per voxel.
///
/// Data is stored as `(depth, height, width, channels)`, i.e. indexed
/// `[z, y, x, c]`, so that the logical iteration order of the array is the
/// natural traversal order of the grid: x fastest, then y, then z.
#[derive(Clone, Debug)]
pub struct Volume<T> {
    pub data: Array4<T>,
    pub geometry: Geometry,
    pub provenance: Option<FeatureSet>,
}

impl<T> Volume<T> {
    pub fn new(data: Array4<T>, geometry: Geometry) -> Self {
        Self {
            data,
            geometry,
            provenance: None,
        }
    }

    /// Wrap a `(depth, height, width)` array as a single-channel volume
    pub fn from_scalar(data: Array3<T>, geometry: Geometry) -> Self {
        Self::new(data.insert_axis(Axis(3)), geometry)
    }

    pub fn with_provenance(mut self, provenance: Option<FeatureSet>) -> Self {
        self.provenance = provenance;
        self
    }

    /// Get the extent of the grid as `(nx, ny, nz)`
    pub fn extent(&self) -> (usize, usize, usize) {
        let (depth, height, width, _) = self.data.dim();
        (width, height, depth)
    }

    /// Number of channels per voxel
    pub fn components(&self) -> usize {
        self.data.dim().3
    }

    /// Number of voxels in the grid
    pub fn len(&self) -> usize {
        let (nx, ny, nz) = self.extent();
        nx * ny * nz
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array4<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array4<T> {
        &mut self.data
    }

    pub fn contains(&self, index: VoxelIndex) -> bool {
        let (nx, ny, nz) = self.extent();
        index.0 < nx && index.1 < ny && index.2 < nz
    }

    /// Position of the `linear`-th voxel in traversal order
    #[inline]
    pub fn index_of(&self, linear: usize) -> VoxelIndex {
        let (nx, ny, _) = self.extent();
        (linear % nx, (linear / nx) % ny, linear / (nx * ny))
    }

    /// All channel values of one voxel
    pub fn voxel(&self, index: VoxelIndex) -> Option<ArrayView1<'_, T>> {
        if !self.contains(index) {
            return None;
        }
        let (x, y, z) = index;
        Some(self.data.slice(ndarray::s![z, y, x, ..]))
    }

    /// Every voxel with its position, in traversal order
    pub fn voxels(&self) -> impl Iterator<Item = (VoxelIndex, ArrayView1<'_, T>)> + '_ {
        self.data
            .lanes(Axis(3))
            .into_iter()
            .enumerate()
            .map(move |(linear, values)| (self.index_of(linear), values))
    }

    /// View one channel as a `(depth, height, width)` array
    pub fn channel_view(&self, channel: usize) -> Result<ArrayView3<'_, T>, VolumeError> {
        let channels = self.components();
        if channel >= channels {
            return Err(VolumeError::ChannelOutOfRange { channel, channels });
        }
        Ok(self.data.index_axis(Axis(3), channel))
    }

    /// Fail unless `other` covers exactly the same grid
    pub fn ensure_same_extent<U>(&self, other: &Volume<U>) -> Result<(), VolumeError> {
        if self.extent() != other.extent() {
            return Err(VolumeError::ShapeMismatch {
                expected: self.extent(),
                found: other.extent(),
            });
        }
        Ok(())
    }
}

impl<T: Clone> Volume<T> {
    /// A single-channel volume shaped and placed like `reference`, every voxel set to `fill`
    pub fn filled_like<U>(reference: &Volume<U>, fill: T) -> Self {
        let (nx, ny, nz) = reference.extent();
        Self::new(
            Array4::from_elem((nz, ny, nx, 1), fill),
            reference.geometry.clone(),
        )
    }

    /// Copy one channel out into a new single-channel volume with the same geometry
    pub fn select_channel(&self, channel: usize) -> Result<Volume<T>, VolumeError> {
        let view = self.channel_view(channel)?;
        Ok(Volume::from_scalar(view.to_owned(), self.geometry.clone()))
    }
}

impl<T: Copy> Volume<T> {
    /// First channel value of one voxel
    pub fn value(&self, index: VoxelIndex) -> Option<T> {
        let (x, y, z) = index;
        self.data.get([z, y, x, 0]).copied()
    }

    pub fn set_value(&mut self, index: VoxelIndex, value: T) -> Result<(), VolumeError> {
        let extent = self.extent();
        let (x, y, z) = index;
        let slot = self
            .data
            .get_mut([z, y, x, 0])
            .ok_or(VolumeError::OutOfBounds { index, extent })?;
        *slot = value;
        Ok(())
    }
}
