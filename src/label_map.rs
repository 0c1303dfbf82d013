//! Label volumes built from CSV rows of `x,y,z,label`.

use crate::volume::{Volume, VoxelIndex};

use log::{info, warn};
use std::{
    borrow::Cow,
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Number of label names that can be bound to a code
pub const MAX_LABELS: usize = 5;

/// Code of voxels that no record, or no matching record, addresses
pub const BACKGROUND: u32 = 0;

#[derive(Debug, Error)]
pub enum LabelMapError {
    #[error("At most 5 labels can be configured, got {0}")]
    TooManyLabels(usize),

    #[error("Failed to open label CSV '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read label CSV at line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },

    #[error("Line {line}: voxel ({x}, {y}, {z}) lies outside extent {extent:?}")]
    OutOfBounds {
        line: usize,
        x: i64,
        y: i64,
        z: i64,
        extent: (usize, usize, usize),
    },
}

/// Label names bound to codes `1..=5` by position.
///
/// Unset slots never match; text matching no slot maps to [`BACKGROUND`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelTable {
    slots: [Option<String>; MAX_LABELS],
}

impl LabelTable {
    /// Bind each given name to its 1-based position
    pub fn new<I, S>(names: I) -> Result<Self, LabelMapError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_slots(names.into_iter().map(|name| Some(name.into())))
    }

    /// Like [`LabelTable::new`] but with gaps, e.g. only `Label1` and `Label3` set
    pub fn from_slots<I>(slots: I) -> Result<Self, LabelMapError>
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let given: Vec<_> = slots.into_iter().collect();
        if given.len() > MAX_LABELS {
            return Err(LabelMapError::TooManyLabels(given.len()));
        }

        let mut table = Self::default();
        for (slot, name) in table.slots.iter_mut().zip(given) {
            *slot = name;
        }
        Ok(table)
    }

    /// Code of the first slot equal to `text` (case-sensitive)
    pub fn code_of(&self, text: &str) -> u32 {
        self.slots
            .iter()
            .position(|slot| slot.as_deref() == Some(text))
            .map_or(BACKGROUND, |position| position as u32 + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

/// One parsed CSV row
#[derive(Clone, Debug, PartialEq)]
pub struct CoordinateLabel {
    pub x: i64,
    pub y: i64,
    pub z: i64,
    pub label: String,
}

impl CoordinateLabel {
    /// Parse `x,y,z,label`.
    ///
    /// Returns `None` for rows with fewer than four fields. Coordinates that
    /// are not numbers read as 0; fields past the fourth are ignored.
    /// Trailing whitespace, including `\r`, is trimmed off the label.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split(',');
        let x = parse_leading_int(fields.next()?);
        let y = parse_leading_int(fields.next()?);
        let z = parse_leading_int(fields.next()?);
        let label = fields.next()?.trim_end().to_string();
        Some(Self { x, y, z, label })
    }

    fn voxel_index(&self, extent: (usize, usize, usize)) -> Option<VoxelIndex> {
        let axis = |value: i64, size: usize| {
            usize::try_from(value).ok().filter(|&value| value < size)
        };
        Some((
            axis(self.x, extent.0)?,
            axis(self.y, extent.1)?,
            axis(self.z, extent.2)?,
        ))
    }
}

/// Leading optional sign and digits of `field`, 0 when there are none.
///
/// Values past the `i64` range saturate, so they still fail the bounds check.
fn parse_leading_int(field: &str) -> i64 {
    let field = field.trim_start();
    let (sign, digits) = match field.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, field.strip_prefix('+').unwrap_or(field)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return 0;
    }
    let saturated = if sign < 0 { i64::MIN } else { i64::MAX };
    digits[..end]
        .parse::<i64>()
        .map_or(saturated, |value| sign * value)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LabelMapStats {
    /// Rows written into the volume, matched or not
    pub records: usize,
    /// Rows whose label text matched no configured name
    pub unmatched: usize,
    /// Non-empty rows dropped for having fewer than four fields
    pub skipped: usize,
}

pub struct LabelMapBuilder<'a> {
    table: &'a LabelTable,
}

impl<'a> LabelMapBuilder<'a> {
    pub fn new(table: &'a LabelTable) -> Self {
        Self { table }
    }

    /// Build a label volume shaped and placed like `reference` from a CSV file
    pub fn build_from_path<U>(
        &self,
        reference: &Volume<U>,
        path: impl AsRef<Path>,
    ) -> Result<Volume<u32>, LabelMapError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LabelMapError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let (volume, stats) = self.build(reference, BufReader::new(file))?;
        info!(
            "Built label map from {}: {} record(s), {} unmatched, {} skipped",
            path.display(),
            stats.records,
            stats.unmatched,
            stats.skipped
        );
        Ok(volume)
    }

    /// Build a label volume from CSV rows read in order.
    ///
    /// Every voxel starts at [`BACKGROUND`]. Each row overwrites its voxel,
    /// so the last row addressing a voxel wins. A coordinate outside the
    /// grid aborts the build. Bytes that are not valid UTF-8 are replaced
    /// with U+FFFD, so such labels match no configured name.
    pub fn build<U, R: BufRead>(
        &self,
        reference: &Volume<U>,
        mut reader: R,
    ) -> Result<(Volume<u32>, LabelMapStats), LabelMapError> {
        let mut volume = Volume::filled_like(reference, BACKGROUND);
        let extent = volume.extent();
        let mut stats = LabelMapStats::default();
        let mut buffer = Vec::new();
        let mut number = 0;

        loop {
            buffer.clear();
            let read = reader
                .read_until(b'\n', &mut buffer)
                .map_err(|source| LabelMapError::Read {
                    line: number + 1,
                    source,
                })?;
            if read == 0 {
                break;
            }
            number += 1;

            let line = String::from_utf8_lossy(&buffer);
            if let Cow::Owned(_) = line {
                warn!("Line {number} is not valid UTF-8, invalid bytes were replaced");
            }
            if line.trim().is_empty() {
                continue;
            }

            let Some(record) = CoordinateLabel::parse(&line) else {
                warn!("Skipping line {number}: expected 4 comma-separated fields");
                stats.skipped += 1;
                continue;
            };

            let index = record
                .voxel_index(extent)
                .ok_or(LabelMapError::OutOfBounds {
                    line: number,
                    x: record.x,
                    y: record.y,
                    z: record.z,
                    extent,
                })?;

            let code = self.table.code_of(&record.label);
            if code == BACKGROUND {
                stats.unmatched += 1;
            }
            // Index was checked against the extent above
            volume.data[[index.2, index.1, index.0, 0]] = code;
            stats.records += 1;
        }

        if stats.unmatched > 0 {
            warn!(
                "{} record(s) matched no configured label and were left as background",
                stats.unmatched
            );
        }
        Ok((volume, stats))
    }
}
