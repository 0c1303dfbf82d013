use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The filter family a multi-channel volume was produced by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureSet {
    /// Bone morphometry indices (5 channels)
    BoneMorphometry,
    /// Grey-level co-occurrence matrix features (8 channels)
    CoOccurrence,
    /// Grey-level run-length matrix features (10 channels)
    RunLength,
}

#[derive(Debug, Error)]
#[error("unknown feature set '{0}' (expected one of: bm, glcm, glrlm)")]
pub struct UnknownFeatureSet(pub String);

impl FeatureSet {
    pub const ALL: [FeatureSet; 3] = [
        FeatureSet::BoneMorphometry,
        FeatureSet::CoOccurrence,
        FeatureSet::RunLength,
    ];

    /// Short tag stored in a volume header's intent name
    pub fn tag(self) -> &'static str {
        match self {
            FeatureSet::BoneMorphometry => "BM",
            FeatureSet::CoOccurrence => "GLCM",
            FeatureSet::RunLength => "GLRLM",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|set| set.tag().eq_ignore_ascii_case(tag.trim()))
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for FeatureSet {
    type Err = UnknownFeatureSet;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| UnknownFeatureSet(s.to_string()))
    }
}
