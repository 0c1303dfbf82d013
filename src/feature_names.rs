use crate::enums::FeatureSet;

const BONE_MORPHOMETRY: [&str; 5] = [
    "BoneVolumeDensity",
    "TrabecularThickness",
    "TrabecularSeparation",
    "TrabecularNumber",
    "BoneSurfaceDensity",
];

const CO_OCCURRENCE: [&str; 8] = [
    "Energy",
    "Entropy",
    "Correlation",
    "InverseDifferenceMoment",
    "Inertia",
    "ClusterShade",
    "ClusterProminence",
    "HaralickCorrelation",
];

const RUN_LENGTH: [&str; 10] = [
    "ShortRunEmphasis",
    "LongRunEmphasis",
    "GreyLevelNonuniformity",
    "RunLengthNonuniformity",
    "LowGreyLevelRunEmphasis",
    "HighGreyLevelRunEmphasis",
    "ShortRunLowGreyLevelEmphasis",
    "ShortRunHighGreyLevelEmphasis",
    "LongRunLowGreyLevelEmphasis",
    "LongRunHighGreyLevelEmphasis",
];

/// Leading columns of every feature table row
pub const INDEX_COLUMNS: [&str; 3] = ["X", "Y", "Z"];

/// Human-readable channel names per feature set.
///
/// Built once at start-up and handed to the components that name channels
/// or columns. Lookups never mix sets: a volume is named entirely from one
/// entry or entirely with the numeric fallback.
#[derive(Clone, Debug)]
pub struct FeatureNameTable {
    entries: Vec<(FeatureSet, Vec<String>)>,
}

impl Default for FeatureNameTable {
    fn default() -> Self {
        fn owned(names: &[&str]) -> Vec<String> {
            names.iter().map(|name| name.to_string()).collect()
        }

        Self {
            entries: vec![
                (FeatureSet::BoneMorphometry, owned(&BONE_MORPHOMETRY)),
                (FeatureSet::CoOccurrence, owned(&CO_OCCURRENCE)),
                (FeatureSet::RunLength, owned(&RUN_LENGTH)),
            ],
        }
    }
}

impl FeatureNameTable {
    pub fn names(&self, set: FeatureSet) -> &[String] {
        self.entries
            .iter()
            .find(|(entry_set, _)| *entry_set == set)
            .map(|(_, names)| names.as_slice())
            .unwrap_or(&[])
    }

    /// Find the feature set whose name list has exactly `channels` entries
    pub fn set_for_channel_count(&self, channels: usize) -> Option<FeatureSet> {
        self.entries
            .iter()
            .find(|(_, names)| names.len() == channels)
            .map(|(set, _)| *set)
    }

    /// Names for each of `channels` channels, index-aligned.
    ///
    /// An explicit provenance tag wins when its list length matches; the
    /// channel count is used otherwise, and `"1".."C"` when nothing matches.
    pub fn channel_names(&self, provenance: Option<FeatureSet>, channels: usize) -> Vec<String> {
        let set = provenance
            .filter(|set| self.names(*set).len() == channels)
            .or_else(|| self.set_for_channel_count(channels));

        match set {
            Some(set) => self.names(set).to_vec(),
            None => (1..=channels).map(|i| i.to_string()).collect(),
        }
    }

    /// Fixed header of the CSV feature table: index columns, then the
    /// co-occurrence and run-length names.
    pub fn table_header(&self) -> Vec<String> {
        INDEX_COLUMNS
            .iter()
            .map(|column| column.to_string())
            .chain(self.names(FeatureSet::CoOccurrence).iter().cloned())
            .chain(self.names(FeatureSet::RunLength).iter().cloned())
            .collect()
    }
}
