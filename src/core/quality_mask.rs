/*!
 * Snow product quality masking
 *
 * Decodes the basic QA category and the 8-bit algorithm flags of each
 * observation into an accept/reject decision. Flag handling is table driven:
 * adding or removing a flag only touches `QA_FLAG_TABLE`.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{BasicQa, Observation};

/// Named conditions packed into the algorithm flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QaFlag {
    InlandWater,
    VisibleScreenFail,
    NdsiScreenFail,
    TempHeightFail,
    SwirAnomaly,
    ProbablyCloudy,
    ProbablyClear,
    HighSolarZenith,
}

/// One row of the flag table
#[derive(Debug, Clone, Copy)]
pub struct QaFlagSpec {
    pub flag: QaFlag,
    pub bit: u8,
    pub column: &'static str,
    pub description: &'static str,
}

/// Bit layout of the algorithm flags byte, in bit order
pub static QA_FLAG_TABLE: [QaFlagSpec; 8] = [
    QaFlagSpec { flag: QaFlag::InlandWater, bit: 0, column: "flag_inland_water", description: "Inland water" },
    QaFlagSpec { flag: QaFlag::VisibleScreenFail, bit: 1, column: "flag_visible_fail", description: "Low visible reflectance screen failed" },
    QaFlagSpec { flag: QaFlag::NdsiScreenFail, bit: 2, column: "flag_ndsi_fail", description: "Low NDSI screen failed" },
    QaFlagSpec { flag: QaFlag::TempHeightFail, bit: 3, column: "flag_temp_height_fail", description: "Combined temperature/height screen failed" },
    QaFlagSpec { flag: QaFlag::SwirAnomaly, bit: 4, column: "flag_swir_anomaly", description: "Shortwave IR reflectance anomaly" },
    QaFlagSpec { flag: QaFlag::ProbablyCloudy, bit: 5, column: "flag_probably_cloudy", description: "Probably cloudy" },
    QaFlagSpec { flag: QaFlag::ProbablyClear, bit: 6, column: "flag_probably_clear", description: "Probably clear" },
    QaFlagSpec { flag: QaFlag::HighSolarZenith, bit: 7, column: "flag_high_solar_zenith", description: "Solar zenith above 70 degrees" },
];

impl QaFlag {
    pub fn spec(self) -> &'static QaFlagSpec {
        // The table covers every variant
        QA_FLAG_TABLE
            .iter()
            .find(|spec| spec.flag == self)
            .unwrap_or(&QA_FLAG_TABLE[0])
    }

    pub fn bit(self) -> u8 {
        self.spec().bit
    }

    pub fn is_set(self, flags: u8) -> bool {
        flags & (1 << self.bit()) != 0
    }
}

/// Highest basic QA category accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasicLevel {
    Best,
    Good,
    Ok,
    All,
}

impl BasicLevel {
    /// Largest basic QA code accepted at this level
    pub fn ceiling(self) -> u8 {
        match self {
            BasicLevel::Best => 0,
            BasicLevel::Good => 1,
            BasicLevel::Ok => 2,
            BasicLevel::All => 3,
        }
    }
}

/// Quality masking configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaConfig {
    pub basic_level: BasicLevel,
    /// Flags that reject a pixel when set
    pub excluded_flags: BTreeSet<QaFlag>,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl QaConfig {
    /// Configuration used for every export: good basic quality, every flag
    /// excluded except "probably clear"
    pub fn standard() -> Self {
        Self {
            basic_level: BasicLevel::Good,
            excluded_flags: QA_FLAG_TABLE
                .iter()
                .map(|spec| spec.flag)
                .filter(|flag| *flag != QaFlag::ProbablyClear)
                .collect(),
        }
    }

    /// Basic QA gate only
    pub fn permissive(basic_level: BasicLevel) -> Self {
        Self {
            basic_level,
            excluded_flags: BTreeSet::new(),
        }
    }

    pub fn with_excluded(mut self, flag: QaFlag, excluded: bool) -> Self {
        if excluded {
            self.excluded_flags.insert(flag);
        } else {
            self.excluded_flags.remove(&flag);
        }
        self
    }

    pub fn excludes(&self, flag: QaFlag) -> bool {
        self.excluded_flags.contains(&flag)
    }
}

/// Breakdown of one masking decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaDecision {
    pub basic_pass: bool,
    pub rejecting_flags: Vec<QaFlag>,
}

impl QaDecision {
    pub fn accepted(&self) -> bool {
        self.basic_pass && self.rejecting_flags.is_empty()
    }
}

/// Per-observation quality mask evaluation
pub struct QualityMaskEvaluator;

impl QualityMaskEvaluator {
    /// Accept or reject one observation
    pub fn accept(obs: &Observation, config: &QaConfig) -> bool {
        Self::basic_gate(obs.basic_qa, config.basic_level)
            && Self::flag_gate(obs.algorithm_flags, config)
    }

    /// Full decision, including which excluded flags fired
    pub fn evaluate(obs: &Observation, config: &QaConfig) -> QaDecision {
        let rejecting_flags = match obs.algorithm_flags {
            Some(flags) => Self::triggered_flags(flags)
                .into_iter()
                .filter(|flag| config.excludes(*flag))
                .collect(),
            None => Vec::new(),
        };
        QaDecision {
            basic_pass: Self::basic_gate(obs.basic_qa, config.basic_level),
            rejecting_flags,
        }
    }

    fn basic_gate(basic_qa: u8, level: BasicLevel) -> bool {
        if BasicQa::from_code(basic_qa).map_or(false, BasicQa::is_unusable) {
            return false;
        }
        basic_qa <= level.ceiling()
    }

    /// Absent flags never reject
    fn flag_gate(flags: Option<u8>, config: &QaConfig) -> bool {
        let Some(flags) = flags else {
            return true;
        };
        !QA_FLAG_TABLE
            .iter()
            .any(|spec| config.excludes(spec.flag) && spec.flag.is_set(flags))
    }

    /// All flags set in a flags byte, in bit order
    pub fn triggered_flags(flags: u8) -> Vec<QaFlag> {
        QA_FLAG_TABLE
            .iter()
            .filter(|spec| spec.flag.is_set(flags))
            .map(|spec| spec.flag)
            .collect()
    }
}
