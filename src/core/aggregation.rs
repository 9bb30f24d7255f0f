/*!
 * Pixel aggregation into daily and annual summaries
 *
 * Observations that pass the quality mask and the NDSI/albedo validity checks
 * are classified by glacier fraction and reduced per (time bucket, class).
 * Groups below the minimum pixel count keep their count but report no
 * statistics.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::fraction_classifier::{FractionClass, FractionClassifier};
use crate::core::quality_mask::{QaConfig, QualityMaskEvaluator};
use crate::core::stats;
use crate::types::{AlbedoResult, BucketKind, Observation, TimeBucket, MAX_VALID_RAW};

/// Aggregation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationParams {
    pub qa_config: QaConfig,
    /// Minimum NDSI snow cover (0-100)
    pub ndsi_threshold: u8,
    /// Glacier fraction (percent) a pixel needs to count towards the total
    pub fraction_threshold_pct: u8,
    pub min_pixels: usize,
    pub classifier: FractionClassifier,
}

impl Default for AggregationParams {
    fn default() -> Self {
        Self {
            qa_config: QaConfig::standard(),
            ndsi_threshold: 0,
            fraction_threshold_pct: 75,
            min_pixels: 10,
            classifier: FractionClassifier::default(),
        }
    }
}

/// Summary statistics of one group of pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub count: usize,
    pub sufficient_pixels: bool,
    pub mean: Option<f64>,
    /// Daily summaries only
    pub median: Option<f64>,
    /// Annual summaries only
    pub std_dev: Option<f64>,
}

impl AggregateRecord {
    /// Reduce scaled albedo values; statistics are withheld below `min_pixels`
    pub fn from_values(values: &[f64], kind: BucketKind, min_pixels: usize) -> Self {
        let count = values.len();
        let sufficient_pixels = count > 0 && count >= min_pixels;
        if !sufficient_pixels {
            return Self::insufficient(count);
        }
        let (median, std_dev) = match kind {
            BucketKind::Daily => (stats::median(values), None),
            BucketKind::Annual => (None, stats::sample_std_dev(values)),
        };
        Self {
            count,
            sufficient_pixels,
            mean: stats::mean(values),
            median,
            std_dev,
        }
    }

    pub fn insufficient(count: usize) -> Self {
        Self {
            count,
            sufficient_pixels: false,
            mean: None,
            median: None,
            std_dev: None,
        }
    }

    /// `self.mean - other.mean`, unavailable if either side is
    pub fn mean_difference(&self, other: &AggregateRecord) -> Option<f64> {
        Some(self.mean? - other.mean?)
    }
}

/// All records for one time bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub bucket: TimeBucket,
    /// Pixels at or above the glacier fraction threshold
    pub total: AggregateRecord,
    pub classes: BTreeMap<FractionClass, AggregateRecord>,
}

impl BucketSummary {
    pub fn class(&self, class: FractionClass) -> Option<&AggregateRecord> {
        self.classes.get(&class)
    }

    pub fn total_filtered_pixels(&self) -> usize {
        self.total.count
    }
}

pub type AggregateMap = BTreeMap<TimeBucket, BucketSummary>;

#[derive(Default)]
struct BucketValues {
    total: Vec<f64>,
    classes: BTreeMap<FractionClass, Vec<f64>>,
}

/// Reduces filtered observations per time bucket and fraction class
pub struct AggregationReducer {
    params: AggregationParams,
}

impl AggregationReducer {
    pub fn new(params: AggregationParams) -> Self {
        Self { params }
    }

    pub fn standard() -> Self {
        Self::new(AggregationParams::default())
    }

    pub fn params(&self) -> &AggregationParams {
        &self.params
    }

    /// Quality, NDSI and albedo validity checks for one observation
    pub fn passes_filters(&self, obs: &Observation) -> bool {
        QualityMaskEvaluator::accept(obs, &self.params.qa_config)
            && obs.ndsi_snow_cover <= MAX_VALID_RAW
            && obs.ndsi_snow_cover >= self.params.ndsi_threshold
            && obs.snow_albedo_raw <= MAX_VALID_RAW
    }

    pub fn aggregate(&self, observations: &[Observation], kind: BucketKind) -> AlbedoResult<AggregateMap> {
        log::info!(
            "Aggregating {} observations ({:?}, NDSI >= {}, fraction >= {}%, min {} pixels)",
            observations.len(),
            kind,
            self.params.ndsi_threshold,
            self.params.fraction_threshold_pct,
            self.params.min_pixels
        );

        let fraction_threshold = self.params.fraction_threshold_pct as f64 / 100.0;
        let mut grouped: BTreeMap<TimeBucket, BucketValues> = BTreeMap::new();
        let mut accepted = 0usize;
        let mut unclassified = 0usize;

        for obs in observations {
            if !self.passes_filters(obs) {
                continue;
            }
            let Some(albedo) = obs.albedo() else {
                continue;
            };
            let class = match self.params.classifier.classify(obs.glacier_fraction) {
                Ok(class) => class,
                Err(e) => {
                    log::warn!("Skipping pixel at ({}, {}) on {}: {}", obs.longitude, obs.latitude, obs.date, e);
                    unclassified += 1;
                    continue;
                }
            };
            let values = grouped.entry(kind.bucket_for(obs.date)).or_default();
            values.classes.entry(class).or_default().push(albedo);
            if obs.glacier_fraction >= fraction_threshold {
                values.total.push(albedo);
            }
            accepted += 1;
        }

        log::info!(
            "{} of {} observations passed filtering into {} buckets",
            accepted,
            observations.len(),
            grouped.len()
        );
        if unclassified > 0 {
            log::warn!("{} observations had an unusable glacier fraction", unclassified);
        }

        let min_pixels = self.params.min_pixels;
        let summaries = grouped
            .into_iter()
            .map(|(bucket, values)| {
                let classes = FractionClass::ALL
                    .iter()
                    .map(|class| {
                        let class_values = values.classes.get(class).map(Vec::as_slice).unwrap_or(&[]);
                        (*class, AggregateRecord::from_values(class_values, kind, min_pixels))
                    })
                    .collect();
                let total = AggregateRecord::from_values(&values.total, kind, min_pixels);
                log::debug!("{}: {} pixels above fraction threshold", bucket, total.count);
                (bucket, BucketSummary { bucket, total, classes })
            })
            .collect();

        Ok(summaries)
    }
}

/// Ordered (year, mean albedo) pairs for one series, sufficient years only
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct YearSeries {
    pub points: Vec<(i32, f64)>,
}

impl YearSeries {
    pub fn new(mut points: Vec<(i32, f64)>) -> Self {
        points.sort_by_key(|(year, _)| *year);
        Self { points }
    }

    /// Series for one class from annual summaries
    pub fn from_annual(summaries: &AggregateMap, class: FractionClass) -> Self {
        Self::collect(summaries, |summary| summary.class(class))
    }

    /// Series of the above-threshold totals from annual summaries
    pub fn from_annual_totals(summaries: &AggregateMap) -> Self {
        Self::collect(summaries, |summary| Some(&summary.total))
    }

    fn collect<'a, F>(summaries: &'a AggregateMap, pick: F) -> Self
    where
        F: Fn(&'a BucketSummary) -> Option<&'a AggregateRecord>,
    {
        let points = summaries
            .values()
            .filter_map(|summary| {
                let TimeBucket::Year(year) = summary.bucket else {
                    return None;
                };
                let record = pick(summary)?;
                match (record.sufficient_pixels, record.mean) {
                    (true, Some(mean)) => Some((year, mean)),
                    _ => None,
                }
            })
            .collect();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn years(&self) -> Vec<i32> {
        self.points.iter().map(|(year, _)| *year).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, value)| *value).collect()
    }
}
