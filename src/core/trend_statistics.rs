/*!
 * Descriptive trend statistics over annual albedo series
 *
 * - Sen's slope (median of pairwise slopes)
 * - Sliding-window mean difference change-point scan
 * - Global and rolling coefficient of variation
 * - Z-score anomaly flags
 * - Lag-1 autocorrelation
 * - Early/late split-period comparison
 *
 * The change-point scan and split-period comparison are simple heuristics
 * with fixed windows and thresholds, not formal structural-break tests.
 * Each analysis is independent and carries its own minimum series length.
 * Windowed analyses only use runs of consecutive calendar years, so a window
 * never bridges a year dropped for insufficient pixels.
 */

use serde::{Deserialize, Serialize};

use crate::core::aggregation::YearSeries;
use crate::core::stats;

/// Minimum number of years for a trend report
pub const MIN_TREND_YEARS: usize = 5;
/// Minimum number of years for lag-1 autocorrelation
pub const MIN_AUTOCORRELATION_YEARS: usize = 3;
/// Minimum number of years for the split-period comparison
pub const MIN_SPLIT_YEARS: usize = 10;

/// Result of an analysis with its own sufficiency rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatOutcome<T> {
    Computed(T),
    Insufficient { required: usize, available: usize },
}

impl<T> StatOutcome<T> {
    fn require(available: usize, required: usize, compute: impl FnOnce() -> T) -> Self {
        if available < required {
            StatOutcome::Insufficient { required, available }
        } else {
            StatOutcome::Computed(compute())
        }
    }

    pub fn computed(&self) -> Option<&T> {
        match self {
            StatOutcome::Computed(value) => Some(value),
            StatOutcome::Insufficient { .. } => None,
        }
    }
}

/// Trend analysis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendParams {
    pub change_point_window: usize,
    /// Absolute albedo difference between window means
    pub change_point_threshold: f64,
    pub rolling_cv_window: usize,
    pub anomaly_z_threshold: f64,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            change_point_window: 3,
            change_point_threshold: 0.03,
            rolling_cv_window: 5,
            anomaly_z_threshold: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePoint {
    pub year: i32,
    pub mean_before: f64,
    pub mean_after: f64,
    pub difference: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvWindow {
    pub start_year: i32,
    pub end_year: i32,
    /// None when the window mean is zero
    pub cv_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variability {
    pub mean: f64,
    pub std_dev: f64,
    pub cv_percent: Option<f64>,
    pub min_window: Option<CvWindow>,
    pub max_window: Option<CvWindow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyKind {
    High,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub year: i32,
    pub value: f64,
    pub z_score: f64,
    pub kind: AnomalyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Persistence {
    High,
    Moderate,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Autocorrelation {
    Defined { r: f64, persistence: Persistence },
    /// Zero variance in one of the lagged series
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStrength {
    Strong,
    Moderate,
    Weak,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitComparison {
    pub early_years: (i32, i32),
    pub late_years: (i32, i32),
    pub early_mean: f64,
    pub late_mean: f64,
    pub difference: f64,
    /// None when the early mean is zero
    pub relative_percent: Option<f64>,
    pub strength: Option<SignalStrength>,
}

/// All six analyses of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub years: usize,
    pub first_year: i32,
    pub last_year: i32,
    /// None when every year is identical, so no pairwise slope exists
    pub sens_slope: Option<f64>,
    pub change_points: Vec<ChangePoint>,
    pub variability: StatOutcome<Variability>,
    pub anomalies: Vec<Anomaly>,
    pub autocorrelation: StatOutcome<Autocorrelation>,
    pub split_period: StatOutcome<SplitComparison>,
    /// Windows and thresholds the summary was computed with
    pub params: TrendParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrendReport {
    InsufficientData { years: usize },
    Summary(TrendSummary),
}

/// Trend statistics over an annual series
pub struct TrendStatistics {
    params: TrendParams,
}

impl Default for TrendStatistics {
    fn default() -> Self {
        Self::new(TrendParams::default())
    }
}

impl TrendStatistics {
    pub fn new(params: TrendParams) -> Self {
        Self { params }
    }

    pub fn analyze(&self, series: &YearSeries) -> TrendReport {
        let n = series.len();
        if n < MIN_TREND_YEARS {
            log::warn!("Trend analysis skipped: {} years available, {} required", n, MIN_TREND_YEARS);
            return TrendReport::InsufficientData { years: n };
        }

        let years = series.years();
        let values = series.values();
        log::info!("Running trend analysis over {} years ({}-{})", n, years[0], years[n - 1]);

        TrendReport::Summary(TrendSummary {
            years: n,
            first_year: years[0],
            last_year: years[n - 1],
            sens_slope: sens_slope(&series.points),
            change_points: change_points(
                series,
                self.params.change_point_window,
                self.params.change_point_threshold,
            ),
            variability: variability(series, self.params.rolling_cv_window),
            anomalies: anomalies(series, self.params.anomaly_z_threshold),
            autocorrelation: lag1_autocorrelation(&values),
            split_period: split_period(series),
            params: self.params.clone(),
        })
    }
}

/// Median of all pairwise slopes; independent of input order
pub fn sens_slope(points: &[(i32, f64)]) -> Option<f64> {
    let mut slopes = Vec::with_capacity(points.len() * points.len().saturating_sub(1) / 2);
    for (i, (year_i, value_i)) in points.iter().enumerate() {
        for (year_j, value_j) in &points[i + 1..] {
            if year_i == year_j {
                continue;
            }
            slopes.push((value_j - value_i) / (*year_j - *year_i) as f64);
        }
    }
    stats::median(&slopes)
}

/// True when `points[start..end]` covers consecutive calendar years
fn spans_consecutive_years(points: &[(i32, f64)], start: usize, end: usize) -> bool {
    let first = points[start].0;
    let last = points[end - 1].0;
    (last - first + 1) as usize == end - start
}

/// Compare the mean of the `window` values before each index with the mean
/// of the `window` values from it onward. Candidates whose two windows do not
/// cover consecutive calendar years are skipped.
pub fn change_points(series: &YearSeries, window: usize, threshold: f64) -> Vec<ChangePoint> {
    let values = series.values();
    let n = values.len();
    if window == 0 || n < 2 * window + 1 {
        return Vec::new();
    }

    let window_mean = |slice: &[f64]| slice.iter().sum::<f64>() / slice.len() as f64;
    (window..n - window)
        .filter(|i| spans_consecutive_years(&series.points, i - window, i + window))
        .filter_map(|i| {
            let mean_before = window_mean(&values[i - window..i]);
            let mean_after = window_mean(&values[i..i + window]);
            let difference = mean_after - mean_before;
            if difference.abs() <= threshold {
                return None;
            }
            Some(ChangePoint {
                year: series.points[i].0,
                mean_before,
                mean_after,
                difference,
                direction: if difference > 0.0 { Direction::Increase } else { Direction::Decrease },
            })
        })
        .collect()
}

/// Global CV plus the least and most variable rolling windows of `window`
/// consecutive calendar years
pub fn variability(series: &YearSeries, window: usize) -> StatOutcome<Variability> {
    let values = series.values();
    StatOutcome::require(values.len(), 2, || {
        let mean = stats::mean(&values).unwrap_or(0.0);
        let std_dev = stats::sample_std_dev(&values).unwrap_or(0.0);

        let windows: Vec<CvWindow> = if window >= 2 && values.len() >= window {
            (0..=values.len() - window)
                .filter(|start| spans_consecutive_years(&series.points, *start, start + window))
                .map(|start| CvWindow {
                    start_year: series.points[start].0,
                    end_year: series.points[start + window - 1].0,
                    cv_percent: stats::coefficient_of_variation(&values[start..start + window]),
                })
                .collect()
        } else {
            Vec::new()
        };
        let defined = || windows.iter().filter(|w| w.cv_percent.is_some());
        let cv = |w: &&CvWindow| w.cv_percent.unwrap_or(0.0);

        Variability {
            mean,
            std_dev,
            cv_percent: stats::coefficient_of_variation(&values),
            min_window: defined().min_by(|a, b| cv(a).total_cmp(&cv(b))).cloned(),
            max_window: defined().max_by(|a, b| cv(a).total_cmp(&cv(b))).cloned(),
        }
    })
}

/// Years whose z-score magnitude exceeds `z_threshold`
pub fn anomalies(series: &YearSeries, z_threshold: f64) -> Vec<Anomaly> {
    let values = series.values();
    let (Some(mean), Some(std_dev)) = (stats::mean(&values), stats::sample_std_dev(&values)) else {
        return Vec::new();
    };
    if std_dev <= f64::EPSILON {
        return Vec::new();
    }
    series
        .points
        .iter()
        .filter_map(|(year, value)| {
            let z_score = (value - mean) / std_dev;
            if z_score.abs() <= z_threshold {
                return None;
            }
            Some(Anomaly {
                year: *year,
                value: *value,
                z_score,
                kind: if z_score > 0.0 { AnomalyKind::High } else { AnomalyKind::Low },
            })
        })
        .collect()
}

/// Z-score of every value, empty when the series has no spread
pub fn z_scores(values: &[f64]) -> Vec<f64> {
    match (stats::mean(values), stats::sample_std_dev(values)) {
        (Some(mean), Some(std_dev)) if std_dev > f64::EPSILON => {
            values.iter().map(|v| (v - mean) / std_dev).collect()
        }
        _ => Vec::new(),
    }
}

/// Pearson correlation of the series with itself shifted by one year
pub fn lag1_autocorrelation(values: &[f64]) -> StatOutcome<Autocorrelation> {
    StatOutcome::require(values.len(), MIN_AUTOCORRELATION_YEARS, || {
        let n = values.len();
        match stats::pearson(&values[..n - 1], &values[1..]) {
            Some(r) => Autocorrelation::Defined {
                r,
                persistence: if r > 0.5 {
                    Persistence::High
                } else if r > 0.2 {
                    Persistence::Moderate
                } else {
                    Persistence::Low
                },
            },
            None => Autocorrelation::Undefined,
        }
    })
}

/// Compare the first and last halves of the series; the middle year of an
/// odd-length series is dropped
pub fn split_period(series: &YearSeries) -> StatOutcome<SplitComparison> {
    let n = series.len();
    StatOutcome::require(n, MIN_SPLIT_YEARS, || {
        let half = n / 2;
        let early = &series.points[..half];
        let late = &series.points[n - half..];
        let half_mean = |points: &[(i32, f64)]| points.iter().map(|(_, v)| v).sum::<f64>() / points.len() as f64;

        let early_mean = half_mean(early);
        let late_mean = half_mean(late);
        let difference = late_mean - early_mean;
        let relative_percent = if early_mean != 0.0 {
            Some(difference / early_mean * 100.0)
        } else {
            None
        };
        let strength = relative_percent.map(|pct| {
            if pct.abs() > 5.0 {
                SignalStrength::Strong
            } else if pct.abs() > 2.0 {
                SignalStrength::Moderate
            } else {
                SignalStrength::Weak
            }
        });

        SplitComparison {
            early_years: (early[0].0, early[half - 1].0),
            late_years: (late[0].0, late[half - 1].0),
            early_mean,
            late_mean,
            difference,
            relative_percent,
            strength,
        }
    })
}
