//! Analysis requests and recomputation
//!
//! An `AnalysisRequest` is an immutable snapshot of every user-adjustable
//! parameter. Each change produces a new request and a fresh, independent
//! recomputation; nothing is updated in place.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::aggregation::{AggregateMap, AggregationParams, AggregationReducer, YearSeries};
use crate::core::fraction_classifier::{FractionClass, FractionClassifier, DEFAULT_BREAKPOINTS};
use crate::core::quality_mask::QaConfig;
use crate::core::trend_statistics::{TrendReport, TrendStatistics};
use crate::io::observation_reader::ObservationSource;
use crate::types::{AlbedoError, AlbedoResult, BucketKind, Observation};

/// Inclusive month range, may not wrap the new year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonWindow {
    pub start_month: u32,
    pub end_month: u32,
}

impl Default for SeasonWindow {
    fn default() -> Self {
        // June-September melt season
        Self {
            start_month: 6,
            end_month: 9,
        }
    }
}

impl SeasonWindow {
    /// July-August
    pub fn peak_melt() -> Self {
        Self {
            start_month: 7,
            end_month: 8,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start_month..=self.end_month).contains(&date.month())
    }

    fn validate(&self) -> AlbedoResult<()> {
        if !(1..=12).contains(&self.start_month)
            || !(1..=12).contains(&self.end_month)
            || self.start_month > self.end_month
        {
            return Err(AlbedoError::InvalidInput(format!(
                "Invalid season months {}-{}",
                self.start_month, self.end_month
            )));
        }
        Ok(())
    }
}

/// Every parameter of one analysis pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisRequest {
    pub qa_config: QaConfig,
    pub ndsi_threshold: u8,
    pub fraction_threshold_pct: u8,
    pub min_pixels: usize,
    pub season: SeasonWindow,
    /// Narrow the season to July-August
    pub peak_melt_only: bool,
    pub breakpoints: [f64; 4],
    /// Inclusive year range
    pub year_range: Option<(i32, i32)>,
    /// Date shown in the pixel-level view
    pub selected_date: Option<NaiveDate>,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            qa_config: QaConfig::standard(),
            ndsi_threshold: 0,
            fraction_threshold_pct: 75,
            min_pixels: 10,
            season: SeasonWindow::default(),
            peak_melt_only: false,
            breakpoints: DEFAULT_BREAKPOINTS,
            year_range: None,
            selected_date: None,
        }
    }
}

impl AnalysisRequest {
    /// Load a request from a JSON file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> AlbedoResult<Self> {
        log::info!("Reading analysis configuration: {}", path.as_ref().display());
        let text = std::fs::read_to_string(path)?;
        let request: Self = serde_json::from_str(&text)?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> AlbedoResult<()> {
        if self.ndsi_threshold > 100 {
            return Err(AlbedoError::InvalidInput(format!(
                "NDSI threshold {} outside 0-100",
                self.ndsi_threshold
            )));
        }
        if self.fraction_threshold_pct > 100 {
            return Err(AlbedoError::InvalidInput(format!(
                "Glacier fraction threshold {}% outside 0-100",
                self.fraction_threshold_pct
            )));
        }
        if self.min_pixels == 0 {
            return Err(AlbedoError::InvalidInput(
                "Minimum pixel count must be at least 1".to_string(),
            ));
        }
        if let Some((first, last)) = self.year_range {
            if first > last {
                return Err(AlbedoError::InvalidInput(format!("Invalid year range {}-{}", first, last)));
            }
        }
        self.season.validate()?;
        FractionClassifier::with_breakpoints(self.breakpoints)?;
        Ok(())
    }

    pub fn with_qa_config(&self, qa_config: QaConfig) -> Self {
        Self { qa_config, ..self.clone() }
    }

    pub fn with_ndsi_threshold(&self, ndsi_threshold: u8) -> Self {
        Self { ndsi_threshold, ..self.clone() }
    }

    pub fn with_fraction_threshold(&self, fraction_threshold_pct: u8) -> Self {
        Self { fraction_threshold_pct, ..self.clone() }
    }

    pub fn with_min_pixels(&self, min_pixels: usize) -> Self {
        Self { min_pixels, ..self.clone() }
    }

    pub fn with_peak_melt_only(&self, peak_melt_only: bool) -> Self {
        Self { peak_melt_only, ..self.clone() }
    }

    pub fn with_year_range(&self, year_range: Option<(i32, i32)>) -> Self {
        Self { year_range, ..self.clone() }
    }

    pub fn with_selected_date(&self, selected_date: Option<NaiveDate>) -> Self {
        Self { selected_date, ..self.clone() }
    }

    /// Season actually applied
    pub fn effective_season(&self) -> SeasonWindow {
        if self.peak_melt_only {
            SeasonWindow::peak_melt()
        } else {
            self.season
        }
    }

    pub fn in_scope(&self, obs: &Observation) -> bool {
        let in_years = self
            .year_range
            .map_or(true, |(first, last)| (first..=last).contains(&obs.year()));
        in_years && self.effective_season().contains(obs.date)
    }

    pub fn aggregation_params(&self) -> AlbedoResult<AggregationParams> {
        Ok(AggregationParams {
            qa_config: self.qa_config.clone(),
            ndsi_threshold: self.ndsi_threshold,
            fraction_threshold_pct: self.fraction_threshold_pct,
            min_pixels: self.min_pixels,
            classifier: FractionClassifier::with_breakpoints(self.breakpoints)?,
        })
    }
}

/// Everything one recomputation pass produces
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisOutcome {
    pub annual: AggregateMap,
    pub daily: AggregateMap,
    pub class_trends: BTreeMap<FractionClass, TrendReport>,
    /// Trend of the pixels above the glacier fraction threshold
    pub total_trend: Option<TrendReport>,
    /// Observations on the selected date, unfiltered
    pub selected_pixels: Vec<Observation>,
}

/// Pure recomputation of every summary for one request
pub fn run_analysis(request: &AnalysisRequest, observations: &[Observation]) -> AlbedoResult<AnalysisOutcome> {
    request.validate()?;

    let in_scope: Vec<Observation> = observations
        .iter()
        .filter(|obs| request.in_scope(obs))
        .cloned()
        .collect();
    log::info!(
        "{} of {} observations inside season {:?} and year range {:?}",
        in_scope.len(),
        observations.len(),
        request.effective_season(),
        request.year_range
    );

    let reducer = AggregationReducer::new(request.aggregation_params()?);
    let annual = reducer.aggregate(&in_scope, BucketKind::Annual)?;
    let daily = reducer.aggregate(&in_scope, BucketKind::Daily)?;

    let trends = TrendStatistics::default();
    let class_trends = FractionClass::ALL
        .iter()
        .map(|class| (*class, trends.analyze(&YearSeries::from_annual(&annual, *class))))
        .collect();
    let total_trend = Some(trends.analyze(&YearSeries::from_annual_totals(&annual)));

    let selected_pixels = match request.selected_date {
        Some(date) => observations.iter().filter(|obs| obs.date == date).cloned().collect(),
        None => Vec::new(),
    };

    Ok(AnalysisOutcome {
        annual,
        daily,
        class_trends,
        total_trend,
        selected_pixels,
    })
}

/// Holds the current request and recomputes on every change
pub struct AnalysisSession<S: ObservationSource> {
    source: S,
    request: AnalysisRequest,
    outcome: AnalysisOutcome,
}

impl<S: ObservationSource> AnalysisSession<S> {
    pub fn new(source: S, request: AnalysisRequest) -> Self {
        let outcome = Self::recompute(&source, &request);
        Self {
            source,
            request,
            outcome,
        }
    }

    pub fn request(&self) -> &AnalysisRequest {
        &self.request
    }

    pub fn outcome(&self) -> &AnalysisOutcome {
        &self.outcome
    }

    /// Replace the request and recompute from scratch
    pub fn update(&mut self, request: AnalysisRequest) -> &AnalysisOutcome {
        log::debug!("Analysis request changed: {:?}", request);
        self.outcome = Self::recompute(&self.source, &request);
        self.request = request;
        &self.outcome
    }

    /// Source or computation failures are logged and yield an empty outcome
    fn recompute(source: &S, request: &AnalysisRequest) -> AnalysisOutcome {
        let observations = match source.fetch(request) {
            Ok(observations) => observations,
            Err(e) => {
                log::error!("Failed to fetch observations: {}", e);
                return AnalysisOutcome::default();
            }
        };
        match run_analysis(request, &observations) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Analysis failed: {}", e);
                AnalysisOutcome::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::quality_mask::BasicLevel;
    use crate::types::TimeBucket;
    use std::cell::Cell;

    fn pixel(date: (i32, u32, u32), albedo: u8) -> Observation {
        Observation {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            longitude: -117.28,
            latitude: 52.18,
            ndsi_snow_cover: 70,
            snow_albedo_raw: albedo,
            basic_qa: 1,
            algorithm_flags: Some(0),
            glacier_fraction: 0.96,
        }
    }

    struct FixedSource {
        observations: Vec<Observation>,
        calls: Cell<usize>,
    }

    impl ObservationSource for FixedSource {
        fn fetch(&self, _request: &AnalysisRequest) -> AlbedoResult<Vec<Observation>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.observations.clone())
        }
    }

    struct FailingSource;

    impl ObservationSource for FailingSource {
        fn fetch(&self, _request: &AnalysisRequest) -> AlbedoResult<Vec<Observation>> {
            Err(AlbedoError::Processing("tile evaluation failed".to_string()))
        }
    }

    #[test]
    fn test_season_filtering() {
        let request = AnalysisRequest::default().with_min_pixels(1);
        let observations = vec![pixel((2015, 5, 31), 50), pixel((2015, 6, 1), 60), pixel((2015, 9, 30), 70)];
        let outcome = run_analysis(&request, &observations).unwrap();
        assert_eq!(outcome.daily.len(), 2);
        assert_eq!(outcome.annual[&TimeBucket::Year(2015)].total.count, 2);

        let peak = request.with_peak_melt_only(true);
        let outcome = run_analysis(&peak, &observations).unwrap();
        assert!(outcome.annual.is_empty());
    }

    #[test]
    fn test_year_range_and_selected_date() {
        let request = AnalysisRequest::default()
            .with_min_pixels(1)
            .with_year_range(Some((2016, 2016)))
            .with_selected_date(NaiveDate::from_ymd_opt(2015, 7, 1));
        let observations = vec![pixel((2015, 7, 1), 50), pixel((2016, 7, 1), 60)];
        let outcome = run_analysis(&request, &observations).unwrap();
        assert_eq!(outcome.annual.len(), 1);
        assert!(outcome.annual.contains_key(&TimeBucket::Year(2016)));
        assert_eq!(outcome.selected_pixels.len(), 1);
    }

    #[test]
    fn test_invalid_request_rejected() {
        let request = AnalysisRequest {
            breakpoints: [0.5, 0.4, 0.6, 0.7],
            ..AnalysisRequest::default()
        };
        assert!(run_analysis(&request, &[]).is_err());
        assert!(AnalysisRequest::default().with_ndsi_threshold(120).validate().is_err());
        assert!(AnalysisRequest::default().with_year_range(Some((2020, 2010))).validate().is_err());
    }

    #[test]
    fn test_zero_min_pixels_rejected() {
        let request = AnalysisRequest::default().with_min_pixels(0);
        assert!(matches!(request.validate(), Err(AlbedoError::InvalidInput(_))));
        assert!(run_analysis(&request, &[pixel((2015, 7, 1), 50)]).is_err());
        assert!(AnalysisRequest::default().with_min_pixels(1).validate().is_ok());
    }

    #[test]
    fn test_session_recomputes_on_update() {
        let source = FixedSource {
            observations: (0..12).map(|_| pixel((2017, 7, 20), 60)).collect(),
            calls: Cell::new(0),
        };
        let mut session = AnalysisSession::new(source, AnalysisRequest::default());
        assert!(session.outcome().annual[&TimeBucket::Year(2017)].total.sufficient_pixels);

        let stricter = session.request().with_min_pixels(20);
        let outcome = session.update(stricter);
        assert!(!outcome.annual[&TimeBucket::Year(2017)].total.sufficient_pixels);
        assert_eq!(session.request().min_pixels, 20);
        assert_eq!(session.source.calls.get(), 2);

        // Basic QA 1 is rejected at the "best" level
        let best_only = session.request().with_qa_config(QaConfig {
            basic_level: BasicLevel::Best,
            ..QaConfig::standard()
        });
        assert!(session.update(best_only).annual.is_empty());
    }

    #[test]
    fn test_session_falls_back_on_source_failure() {
        let session = AnalysisSession::new(FailingSource, AnalysisRequest::default());
        assert_eq!(session.outcome(), &AnalysisOutcome::default());
    }

    #[test]
    fn test_request_json_defaults() {
        let request: AnalysisRequest = serde_json::from_str(r#"{"ndsi_threshold": 40}"#).unwrap();
        assert_eq!(request.ndsi_threshold, 40);
        assert_eq!(request.min_pixels, 10);
        assert_eq!(request.fraction_threshold_pct, 75);
        assert_eq!(request.season, SeasonWindow::default());
    }
}
