//! Core analysis modules

pub mod stats;
pub mod quality_mask;
pub mod fraction_classifier;
pub mod aggregation;
pub mod trend_statistics;
pub mod analysis;

// Re-export main types
pub use quality_mask::{QualityMaskEvaluator, QaConfig, QaFlag, QaFlagSpec, QaDecision, BasicLevel, QA_FLAG_TABLE};
pub use fraction_classifier::{FractionClassifier, FractionClass, DEFAULT_BREAKPOINTS};
pub use aggregation::{AggregationReducer, AggregationParams, AggregateRecord, AggregateMap, BucketSummary, YearSeries};
pub use trend_statistics::{TrendStatistics, TrendParams, TrendReport, TrendSummary, StatOutcome};
pub use analysis::{AnalysisRequest, AnalysisSession, AnalysisOutcome, SeasonWindow, run_analysis};
