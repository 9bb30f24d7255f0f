//! glacier_albedo: quality-controlled glacier snow albedo analysis
//!
//! Filters daily per-pixel snow product observations with the product's QA
//! bits, aggregates albedo per glacier-fraction class into daily and annual
//! summaries, runs descriptive trend statistics over the annual series and
//! exports flat CSV tables.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    AlbedoError, AlbedoResult, BasicQa, BucketKind, Observation, TimeBucket
};

pub use crate::core::{
    AggregateRecord, AggregationParams, AggregationReducer, AnalysisRequest, AnalysisSession,
    BasicLevel, FractionClass, FractionClassifier, QaConfig, QaFlag, QualityMaskEvaluator,
    TrendReport, TrendStatistics, YearSeries, run_analysis,
};
pub use crate::io::{CsvObservationReader, ExportFormatter, ObservationSource};
