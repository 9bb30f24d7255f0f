//! I/O modules for reading observations and writing results

pub mod observation_reader;
pub mod export;
pub mod report;

pub use observation_reader::{CsvObservationReader, ObservationSource};
pub use export::{ExportFormatter, NULL_MARKER};
pub use report::render_trend_report;
