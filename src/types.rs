use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Scale factor applied to the raw 0-100 albedo integer
pub const ALBEDO_SCALE: f64 = 0.01;

/// Largest raw value that is a physical measurement (NDSI or albedo)
pub const MAX_VALID_RAW: u8 = 100;

/// One satellite overpass of one pixel on one date
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub longitude: f64,
    pub latitude: f64,
    pub ndsi_snow_cover: u8,        // 0-100, >100 is a product sentinel
    pub snow_albedo_raw: u8,        // 0-100, scale 0.01
    pub basic_qa: u8,               // see BasicQa
    pub algorithm_flags: Option<u8>, // None when the band is masked out
    pub glacier_fraction: f64,      // 0-1, static per pixel
}

impl Observation {
    /// Albedo in [0, 1], or None when the raw value is a sentinel
    pub fn albedo(&self) -> Option<f64> {
        if self.snow_albedo_raw <= MAX_VALID_RAW {
            Some(self.snow_albedo_raw as f64 * ALBEDO_SCALE)
        } else {
            None
        }
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn day_of_year(&self) -> u32 {
        self.date.ordinal()
    }

    pub fn decimal_year(&self) -> f64 {
        decimal_year(self.date)
    }
}

/// Fractional year, `year + (doy - 1) / days_in_year`
pub fn decimal_year(date: NaiveDate) -> f64 {
    let days_in_year = if is_leap_year(date.year()) { 366.0 } else { 365.0 };
    date.year() as f64 + (date.ordinal() as f64 - 1.0) / days_in_year
}

fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

/// Coarse per-pixel quality category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasicQa {
    Best,
    Good,
    Ok,
    Poor,
    Night,
    Ocean,
}

const BASIC_QA_TABLE: [(u8, BasicQa, &str); 6] = [
    (0, BasicQa::Best, "best"),
    (1, BasicQa::Good, "good"),
    (2, BasicQa::Ok, "ok"),
    (3, BasicQa::Poor, "poor"),
    (211, BasicQa::Night, "night"),
    (239, BasicQa::Ocean, "ocean"),
];

impl BasicQa {
    pub fn from_code(code: u8) -> Option<Self> {
        BASIC_QA_TABLE
            .iter()
            .find(|(c, _, _)| *c == code)
            .map(|(_, qa, _)| *qa)
    }

    pub fn text(self) -> &'static str {
        BASIC_QA_TABLE
            .iter()
            .find(|(_, qa, _)| *qa == self)
            .map(|(_, _, t)| *t)
            .unwrap_or("unknown")
    }

    /// Text for a raw code, "unknown" for codes outside the table
    pub fn text_for_code(code: u8) -> &'static str {
        Self::from_code(code).map(Self::text).unwrap_or("unknown")
    }

    /// Night and ocean pixels carry no usable retrieval
    pub fn is_unusable(self) -> bool {
        matches!(self, BasicQa::Night | BasicQa::Ocean)
    }
}

impl std::fmt::Display for BasicQa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// Time bucket used to group observations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeBucket {
    Day(NaiveDate),
    Year(i32),
}

impl TimeBucket {
    pub fn year(&self) -> i32 {
        match self {
            TimeBucket::Day(date) => date.year(),
            TimeBucket::Year(year) => *year,
        }
    }
}

impl std::fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeBucket::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            TimeBucket::Year(year) => write!(f, "{}", year),
        }
    }
}

/// Granularity of an aggregation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketKind {
    Daily,
    Annual,
}

impl BucketKind {
    pub fn bucket_for(self, date: NaiveDate) -> TimeBucket {
        match self {
            BucketKind::Daily => TimeBucket::Day(date),
            BucketKind::Annual => TimeBucket::Year(date.year()),
        }
    }
}

/// Error types for albedo analysis
#[derive(Debug, thiserror::Error)]
pub enum AlbedoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for albedo operations
pub type AlbedoResult<T> = Result<T, AlbedoError>;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basic_qa_lookup() {
        assert_eq!(BasicQa::from_code(1), Some(BasicQa::Good));
        assert_eq!(BasicQa::from_code(239), Some(BasicQa::Ocean));
        assert_eq!(BasicQa::from_code(7), None);
        assert!(BasicQa::from_code(211).map_or(false, BasicQa::is_unusable));
        assert_eq!(BasicQa::text_for_code(3), "poor");
        assert_eq!(BasicQa::text_for_code(42), "unknown");
    }

    #[test]
    fn test_albedo_scaling() {
        let mut obs = Observation {
            date: NaiveDate::from_ymd_opt(2015, 7, 1).unwrap(),
            longitude: -117.2,
            latitude: 52.2,
            ndsi_snow_cover: 80,
            snow_albedo_raw: 65,
            basic_qa: 0,
            algorithm_flags: Some(0),
            glacier_fraction: 1.0,
        };
        assert_relative_eq!(obs.albedo().unwrap(), 0.65, epsilon = 1e-12);

        obs.snow_albedo_raw = 101;
        assert!(obs.albedo().is_none());
    }

    #[test]
    fn test_decimal_year() {
        let jan1 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert_relative_eq!(decimal_year(jan1), 2020.0);

        // 2020 is a leap year: July 2 is day 184
        let mid = NaiveDate::from_ymd_opt(2020, 7, 2).unwrap();
        assert_relative_eq!(decimal_year(mid), 2020.0 + 183.0 / 366.0, epsilon = 1e-12);

        let late = NaiveDate::from_ymd_opt(2019, 12, 31).unwrap();
        assert_relative_eq!(decimal_year(late), 2019.0 + 364.0 / 365.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bucket_ordering() {
        let a = TimeBucket::Day(NaiveDate::from_ymd_opt(2018, 6, 1).unwrap());
        let b = TimeBucket::Day(NaiveDate::from_ymd_opt(2018, 6, 2).unwrap());
        assert!(a < b);
        assert_eq!(a.year(), 2018);
        assert_eq!(TimeBucket::Year(2018).to_string(), "2018");
        assert_eq!(a.to_string(), "2018-06-01");
    }
}
