use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::analysis::AnalysisRequest;
use crate::types::{AlbedoError, AlbedoResult, Observation};

/// Supplies per-pixel observations for an analysis request.
///
/// The raster reduction itself happens elsewhere; implementors only hand back
/// the sampled pixels.
pub trait ObservationSource {
    fn fetch(&self, request: &AnalysisRequest) -> AlbedoResult<Vec<Observation>>;
}

/// One CSV row as exported by the sampling service
#[derive(Debug, Deserialize)]
struct ObservationRow {
    date: String,
    longitude: f64,
    latitude: f64,
    ndsi_snow_cover: u8,
    snow_albedo_raw: u8,
    basic_qa: u8,
    algorithm_flags: Option<u8>,
    glacier_fraction: f64,
}

impl ObservationRow {
    fn into_observation(self) -> AlbedoResult<Observation> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|e| AlbedoError::InvalidFormat(format!("Bad date '{}': {}", self.date, e)))?;
        if !(0.0..=1.0).contains(&self.glacier_fraction) {
            return Err(AlbedoError::InvalidFormat(format!(
                "Glacier fraction {} outside [0, 1]",
                self.glacier_fraction
            )));
        }
        Ok(Observation {
            date,
            longitude: self.longitude,
            latitude: self.latitude,
            ndsi_snow_cover: self.ndsi_snow_cover,
            snow_albedo_raw: self.snow_albedo_raw,
            basic_qa: self.basic_qa,
            algorithm_flags: self.algorithm_flags,
            glacier_fraction: self.glacier_fraction,
        })
    }
}

/// Reads observations from a sampled-pixel CSV file
pub struct CsvObservationReader {
    path: PathBuf,
}

impl CsvObservationReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_all(&self) -> AlbedoResult<Vec<Observation>> {
        log::info!("Reading observations from: {}", self.path.display());
        let file = std::fs::File::open(&self.path)?;
        let observations = Self::read_from(file)?;
        log::info!("Loaded {} observations", observations.len());
        Ok(observations)
    }

    /// Parse observations from any CSV stream with a header row.
    ///
    /// Rows with unparseable cells, bad dates or out-of-range glacier
    /// fractions are logged and skipped; only stream-level failures abort.
    pub fn read_from<R: std::io::Read>(reader: R) -> AlbedoResult<Vec<Observation>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut observations = Vec::new();
        for (line, row) in csv_reader.deserialize::<ObservationRow>().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) if matches!(e.kind(), csv::ErrorKind::Deserialize { .. }) => {
                    log::warn!("Skipping row {}: {}", line + 1, e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            match row.into_observation() {
                Ok(obs) => observations.push(obs),
                Err(e) => log::warn!("Skipping row {}: {}", line + 1, e),
            }
        }
        Ok(observations)
    }
}

impl ObservationSource for CsvObservationReader {
    fn fetch(&self, _request: &AnalysisRequest) -> AlbedoResult<Vec<Observation>> {
        self.read_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
date,longitude,latitude,ndsi_snow_cover,snow_albedo_raw,basic_qa,algorithm_flags,glacier_fraction
2014-07-01,-117.29,52.19,78,64,0,0,0.97
2014-07-01,-117.30,52.19,65,58,1,,0.42
2014-07-02,-117.29,52.19,250,250,211,32,0.97
";

    #[test]
    fn test_read_rows() {
        let observations = CsvObservationReader::read_from(SAMPLE.as_bytes()).unwrap();
        assert_eq!(observations.len(), 3);
        assert_eq!(observations[0].algorithm_flags, Some(0));
        assert_eq!(observations[1].algorithm_flags, None);
        assert_eq!(observations[2].basic_qa, 211);
        assert_eq!(observations[2].date, NaiveDate::from_ymd_opt(2014, 7, 2).unwrap());
    }

    #[test]
    fn test_bad_date_skipped() {
        let text = "\
date,longitude,latitude,ndsi_snow_cover,snow_albedo_raw,basic_qa,algorithm_flags,glacier_fraction
2014-13-01,-117.29,52.19,78,64,0,0,0.97
2014-07-01,-117.29,52.19,78,64,0,0,0.97
";
        let observations = CsvObservationReader::read_from(text.as_bytes()).unwrap();
        assert_eq!(observations.len(), 1);
    }

    #[test]
    fn test_malformed_cells_skip_only_their_row() {
        let text = "\
date,longitude,latitude,ndsi_snow_cover,snow_albedo_raw,basic_qa,algorithm_flags,glacier_fraction
2014-07-01,-117.29,52.19,78,64,0,0,0.97
2014-07-01,-117.30,52.19,seventy,64,0,0,0.97
2014-07-01,-117.31,52.19,78,,0,0,0.97
2014-07-01,-117.32,52.19,78,61,0,0,0.96
";
        let observations = CsvObservationReader::read_from(text.as_bytes()).unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].longitude, -117.29);
        assert_eq!(observations[1].longitude, -117.32);
    }

    #[test]
    fn test_out_of_range_fraction_skipped() {
        let text = "\
date,longitude,latitude,ndsi_snow_cover,snow_albedo_raw,basic_qa,algorithm_flags,glacier_fraction
2014-07-01,-117.29,52.19,78,64,0,0,1.0000001
2014-07-01,-117.30,52.19,78,64,0,0,-0.2
2014-07-01,-117.31,52.19,78,64,0,0,NaN
2014-07-01,-117.32,52.19,78,64,0,0,1.0
";
        let observations = CsvObservationReader::read_from(text.as_bytes()).unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].glacier_fraction, 1.0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let reader = CsvObservationReader::new("/nonexistent/observations.csv");
        assert!(matches!(reader.read_all(), Err(AlbedoError::Io(_))));
    }
}
