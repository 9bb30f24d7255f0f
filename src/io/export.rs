/*!
 * CSV export of aggregated and pixel-level results
 *
 * Column order is fixed. Unavailable statistics are written as `NA`, never as
 * 0 or an empty field.
 */

use chrono::Datelike;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::core::aggregation::{AggregateMap, AggregateRecord};
use crate::core::analysis::AnalysisRequest;
use crate::core::fraction_classifier::{FractionClass, FractionClassifier};
use crate::core::quality_mask::{QaConfig, QualityMaskEvaluator, QA_FLAG_TABLE};
use crate::types::{decimal_year, AlbedoResult, BasicQa, Observation, TimeBucket, MAX_VALID_RAW};

/// Marker written for unavailable values
pub const NULL_MARKER: &str = "NA";

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| NULL_MARKER.to_string(), |v| format!("{:.6}", v))
}

fn flag(value: bool) -> String {
    let text = if value { "1" } else { "0" };
    text.to_string()
}

/// Builds and writes the export tables
pub struct ExportFormatter {
    request: AnalysisRequest,
    qa_config: QaConfig,
}

impl ExportFormatter {
    /// Exports always evaluate pixels against the standard QA configuration
    pub fn new(request: AnalysisRequest) -> Self {
        Self {
            request,
            qa_config: QaConfig::standard(),
        }
    }

    pub fn annual_header() -> Vec<String> {
        let mut header: Vec<String> = [
            "year",
            "glacier_fraction_threshold",
            "ndsi_snow_threshold",
            "min_pixel_threshold",
            "peak_melt_only",
            "total_filtered_pixels",
            "sufficient_pixels",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        for class in FractionClass::ALL {
            for suffix in ["mean", "stdDev", "count", "sufficient_pixels"] {
                header.push(format!("{}_{}", class.name(), suffix));
            }
        }
        header
    }

    pub fn daily_header() -> Vec<String> {
        let mut header: Vec<String> = [
            "date",
            "year",
            "doy",
            "decimal_year",
            "total_filtered_pixels",
            "sufficient_total_pixels",
            "min_pixel_threshold",
            "ndsi_snow_threshold",
            "glacier_fraction_threshold",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        for class in FractionClass::ALL {
            for suffix in ["mean", "median", "pixel_count", "sufficient_pixels"] {
                header.push(format!("{}_{}", class.name(), suffix));
            }
        }
        header
    }

    pub fn pixel_header() -> Vec<String> {
        let mut header: Vec<String> = [
            "date",
            "year",
            "doy",
            "decimal_year",
            "longitude",
            "latitude",
            "glacier_fraction_pct",
            "glacier_class",
            "ndsi_snow_cover",
            "snow_albedo_raw",
            "snow_albedo_scaled",
            "basic_qa",
            "basic_qa_text",
            "algorithm_flags",
            "passes_standard_qa",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        header.extend(QA_FLAG_TABLE.iter().map(|spec| spec.column.to_string()));
        header
    }

    fn class_record(classes: &BTreeMap<FractionClass, AggregateRecord>, class: FractionClass) -> AggregateRecord {
        classes
            .get(&class)
            .cloned()
            .unwrap_or_else(|| AggregateRecord::insufficient(0))
    }

    pub fn annual_rows(&self, annual: &AggregateMap) -> Vec<Vec<String>> {
        annual
            .values()
            .map(|summary| {
                let mut row = vec![
                    summary.bucket.year().to_string(),
                    self.request.fraction_threshold_pct.to_string(),
                    self.request.ndsi_threshold.to_string(),
                    self.request.min_pixels.to_string(),
                    self.request.peak_melt_only.to_string(),
                    summary.total.count.to_string(),
                    flag(summary.total.sufficient_pixels),
                ];
                for class in FractionClass::ALL {
                    let record = Self::class_record(&summary.classes, class);
                    row.push(optional(record.mean));
                    row.push(optional(record.std_dev));
                    row.push(record.count.to_string());
                    row.push(flag(record.sufficient_pixels));
                }
                row
            })
            .collect()
    }

    pub fn daily_rows(&self, daily: &AggregateMap) -> Vec<Vec<String>> {
        daily
            .values()
            .filter_map(|summary| {
                let TimeBucket::Day(date) = summary.bucket else {
                    log::warn!("Skipping non-daily bucket {} in daily export", summary.bucket);
                    return None;
                };
                let mut row = vec![
                    date.format("%Y-%m-%d").to_string(),
                    summary.bucket.year().to_string(),
                    date.ordinal().to_string(),
                    format!("{:.6}", decimal_year(date)),
                    summary.total.count.to_string(),
                    flag(summary.total.sufficient_pixels),
                    self.request.min_pixels.to_string(),
                    self.request.ndsi_threshold.to_string(),
                    self.request.fraction_threshold_pct.to_string(),
                ];
                for class in FractionClass::ALL {
                    let record = Self::class_record(&summary.classes, class);
                    row.push(optional(record.mean));
                    row.push(optional(record.median));
                    row.push(record.count.to_string());
                    row.push(flag(record.sufficient_pixels));
                }
                Some(row)
            })
            .collect()
    }

    pub fn pixel_rows(&self, observations: &[Observation]) -> AlbedoResult<Vec<Vec<String>>> {
        let classifier = FractionClassifier::with_breakpoints(self.request.breakpoints)?;
        observations
            .iter()
            .map(|obs| {
                let class_label = match classifier.classify(obs.glacier_fraction) {
                    Ok(class) => classifier.label(class),
                    Err(e) => {
                        log::warn!("Pixel {:.4},{:.4} on {}: {}", obs.longitude, obs.latitude, obs.date, e);
                        NULL_MARKER.to_string()
                    }
                };
                let flags = obs.algorithm_flags;
                let mut row = vec![
                    obs.date.format("%Y-%m-%d").to_string(),
                    obs.year().to_string(),
                    obs.day_of_year().to_string(),
                    format!("{:.6}", obs.decimal_year()),
                    format!("{:.6}", obs.longitude),
                    format!("{:.6}", obs.latitude),
                    format!("{:.2}", obs.glacier_fraction * 100.0),
                    class_label,
                    obs.ndsi_snow_cover.to_string(),
                    obs.snow_albedo_raw.to_string(),
                    optional(obs.albedo()),
                    obs.basic_qa.to_string(),
                    BasicQa::text_for_code(obs.basic_qa).to_string(),
                    flags.map_or_else(|| NULL_MARKER.to_string(), |f| f.to_string()),
                    flag(QualityMaskEvaluator::accept(obs, &self.qa_config)),
                ];
                for spec in QA_FLAG_TABLE.iter() {
                    row.push(match flags {
                        Some(f) => flag(spec.flag.is_set(f)),
                        None => NULL_MARKER.to_string(),
                    });
                }
                if obs.snow_albedo_raw > MAX_VALID_RAW {
                    log::debug!("Pixel {:.4},{:.4} on {} has fill albedo {}", obs.longitude, obs.latitude, obs.date, obs.snow_albedo_raw);
                }
                Ok(row)
            })
            .collect()
    }

    pub fn write_annual<W: Write>(&self, annual: &AggregateMap, writer: W) -> AlbedoResult<()> {
        write_table(writer, &Self::annual_header(), &self.annual_rows(annual))
    }

    pub fn write_daily<W: Write>(&self, daily: &AggregateMap, writer: W) -> AlbedoResult<()> {
        write_table(writer, &Self::daily_header(), &self.daily_rows(daily))
    }

    pub fn write_pixels<W: Write>(&self, observations: &[Observation], writer: W) -> AlbedoResult<()> {
        write_table(writer, &Self::pixel_header(), &self.pixel_rows(observations)?)
    }

    pub fn write_annual_to_path<P: AsRef<Path>>(&self, annual: &AggregateMap, path: P) -> AlbedoResult<()> {
        log::info!("Writing annual table ({} years) to {}", annual.len(), path.as_ref().display());
        self.write_annual(annual, std::fs::File::create(path)?)
    }

    pub fn write_daily_to_path<P: AsRef<Path>>(&self, daily: &AggregateMap, path: P) -> AlbedoResult<()> {
        log::info!("Writing daily table ({} days) to {}", daily.len(), path.as_ref().display());
        self.write_daily(daily, std::fs::File::create(path)?)
    }

    pub fn write_pixels_to_path<P: AsRef<Path>>(&self, observations: &[Observation], path: P) -> AlbedoResult<()> {
        log::info!("Writing {} pixels to {}", observations.len(), path.as_ref().display());
        self.write_pixels(observations, std::fs::File::create(path)?)
    }
}

fn write_table<W: Write>(writer: W, header: &[String], rows: &[Vec<String>]) -> AlbedoResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(header)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregation::{AggregationParams, AggregationReducer};
    use crate::types::BucketKind;
    use chrono::NaiveDate;

    fn pixel(day: u32, fraction: f64, albedo: u8, flags: Option<u8>) -> Observation {
        Observation {
            date: NaiveDate::from_ymd_opt(2020, 7, day).unwrap(),
            longitude: -117.31,
            latitude: 52.17,
            ndsi_snow_cover: 75,
            snow_albedo_raw: albedo,
            basic_qa: 0,
            algorithm_flags: flags,
            glacier_fraction: fraction,
        }
    }

    #[test]
    fn test_header_widths() {
        assert_eq!(ExportFormatter::annual_header().len(), 7 + 5 * 4);
        assert_eq!(ExportFormatter::daily_header().len(), 9 + 5 * 4);
        assert_eq!(ExportFormatter::pixel_header().len(), 15 + 8);
        assert_eq!(ExportFormatter::annual_header()[7], "border_mean");
        assert_eq!(ExportFormatter::annual_header()[26], "pure_ice_sufficient_pixels");
        assert_eq!(ExportFormatter::daily_header()[11], "border_pixel_count");
        assert_eq!(ExportFormatter::pixel_header()[22], "flag_high_solar_zenith");
    }

    #[test]
    fn test_unavailable_written_as_null_marker() {
        let observations = vec![pixel(1, 0.95, 60, Some(0)), pixel(1, 0.95, 62, Some(0))];
        let reducer = AggregationReducer::new(AggregationParams::default());
        let annual = reducer.aggregate(&observations, BucketKind::Annual).unwrap();
        let formatter = ExportFormatter::new(AnalysisRequest::default());
        let rows = formatter.annual_rows(&annual);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row[0], "2020");
        assert_eq!(row[1], "75");
        assert_eq!(row[4], "false");
        assert_eq!(row[5], "2");
        assert_eq!(row[6], "0");
        // pure ice: insufficient, count kept
        assert_eq!(&row[23..27], &["NA", "NA", "2", "0"]);
        // border: empty class
        assert_eq!(&row[7..11], &["NA", "NA", "0", "0"]);
    }

    #[test]
    fn test_daily_row_values() {
        let observations = vec![pixel(2, 0.95, 60, Some(0)), pixel(2, 0.95, 70, Some(0))];
        let request = AnalysisRequest::default().with_min_pixels(2);
        let reducer = AggregationReducer::new(request.aggregation_params().unwrap());
        let daily = reducer.aggregate(&observations, BucketKind::Daily).unwrap();
        let rows = ExportFormatter::new(request).daily_rows(&daily);
        let row = &rows[0];
        assert_eq!(row[0], "2020-07-02");
        assert_eq!(row[2], "184");
        assert_eq!(row[3], "2020.500000");
        assert_eq!(&row[25..29], &["0.650000", "0.650000", "2", "1"]);
    }

    #[test]
    fn test_pixel_row_flags() {
        let formatter = ExportFormatter::new(AnalysisRequest::default());
        let rows = formatter
            .pixel_rows(&[pixel(3, 0.8, 55, Some(0b0010_0001)), pixel(3, 0.3, 120, None)])
            .unwrap();

        let cloudy = &rows[0];
        assert_eq!(cloudy[7], "Mostly ice (75-90%)");
        assert_eq!(cloudy[10], "0.550000");
        assert_eq!(cloudy[12], "best");
        assert_eq!(cloudy[13], "33");
        assert_eq!(cloudy[14], "0");
        assert_eq!(&cloudy[15..23], &["1", "0", "0", "0", "0", "1", "0", "0"]);

        let no_flags = &rows[1];
        assert_eq!(no_flags[10], "NA");
        assert_eq!(no_flags[13], "NA");
        assert_eq!(no_flags[14], "1");
        assert!(no_flags[15..23].iter().all(|v| v == "NA"));
    }

    #[test]
    fn test_pixel_class_label_uses_request_breakpoints() {
        let request = AnalysisRequest {
            breakpoints: [0.02, 0.04, 0.06, 0.08],
            ..AnalysisRequest::default()
        };
        let rows = ExportFormatter::new(request)
            .pixel_rows(&[pixel(3, 0.05, 55, Some(0)), pixel(3, 1.2, 55, Some(0))])
            .unwrap();
        assert_eq!(rows[0][7], "Mixed high (4-6%)");
        assert_eq!(rows[1][7], "NA");
    }

    #[test]
    fn test_write_annual_csv() {
        let observations: Vec<_> = (0..10).map(|i| pixel(5, 0.95, 60 + i, Some(0))).collect();
        let reducer = AggregationReducer::standard();
        let annual = reducer.aggregate(&observations, BucketKind::Annual).unwrap();
        let mut buffer = Vec::new();
        ExportFormatter::new(AnalysisRequest::default())
            .write_annual(&annual, &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("year,glacier_fraction_threshold,ndsi_snow_threshold"));
        assert!(lines[1].starts_with("2020,75,0,10,false,10,1,"));
    }
}
