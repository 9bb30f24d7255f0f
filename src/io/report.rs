//! Plain-text rendering of trend reports

use std::fmt::Write;

use crate::core::trend_statistics::{
    AnomalyKind, Autocorrelation, Direction, Persistence, SignalStrength, StatOutcome, TrendReport,
    MIN_TREND_YEARS,
};

fn persistence_text(persistence: Persistence) -> &'static str {
    match persistence {
        Persistence::High => "HIGH",
        Persistence::Moderate => "MODERATE",
        Persistence::Low => "LOW",
    }
}

fn strength_text(strength: SignalStrength) -> &'static str {
    match strength {
        SignalStrength::Strong => "STRONG",
        SignalStrength::Moderate => "MODERATE",
        SignalStrength::Weak => "WEAK",
    }
}

/// Render one trend report under a title
pub fn render_trend_report(title: &str, report: &TrendReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_report(&mut out, title, report);
    out
}

fn write_report(out: &mut String, title: &str, report: &TrendReport) -> std::fmt::Result {
    writeln!(out, "=== {} ===", title)?;
    let summary = match report {
        TrendReport::InsufficientData { years } => {
            writeln!(
                out,
                "Insufficient data: {} sufficient years ({} required)",
                years, MIN_TREND_YEARS
            )?;
            return Ok(());
        }
        TrendReport::Summary(summary) => summary,
    };

    writeln!(out, "Years: {} ({}-{})", summary.years, summary.first_year, summary.last_year)?;
    match summary.sens_slope {
        Some(slope) => writeln!(out, "Sen's slope: {:+.5} per year ({:+.4} per decade)", slope, slope * 10.0)?,
        None => writeln!(out, "Sen's slope: undefined")?,
    }

    if summary.change_points.is_empty() {
        writeln!(out, "Change points ({}-year windows): none", summary.params.change_point_window)?;
    } else {
        writeln!(out, "Change points ({}-year windows):", summary.params.change_point_window)?;
        for cp in &summary.change_points {
            let direction = match cp.direction {
                Direction::Increase => "increase",
                Direction::Decrease => "decrease",
            };
            writeln!(
                out,
                "  {}: {} ({:.3} -> {:.3}, {:+.3})",
                cp.year, direction, cp.mean_before, cp.mean_after, cp.difference
            )?;
        }
    }

    match &summary.variability {
        StatOutcome::Computed(v) => {
            let cv = v.cv_percent.map_or_else(|| "undefined".to_string(), |cv| format!("{:.2}%", cv));
            writeln!(out, "Mean: {:.4}  Std dev: {:.4}  CV: {}", v.mean, v.std_dev, cv)?;
            for (label, window) in [("Least variable", &v.min_window), ("Most variable", &v.max_window)] {
                if let Some(w) = window {
                    let cv = w.cv_percent.unwrap_or(0.0);
                    writeln!(
                        out,
                        "  {} {}-year window: {}-{} (CV {:.2}%)",
                        label, summary.params.rolling_cv_window, w.start_year, w.end_year, cv
                    )?;
                }
            }
        }
        StatOutcome::Insufficient { required, available } => {
            writeln!(out, "Variability: insufficient data ({} of {} years)", available, required)?
        }
    }

    let z_threshold = summary.params.anomaly_z_threshold;
    if summary.anomalies.is_empty() {
        writeln!(out, "Anomalies (|z| > {}): none", z_threshold)?;
    } else {
        writeln!(out, "Anomalies (|z| > {}):", z_threshold)?;
        for anomaly in &summary.anomalies {
            let kind = match anomaly.kind {
                AnomalyKind::High => "HIGH",
                AnomalyKind::Low => "LOW",
            };
            writeln!(out, "  {}: {:.4} (z = {:+.2}, {})", anomaly.year, anomaly.value, anomaly.z_score, kind)?;
        }
    }

    match &summary.autocorrelation {
        StatOutcome::Computed(Autocorrelation::Defined { r, persistence }) => writeln!(
            out,
            "Lag-1 autocorrelation: {:.3} ({} persistence)",
            r,
            persistence_text(*persistence)
        )?,
        StatOutcome::Computed(Autocorrelation::Undefined) => {
            writeln!(out, "Lag-1 autocorrelation: undefined (no variance)")?
        }
        StatOutcome::Insufficient { required, available } => writeln!(
            out,
            "Lag-1 autocorrelation: insufficient data ({} of {} years)",
            available, required
        )?,
    }

    match &summary.split_period {
        StatOutcome::Computed(split) => {
            writeln!(
                out,
                "Early {}-{}: {:.4}  Late {}-{}: {:.4}  Difference: {:+.4}",
                split.early_years.0,
                split.early_years.1,
                split.early_mean,
                split.late_years.0,
                split.late_years.1,
                split.late_mean,
                split.difference
            )?;
            match (split.relative_percent, split.strength) {
                (Some(pct), Some(strength)) => {
                    writeln!(out, "  Relative change: {:+.2}% ({} signal)", pct, strength_text(strength))?
                }
                _ => writeln!(out, "  Relative change: undefined")?,
            }
        }
        StatOutcome::Insufficient { required, available } => writeln!(
            out,
            "Split-period comparison: insufficient data ({} of {} years)",
            available, required
        )?,
    }
    Ok(())
}
