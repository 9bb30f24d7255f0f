//! glacier-albedo: export albedo tables and trend reports from sampled pixels

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use glacier_albedo::core::analysis::{run_analysis, AnalysisRequest};
use glacier_albedo::core::fraction_classifier::{FractionClass, FractionClassifier};
use glacier_albedo::io::{render_trend_report, CsvObservationReader, ExportFormatter};

#[derive(Parser, Debug)]
#[command(name = "glacier-albedo", about = "Quality-controlled glacier snow albedo analysis")]
struct Args {
    /// Sampled observation CSV
    #[arg(short, long)]
    observations: PathBuf,

    /// JSON analysis configuration; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Minimum NDSI snow cover (0-100)
    #[arg(long)]
    ndsi_threshold: Option<u8>,

    /// Glacier fraction threshold in percent
    #[arg(long)]
    fraction_threshold: Option<u8>,

    /// Minimum pixel count for a reported statistic
    #[arg(long)]
    min_pixels: Option<usize>,

    /// Restrict the season to July-August
    #[arg(long)]
    peak_melt_only: bool,

    /// First year analysed
    #[arg(long, requires = "end_year")]
    start_year: Option<i32>,

    /// Last year analysed
    #[arg(long, requires = "start_year")]
    end_year: Option<i32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the annual and daily tables
    Export {
        #[arg(short = 'd', long, default_value = "output")]
        out_dir: PathBuf,
    },
    /// Write the pixel-level table for one date
    Pixels {
        /// Date as YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        #[arg(short = 'f', long, default_value = "pixels.csv")]
        output: PathBuf,
    },
    /// Print trend reports for the threshold total and each class
    Trend {
        /// Only this class (border, mixed_low, mixed_high, mostly_ice, pure_ice)
        #[arg(long)]
        class: Option<String>,
    },
}

fn build_request(args: &Args) -> Result<AnalysisRequest> {
    let mut request = match &args.config {
        Some(path) => AnalysisRequest::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => AnalysisRequest::default(),
    };
    if let Some(ndsi) = args.ndsi_threshold {
        request = request.with_ndsi_threshold(ndsi);
    }
    if let Some(fraction) = args.fraction_threshold {
        request = request.with_fraction_threshold(fraction);
    }
    if let Some(min_pixels) = args.min_pixels {
        request = request.with_min_pixels(min_pixels);
    }
    if args.peak_melt_only {
        request = request.with_peak_melt_only(true);
    }
    if let (Some(first), Some(last)) = (args.start_year, args.end_year) {
        request = request.with_year_range(Some((first, last)));
    }
    request.validate()?;
    Ok(request)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let request = build_request(&args)?;
    let observations = CsvObservationReader::new(&args.observations)
        .read_all()
        .with_context(|| format!("reading {}", args.observations.display()))?;

    match &args.command {
        Command::Export { out_dir } => {
            std::fs::create_dir_all(out_dir)
                .with_context(|| format!("creating {}", out_dir.display()))?;
            let outcome = run_analysis(&request, &observations)?;
            let formatter = ExportFormatter::new(request.clone());
            formatter.write_annual_to_path(&outcome.annual, out_dir.join("annual_albedo.csv"))?;
            formatter.write_daily_to_path(&outcome.daily, out_dir.join("daily_albedo.csv"))?;
        }
        Command::Pixels { date, output } => {
            let request = request.with_selected_date(Some(*date));
            let outcome = run_analysis(&request, &observations)?;
            if outcome.selected_pixels.is_empty() {
                log::warn!("No observations on {}", date);
            }
            ExportFormatter::new(request).write_pixels_to_path(&outcome.selected_pixels, output)?;
        }
        Command::Trend { class } => {
            let only = match class {
                Some(name) => match FractionClass::from_name(name) {
                    Some(class) => Some(class),
                    None => bail!("unknown class '{}'", name),
                },
                None => None,
            };
            let classifier = FractionClassifier::with_breakpoints(request.breakpoints)?;
            let outcome = run_analysis(&request, &observations)?;
            if only.is_none() {
                if let Some(total) = &outcome.total_trend {
                    let title = format!("Glacier fraction >= {}%", request.fraction_threshold_pct);
                    println!("{}", render_trend_report(&title, total));
                }
            }
            for (class, report) in &outcome.class_trends {
                if only.map_or(true, |c| c == *class) {
                    println!("{}", render_trend_report(&classifier.label(*class), report));
                }
            }
        }
    }

    Ok(())
}
