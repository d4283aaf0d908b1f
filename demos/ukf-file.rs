use anyhow::{bail, Context, Result};
use clap::Parser;
use ctrv_ukf::data::{EstimateWriter, SampleReader};
use ctrv_ukf::ukf::{NIS_95_LASER, NIS_95_RADAR};
use ctrv_ukf::{SensorKind, Tracker, UkfConfig};
use std::path::PathBuf;

/// Runs the CTRV UKF over a tracking data file and logs the estimates as CSV.
#[derive(Parser, Debug)]
struct Args {
    /// tab-separated measurement file
    input: PathBuf,

    /// output CSV (default: logs/ukf-<time>.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    no_laser: bool,

    #[arg(long)]
    no_radar: bool,

    /// process noise std, longitudinal acceleration [m/s^2]
    #[arg(long, default_value_t = 3.0)]
    std_a: f64,

    /// process noise std, yaw acceleration [rad/s^2]
    #[arg(long, default_value_t = 0.5)]
    std_yawdd: f64,

    #[arg(long, default_value_t = log::Level::Info)]
    log_level: log::Level,
}

fn main() -> Result<()> {
    let args = Args::parse();
    simple_logger::init_with_level(args.log_level)?;

    if args.no_laser && args.no_radar {
        bail!("at least one sensor must stay enabled");
    }
    let config = UkfConfig::default()
        .with_sensors(!args.no_laser, !args.no_radar)
        .with_process_noise(args.std_a, args.std_yawdd);

    let output = match args.output {
        Some(path) => path,
        None => {
            std::fs::create_dir_all("logs")?;
            let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
            PathBuf::from(format!("logs/ukf-{stamp}.csv"))
        }
    };

    let reader = SampleReader::from_path(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let mut wtr = EstimateWriter::from_path(&output)?;
    let mut tracker = Tracker::new(config)?;

    // NIS の 95% 超過回数
    let mut over = [(0usize, 0usize); 2];
    for sample in reader {
        let record = tracker.step(&sample?)?;
        if let (Some(kind), Some(nis)) = (record.kind(), record.nis) {
            let (i, limit) = match kind {
                SensorKind::Laser => (0, NIS_95_LASER),
                SensorKind::Radar => (1, NIS_95_RADAR),
            };
            over[i].1 += 1;
            if nis > limit {
                over[i].0 += 1;
            }
        }
        wtr.write(&record)?;
    }
    wtr.flush()?;

    let rmse = tracker.rmse().value();
    log::info!("wrote {} estimates to {}", tracker.rmse().count(), output.display());
    println!(
        "RMSE: px {:.4} py {:.4} vx {:.4} vy {:.4}",
        rmse[0], rmse[1], rmse[2], rmse[3]
    );
    for (name, (n, total)) in ["laser", "radar"].iter().zip(over) {
        if total > 0 {
            println!(
                "{name} NIS above 95%: {n}/{total} ({:.1}%)",
                100.0 * n as f64 / total as f64
            );
        }
    }
    Ok(())
}
