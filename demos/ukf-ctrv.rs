use anyhow::Result;
use ctrv_ukf::sim::{SimConfig, Simulator};
use ctrv_ukf::{Tracker, UkfConfig};

fn main() -> Result<()> {
    simple_logger::init_with_level(log::Level::Warn)?;

    let config = UkfConfig::default();
    let sim = SimConfig {
        seed: 42,
        steps: 200,
        ..SimConfig::default()
    };
    let mut tracker = Tracker::new(config)?;

    for sample in Simulator::new(sim, &config)? {
        let r = tracker.step(&sample)?;
        print!(
            "{} x_act: ({:7.2},{:7.2},{:7.2},{:7.2}) ",
            r.sensor, r.gt_px, r.gt_py, r.gt_vx, r.gt_vy
        );
        print!("x_obs: ({:7.2},{:7.2}) ", r.meas_px, r.meas_py);
        print!(
            "x_est: ({:7.2},{:7.2},{:7.2},{:7.2}) ",
            r.px, r.py, r.vx, r.vy
        );
        match r.nis {
            Some(nis) => println!("nis: {:6.2}", nis),
            None => println!(),
        }
    }

    let rmse = tracker.rmse().value();
    println!(
        "RMSE: px {:.4} py {:.4} vx {:.4} vy {:.4}",
        rmse[0], rmse[1], rmse[2], rmse[3]
    );
    Ok(())
}
