use crate::config::UkfConfig;
use crate::data::Sample;
use crate::error::{Error, Result};
use crate::measurement::Measurement;
use crate::ukf::{ctrv, normalize_angle, to_cartesian, AugState, State, N_X};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

// 各ステップで観測するセンサ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorPattern {
    Alternate,
    LaserOnly,
    RadarOnly,
}

#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    pub seed: u64,
    // 真の初期状態 (px, py, v, yaw, yaw_rate)
    pub x0: State,
    pub start_us: u64,
    pub dt_us: u64,
    pub steps: usize,
    // 真の加速度 / ヨー角加速度の標準偏差
    pub std_a: f64,
    pub std_yawdd: f64,
    pub pattern: SensorPattern,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            // センサ原点から数 m 離して開始する
            x0: na::vector![4.0, 4.0, 5.2, 0.0, 0.2],
            start_us: 1_477_010_443_000_000,
            dt_us: 50_000,
            steps: 500,
            std_a: 0.3,
            std_yawdd: 0.05,
            pattern: SensorPattern::Alternate,
        }
    }
}

// CTRV の真の軌道とノイズ付き観測を生成する. 観測ノイズは UkfConfig の標準偏差に従う
pub struct Simulator {
    rng: Xoshiro256PlusPlus,
    config: SimConfig,
    x: State,
    time_us: u64,
    step: usize,
    accel: [Normal<f64>; 2],
    laser: [Normal<f64>; 2],
    radar: [Normal<f64>; 3],
}

impl Simulator {
    pub fn new(config: SimConfig, sensors: &UkfConfig) -> Result<Self> {
        let normal = |std: f64| {
            // Normal::new は負の標準偏差を通すので先に弾く
            if !std.is_finite() || std < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "noise std must be finite and non-negative, got {std}"
                )));
            }
            Normal::new(0.0, std).map_err(|e| Error::InvalidConfig(format!("noise std {std}: {e}")))
        };
        Ok(Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(config.seed),
            x: config.x0,
            time_us: config.start_us,
            step: 0,
            accel: [normal(config.std_a)?, normal(config.std_yawdd)?],
            laser: [normal(sensors.std_laspx)?, normal(sensors.std_laspy)?],
            radar: [
                normal(sensors.std_radr)?,
                normal(sensors.std_radphi)?,
                normal(sensors.std_radrd)?,
            ],
            config,
        })
    }

    pub fn truth(&self) -> State {
        self.x
    }

    fn advance(&mut self) {
        let dt = self.config.dt_us as f64 / 1e6;
        let mut aug = AugState::zeros();
        aug.fixed_rows_mut::<N_X>(0).copy_from(&self.x);
        aug[5] = self.accel[0].sample(&mut self.rng);
        aug[6] = self.accel[1].sample(&mut self.rng);
        self.x = ctrv(&aug, dt);
        self.x[3] = normalize_angle(self.x[3]);
        self.time_us += self.config.dt_us;
    }

    fn measure(&mut self) -> Measurement {
        let laser = match self.config.pattern {
            SensorPattern::Alternate => self.step % 2 == 0,
            SensorPattern::LaserOnly => true,
            SensorPattern::RadarOnly => false,
        };
        let (px, py, v, yaw) = (self.x[0], self.x[1], self.x[2], self.x[3]);
        if laser {
            Measurement::laser(
                self.time_us,
                px + self.laser[0].sample(&mut self.rng),
                py + self.laser[1].sample(&mut self.rng),
            )
        } else {
            let rho = (px * px + py * py).sqrt();
            let rho_dot = if rho > 0.0 {
                (px * yaw.cos() * v + py * yaw.sin() * v) / rho
            } else {
                0.0
            };
            Measurement::radar(
                self.time_us,
                (rho + self.radar[0].sample(&mut self.rng)).max(0.0),
                normalize_angle(py.atan2(px) + self.radar[1].sample(&mut self.rng)),
                rho_dot + self.radar[2].sample(&mut self.rng),
            )
        }
    }
}

impl Iterator for Simulator {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if self.step >= self.config.steps {
            return None;
        }
        if self.step > 0 {
            self.advance();
        }
        let measurement = self.measure();
        self.step += 1;
        Some(Sample {
            measurement,
            ground_truth: to_cartesian(&self.x),
        })
    }
}
