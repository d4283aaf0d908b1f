use crate::config::UkfConfig;
use crate::error::{Error, Result};
use crate::measurement::{Measurement, SensorData, SensorKind};
use std::f64::consts::{PI, TAU};

// 状態空間の次元 (px, py, v, yaw, yaw_rate)
pub const N_X: usize = 5;
// 拡張状態の次元 (加速度ノイズ nu_a, nu_yawdd を追加)
pub const N_AUG: usize = N_X + 2;
// シグマ点の数
pub const M: usize = 2 * N_AUG + 1;

// NIS の 95% 閾値 (カイ二乗分布, 自由度 2 / 3)
pub const NIS_95_LASER: f64 = 5.991;
pub const NIS_95_RADAR: f64 = 7.815;

pub type State = na::SVector<f64, N_X>;
pub type AugState = na::SVector<f64, N_AUG>;
pub type Cov<const S: usize> = na::SMatrix<f64, S, S>;
pub type Sigma<const S: usize> = na::SMatrix<f64, S, M>;
type Weights = na::SVector<f64, M>;

// CTRV モデルの UKF
#[derive(Debug, Clone)]
pub struct UnscentedKalmanFilter {
    config: UkfConfig,
    initialized: bool,
    time_us: u64,
    x: State,
    p: Cov<N_X>,
    r_laser: Cov<2>,
    r_radar: Cov<3>,
    weights: Weights,
    sigma_aug: Sigma<N_AUG>,
    sigma_pred: Sigma<N_X>,
    nis_laser: Option<f64>,
    nis_radar: Option<f64>,
}

impl UnscentedKalmanFilter {
    // これ以下のヨーレートは直進モデル
    pub const EPS: f64 = 1e-3;
    const N: f64 = N_AUG as f64;
    const LAMBDA: f64 = 3.0 - Self::N;

    pub fn new(config: UkfConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            initialized: false,
            time_us: 0,
            x: State::zeros(),
            p: Cov::<N_X>::zeros(),
            r_laser: config.laser_noise(),
            r_radar: config.radar_noise(),
            weights: Weights::from_column_slice(sigma_weights(N_AUG).as_slice()),
            sigma_aug: Sigma::<N_AUG>::zeros(),
            sigma_pred: Sigma::<N_X>::zeros(),
            nis_laser: None,
            nis_radar: None,
        })
    }

    pub fn from_state(config: UkfConfig, x: State, p: Cov<N_X>, time_us: u64) -> Result<Self> {
        let mut ukf = Self::new(config)?;
        if !x.iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidConfig(format!("non-finite state {}", x.transpose())));
        }
        let asym = (p - p.transpose()).amax();
        if asym > 1e-9 * p.amax().max(1.0) || p.cholesky().is_none() {
            return Err(Error::InvalidConfig(
                "initial covariance must be symmetric positive definite".into(),
            ));
        }
        ukf.x = x;
        ukf.x[3] = normalize_angle(x[3]);
        ukf.p = p;
        ukf.time_us = time_us;
        ukf.initialized = true;
        Ok(ukf)
    }

    pub fn process(&mut self, m: &Measurement) -> Result<()> {
        if !self.initialized {
            self.initialize(m);
            return Ok(());
        }

        // 時刻の逆転は負の dt として扱う
        let dt = (m.timestamp as i128 - self.time_us as i128) as f64 / 1e6;
        self.time_us = m.timestamp;
        self.predict(dt)?;

        match m.data {
            SensorData::Laser(z) if self.config.use_laser => self.update_laser(&z)?,
            SensorData::Radar(z) if self.config.use_radar => self.update_radar(&z)?,
            _ => log::trace!("{} update disabled, prediction only", m.kind()),
        }

        log::debug!("x = {}", self.x.transpose());
        log::debug!("P = {}", self.p);
        Ok(())
    }

    fn initialize(&mut self, m: &Measurement) {
        self.x = match m.data {
            SensorData::Laser(z) => na::vector![z[0], z[1], 0.0, 0.0, 0.0],
            SensorData::Radar(z) => {
                let (rho, phi, rho_dot) = (z[0], z[1], z[2]);
                let vx = rho_dot * phi.cos();
                let vy = rho_dot * phi.sin();
                na::vector![
                    rho * phi.cos(),
                    rho * phi.sin(),
                    (vx * vx + vy * vy).sqrt(),
                    0.0,
                    0.0
                ]
            }
        };
        self.p = Cov::<N_X>::identity();
        self.time_us = m.timestamp;
        self.initialized = true;
        log::info!(
            "initialized from {} at t={}us: x = {}",
            m.kind(),
            m.timestamp,
            self.x.transpose()
        );
    }

    pub fn predict(&mut self, dt: f64) -> Result<()> {
        self.sigma_aug =
            Self::augmented_sigma_points(&self.x, &self.p, self.config.std_a, self.config.std_yawdd)?;
        for i in 0..M {
            let col = self.sigma_aug.column(i).into_owned();
            self.sigma_pred.set_column(i, &ctrv(&col, dt));
        }

        let x = self.sigma_pred * self.weights;
        let mut p = Cov::<N_X>::zeros();
        for i in 0..M {
            let mut d = self.sigma_pred.column(i) - x;
            d[3] = normalize_angle(d[3]);
            p += self.weights[i] * d * d.transpose();
        }
        self.x = x;
        self.x[3] = normalize_angle(self.x[3]);
        self.p = p;
        Ok(())
    }

    // P_aug はブロック対角なので chol(P) とノイズの標準偏差を並べれば下三角分解になる
    pub fn augmented_sigma_points(
        x: &State,
        p: &Cov<N_X>,
        std_a: f64,
        std_yawdd: f64,
    ) -> Result<Sigma<N_AUG>> {
        let mut x_aug = AugState::zeros();
        x_aug.fixed_rows_mut::<N_X>(0).copy_from(x);

        let l = (*p).cholesky().ok_or(Error::NotPositiveDefinite)?.l();
        let mut a = Cov::<N_AUG>::zeros();
        a.fixed_view_mut::<N_X, N_X>(0, 0).copy_from(&l);
        a[(5, 5)] = std_a;
        a[(6, 6)] = std_yawdd;

        let spread = (Self::LAMBDA + Self::N).sqrt();
        let mut sigma = Sigma::<N_AUG>::zeros();
        sigma.set_column(0, &x_aug);
        for i in 0..N_AUG {
            sigma.set_column(1 + i, &(x_aug + spread * a.column(i)));
            sigma.set_column(1 + N_AUG + i, &(x_aug - spread * a.column(i)));
        }
        Ok(sigma)
    }

    fn update_laser(&mut self, z: &na::Vector2<f64>) -> Result<()> {
        let r = self.r_laser;
        let nis = self.update(z, laser_hx, &r, None, SensorKind::Laser)?;
        self.nis_laser = Some(nis);
        Ok(())
    }

    fn update_radar(&mut self, z: &na::Vector3<f64>) -> Result<()> {
        let r = self.r_radar;
        let nis = self.update(z, radar_hx, &r, Some(1), SensorKind::Radar)?;
        self.nis_radar = Some(nis);
        Ok(())
    }

    // angle: 角度を持つ観測の行. 戻り値は NIS
    fn update<const Z: usize, F>(
        &mut self,
        z: &na::SVector<f64, Z>,
        hx: F,
        r: &Cov<Z>,
        angle: Option<usize>,
        sensor: SensorKind,
    ) -> Result<f64>
    where
        F: Fn(&State) -> na::SVector<f64, Z>,
    {
        let wrap = |mut v: na::SVector<f64, Z>| {
            if let Some(k) = angle {
                v[k] = normalize_angle(v[k]);
            }
            v
        };

        let mut sigmas_h = Sigma::<Z>::zeros();
        for i in 0..M {
            sigmas_h.set_column(i, &hx(&self.sigma_pred.column(i).into_owned()));
        }
        let mut z_pred = sigmas_h * self.weights;
        if let Some(k) = angle {
            // +-pi をまたぐ方位角は中心シグマ点からの差分で平均する
            let center = sigmas_h[(k, 0)];
            z_pred[k] = center
                + (0..M)
                    .map(|i| self.weights[i] * normalize_angle(sigmas_h[(k, i)] - center))
                    .sum::<f64>();
        }
        let z_pred = wrap(z_pred);

        let mut s = Cov::<Z>::zeros();
        let mut t = na::SMatrix::<f64, N_X, Z>::zeros();
        for i in 0..M {
            let dz = wrap(sigmas_h.column(i) - z_pred);
            let mut dx = self.sigma_pred.column(i) - self.x;
            dx[3] = normalize_angle(dx[3]);
            s += self.weights[i] * dz * dz.transpose();
            t += self.weights[i] * dx * dz.transpose();
        }
        s += r;

        let s_inv = s.try_inverse().ok_or(Error::SingularInnovation { sensor })?;
        let k = t * s_inv;
        let dz = wrap(z - z_pred);
        let mut x = self.x + k * dz;
        x[3] = normalize_angle(x[3]);
        let p = self.p - k * s * k.transpose();
        // 対称性の維持
        let p = (p + p.transpose()) / 2.0;
        // 正定値でなくなった事後分布は採用しない
        if p.cholesky().is_none() {
            log::warn!("{sensor} update left the covariance indefinite: {p}");
            return Err(Error::NotPositiveDefinite);
        }
        self.x = x;
        self.p = p;

        Ok((dz.transpose() * s_inv * dz)[0])
    }

    pub fn state(&self) -> State {
        if !self.initialized {
            log::warn!("state queried before the filter was initialized");
        }
        self.x
    }

    pub fn covariance(&self) -> Cov<N_X> {
        if !self.initialized {
            log::warn!("covariance queried before the filter was initialized");
        }
        self.p
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    // 最後に処理した観測の時刻 [us]
    pub fn timestamp(&self) -> u64 {
        self.time_us
    }

    pub fn config(&self) -> &UkfConfig {
        &self.config
    }

    pub fn nis(&self, sensor: SensorKind) -> Option<f64> {
        match sensor {
            SensorKind::Laser => self.nis_laser,
            SensorKind::Radar => self.nis_radar,
        }
    }

    pub fn reset(&mut self) {
        self.initialized = false;
        self.time_us = 0;
        self.x = State::zeros();
        self.p = Cov::<N_X>::zeros();
        self.nis_laser = None;
        self.nis_radar = None;
    }
}

// シグマ点の重み (lambda = 3 - n_aug)
pub fn sigma_weights(n_aug: usize) -> na::DVector<f64> {
    let n = n_aug as f64;
    let lambda = 3.0 - n;
    let mut w = na::DVector::from_element(2 * n_aug + 1, 0.5 / (lambda + n));
    w[0] = lambda / (lambda + n);
    w
}

// 角度を (-pi, pi] に正規化
pub fn normalize_angle(theta: f64) -> f64 {
    let r = theta - TAU * (theta / TAU).round();
    if r <= -PI {
        r + TAU
    } else if r > PI {
        r - TAU
    } else {
        r
    }
}

// (px, py, vx, vy) へ変換
pub fn to_cartesian(x: &State) -> na::Vector4<f64> {
    let (v, yaw) = (x[2], x[3]);
    na::vector![x[0], x[1], v * yaw.cos(), v * yaw.sin()]
}

// 状態遷移関数 (CTRV)
pub fn ctrv(x: &AugState, dt: f64) -> State {
    let (px, py, v, yaw, yawd) = (x[0], x[1], x[2], x[3], x[4]);
    let (nu_a, nu_yawdd) = (x[5], x[6]);

    let (dx, dy) = if yawd.abs() > UnscentedKalmanFilter::EPS {
        turning(v, yaw, yawd, dt)
    } else {
        straight(v, yaw, dt)
    };
    let dt2 = dt * dt;

    na::vector![
        px + dx + 0.5 * nu_a * dt2 * yaw.cos(),
        py + dy + 0.5 * nu_a * dt2 * yaw.sin(),
        v + nu_a * dt,
        yaw + yawd * dt + 0.5 * nu_yawdd * dt2,
        yawd + nu_yawdd * dt
    ]
}

fn turning(v: f64, yaw: f64, yawd: f64, dt: f64) -> (f64, f64) {
    let yaw_p = yaw + yawd * dt;
    (
        v / yawd * (yaw_p.sin() - yaw.sin()),
        v / yawd * (yaw.cos() - yaw_p.cos()),
    )
}

fn straight(v: f64, yaw: f64, dt: f64) -> (f64, f64) {
    (v * dt * yaw.cos(), v * dt * yaw.sin())
}

// 観測関数 (laser)
fn laser_hx(x: &State) -> na::Vector2<f64> {
    na::vector![x[0], x[1]]
}

// 観測関数 (radar)
fn radar_hx(x: &State) -> na::Vector3<f64> {
    let (px, py, v, yaw) = (x[0], x[1], x[2], x[3]);
    let r = (px * px + py * py).sqrt();
    let r_dot = if r > UnscentedKalmanFilter::EPS {
        (px * yaw.cos() * v + py * yaw.sin() * v) / r
    } else {
        0.0
    };
    na::vector![r, py.atan2(px), r_dot]
}
