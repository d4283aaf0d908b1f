use crate::error::{Error, Result};

// フィルタのパラメータ (生成時に固定)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UkfConfig {
    // false のセンサは初期化以外では無視する
    pub use_laser: bool,
    pub use_radar: bool,
    // プロセスノイズ [m/s^2], [rad/s^2]
    pub std_a: f64,
    pub std_yawdd: f64,
    // レーザ観測ノイズ [m]
    pub std_laspx: f64,
    pub std_laspy: f64,
    // レーダ観測ノイズ [m], [rad], [m/s]
    pub std_radr: f64,
    pub std_radphi: f64,
    pub std_radrd: f64,
}

impl Default for UkfConfig {
    fn default() -> Self {
        Self {
            use_laser: true,
            use_radar: true,
            std_a: 3.0,
            std_yawdd: 0.5,
            std_laspx: 0.15,
            std_laspy: 0.15,
            std_radr: 0.3,
            std_radphi: 0.03,
            std_radrd: 0.3,
        }
    }
}

impl UkfConfig {
    pub fn with_sensors(mut self, use_laser: bool, use_radar: bool) -> Self {
        self.use_laser = use_laser;
        self.use_radar = use_radar;
        self
    }

    pub fn with_process_noise(mut self, std_a: f64, std_yawdd: f64) -> Self {
        self.std_a = std_a;
        self.std_yawdd = std_yawdd;
        self
    }

    pub fn with_laser_noise(mut self, std_laspx: f64, std_laspy: f64) -> Self {
        self.std_laspx = std_laspx;
        self.std_laspy = std_laspy;
        self
    }

    pub fn with_radar_noise(mut self, std_radr: f64, std_radphi: f64, std_radrd: f64) -> Self {
        self.std_radr = std_radr;
        self.std_radphi = std_radphi;
        self.std_radrd = std_radrd;
        self
    }

    // プロセスノイズは 0 可, 観測ノイズは S の逆行列のため正
    pub fn validate(&self) -> Result<()> {
        let process = [("std_a", self.std_a), ("std_yawdd", self.std_yawdd)];
        for (name, value) in process {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        let sensor = [
            ("std_laspx", self.std_laspx),
            ("std_laspy", self.std_laspy),
            ("std_radr", self.std_radr),
            ("std_radphi", self.std_radphi),
            ("std_radrd", self.std_radrd),
        ];
        for (name, value) in sensor {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn laser_noise(&self) -> na::Matrix2<f64> {
        na::Matrix2::from_diagonal(&na::vector![
            self.std_laspx * self.std_laspx,
            self.std_laspy * self.std_laspy
        ])
    }

    pub fn radar_noise(&self) -> na::Matrix3<f64> {
        na::Matrix3::from_diagonal(&na::vector![
            self.std_radr * self.std_radr,
            self.std_radphi * self.std_radphi,
            self.std_radrd * self.std_radrd
        ])
    }
}
