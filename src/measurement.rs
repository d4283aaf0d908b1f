use std::fmt;

// センサの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Laser,
    Radar,
}

impl SensorKind {
    pub fn tag(&self) -> &'static str {
        match self {
            SensorKind::Laser => "L",
            SensorKind::Radar => "R",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Laser => write!(f, "laser"),
            SensorKind::Radar => write!(f, "radar"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorData {
    // (px, py) [m]
    Laser(na::Vector2<f64>),
    // (rho [m], phi [rad], rho_dot [m/s])
    Radar(na::Vector3<f64>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    // [us]
    pub timestamp: u64,
    pub data: SensorData,
}

impl Measurement {
    pub fn laser(timestamp: u64, px: f64, py: f64) -> Self {
        Self {
            timestamp,
            data: SensorData::Laser(na::Vector2::new(px, py)),
        }
    }

    pub fn radar(timestamp: u64, rho: f64, phi: f64, rho_dot: f64) -> Self {
        Self {
            timestamp,
            data: SensorData::Radar(na::Vector3::new(rho, phi, rho_dot)),
        }
    }

    pub fn kind(&self) -> SensorKind {
        match self.data {
            SensorData::Laser(_) => SensorKind::Laser,
            SensorData::Radar(_) => SensorKind::Radar,
        }
    }

    // 観測位置 (直交座標)
    pub fn position(&self) -> na::Vector2<f64> {
        match self.data {
            SensorData::Laser(z) => z,
            SensorData::Radar(z) => na::Vector2::new(z[0] * z[1].cos(), z[0] * z[1].sin()),
        }
    }
}
