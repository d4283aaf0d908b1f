extern crate nalgebra as na;

pub mod config;
pub mod data;
pub mod error;
pub mod measurement;
pub mod rmse;
pub mod sim;
pub mod tracker;
pub mod ukf;

pub use config::UkfConfig;
pub use error::{Error, Result};
pub use measurement::{Measurement, SensorData, SensorKind};
pub use rmse::Rmse;
pub use tracker::Tracker;
pub use ukf::UnscentedKalmanFilter;
