use crate::config::UkfConfig;
use crate::data::{EstimateRecord, Sample};
use crate::error::Result;
use crate::rmse::Rmse;
use crate::ukf::{to_cartesian, UnscentedKalmanFilter};

pub struct Tracker {
    ukf: UnscentedKalmanFilter,
    rmse: Rmse,
}

impl Tracker {
    pub fn new(config: UkfConfig) -> Result<Self> {
        Ok(Self {
            ukf: UnscentedKalmanFilter::new(config)?,
            rmse: Rmse::new(),
        })
    }

    pub fn step(&mut self, sample: &Sample) -> Result<EstimateRecord> {
        let m = &sample.measurement;
        self.ukf.process(m)?;
        let x = self.ukf.state();
        let rmse = self.rmse.update(&to_cartesian(&x), &sample.ground_truth);
        Ok(EstimateRecord::new(sample, &x, self.ukf.nis(m.kind()), &rmse))
    }

    pub fn filter(&self) -> &UnscentedKalmanFilter {
        &self.ukf
    }

    pub fn rmse(&self) -> &Rmse {
        &self.rmse
    }

    // 新しい走行: フィルタも RMSE も最初から
    pub fn reset(&mut self) {
        self.ukf.reset();
        self.rmse.reset();
    }
}
