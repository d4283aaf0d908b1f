// (px, py, vx, vy) ごとの許容値
pub const TOLERANCE: [f64; 4] = [0.09, 0.10, 0.40, 0.30];

type Vec4 = na::Vector4<f64>;

// (px, py, vx, vy) の逐次 RMSE, 1 ステップ O(1)
#[derive(Debug, Clone)]
pub struct Rmse {
    sum: Vec4,
    compensation: Vec4,
    last: Vec4,
    count: u64,
    exceeded: [bool; 4],
    warnings: usize,
}

impl Default for Rmse {
    fn default() -> Self {
        Self {
            sum: Vec4::zeros(),
            compensation: Vec4::zeros(),
            last: Vec4::zeros(),
            count: 0,
            exceeded: [false; 4],
            warnings: 0,
        }
    }
}

impl Rmse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, estimate: &Vec4, truth: &Vec4) -> Vec4 {
        self.count += 1;

        let residual = (estimate - truth).map(|e| e * e);
        // Kahan の補正加算
        let y = residual + self.compensation;
        let sum = self.sum + y;
        self.compensation = y - (sum - self.sum);
        self.sum = sum;

        self.last = (self.sum / self.count as f64).map(f64::sqrt);
        self.check_tolerance();
        self.last
    }

    // 不正な入力は警告して前回の値を返す
    pub fn update_slices(&mut self, estimate: &[f64], truth: &[f64]) -> Vec4 {
        if estimate.is_empty() || truth.is_empty() {
            log::warn!("rmse: empty estimate or ground truth");
            return self.last;
        }
        if estimate.len() != truth.len() {
            log::warn!(
                "rmse: sizes of estimate ({}) and ground truth ({}) do not match",
                estimate.len(),
                truth.len()
            );
            return self.last;
        }
        if estimate.len() != 4 {
            log::warn!("rmse: expected 4 components, got {}", estimate.len());
            return self.last;
        }
        self.update(&Vec4::from_column_slice(estimate), &Vec4::from_column_slice(truth))
    }

    fn check_tolerance(&mut self) {
        let mut crossed = false;
        for (i, tol) in TOLERANCE.iter().enumerate() {
            let over = self.last[i] > *tol;
            crossed |= over && !self.exceeded[i];
            self.exceeded[i] = over;
        }
        if crossed {
            self.warnings += 1;
            log::warn!(
                "step {}: rmse = [{:.4}, {:.4}, {:.4}, {:.4}] exceeds tolerances {:?}",
                self.count,
                self.last[0],
                self.last[1],
                self.last[2],
                self.last[3],
                TOLERANCE
            );
        }
    }

    pub fn value(&self) -> Vec4 {
        self.last
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn exceeded(&self) -> [bool; 4] {
        self.exceeded
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// 全履歴から再計算する RMSE
pub fn calculate_rmse(estimations: &[Vec4], ground_truth: &[Vec4]) -> Vec4 {
    if estimations.is_empty() || estimations.len() != ground_truth.len() {
        log::warn!("invalid estimation or ground truth data");
        return Vec4::zeros();
    }
    let sum = estimations
        .iter()
        .zip(ground_truth)
        .fold(Vec4::zeros(), |acc, (e, t)| acc + (e - t).map(|r| r * r));
    (sum / estimations.len() as f64).map(f64::sqrt)
}
