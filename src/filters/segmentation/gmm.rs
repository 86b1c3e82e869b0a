//! Full-covariance Gaussian mixture over RGB samples

/// Components per colour model
pub const COMPONENTS: usize = 5;

const COVARIANCE_REGULARIZATION: f64 = 0.01;

#[derive(Debug, Clone, Copy, Default)]
struct Component {
    weight: f64,
    mean: [f64; 3],
    inverse: [[f64; 3]; 3],
    /// `1 / sqrt(det(covariance))`
    norm: f64,
}

impl Component {
    fn density(&self, x: &[f64; 3]) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        let d = [x[0] - self.mean[0], x[1] - self.mean[1], x[2] - self.mean[2]];
        let mut quad = 0.0;
        for (i, row) in self.inverse.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                quad += d[i] * value * d[j];
            }
        }
        self.norm * (-0.5 * quad).exp()
    }
}

/// Colour model for one side of the cut
#[derive(Debug, Clone, Default)]
pub struct Gmm {
    components: [Component; COMPONENTS],
}

impl Gmm {
    /// Fit from samples and their component assignment
    ///
    /// Components without samples get zero weight. Every covariance gets a
    /// small diagonal term so flat colour regions stay invertible.
    #[must_use]
    pub fn fit(samples: &[[f64; 3]], assignment: &[usize]) -> Self {
        let mut sums = [[0.0_f64; 3]; COMPONENTS];
        let mut products = [[[0.0_f64; 3]; 3]; COMPONENTS];
        let mut counts = [0usize; COMPONENTS];

        for (x, &k) in samples.iter().zip(assignment) {
            counts[k] += 1;
            for i in 0..3 {
                sums[k][i] += x[i];
                for j in 0..3 {
                    products[k][i][j] += x[i] * x[j];
                }
            }
        }

        let total = samples.len().max(1) as f64;
        let mut gmm = Self::default();
        for k in 0..COMPONENTS {
            if counts[k] == 0 {
                continue;
            }
            let n = counts[k] as f64;
            let mean = [sums[k][0] / n, sums[k][1] / n, sums[k][2] / n];
            let mut cov = [[0.0_f64; 3]; 3];
            for i in 0..3 {
                for j in 0..3 {
                    cov[i][j] = products[k][i][j] / n - mean[i] * mean[j];
                }
                cov[i][i] += COVARIANCE_REGULARIZATION;
            }

            let det = determinant(&cov);
            if det <= f64::EPSILON {
                continue;
            }
            gmm.components[k] = Component {
                weight: n / total,
                mean,
                inverse: inverse(&cov, det),
                norm: 1.0 / det.sqrt(),
            };
        }
        gmm
    }

    /// Deterministic initial fit: samples sorted by brightness and split into
    /// equally sized runs, one per component
    #[must_use]
    pub fn initial(samples: &[[f64; 3]]) -> Self {
        let mut order: Vec<usize> = (0..samples.len()).collect();
        order.sort_by(|&a, &b| {
            let la = samples[a].iter().sum::<f64>();
            let lb = samples[b].iter().sum::<f64>();
            la.total_cmp(&lb)
        });
        let mut assignment = vec![0usize; samples.len()];
        let n = samples.len().max(1);
        for (rank, &idx) in order.iter().enumerate() {
            assignment[idx] = (rank * COMPONENTS / n).min(COMPONENTS - 1);
        }
        Self::fit(samples, &assignment)
    }

    /// Weighted mixture density
    #[must_use]
    pub fn probability(&self, x: &[f64; 3]) -> f64 {
        self.components.iter().map(|c| c.weight * c.density(x)).sum()
    }

    /// Component that explains `x` best
    #[must_use]
    pub fn most_likely_component(&self, x: &[f64; 3]) -> usize {
        let mut best = (0, -1.0);
        for (k, c) in self.components.iter().enumerate() {
            let p = c.weight * c.density(x);
            if p > best.1 {
                best = (k, p);
            }
        }
        best.0
    }

    /// `-ln p(x)`, finite even where the density underflows
    #[must_use]
    pub fn neg_log_likelihood(&self, x: &[f64; 3]) -> f64 {
        -self.probability(x).max(f64::MIN_POSITIVE).ln()
    }
}

fn determinant(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]) - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

fn inverse(m: &[[f64; 3]; 3], det: f64) -> [[f64; 3]; 3] {
    let inv_det = 1.0 / det;
    [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ]
}
