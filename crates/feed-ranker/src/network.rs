//! Feed-forward engagement network
//!
//! One ReLU hidden layer and a softmax head over the three engagement
//! classes, trained with full-batch gradient descent on cross-entropy loss.
//!
//! Shapes:
//! - `w1`: [input_dim, hidden]
//! - `w2`: [hidden, 3]

use crate::error::RankerError;
use crate::types::EngagementClass;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;

#[derive(Debug, Clone)]
pub struct EngagementNetwork {
    w1: Array2<f32>,
    b1: Array1<f32>,
    w2: Array2<f32>,
    b2: Array1<f32>,
}

/// Class probabilities for one input row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassProbabilities {
    pub negative: f32,
    pub neutral: f32,
    pub positive: f32,
}

impl ClassProbabilities {
    /// Signed contrast consumed by the selector
    pub fn contrast(&self) -> f32 {
        self.positive - self.negative
    }
}

impl EngagementNetwork {
    /// Create a network with Xavier-uniform weights
    pub fn new(input_dim: usize, hidden: usize, rng: &mut impl Rng) -> Self {
        let classes = EngagementClass::COUNT;
        Self {
            w1: Self::xavier(input_dim, hidden, rng),
            b1: Array1::zeros(hidden),
            w2: Self::xavier(hidden, classes, rng),
            b2: Array1::zeros(classes),
        }
    }

    fn xavier(fan_in: usize, fan_out: usize, rng: &mut impl Rng) -> Array2<f32> {
        let limit = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
        Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-limit..limit))
    }

    pub fn input_dim(&self) -> usize {
        self.w1.nrows()
    }

    fn hidden(&self, inputs: &ArrayView2<f32>) -> (Array2<f32>, Array2<f32>) {
        let pre = inputs.dot(&self.w1) + &self.b1;
        let activated = pre.mapv(|v| v.max(0.0));
        (pre, activated)
    }

    fn softmax_rows(mut logits: Array2<f32>) -> Array2<f32> {
        for mut row in logits.rows_mut() {
            let max = row.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            if sum > 0.0 {
                row.mapv_inplace(|v| v / sum);
            }
        }
        logits
    }

    /// Class probabilities for a batch of rows
    pub fn forward(&self, inputs: &ArrayView2<f32>) -> Result<Array2<f32>, RankerError> {
        if inputs.ncols() != self.input_dim() {
            return Err(RankerError::DimensionMismatch {
                expected: self.input_dim(),
                actual: inputs.ncols(),
            });
        }
        let (_, hidden) = self.hidden(inputs);
        let logits = hidden.dot(&self.w2) + &self.b2;
        Ok(Self::softmax_rows(logits))
    }

    /// Class probabilities for a single feature vector
    pub fn predict(&self, features: &[f32]) -> Result<ClassProbabilities, RankerError> {
        let inputs = Array2::from_shape_vec((1, features.len()), features.to_vec())?;
        let probabilities = self.forward(&inputs.view())?;
        Ok(ClassProbabilities {
            negative: probabilities[[0, EngagementClass::Negative.index()]],
            neutral: probabilities[[0, EngagementClass::Neutral.index()]],
            positive: probabilities[[0, EngagementClass::Positive.index()]],
        })
    }

    /// Fit to labelled rows, returning the loss of the final epoch
    pub fn fit(
        &mut self,
        inputs: &Array2<f32>,
        labels: &[EngagementClass],
        epochs: usize,
        learning_rate: f32,
    ) -> Result<f32, RankerError> {
        if inputs.nrows() != labels.len() {
            return Err(RankerError::DimensionMismatch {
                expected: inputs.nrows(),
                actual: labels.len(),
            });
        }
        if inputs.ncols() != self.input_dim() {
            return Err(RankerError::DimensionMismatch {
                expected: self.input_dim(),
                actual: inputs.ncols(),
            });
        }

        let rows = inputs.nrows() as f32;
        let mut targets = Array2::<f32>::zeros((labels.len(), EngagementClass::COUNT));
        for (row, label) in labels.iter().enumerate() {
            targets[[row, label.index()]] = 1.0;
        }

        let view = inputs.view();
        let mut loss = 0.0;
        for epoch in 0..epochs {
            // forward
            let (pre, hidden) = self.hidden(&view);
            let probabilities = Self::softmax_rows(hidden.dot(&self.w2) + &self.b2);

            loss = -labels
                .iter()
                .enumerate()
                .map(|(row, label)| probabilities[[row, label.index()]].max(1e-7).ln())
                .sum::<f32>()
                / rows;

            // backward
            let d_logits = (&probabilities - &targets) / rows;
            let d_w2 = hidden.t().dot(&d_logits);
            let d_b2 = d_logits.sum_axis(Axis(0));
            let d_hidden = d_logits.dot(&self.w2.t());
            let relu_mask = pre.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
            let d_pre = &d_hidden * &relu_mask;
            let d_w1 = view.t().dot(&d_pre);
            let d_b1 = d_pre.sum_axis(Axis(0));

            self.w2.scaled_add(-learning_rate, &d_w2);
            self.b2.scaled_add(-learning_rate, &d_b2);
            self.w1.scaled_add(-learning_rate, &d_w1);
            self.b1.scaled_add(-learning_rate, &d_b1);

            if epoch % 20 == 0 {
                tracing::debug!(epoch, loss, "Engagement network epoch");
            }
        }

        Ok(loss)
    }
}
