//! L2-regularised logistic regression with balanced class weights.
//!
//! Minimises
//!
//! ```text
//! J(w, b) = (1/n) Σ s_i · logloss(σ(w·x_i + b), y_i) + ‖w‖² / (2·C·n)
//! ```
//!
//! where `s_i = n / (2 · n_{y_i})`, so each class contributes the same total
//! weight however lopsided the labels are. The intercept is not penalised.
//! Fitting is full-batch gradient descent with a backtracking line search.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, warn};

use super::error::{PredictError, Result};
use super::features::FeatureKey;

/// Armijo sufficient-decrease factor for the line search.
const ARMIJO: f64 = 0.5;
/// Smallest step tried before the line search gives up.
const MIN_STEP: f64 = 1e-12;
/// Half-width of the uniform initial weight distribution.
const INIT_SPREAD: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Inverse regularisation strength `C`; larger means a weaker penalty
    pub inverse_regularization: f64,
    pub max_iterations: usize,
    /// Gradient norm at which the optimiser stops
    pub tolerance: f64,
    /// Initial line-search step
    pub initial_step: f64,
    /// Seed for weight initialisation
    pub seed: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            inverse_regularization: 1.0,
            max_iterations: 5000,
            tolerance: 1e-8,
            initial_step: 1.0,
            seed: 42,
        }
    }
}

/// Absolute coefficient of one standardised feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Why the optimiser stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    /// Gradient norm fell below the tolerance
    Converged,
    /// The line search found no descending step above the minimum step
    Stalled,
    /// The iteration cap was reached first
    IterationCap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticClassifier {
    coefficients: Vec<f64>,
    intercept: f64,
    iterations: usize,
    status: FitStatus,
}

/// Per-class sample weights `(negative, positive)`, inversely proportional to
/// class frequency.
pub fn balanced_class_weights(labels: &[bool]) -> (f64, f64) {
    let n = labels.len() as f64;
    let positives = labels.iter().filter(|&&y| y).count() as f64;
    let negatives = n - positives;
    (n / (2.0 * negatives), n / (2.0 * positives))
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

struct Problem<'a> {
    x: &'a [Vec<f64>],
    y: &'a [bool],
    weights: Vec<f64>,
    l2: f64,
}

impl Problem<'_> {
    fn n(&self) -> f64 {
        self.x.len() as f64
    }

    /// Objective and gradient at `params` (`[w..., b]`).
    fn evaluate(&self, params: &[f64]) -> (f64, Vec<f64>) {
        let d = params.len() - 1;
        let (w, b) = (&params[..d], params[d]);
        let mut loss = 0.0;
        let mut grad = vec![0.0; d + 1];

        for ((row, &y), &s) in self.x.iter().zip(self.y).zip(&self.weights) {
            let z = dot(w, row) + b;
            let target = if y { 1.0 } else { 0.0 };
            loss += s * (softplus(z) - target * z);
            let err = s * (sigmoid(z) - target);
            for (g, v) in grad[..d].iter_mut().zip(row) {
                *g += err * v;
            }
            grad[d] += err;
        }

        let n = self.n();
        loss /= n;
        grad.iter_mut().for_each(|g| *g /= n);
        loss += 0.5 * self.l2 * w.iter().map(|v| v * v).sum::<f64>();
        for (g, v) in grad[..d].iter_mut().zip(w) {
            *g += self.l2 * v;
        }
        (loss, grad)
    }

    fn loss(&self, params: &[f64]) -> f64 {
        self.evaluate(params).0
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl LogisticClassifier {
    /// Fit on standardised training rows. Fails when the labels contain a
    /// single class, since no decision boundary can be learned.
    pub fn fit(x: &[Vec<f64>], y: &[bool], config: &ClassifierConfig) -> Result<Self> {
        if x.len() != y.len() {
            return Err(PredictError::InvalidInput(format!(
                "{} training row(s) but {} label(s)",
                x.len(),
                y.len()
            )));
        }
        let positives = y.iter().filter(|&&v| v).count();
        if positives == 0 || positives == y.len() {
            return Err(PredictError::DegenerateTrainingSet);
        }

        let d = x[0].len();
        let (w_neg, w_pos) = balanced_class_weights(y);
        let problem = Problem {
            x,
            y,
            weights: y.iter().map(|&v| if v { w_pos } else { w_neg }).collect(),
            l2: 1.0 / (config.inverse_regularization * x.len() as f64),
        };

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut params: Vec<f64> = (0..d)
            .map(|_| rng.gen_range(-INIT_SPREAD..INIT_SPREAD))
            .chain(std::iter::once(0.0))
            .collect();

        let mut step = config.initial_step;
        let mut status = FitStatus::IterationCap;
        let mut iterations = 0;
        let (mut loss, mut grad) = problem.evaluate(&params);

        while iterations < config.max_iterations {
            let grad_sq: f64 = grad.iter().map(|g| g * g).sum();
            if grad_sq.sqrt() < config.tolerance {
                status = FitStatus::Converged;
                break;
            }
            iterations += 1;

            // Backtrack until the step gives sufficient decrease.
            let accepted = loop {
                let candidate: Vec<f64> = params
                    .iter()
                    .zip(&grad)
                    .map(|(p, g)| p - step * g)
                    .collect();
                let candidate_loss = problem.loss(&candidate);
                if candidate_loss <= loss - ARMIJO * step * grad_sq {
                    break Some(candidate);
                }
                step *= 0.5;
                if step < MIN_STEP {
                    break None;
                }
            };

            match accepted {
                Some(next) => {
                    params = next;
                    (loss, grad) = problem.evaluate(&params);
                    step = (step * 2.0).min(config.initial_step);
                }
                None => {
                    status = FitStatus::Stalled;
                    break;
                }
            }
        }

        match status {
            FitStatus::Converged => debug!(
                "Classifier converged after {} iteration(s), loss {:.6}",
                iterations, loss
            ),
            FitStatus::Stalled => warn!(
                "Classifier line search stalled after {} iteration(s), loss {:.6}",
                iterations, loss
            ),
            FitStatus::IterationCap => warn!(
                "Classifier stopped at the iteration cap ({}), loss {:.6}",
                iterations, loss
            ),
        }

        let intercept = params[d];
        params.truncate(d);
        Ok(LogisticClassifier {
            coefficients: params,
            intercept,
            iterations,
            status,
        })
    }

    pub fn decision(&self, row: &[f64]) -> f64 {
        dot(&self.coefficients, row) + self.intercept
    }

    /// Probability that the row belongs to the positive (OVER) class.
    pub fn predict_probability(&self, row: &[f64]) -> f64 {
        sigmoid(self.decision(row))
    }

    pub fn predict(&self, row: &[f64]) -> bool {
        self.decision(row) > 0.0
    }

    /// Features ranked by absolute coefficient, largest first. Ties keep the
    /// column order of `keys`.
    pub fn feature_importance(&self, keys: &[FeatureKey]) -> Vec<FeatureImportance> {
        let mut ranked: Vec<FeatureImportance> = keys
            .iter()
            .zip(&self.coefficients)
            .map(|(key, coef)| FeatureImportance {
                feature: key.to_string(),
                importance: coef.abs(),
            })
            .collect();
        // Stable sort keeps declaration order among equal magnitudes.
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranked
    }

    #[cfg(test)]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn status(&self) -> FitStatus {
        self.status
    }
}

/// Holdout performance of a fitted classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub accuracy: f64,
    /// `[[true_under, false_over], [false_under, true_over]]`
    pub confusion_matrix: [[u32; 2]; 2],
}

pub fn evaluate(model: &LogisticClassifier, x: &[Vec<f64>], y: &[bool]) -> Evaluation {
    let mut confusion_matrix = [[0u32; 2]; 2];
    for (row, &actual) in x.iter().zip(y) {
        let predicted = model.predict(row);
        confusion_matrix[actual as usize][predicted as usize] += 1;
    }
    let correct = confusion_matrix[0][0] + confusion_matrix[1][1];
    let accuracy = if y.is_empty() {
        0.0
    } else {
        correct as f64 / y.len() as f64
    };
    Evaluation {
        accuracy,
        confusion_matrix,
    }
}
