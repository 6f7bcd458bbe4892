//! Disjoint-arm LinUCB.
//!
//! Each arm keeps ridge-regression statistics seeded with the identity:
//!
//! ```text
//!   A_a = I + Σ x xᵗ        (design matrix, symmetric positive definite)
//!   b_a = Σ r x             (reward-weighted contexts)
//!   θ_a = A_a⁻¹ b_a
//!   score_a(x) = θ_a·x + α √(xᵗ A_a⁻¹ x)
//! ```
//!
//! Statistics only ever grow by positive semi-definite terms, so `A_a` stays
//! invertible; solves go through a Cholesky factorization and a failed
//! factorization is reported as [`GrowError::NumericDegeneracy`].

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{GrowError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinUcbConfig {
    /// Exploration coefficient α ≥ 0.
    pub alpha: f64,
    /// Discount γ in (0, 1] applied to an arm's statistics before each of
    /// its updates. 1.0 keeps every observation forever.
    pub forgetting_factor: f64,
}

impl Default for LinUcbConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            forgetting_factor: 1.0,
        }
    }
}

impl LinUcbConfig {
    #[must_use]
    pub fn with_alpha(alpha: f64) -> Self {
        Self {
            alpha,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(GrowError::Config(format!(
                "alpha must be finite and non-negative, got {}",
                self.alpha
            )));
        }
        if !(self.forgetting_factor > 0.0 && self.forgetting_factor <= 1.0) {
            return Err(GrowError::Config(format!(
                "forgetting_factor must be in (0, 1], got {}",
                self.forgetting_factor
            )));
        }
        Ok(())
    }
}

/// Per-arm ridge-regression statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmStats {
    a: DMatrix<f64>,
    b: DVector<f64>,
    pulls: u64,
    reward_sum: f64,
}

impl ArmStats {
    fn new(dimension: usize) -> Self {
        Self {
            a: DMatrix::identity(dimension, dimension),
            b: DVector::zeros(dimension),
            pulls: 0,
            reward_sum: 0.0,
        }
    }

    #[must_use]
    pub const fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    #[must_use]
    pub const fn b(&self) -> &DVector<f64> {
        &self.b
    }

    #[must_use]
    pub const fn pulls(&self) -> u64 {
        self.pulls
    }

    #[must_use]
    pub fn mean_reward(&self) -> Option<f64> {
        (self.pulls > 0).then(|| self.reward_sum / self.pulls as f64)
    }

    fn observe(&mut self, x: &DVector<f64>, reward: f64, gamma: f64) {
        if gamma < 1.0 {
            // Shrink toward the identity prior, not toward zero.
            self.a *= gamma;
            for i in 0..self.a.nrows() {
                self.a[(i, i)] += 1.0 - gamma;
            }
            self.b *= gamma;
        }
        self.a.ger(1.0, x, x, 1.0);
        self.b.axpy(reward, x, 1.0);
        self.pulls += 1;
        self.reward_sum += reward;
    }

    fn is_finite(&self) -> bool {
        self.a.iter().chain(self.b.iter()).all(|v| v.is_finite()) && self.reward_sum.is_finite()
    }

    fn theta(&self, index: usize) -> Result<DVector<f64>> {
        let chol = self
            .a
            .clone()
            .cholesky()
            .ok_or(GrowError::NumericDegeneracy { action: index })?;
        Ok(chol.solve(&self.b))
    }

    fn score(&self, index: usize, x: &DVector<f64>, alpha: f64) -> Result<ArmScore> {
        let chol = self
            .a
            .clone()
            .cholesky()
            .ok_or(GrowError::NumericDegeneracy { action: index })?;
        let theta = chol.solve(&self.b);
        let estimate = theta.dot(x);
        let variance = x.dot(&chol.solve(x)).max(0.0);
        let bonus = alpha * variance.sqrt();
        let total = estimate + bonus;
        if !total.is_finite() {
            return Err(GrowError::NumericDegeneracy { action: index });
        }
        Ok(ArmScore {
            action: index,
            estimate,
            bonus,
            total,
        })
    }
}

/// Upper-confidence score of one arm for one context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArmScore {
    pub action: usize,
    /// θ·x
    pub estimate: f64,
    /// α √(xᵗ A⁻¹ x)
    pub bonus: f64,
    pub total: f64,
}

/// Outcome of a selection: the winning arm and every arm's score.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub action: usize,
    pub scores: Vec<ArmScore>,
}

/// Reporting view of one arm.
#[derive(Debug, Clone, Serialize)]
pub struct ArmSummary {
    pub action: usize,
    pub pulls: u64,
    pub mean_reward: Option<f64>,
    pub theta: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct LinUcb {
    arms: Vec<ArmStats>,
    dimension: usize,
    config: LinUcbConfig,
    total_updates: u64,
}

impl LinUcb {
    pub fn new(num_actions: usize, dimension: usize, config: LinUcbConfig) -> Result<Self> {
        if num_actions == 0 {
            return Err(GrowError::Config("at least one action is required".into()));
        }
        if dimension == 0 {
            return Err(GrowError::Config("feature dimension must be positive".into()));
        }
        config.validate()?;
        Ok(Self {
            arms: (0..num_actions).map(|_| ArmStats::new(dimension)).collect(),
            dimension,
            config,
            total_updates: 0,
        })
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn num_actions(&self) -> usize {
        self.arms.len()
    }

    #[must_use]
    pub const fn config(&self) -> &LinUcbConfig {
        &self.config
    }

    #[must_use]
    pub const fn total_updates(&self) -> u64 {
        self.total_updates
    }

    #[must_use]
    pub fn arm(&self, action: usize) -> Option<&ArmStats> {
        self.arms.get(action)
    }

    #[must_use]
    pub fn arms(&self) -> &[ArmStats] {
        &self.arms
    }

    fn context_vector(&self, context: &[f64]) -> Result<DVector<f64>> {
        if context.len() != self.dimension {
            return Err(GrowError::InvalidInput {
                expected: self.dimension,
                actual: context.len(),
            });
        }
        if context.iter().any(|v| !v.is_finite()) {
            return Err(GrowError::NonFinite("context"));
        }
        Ok(DVector::from_column_slice(context))
    }

    /// Score every arm for `context`.
    pub fn scores(&self, context: &[f64]) -> Result<Vec<ArmScore>> {
        let x = self.context_vector(context)?;
        self.arms
            .iter()
            .enumerate()
            .map(|(i, arm)| arm.score(i, &x, self.config.alpha))
            .collect()
    }

    /// Pick the arm with the highest score; ties go to the lowest index.
    pub fn selection(&self, context: &[f64]) -> Result<Selection> {
        let scores = self.scores(context)?;
        let mut best = 0;
        for (i, score) in scores.iter().enumerate().skip(1) {
            if score.total > scores[best].total {
                best = i;
            }
        }
        Ok(Selection {
            action: best,
            scores,
        })
    }

    pub fn select(&self, context: &[f64]) -> Result<usize> {
        self.selection(context).map(|selection| selection.action)
    }

    /// Fold one observed `(context, reward)` into `action`'s statistics.
    ///
    /// Only that arm changes. An update that would overflow the arm's
    /// statistics is refused and leaves the model as it was.
    pub fn update(&mut self, action: usize, context: &[f64], reward: f64) -> Result<()> {
        let Some(current) = self.arms.get(action) else {
            return Err(GrowError::InvalidAction(action));
        };
        if !reward.is_finite() {
            return Err(GrowError::NonFinite("reward"));
        }
        let x = self.context_vector(context)?;
        let mut next = current.clone();
        next.observe(&x, reward, self.config.forgetting_factor);
        if !next.is_finite() {
            return Err(GrowError::NumericDegeneracy { action });
        }
        self.arms[action] = next;
        self.total_updates += 1;
        Ok(())
    }

    /// Current θ for `action`.
    pub fn theta(&self, action: usize) -> Result<Vec<f64>> {
        let arm = self.arms.get(action).ok_or(GrowError::InvalidAction(action))?;
        Ok(arm.theta(action)?.iter().copied().collect())
    }

    pub fn summaries(&self) -> Result<Vec<ArmSummary>> {
        self.arms
            .iter()
            .enumerate()
            .map(|(i, arm)| {
                Ok(ArmSummary {
                    action: i,
                    pulls: arm.pulls(),
                    mean_reward: arm.mean_reward(),
                    theta: arm.theta(i)?.iter().copied().collect(),
                })
            })
            .collect()
    }
}
