//! Random-variate generators supplied by study configuration.
//!
//! The engine treats every distribution as opaque: it only ever calls
//! [`Distribution::sample`]. The concrete families below exist so that study
//! JSON can describe them; tests and embedders are free to plug in their own
//! implementations.

use rand::RngCore;
use rand_distr::Distribution as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::StudyError;
use crate::reactions::{Reaction, ReactionCounts};

/// Upper bound on rejection-sampling attempts for truncated normals before
/// falling back to clamping.
const MAX_TRUNCATION_ATTEMPTS: usize = 64;

/// A source of random numbers with a fixed shape.
pub trait Distribution: fmt::Debug + Send + Sync {
    fn sample(&self, rng: &mut dyn RngCore) -> f64;
}

/// Shared handle to an opaque distribution.
pub type DistributionRef = Arc<dyn Distribution>;

/// Always returns the same value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant(pub f64);

impl Distribution for Constant {
    fn sample(&self, _rng: &mut dyn RngCore) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct UniformRange(rand_distr::Uniform<f64>);

impl Distribution for UniformRange {
    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        self.0.sample(rng)
    }
}

#[derive(Debug, Clone, Copy)]
struct Gaussian(rand_distr::Normal<f64>);

/// Samples are clamped to the finite range.
impl Distribution for Gaussian {
    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        self.0.sample(rng).clamp(f64::MIN, f64::MAX)
    }
}

/// Normal distribution restricted to `[min, max]` by rejection.
#[derive(Debug, Clone, Copy)]
struct TruncatedGaussian {
    normal: rand_distr::Normal<f64>,
    min: f64,
    max: f64,
}

impl Distribution for TruncatedGaussian {
    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        let mut value = self.normal.sample(rng);
        for _ in 0..MAX_TRUNCATION_ATTEMPTS {
            if (self.min..=self.max).contains(&value) {
                return value;
            }
            value = self.normal.sample(rng);
        }
        value.clamp(self.min, self.max)
    }
}

/// Distribution description as it appears in study JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DistributionSpec {
    Constant {
        value: f64,
    },
    Uniform {
        min: f64,
        max: f64,
    },
    #[serde(rename_all = "camelCase")]
    Normal {
        mean: f64,
        std_deviation: f64,
    },
    #[serde(rename_all = "camelCase")]
    TruncatedNormal {
        mean: f64,
        std_deviation: f64,
        min: f64,
        max: f64,
    },
}

impl DistributionSpec {
    /// Validates the parameters and produces an opaque sampler.
    pub fn build(&self, context: &str) -> Result<DistributionRef, StudyError> {
        let invalid = |reason: &str| StudyError::InvalidDistribution {
            context: context.to_string(),
            reason: reason.to_string(),
        };

        match *self {
            DistributionSpec::Constant { value } => {
                if !value.is_finite() {
                    return Err(invalid("value must be finite"));
                }
                Ok(Arc::new(Constant(value)))
            }
            DistributionSpec::Uniform { min, max } => {
                if !min.is_finite() || !max.is_finite() || min > max {
                    return Err(invalid("uniform bounds must be finite with min <= max"));
                }
                if !(max - min).is_finite() {
                    return Err(invalid("uniform range must be finite"));
                }
                Ok(Arc::new(UniformRange(rand_distr::Uniform::new_inclusive(
                    min, max,
                ))))
            }
            DistributionSpec::Normal {
                mean,
                std_deviation,
            } => {
                let normal = normal(mean, std_deviation).ok_or_else(|| {
                    invalid("normal requires a finite mean and non-negative deviation")
                })?;
                Ok(Arc::new(Gaussian(normal)))
            }
            DistributionSpec::TruncatedNormal {
                mean,
                std_deviation,
                min,
                max,
            } => {
                let normal = normal(mean, std_deviation).ok_or_else(|| {
                    invalid("normal requires a finite mean and non-negative deviation")
                })?;
                if !min.is_finite() || !max.is_finite() || min > max {
                    return Err(invalid("truncation bounds must be finite with min <= max"));
                }
                Ok(Arc::new(TruncatedGaussian { normal, min, max }))
            }
        }
    }
}

fn normal(mean: f64, std_deviation: f64) -> Option<rand_distr::Normal<f64>> {
    if !mean.is_finite() || !std_deviation.is_finite() || std_deviation < 0.0 {
        return None;
    }
    rand_distr::Normal::new(mean, std_deviation).ok()
}

/// One distribution per reaction, e.g. the credibility change for a like.
#[derive(Debug, Clone, Default)]
pub struct ReactionDistributions {
    by_reaction: BTreeMap<Reaction, DistributionRef>,
}

impl ReactionDistributions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reaction: Reaction, distribution: DistributionRef) -> Self {
        self.by_reaction.insert(reaction, distribution);
        self
    }

    pub fn insert(&mut self, reaction: Reaction, distribution: DistributionRef) {
        self.by_reaction.insert(reaction, distribution);
    }

    pub fn get(&self, reaction: Reaction) -> Option<&DistributionRef> {
        self.by_reaction.get(&reaction)
    }

    pub fn contains(&self, reaction: Reaction) -> bool {
        self.by_reaction.contains_key(&reaction)
    }

    pub fn reactions(&self) -> impl Iterator<Item = Reaction> + '_ {
        self.by_reaction.keys().copied()
    }

    /// Samples one reaction's distribution, if configured.
    pub fn sample(&self, reaction: Reaction, rng: &mut dyn RngCore) -> Option<f64> {
        self.by_reaction.get(&reaction).map(|d| d.sample(rng))
    }

    /// Samples every configured reaction independently.
    pub fn sample_all(&self, rng: &mut dyn RngCore) -> ReactionCounts {
        self.by_reaction
            .iter()
            .map(|(reaction, distribution)| (*reaction, distribution.sample(rng)))
            .collect()
    }

    /// Builds the map from its JSON description.
    pub fn from_specs(
        specs: &BTreeMap<Reaction, DistributionSpec>,
        context: &str,
    ) -> Result<Self, StudyError> {
        let mut distributions = Self::new();
        for (reaction, spec) in specs {
            let distribution = spec.build(&format!("{context}.{reaction}"))?;
            distributions.insert(*reaction, distribution);
        }
        Ok(distributions)
    }
}
