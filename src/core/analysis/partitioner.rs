//! Seeded, per-label train/validation/test assignment.
//!
//! The shuffle is rand 0.8's `SliceRandom::shuffle` (Fisher-Yates, walking
//! from the last index down and swapping with `gen_range(0..=i)`) driven by
//! `ChaCha8Rng::seed_from_u64(seed)`. A fresh generator is seeded for every
//! label, so one label's split never depends on which labels precede it.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::dataset::Partition;
use crate::error::{PipelineError, PipelineResult};

pub const DEFAULT_SEED: u64 = 42;

/// Allowed distance of the ratio sum from 1.0.
pub const RATIO_TOLERANCE: f64 = 0.001;

/// Target ratios for train/validation/test split distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub train: f64,
    pub validation: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.7,
            validation: 0.1,
            test: 0.2,
        }
    }
}

impl SplitRatios {
    pub fn new(train: f64, validation: f64, test: f64) -> Self {
        Self {
            train,
            validation,
            test,
        }
    }

    pub fn get(&self, partition: Partition) -> f64 {
        match partition {
            Partition::Train => self.train,
            Partition::Validation => self.validation,
            Partition::Test => self.test,
        }
    }

    /// Check each ratio lies in `[0, 1]` and that they sum to 1.0.
    pub fn validate(&self) -> PipelineResult<Self> {
        let invalid = |reason: String| PipelineError::InvalidRatios {
            train: self.train,
            validation: self.validation,
            test: self.test,
            reason,
        };

        for partition in Partition::ALL {
            let r = self.get(partition);
            if !r.is_finite() || !(0.0..=1.0).contains(&r) {
                return Err(invalid(format!(
                    "{} ratio {} is outside [0, 1]",
                    partition, r
                )));
            }
        }

        let sum = self.train + self.validation + self.test;
        if (sum - 1.0).abs() > RATIO_TOLERANCE {
            return Err(invalid(format!("ratios sum to {}, expected 1.0", sum)));
        }
        Ok(*self)
    }

    /// Per-partition counts for `total` items.
    ///
    /// Train and validation are floored; test takes whatever is left, so the
    /// three always add up to `total`.
    pub fn counts(&self, total: usize) -> SplitCounts {
        let floor = |r: f64| ((total as f64) * r).floor() as usize;
        let train = floor(self.train).min(total);
        let validation = floor(self.validation).min(total - train);
        SplitCounts {
            train,
            validation,
            test: total - train - validation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SplitCounts {
    pub train: usize,
    pub validation: usize,
    pub test: usize,
}

impl SplitCounts {
    pub fn total(&self) -> usize {
        self.train + self.validation + self.test
    }

    pub fn get(&self, partition: Partition) -> usize {
        match partition {
            Partition::Train => self.train,
            Partition::Validation => self.validation,
            Partition::Test => self.test,
        }
    }
}

/// The items of one label, divided into the three partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionAssignment<T> {
    pub train: Vec<T>,
    pub validation: Vec<T>,
    pub test: Vec<T>,
}

impl<T> PartitionAssignment<T> {
    pub fn get(&self, partition: Partition) -> &[T] {
        match partition {
            Partition::Train => &self.train,
            Partition::Validation => &self.validation,
            Partition::Test => &self.test,
        }
    }

    pub fn counts(&self) -> SplitCounts {
        SplitCounts {
            train: self.train.len(),
            validation: self.validation.len(),
            test: self.test.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every item with its partition, train first.
    pub fn iter(&self) -> impl Iterator<Item = (Partition, &T)> {
        Partition::ALL
            .into_iter()
            .flat_map(move |p| self.get(p).iter().map(move |item| (p, item)))
    }
}

/// Shuffle one label's items with `seed` and slice them into partitions.
pub fn split<T: Clone>(
    items: &[T],
    ratios: &SplitRatios,
    seed: u64,
) -> PipelineResult<PartitionAssignment<T>> {
    let ratios = ratios.validate()?;

    let mut shuffled = items.to_vec();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let counts = ratios.counts(shuffled.len());
    debug!(
        "Split {} items: train {}, validation {}, test {}",
        shuffled.len(),
        counts.train,
        counts.validation,
        counts.test
    );

    let test = shuffled.split_off(counts.train + counts.validation);
    let validation = shuffled.split_off(counts.train);
    Ok(PartitionAssignment {
        train: shuffled,
        validation,
        test,
    })
}
