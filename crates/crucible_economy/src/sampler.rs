//! # Weighted Sampler
//!
//! Piecewise-uniform sampling over authored weight tables.
//!
//! A table is an ordered list of `(lower, upper, weight)` rows. The row is
//! picked with probability `weight / total`, then the value is drawn
//! uniformly from `[lower, upper]` inclusive. Rows with a non-positive
//! weight are never picked. A zero-width row (`lower == upper`) always
//! yields `lower`.
//!
//! The draw comes from the environment's [`DeterministicRng`], so
//! `rand()` calls and table draws share one reproducible stream.

use crucible_expr::DeterministicRng;
use serde::{Deserialize, Serialize};

use crate::error::{RecipeError, RecipeResult};

/// One row of a floating weight table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoubleWeightRange {
    /// Inclusive lower bound.
    pub lower: f64,
    /// Inclusive upper bound.
    pub upper: f64,
    /// Relative weight.
    pub weight: i64,
}

/// One row of an integer weight table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntWeightRange {
    /// Inclusive lower bound.
    pub lower: i64,
    /// Inclusive upper bound.
    pub upper: i64,
    /// Relative weight.
    pub weight: i64,
}

/// Weight table producing floating values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoubleWeightTable {
    /// Rows in authoring order.
    pub weight_ranges: Vec<DoubleWeightRange>,
}

/// Weight table producing integer values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntWeightTable {
    /// Rows in authoring order.
    pub weight_ranges: Vec<IntWeightRange>,
}

/// Picks an index with probability proportional to its weight.
///
/// Non-positive weights are skipped.
///
/// # Errors
///
/// [`RecipeError::CannotSample`] when there are no weights, the positive
/// total is zero, or the total overflows.
pub fn pick_weighted(
    weights: impl IntoIterator<Item = i64>,
    rng: &mut DeterministicRng,
) -> RecipeResult<usize> {
    let weights: Vec<i64> = weights.into_iter().collect();
    if weights.is_empty() {
        return Err(RecipeError::CannotSample("weight table is empty".into()));
    }

    let mut total: i64 = 0;
    for &w in weights.iter().filter(|&&w| w > 0) {
        total = total
            .checked_add(w)
            .ok_or_else(|| RecipeError::CannotSample("total weight overflows".into()))?;
    }
    if total == 0 {
        return Err(RecipeError::CannotSample("total weight is not positive".into()));
    }

    let roll = rng
        .below(total)
        .map_err(|e| RecipeError::CannotSample(e.to_string()))?;

    let mut cumulative = 0i64;
    for (idx, &w) in weights.iter().enumerate() {
        if w <= 0 {
            continue;
        }
        cumulative += w;
        if roll < cumulative {
            return Ok(idx);
        }
    }

    // roll < total == final cumulative
    Err(RecipeError::CannotSample("weight scan fell through".into()))
}

impl DoubleWeightTable {
    /// Creates a table from `(lower, upper, weight)` rows.
    #[must_use]
    pub fn new(rows: &[(f64, f64, i64)]) -> Self {
        Self {
            weight_ranges: rows
                .iter()
                .map(|&(lower, upper, weight)| DoubleWeightRange { lower, upper, weight })
                .collect(),
        }
    }

    /// Draws one value.
    ///
    /// # Errors
    ///
    /// [`RecipeError::CannotSample`] for an empty or zero-weight table, or a
    /// malformed row.
    pub fn generate(&self, rng: &mut DeterministicRng) -> RecipeResult<f64> {
        let idx = pick_weighted(self.weight_ranges.iter().map(|r| r.weight), rng)?;
        let row = &self.weight_ranges[idx];
        rng.range_f64(row.lower, row.upper)
            .map_err(|e| RecipeError::CannotSample(e.to_string()))
    }
}

impl IntWeightTable {
    /// Creates a table from `(lower, upper, weight)` rows.
    #[must_use]
    pub fn new(rows: &[(i64, i64, i64)]) -> Self {
        Self {
            weight_ranges: rows
                .iter()
                .map(|&(lower, upper, weight)| IntWeightRange { lower, upper, weight })
                .collect(),
        }
    }

    /// Draws one value.
    ///
    /// # Errors
    ///
    /// [`RecipeError::CannotSample`] for an empty or zero-weight table, or a
    /// malformed row.
    pub fn generate(&self, rng: &mut DeterministicRng) -> RecipeResult<i64> {
        let idx = pick_weighted(self.weight_ranges.iter().map(|r| r.weight), rng)?;
        let row = &self.weight_ranges[idx];
        rng.range_i64(row.lower, row.upper)
            .map_err(|e| RecipeError::CannotSample(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(n: u8) -> DeterministicRng {
        let mut seed = [0u8; 32];
        seed[0] = n;
        DeterministicRng::from_seed(seed)
    }

    #[test]
    fn test_values_fall_in_declared_ranges() {
        let table = IntWeightTable::new(&[(10, 20, 3), (21, 30, 1)]);
        let mut rng = seeded(1);
        for _ in 0..1000 {
            let v = table.generate(&mut rng).unwrap();
            assert!((10..=20).contains(&v) || (21..=30).contains(&v), "{v}");
        }
    }

    #[test]
    fn test_zero_width_range() {
        let table = IntWeightTable::new(&[(0, 0, 1)]);
        let mut rng = seeded(2);
        for _ in 0..50 {
            assert_eq!(table.generate(&mut rng).unwrap(), 0);
        }

        let table = DoubleWeightTable::new(&[(7.5, 7.5, 4)]);
        assert_eq!(table.generate(&mut rng).unwrap(), 7.5);
    }

    #[test]
    fn test_empty_and_non_positive_tables() {
        let mut rng = seeded(3);
        assert!(matches!(
            IntWeightTable::default().generate(&mut rng),
            Err(RecipeError::CannotSample(_))
        ));
        assert!(matches!(
            DoubleWeightTable::new(&[(1.0, 2.0, 0), (3.0, 4.0, -5)]).generate(&mut rng),
            Err(RecipeError::CannotSample(_))
        ));
    }

    #[test]
    fn test_non_positive_rows_are_never_picked() {
        let table = IntWeightTable::new(&[(0, 0, 0), (1, 1, 1), (2, 2, -3)]);
        let mut rng = seeded(4);
        for _ in 0..200 {
            assert_eq!(table.generate(&mut rng).unwrap(), 1);
        }
    }

    #[test]
    fn test_inverted_row_is_reported() {
        let table = IntWeightTable::new(&[(5, 1, 1)]);
        let mut rng = seeded(5);
        assert!(matches!(table.generate(&mut rng), Err(RecipeError::CannotSample(_))));
    }

    #[test]
    fn test_weights_shape_frequencies() {
        let mut rng = seeded(6);
        let mut hits = [0u32; 2];
        for _ in 0..20_000 {
            hits[pick_weighted([3, 1], &mut rng).unwrap()] += 1;
        }
        let share = f64::from(hits[0]) / 20_000.0;
        assert!((share - 0.75).abs() < 0.02, "share {share}");
    }

    #[test]
    fn test_same_seed_same_draws() {
        let table = DoubleWeightTable::new(&[(100.0, 500.0, 6), (501.0, 800.0, 2)]);
        let a: Vec<u64> = {
            let mut rng = seeded(7);
            (0..32).map(|_| table.generate(&mut rng).unwrap().to_bits()).collect()
        };
        let b: Vec<u64> = {
            let mut rng = seeded(7);
            (0..32).map(|_| table.generate(&mut rng).unwrap().to_bits()).collect()
        };
        assert_eq!(a, b);
    }
}
