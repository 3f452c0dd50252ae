//! Weighted value selection.

use crate::context::ContextValueGetter;
use crate::value::{WeightedValue, WeightedValues};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Cursor;

/// Picks one arm of a weighted split.
///
/// When the split names a hash property present in the context the pick is
/// deterministic: `murmur3_32(config_key ++ value)` scaled into `[0, 1)`.
/// Otherwise the fraction comes from a PRNG created with the picker.
pub struct WeightedValuePicker {
    rng: Mutex<StdRng>,
}

impl WeightedValuePicker {
    /// Picker seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Picker with a fixed seed, for reproducible random picks.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Pick an arm, returning its index alongside it.
    pub fn pick<'w>(
        &self,
        config_key: &str,
        weighted: &'w WeightedValues,
        context: &dyn ContextValueGetter,
    ) -> Option<(usize, &'w WeightedValue)> {
        let fraction = weighted
            .hash_by_property_name
            .as_deref()
            .and_then(|property| context.get_context_value(property))
            .map(|value| hash_fraction(config_key, &value.raw_string()))
            .unwrap_or_else(|| self.rng.lock().random::<f64>());

        let weights: Vec<i32> = weighted.values.iter().map(|v| v.weight).collect();
        let index = pick_index(&weights, fraction);
        weighted.values.get(index).map(|value| (index, value))
    }
}

impl Default for WeightedValuePicker {
    fn default() -> Self {
        Self::new()
    }
}

/// Map `config_key ++ value` onto `[0, 1)`.
pub fn hash_fraction(config_key: &str, value: &str) -> f64 {
    let input = format!("{}{}", config_key, value);
    let hash = murmur3::murmur3_32(&mut Cursor::new(input.as_bytes()), 0).unwrap_or_default();
    hash as f64 / (u32::MAX as f64 + 1.0)
}

/// First index whose cumulative weight reaches `fraction * total`.
///
/// Falls back to index 0 when rounding leaves nothing selected.
pub fn pick_index(weights: &[i32], fraction: f64) -> usize {
    let total: i64 = weights.iter().map(|w| *w as i64).sum();
    let threshold = fraction * total as f64;

    let mut cumulative = 0i64;
    for (index, weight) in weights.iter().enumerate() {
        cumulative += *weight as i64;
        if cumulative as f64 >= threshold {
            return index;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, ContextSet};
    use crate::value::ConfigValue;

    fn abc() -> WeightedValues {
        let entry = |weight, letter: &str| WeightedValue {
            weight,
            value: ConfigValue::string(letter),
        };
        WeightedValues::new(
            vec![entry(100, "A"), entry(50, "B"), entry(50, "C")],
            Some("user.id".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_pick_index_thresholds() {
        let weights = [100, 50, 50];
        assert_eq!(pick_index(&weights, 0.1), 0);
        assert_eq!(pick_index(&weights, 0.5), 0);
        assert_eq!(pick_index(&weights, 0.51), 1);
        assert_eq!(pick_index(&weights, 0.75), 1);
        assert_eq!(pick_index(&weights, 0.99), 2);
    }

    #[test]
    fn test_hash_fraction_is_stable_and_bounded() {
        let first = hash_fraction("flag", "u1");
        assert_eq!(first, hash_fraction("flag", "u1"));
        assert!((0.0..1.0).contains(&first));
        assert_ne!(first, hash_fraction("other-flag", "u1"));
    }

    #[test]
    fn test_hashed_pick_is_deterministic() {
        let picker = WeightedValuePicker::new();
        let weighted = abc();
        let ctx = ContextSet::new().with_context(Context::new("user").with("id", "u1"));

        let (index, _) = picker.pick("flag", &weighted, &ctx).unwrap();
        let expected = pick_index(&[100, 50, 50], hash_fraction("flag", "u1"));
        assert_eq!(index, expected);
        for _ in 0..20 {
            assert_eq!(picker.pick("flag", &weighted, &ctx).unwrap().0, index);
        }
    }

    #[test]
    fn test_seeded_random_pick_is_reproducible() {
        let weighted = abc();
        let ctx = ContextSet::new();

        let first = WeightedValuePicker::with_seed(7);
        let second = WeightedValuePicker::with_seed(7);
        let picks: Vec<usize> = (0..10)
            .map(|_| first.pick("flag", &weighted, &ctx).unwrap().0)
            .collect();
        let again: Vec<usize> = (0..10)
            .map(|_| second.pick("flag", &weighted, &ctx).unwrap().0)
            .collect();
        assert_eq!(picks, again);
    }
}
