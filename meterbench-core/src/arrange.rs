//! Execution-order strategies.
//!
//! An [`Arrangement`] turns the planned elements into the order they are
//! executed in. Every arrangement is a permutation of its input. Randomized
//! arrangements take an optional seed so orderings can be reproduced.

use std::collections::HashMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::unit::UnitId;

/// Strategy ordering a collection of elements into an execution sequence.
pub trait Arrangement: Send + Sync {
    /// Reorder `elements`. The output holds exactly the input elements.
    fn arrange(&self, elements: Vec<Element>) -> Vec<Element>;
}

/// Which arrangement a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrangementKind {
    /// Discovery order
    None,
    /// Same-unit elements contiguous, groups in random order
    #[default]
    Sequential,
    /// Uniform random permutation
    Shuffle,
}

impl ArrangementKind {
    /// Build the arrangement, seeding randomized kinds with `seed`.
    pub fn build(self, seed: Option<u64>) -> Box<dyn Arrangement> {
        match self {
            ArrangementKind::None => Box::new(NoArrangement),
            ArrangementKind::Sequential => Box::new(Sequential::new(seed)),
            ArrangementKind::Shuffle => Box::new(Shuffle::new(seed)),
        }
    }
}

impl fmt::Display for ArrangementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArrangementKind::None => "none",
            ArrangementKind::Sequential => "sequential",
            ArrangementKind::Shuffle => "shuffle",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ArrangementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ArrangementKind::None),
            "sequential" => Ok(ArrangementKind::Sequential),
            "shuffle" => Ok(ArrangementKind::Shuffle),
            other => Err(format!("unknown arrangement: {}", other)),
        }
    }
}

fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Identity ordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArrangement;

impl Arrangement for NoArrangement {
    fn arrange(&self, elements: Vec<Element>) -> Vec<Element> {
        elements
    }
}

/// Groups elements by unit and runs the groups in random order.
///
/// Within a group elements keep their discovery order, so repeated
/// occurrences of one unit are never interleaved with other units.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential {
    seed: Option<u64>,
}

impl Sequential {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }
}

impl Arrangement for Sequential {
    fn arrange(&self, elements: Vec<Element>) -> Vec<Element> {
        let mut order: Vec<UnitId> = Vec::new();
        let mut groups: HashMap<UnitId, Vec<Element>> = HashMap::new();

        for element in elements {
            let id = element.unit_id().clone();
            if !groups.contains_key(&id) {
                order.push(id.clone());
            }
            groups.entry(id).or_default().push(element);
        }

        order.shuffle(&mut rng(self.seed));

        order
            .into_iter()
            .flat_map(|id| groups.remove(&id).unwrap_or_default())
            .collect()
    }
}

/// Uniform random permutation of individual elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct Shuffle {
    seed: Option<u64>,
}

impl Shuffle {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }
}

impl Arrangement for Shuffle {
    fn arrange(&self, mut elements: Vec<Element>) -> Vec<Element> {
        elements.shuffle(&mut rng(self.seed));
        elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Suite, Target};

    /// Three units with `runs` elements each, planned in discovery order.
    fn elements(runs: u32) -> Vec<Element> {
        Suite::new()
            .with(
                Target::new("Sort", Vec::<u32>::new)
                    .runs(runs)
                    .bench("quick", |_: &mut Vec<u32>| Ok(()))
                    .bench("merge", |_: &mut Vec<u32>| Ok(()))
                    .bench("heap", |_: &mut Vec<u32>| Ok(())),
            )
            .unwrap()
            .plan(1, None)
    }

    fn ids(elements: &[Element]) -> Vec<u64> {
        elements.iter().map(|e| e.id().0).collect()
    }

    fn sorted(mut ids: Vec<u64>) -> Vec<u64> {
        ids.sort_unstable();
        ids
    }

    fn all_kinds() -> Vec<Box<dyn Arrangement>> {
        vec![
            ArrangementKind::None.build(Some(7)),
            ArrangementKind::Sequential.build(Some(7)),
            ArrangementKind::Shuffle.build(Some(7)),
        ]
    }

    #[test]
    fn test_empty_input() {
        for arrangement in all_kinds() {
            assert!(arrangement.arrange(Vec::new()).is_empty());
        }
    }

    #[test]
    fn test_single_element_invariant() {
        let single: Vec<Element> = elements(1).into_iter().take(1).collect();
        for arrangement in all_kinds() {
            assert_eq!(ids(&arrangement.arrange(single.clone())), vec![0]);
        }
    }

    #[test]
    fn test_arrangements_are_permutations() {
        let input = elements(4);
        let expected = ids(&input);
        for arrangement in all_kinds() {
            let output = arrangement.arrange(input.clone());
            assert_eq!(sorted(ids(&output)), expected);
        }
    }

    #[test]
    fn test_no_arrangement_keeps_order() {
        let input = elements(3);
        let output = NoArrangement.arrange(input.clone());
        assert_eq!(ids(&output), ids(&input));
    }

    #[test]
    fn test_sequential_groups_are_contiguous_and_ordered() {
        for seed in 0..20 {
            let output = Sequential::new(Some(seed)).arrange(elements(4));

            let mut seen: Vec<UnitId> = Vec::new();
            for window in output.windows(2) {
                if window[0].unit_id() != window[1].unit_id() {
                    assert!(
                        !seen.contains(window[1].unit_id()),
                        "unit {} interleaved for seed {}",
                        window[1].unit_id(),
                        seed
                    );
                    seen.push(window[0].unit_id().clone());
                }
            }

            for unit in ["quick", "merge", "heap"] {
                let group: Vec<u64> = output
                    .iter()
                    .filter(|e| e.unit_id().method == unit)
                    .map(|e| e.id().0)
                    .collect();
                assert_eq!(group.len(), 4);
                assert!(group.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }

    #[test]
    fn test_seeded_arrangements_are_reproducible() {
        let first = Shuffle::new(Some(42)).arrange(elements(5));
        let second = Shuffle::new(Some(42)).arrange(elements(5));
        assert_eq!(ids(&first), ids(&second));

        let first = Sequential::new(Some(42)).arrange(elements(5));
        let second = Sequential::new(Some(42)).arrange(elements(5));
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_shuffle_matches_seeded_permutation() {
        let input = elements(5);
        let mut expected = ids(&input);
        expected.shuffle(&mut StdRng::seed_from_u64(99));

        let output = Shuffle::new(Some(99)).arrange(input);
        assert_eq!(ids(&output), expected);
    }

    #[test]
    fn test_sequential_matches_seeded_group_order() {
        let input = elements(2);
        let mut groups = vec!["quick", "merge", "heap"];
        groups.shuffle(&mut StdRng::seed_from_u64(3));

        let output = Sequential::new(Some(3)).arrange(input);
        let mut methods: Vec<&str> = output.iter().map(|e| e.unit_id().method.as_str()).collect();
        methods.dedup();
        assert_eq!(methods, groups);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("shuffle".parse(), Ok(ArrangementKind::Shuffle));
        assert_eq!("None".parse(), Ok(ArrangementKind::None));
        assert!("random".parse::<ArrangementKind>().is_err());
        assert_eq!(ArrangementKind::default(), ArrangementKind::Sequential);
    }
}
