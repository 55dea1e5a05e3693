use crate::breeds::{BreedCatalog, Round};
use itertools::Itertools;
use rand::{seq::SliceRandom, Rng};
use std::collections::HashMap;

/// No breed may appear more often than this in one choice set
pub const MAX_OCCURRENCES: usize = 2;

/// Builds the labelled answer options shown next to each dog
pub struct ChoiceGenerator<'a> {
    catalog: &'a BreedCatalog,
}

impl<'a> ChoiceGenerator<'a> {
    pub fn new(catalog: &'a BreedCatalog) -> Self {
        Self { catalog }
    }

    /// Total number of options for a question: always 4 in round 1,
    /// 3 or 4 (uniform) afterwards.
    pub fn target_count<R: Rng + ?Sized>(round: Round, rng: &mut R) -> usize {
        match round {
            Round::One => 4,
            _ => 3 + rng.gen_range(0..=1),
        }
    }

    /// Generate a shuffled choice set for `correct`.
    ///
    /// Round 1 draws wrong answers from the full round-1 list, later rounds
    /// from the live round pool. A short candidate pool is padded with at most
    /// one repeat of the first shuffled candidate.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        correct: &str,
        round: Round,
        active_pool: &[String],
        rng: &mut R,
    ) -> Vec<String> {
        let source = match round {
            Round::One => self.catalog.breeds_for_round(Round::One),
            _ => active_pool,
        };

        let mut candidates: Vec<&String> = source
            .iter()
            .filter(|b| b.as_str() != correct)
            .unique()
            .collect();

        let total = Self::target_count(round, rng);
        let needed = total - 1;

        candidates.shuffle(rng);

        let mut selected: Vec<String> = candidates.iter().take(needed).map(|b| b.to_string()).collect();
        if selected.len() < needed {
            if let Some(first) = candidates.first() {
                selected.push(first.to_string());
            }
        }

        let mut choices = Vec::with_capacity(total);
        choices.push(correct.to_string());
        choices.extend(selected);

        let mut choices = cap_duplicates(choices);
        choices.shuffle(rng);
        choices
    }
}

/// Drop every occurrence of a breed beyond the second, preserving order.
pub fn cap_duplicates(choices: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    choices
        .into_iter()
        .filter(|breed| {
            let count = seen.entry(breed.clone()).or_insert(0);
            *count += 1;
            *count <= MAX_OCCURRENCES
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn pool(breeds: &[&str]) -> Vec<String> {
        breeds.iter().map(|b| b.to_string()).collect()
    }

    fn assert_occurrence_rules(choices: &[String], correct: &str) {
        let counts = choices.iter().counts();
        let correct_count = choices.iter().filter(|b| b.as_str() == correct).count();
        assert!(
            (1..=MAX_OCCURRENCES).contains(&correct_count),
            "correct breed appears {correct_count} times in {choices:?}"
        );
        for (breed, count) in counts {
            assert!(count <= MAX_OCCURRENCES, "{breed} appears {count} times");
        }
    }

    #[test]
    fn round_one_always_offers_four() {
        let catalog = BreedCatalog::default();
        let generator = ChoiceGenerator::new(&catalog);
        let mut rng = StdRng::seed_from_u64(11);

        for correct in catalog.breeds_for_round(Round::One) {
            for _ in 0..50 {
                let choices = generator.generate(correct, Round::One, &[], &mut rng);
                assert_eq!(choices.len(), 4);
                assert_occurrence_rules(&choices, correct);
                assert_eq!(choices.iter().unique().count(), 4);
            }
        }
    }

    #[test]
    fn later_rounds_stay_inside_the_live_pool() {
        let catalog = BreedCatalog::default();
        let generator = ChoiceGenerator::new(&catalog);
        let mut rng = StdRng::seed_from_u64(3);
        let active = pool(&["Akita", "Husky"]);

        for round in [Round::Two, Round::Three] {
            for _ in 0..200 {
                let choices = generator.generate("Akita", round, &active, &mut rng);
                // one wrong candidate plus a single pad never reaches four
                assert_eq!(choices.len(), 3, "got {choices:?}");
                assert_occurrence_rules(&choices, "Akita");
                assert!(choices.iter().all(|b| active.contains(b)));
            }
        }
    }

    #[test]
    fn target_count_distribution() {
        let mut rng = StdRng::seed_from_u64(8);
        let counts = (0..400)
            .map(|_| ChoiceGenerator::target_count(Round::Two, &mut rng))
            .counts();
        assert_eq!(counts.len(), 2);
        assert!(counts[&3] > 100 && counts[&4] > 100);
        assert_eq!(ChoiceGenerator::target_count(Round::One, &mut rng), 4);
    }

    #[test]
    fn two_breed_pool_pads_with_single_duplicate() {
        let catalog = BreedCatalog::default();
        let generator = ChoiceGenerator::new(&catalog);
        let mut rng = StdRng::seed_from_u64(99);
        let active = pool(&["Mudi", "Keeshond"]);

        for _ in 0..100 {
            let choices = generator.generate("Mudi", Round::Three, &active, &mut rng);
            assert_eq!(choices.iter().filter(|b| b.as_str() == "Mudi").count(), 1);
            assert_eq!(choices.iter().filter(|b| b.as_str() == "Keeshond").count(), 2);
        }
    }

    #[test]
    fn larger_pool_can_fill_four_distinct() {
        let catalog = BreedCatalog::default();
        let generator = ChoiceGenerator::new(&catalog);
        let mut rng = StdRng::seed_from_u64(5);
        let active = pool(&["Akita", "Husky", "Whippet", "Basenji", "Dalmatian"]);
        let mut saw_four = false;

        for _ in 0..100 {
            let choices = generator.generate("Husky", Round::Two, &active, &mut rng);
            assert!(choices.len() == 3 || choices.len() == 4);
            assert_eq!(choices.iter().unique().count(), choices.len());
            saw_four |= choices.len() == 4;
        }
        assert!(saw_four);
    }

    #[test]
    fn empty_candidate_pool_degrades_to_correct_only() {
        let catalog = BreedCatalog::default();
        let generator = ChoiceGenerator::new(&catalog);
        let mut rng = StdRng::seed_from_u64(0);

        let choices = generator.generate("Akita", Round::Two, &pool(&["Akita"]), &mut rng);
        assert_eq!(choices, vec!["Akita"]);

        let choices = generator.generate("Akita", Round::Two, &[], &mut rng);
        assert_eq!(choices, vec!["Akita"]);
    }

    #[test]
    fn round_one_ignores_active_pool() {
        let catalog = BreedCatalog::default();
        let generator = ChoiceGenerator::new(&catalog);
        let mut rng = StdRng::seed_from_u64(21);
        let round_one = catalog.breeds_for_round(Round::One);

        let choices = generator.generate("Beagle", Round::One, &pool(&["Akita"]), &mut rng);
        assert!(choices.iter().all(|b| round_one.contains(b)));
    }

    #[test]
    fn cap_keeps_first_two_occurrences() {
        let capped = cap_duplicates(pool(&["A", "B", "A", "A", "B", "C", "B"]));
        assert_eq!(capped, pool(&["A", "B", "A", "B", "C"]));
    }

    #[test]
    fn seeded_generation_is_deterministic() {
        let catalog = BreedCatalog::default();
        let generator = ChoiceGenerator::new(&catalog);
        let first = generator.generate("Poodle", Round::One, &[], &mut StdRng::seed_from_u64(42));
        let second = generator.generate("Poodle", Round::One, &[], &mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
    }
}
