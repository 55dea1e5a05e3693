use itertools::Itertools;
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One of the three rounds of a play-through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum_macros::Display)]
pub enum Round {
    #[strum(to_string = "Round 1")]
    One,
    #[strum(to_string = "Round 2")]
    Two,
    #[strum(to_string = "Round 3")]
    Three,
}

impl Round {
    pub const ALL: [Round; 3] = [Round::One, Round::Two, Round::Three];

    pub fn number(self) -> u8 {
        match self {
            Round::One => 1,
            Round::Two => 2,
            Round::Three => 3,
        }
    }

    pub fn from_number(number: u8) -> Option<Round> {
        match number {
            1 => Some(Round::One),
            2 => Some(Round::Two),
            3 => Some(Round::Three),
            _ => None,
        }
    }

    /// Zero-based position, used to index per-round tables
    pub fn index(self) -> usize {
        self.number() as usize - 1
    }

    pub fn next(self) -> Option<Round> {
        Round::from_number(self.number() + 1)
    }

    /// Base oscillation speed of the blink-out; later rounds flicker faster
    pub fn blink_base_speed(self) -> f64 {
        match self {
            Round::One => 8.0,
            Round::Two => 12.0,
            Round::Three => 20.0,
        }
    }
}

/// Immutable per-round difficulty table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundConfig {
    pub display_time_secs: f64,
    pub blink_duration_secs: f64,
    /// Inclusive budget: the round ends once errors exceed this value
    pub max_errors: u32,
    pub breeds: Vec<String>,
}

impl RoundConfig {
    fn new(display_time_secs: f64, blink_duration_secs: f64, max_errors: u32, breeds: &[&str]) -> Self {
        Self {
            display_time_secs,
            blink_duration_secs,
            max_errors,
            breeds: breeds.iter().map(|b| b.to_string()).collect(),
        }
    }

    pub fn display_time(&self) -> Duration {
        Duration::try_from_secs_f64(self.display_time_secs).unwrap_or_default()
    }

    pub fn blink_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.blink_duration_secs).unwrap_or_default()
    }

    pub fn errors_exceeded(&self, errors: u32) -> bool {
        errors > self.max_errors
    }
}

/// Static breed tables plus the breed -> image service key mapping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreedCatalog {
    pub rounds: [RoundConfig; 3],
    #[serde(default)]
    pub image_keys: BTreeMap<String, String>,
}

impl Default for BreedCatalog {
    fn default() -> Self {
        let rounds = [
            RoundConfig::new(
                5.0,
                1.5,
                3,
                &[
                    "Golden Retriever",
                    "Labrador",
                    "German Shepherd",
                    "Bulldog",
                    "Beagle",
                    "Poodle",
                    "Rottweiler",
                    "Yorkshire Terrier",
                ],
            ),
            RoundConfig::new(
                3.0,
                1.0,
                2,
                &[
                    "Shiba Inu",
                    "Border Collie",
                    "Australian Shepherd",
                    "Dalmatian",
                    "Husky",
                    "Akita",
                    "Basenji",
                    "Whippet",
                ],
            ),
            RoundConfig::new(
                2.0,
                0.5,
                1,
                &[
                    "Xoloitzcuintli",
                    "Azawakh",
                    "Catalburun",
                    "Lundehund",
                    "Mudi",
                    "Lagotto Romagnolo",
                    "Keeshond",
                    "Bergamasco",
                ],
            ),
        ];

        // main/sub path segments understood by the image service
        let image_keys = [
            ("Golden Retriever", "retriever/golden"),
            ("Labrador", "labrador"),
            ("German Shepherd", "german/shepherd"),
            ("Bulldog", "bulldog/english"),
            ("Beagle", "beagle"),
            ("Poodle", "poodle/standard"),
            ("Rottweiler", "rottweiler"),
            ("Yorkshire Terrier", "terrier/yorkshire"),
            ("Shiba Inu", "shiba"),
            ("Border Collie", "collie/border"),
            ("Australian Shepherd", "australian/shepherd"),
            ("Dalmatian", "dalmatian"),
            ("Husky", "husky"),
            ("Akita", "akita"),
            ("Basenji", "basenji"),
            ("Whippet", "whippet"),
            ("Xoloitzcuintli", "mexicanhairless"),
            ("Azawakh", "saluki"),
            ("Catalburun", "pointer/german"),
            ("Lundehund", "elkhound/norwegian"),
            ("Mudi", "sheepdog/shetland"),
            ("Lagotto Romagnolo", "waterdog/spanish"),
            ("Keeshond", "keeshond"),
            ("Bergamasco", "sheepdog/shetland"),
        ]
        .into_iter()
        .map(|(breed, key)| (breed.to_string(), key.to_string()))
        .collect();

        Self { rounds, image_keys }
    }
}

impl BreedCatalog {
    pub fn round_config(&self, round: Round) -> &RoundConfig {
        &self.rounds[round.index()]
    }

    pub fn breeds_for_round(&self, round: Round) -> &[String] {
        &self.round_config(round).breeds
    }

    /// Lookup key for the image service. Unmapped breeds fall back to the
    /// lowercased name with whitespace runs replaced by `-`.
    pub fn image_source_key(&self, breed: &str) -> String {
        match self.image_keys.get(breed) {
            Some(key) => key.clone(),
            None => breed.to_lowercase().split_whitespace().join("-"),
        }
    }

    /// Draw the live answer universe for a fresh round instance: one or two
    /// breeds, upgraded to two whenever a second distinct breed exists.
    pub fn draw_round_pool<R: Rng + ?Sized>(&self, round: Round, rng: &mut R) -> Vec<String> {
        let available: Vec<&String> = self.breeds_for_round(round).iter().unique().collect();
        let wanted = rng.gen_range(1..=2);

        let mut shuffled = available.clone();
        shuffled.shuffle(rng);
        let mut pool: Vec<String> = shuffled.into_iter().take(wanted).cloned().collect();

        if pool.len() == 1 {
            let remaining: Vec<&String> = available
                .iter()
                .copied()
                .filter(|b| **b != pool[0])
                .collect();
            if let Some(extra) = remaining.choose(rng) {
                pool.push(extra.to_string());
            }
        }

        pool
    }
}
