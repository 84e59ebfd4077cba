//! Probability engines.
//!
//! [`ProbabilityEngine`] is the contract the calculator drives: given the
//! assembled parameters it returns the aggregate probability of satisfying
//! the want expression, the tier the outcome lands in, and every matching
//! combination. [`EnumeratingEngine`] is the bundled implementation; it
//! walks every ordered slot combination the mechanism can roll.

use rayon::prelude::*;

use crate::enums::{Cube, Line, Tier};
use crate::error::{CalcResult, EngineError};
use crate::lines::LineRow;
use crate::matching::{MatchedLine, Matching};
use crate::query::CalcParams;

/// Result of one engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    /// Probability in `[0, 1]` that one use of the mechanism satisfies the wants.
    pub probability: f64,
    pub achieved_tier: Tier,
    pub matching: Matching,
}

/// Computes outcome probabilities for assembled parameters.
///
/// Callers never pass an empty want expression or an empty line table.
pub trait ProbabilityEngine: Send + Sync {
    fn compute(&self, params: &CalcParams<'_>) -> CalcResult<EngineOutput>;
}

// ---------------------------------------------------------------------------
// Mechanism profiles
// ---------------------------------------------------------------------------

/// Per-slot chance of rolling a prime (current-tier) line, in slot order.
/// The slot count is the length of the list. The first entry whose
/// mechanism intersects the query wins, so order matters for combined masks.
const SLOT_PROFILES: &[(Cube, &[f64])] = &[
    (Cube::VIOLET, &[1.0, 0.1, 0.01, 0.01, 0.01, 0.01]),
    (Cube::UNI, &[0.2]),
    (Cube::EQUALITY, &[1.0, 1.0, 1.0]),
    (Cube::FAMILIAR, &[1.0, 0.0]),
    (Cube::RED_FAM_CARD, &[1.0, 0.1]),
    (Cube::RED, &[1.0, 0.1, 0.01]),
    (Cube::BLACK, &[1.0, 0.2, 0.05]),
    (Cube::BONUS, &[1.0, 0.004975, 0.004975]),
    (Cube::OCCULT, &[1.0, 0.009901, 0.009901]),
    (Cube::MASTER, &[1.0, 0.1184, 0.0]),
    (Cube::MEISTER, &[1.0, 0.0169, 0.0]),
];

/// A uni cube rerolls one of the three lines, picked at random.
const UNI_LINE_PICKS: f64 = 3.0;

/// Upper bound on how many times each line may appear in one combination.
/// Each line is counted on its own, so boss/boss/ied is a legal roll.
const LINE_CAPS: &[(Line, usize)] = &[
    (Line::INVIN, 1),
    (Line::DECENTS, 1),
    (Line::BOSS, 2),
    (Line::IED, 2),
    (Line::DROP, 2),
];

fn slot_profile(cube: Cube) -> Option<&'static [f64]> {
    SLOT_PROFILES
        .iter()
        .find(|(c, _)| cube.intersects(*c))
        .map(|(_, p)| *p)
}

fn is_possible(combo: &[&Choice]) -> bool {
    LINE_CAPS.iter().all(|&(line, max)| {
        combo.iter().filter(|c| c.line.intersects(line)).count() <= max
    })
}

// ---------------------------------------------------------------------------
// Enumerating engine
// ---------------------------------------------------------------------------

/// One possible outcome of one slot.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Choice {
    line: Line,
    value: i32,
    /// Probability of this outcome in its slot.
    weight: f64,
    prime: bool,
}

/// Exhaustive engine over ordered slot combinations.
///
/// Lines the query does not mention are pooled into a single [`Line::ANY`]
/// outcome per tier, which keeps the combination count proportional to the
/// query instead of the table. Combinations that the game never produces
/// (two invincibility lines, two decent-skill lines, three of the same
/// boss/ied/drop line) are dropped without redistributing their mass.
#[derive(Debug, Clone)]
pub struct EnumeratingEngine {
    max_combos: usize,
}

impl EnumeratingEngine {
    pub fn new(max_combos: usize) -> Self {
        Self { max_combos }
    }

    pub fn max_combos(&self) -> usize {
        self.max_combos
    }

    /// Relevant rows as separate outcomes plus one `ANY` outcome for the rest.
    fn pool(rows: &[&LineRow], relevant: Line, prime: bool, scale: f64) -> CalcResult<Vec<Choice>> {
        let mut choices = Vec::new();
        let mut covered = 0.0;
        for row in rows.iter().filter(|r| r.line.intersects(relevant)) {
            covered += row.chance();
            choices.push(Choice {
                line: row.line,
                value: row.value,
                weight: row.chance() * scale,
                prime,
            });
        }
        if covered > 1.0 + 1e-9 {
            return Err(EngineError::InconsistentData {
                message: format!("line chances sum to {covered:.4}"),
            }
            .into());
        }
        let rest = (1.0 - covered).max(0.0);
        if rest > 0.0 {
            choices.push(Choice {
                line: Line::ANY,
                value: 0,
                weight: rest * scale,
                prime,
            });
        }
        Ok(choices)
    }

    fn slots(&self, params: &CalcParams<'_>, profile: &[f64]) -> CalcResult<Vec<Vec<Choice>>> {
        let relevant = params.wants.relevant_lines();
        let rows = |tier: Tier| {
            params
                .lines
                .rows_for(params.category, tier, params.level, params.region)
        };
        let prime_rows = rows(params.tier);
        let lower_rows = params.tier.below().map(rows).unwrap_or_default();

        let mut slots = Vec::with_capacity(profile.len());
        for &prime_chance in profile {
            let prime_chance = if lower_rows.is_empty() { 1.0 } else { prime_chance };
            let mut slot = Vec::new();
            if prime_chance > 0.0 {
                slot.extend(Self::pool(&prime_rows, relevant, true, prime_chance)?);
            }
            if prime_chance < 1.0 {
                slot.extend(Self::pool(&lower_rows, relevant, false, 1.0 - prime_chance)?);
            }
            slots.push(slot);
        }
        Ok(slots)
    }
}

impl Default for EnumeratingEngine {
    fn default() -> Self {
        Self::new(1_000_000)
    }
}

impl ProbabilityEngine for EnumeratingEngine {
    fn compute(&self, params: &CalcParams<'_>) -> CalcResult<EngineOutput> {
        let empty = EngineOutput {
            probability: 0.0,
            achieved_tier: params.tier,
            matching: Matching::new(),
        };
        let Some(profile) = slot_profile(params.cube) else {
            tracing::warn!(cube = %params.cube, "no slot profile for mechanism");
            return Ok(empty);
        };
        if params
            .lines
            .rows_for(params.category, params.tier, params.level, params.region)
            .is_empty()
        {
            tracing::debug!(
                category = %params.category,
                tier = %params.tier,
                "no lines roll for this item"
            );
            return Ok(empty);
        }

        let slots = self.slots(params, profile)?;
        let total = slots
            .iter()
            .try_fold(1u64, |acc, s| acc.checked_mul(s.len() as u64))
            .unwrap_or(u64::MAX);
        if total > self.max_combos as u64 {
            return Err(EngineError::TooManyCombos {
                count: total,
                limit: self.max_combos,
            }
            .into());
        }

        tracing::debug!(slots = slots.len(), combos = total, "enumerating combinations");

        let outcomes: Vec<(f64, Vec<MatchedLine>)> = (0..total as usize)
            .into_par_iter()
            .filter_map(|index| {
                let mut rest = index;
                let combo: Vec<&Choice> = slots
                    .iter()
                    .map(|slot| {
                        let choice = &slot[rest % slot.len()];
                        rest /= slot.len();
                        choice
                    })
                    .collect();
                if !is_possible(&combo) {
                    return None;
                }
                let pairs: Vec<(Line, i32)> = combo.iter().map(|c| (c.line, c.value)).collect();
                if !params.wants.evaluate(&pairs) {
                    return None;
                }
                let mass: f64 = combo.iter().map(|c| c.weight).product();
                let lines = combo
                    .iter()
                    .map(|c| MatchedLine {
                        line: c.line,
                        value: c.value,
                        one_in: 1.0 / c.weight,
                        prime: c.prime,
                    })
                    .collect::<Vec<_>>();
                Some((mass, lines))
            })
            .collect();

        let mut probability = 0.0_f64;
        let mut matching = Matching::new();
        for (mass, lines) in outcomes {
            probability += mass;
            matching.push(&lines);
        }

        if params.cube.intersects(Cube::UNI) {
            probability /= UNI_LINE_PICKS;
        }

        tracing::debug!(
            probability,
            matches = matching.outer_length(),
            "enumeration finished"
        );

        Ok(EngineOutput {
            probability: probability.clamp(0.0, 1.0),
            achieved_tier: params.tier,
            matching,
        })
    }
}
