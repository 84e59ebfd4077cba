//! Matching results and the per-session result cache.
//!
//! A [`Matching`] holds four parallel sequences indexed together: the line
//! identities of each matching combination, their values, their "one in N"
//! probabilities and whether each line rolled as a prime line. A compute call
//! replaces a session's cached result wholesale; results are never merged.

use serde::{Deserialize, Serialize};

use crate::enums::Line;
use crate::error::SessionError;
use crate::registry::{SessionId, SessionRegistry};

/// Matching combinations as four parallel sequences of equal outer length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Matching {
    pub types: Vec<Vec<Line>>,
    pub values: Vec<Vec<i32>>,
    pub probabilities: Vec<Vec<f64>>,
    pub is_prime: Vec<Vec<bool>>,
}

/// One line of one matching combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchedLine {
    pub line: Line,
    pub value: i32,
    pub one_in: f64,
    pub prime: bool,
}

impl Matching {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one combination, keeping the four sequences aligned.
    pub fn push(&mut self, combo: &[MatchedLine]) {
        self.types.push(combo.iter().map(|l| l.line).collect());
        self.values.push(combo.iter().map(|l| l.value).collect());
        self.probabilities.push(combo.iter().map(|l| l.one_in).collect());
        self.is_prime.push(combo.iter().map(|l| l.prime).collect());
    }

    /// Number of combinations.
    pub fn outer_length(&self) -> usize {
        self.types.len()
    }

    /// Lines per combination, 0 when there are no combinations.
    pub fn inner_length(&self) -> usize {
        self.types.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Combination `index` reassembled from the parallel sequences.
    pub fn combo(&self, index: usize) -> Option<Vec<MatchedLine>> {
        let types = self.types.get(index)?;
        let values = self.values.get(index)?;
        let probabilities = self.probabilities.get(index)?;
        let is_prime = self.is_prime.get(index)?;
        Some(
            types
                .iter()
                .zip(values)
                .zip(probabilities)
                .zip(is_prime)
                .map(|(((line, value), one_in), prime)| MatchedLine {
                    line: *line,
                    value: *value,
                    one_in: *one_in,
                    prime: *prime,
                })
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Result cache accessors
// ---------------------------------------------------------------------------

impl SessionRegistry {
    /// Cached result of the last successful compute on `id`.
    pub fn matching(&self, id: SessionId) -> Result<&Matching, SessionError> {
        self.get(id)
            .and_then(|s| s.matching.as_ref())
            .ok_or(SessionError::NoResult { session: id })
    }

    pub fn matching_outer_length(&self, id: SessionId) -> Result<usize, SessionError> {
        Ok(self.matching(id)?.outer_length())
    }

    pub fn matching_inner_length(&self, id: SessionId) -> Result<usize, SessionError> {
        Ok(self.matching(id)?.inner_length())
    }

    pub fn matching_types(&self, id: SessionId) -> Result<&[Vec<Line>], SessionError> {
        Ok(&self.matching(id)?.types)
    }

    pub fn matching_values(&self, id: SessionId) -> Result<&[Vec<i32>], SessionError> {
        Ok(&self.matching(id)?.values)
    }

    pub fn matching_probabilities(&self, id: SessionId) -> Result<&[Vec<f64>], SessionError> {
        Ok(&self.matching(id)?.probabilities)
    }

    pub fn matching_is_primes(&self, id: SessionId) -> Result<&[Vec<bool>], SessionError> {
        Ok(&self.matching(id)?.is_prime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ParamValue;

    fn line(line: Line, value: i32, one_in: f64, prime: bool) -> MatchedLine {
        MatchedLine {
            line,
            value,
            one_in,
            prime,
        }
    }

    fn sample() -> Matching {
        let mut m = Matching::new();
        m.push(&[
            line(Line::ATT_PERCENT, 12, 8.5, true),
            line(Line::ATT_PERCENT, 9, 7.0, false),
            line(Line::ANY, 0, 1.2, false),
        ]);
        m.push(&[
            line(Line::ANY, 0, 1.1, true),
            line(Line::ATT_PERCENT, 12, 80.0, true),
            line(Line::ATT_PERCENT, 9, 7.0, false),
        ]);
        m
    }

    #[test]
    fn push_keeps_sequences_parallel() {
        let m = sample();
        assert_eq!(m.outer_length(), 2);
        assert_eq!(m.inner_length(), 3);
        assert_eq!(m.values.len(), 2);
        assert_eq!(m.probabilities.len(), 2);
        assert_eq!(m.is_prime[1], vec![true, true, false]);
    }

    #[test]
    fn combo_reassembles_lines() {
        let m = sample();
        let c = m.combo(1).unwrap();
        assert_eq!(c[1], line(Line::ATT_PERCENT, 12, 80.0, true));
        assert!(m.combo(2).is_none());
    }

    #[test]
    fn empty_matching_has_zero_depth() {
        let m = Matching::new();
        assert!(m.is_empty());
        assert_eq!(m.inner_length(), 0);
    }

    #[test]
    fn accessors_require_a_result() {
        let mut reg = SessionRegistry::new();
        assert_eq!(
            reg.matching_outer_length(1),
            Err(SessionError::NoResult { session: 1 })
        );
        reg.ensure(1);
        assert!(reg.matching_types(1).is_err());
    }

    #[test]
    fn accessors_return_stored_sequences() {
        let mut reg = SessionRegistry::new();
        let m = sample();
        reg.set(3, ParamValue::Matching(m.clone()));
        assert_eq!(reg.matching_outer_length(3).unwrap(), 2);
        assert_eq!(reg.matching_inner_length(3).unwrap(), 3);
        assert_eq!(reg.matching_types(3).unwrap(), m.types.as_slice());
        assert_eq!(reg.matching_values(3).unwrap(), m.values.as_slice());
        assert_eq!(reg.matching_probabilities(3).unwrap(), m.probabilities.as_slice());
        assert_eq!(reg.matching_is_primes(3).unwrap(), m.is_prime.as_slice());
    }
}
