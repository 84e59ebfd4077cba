//! Want expressions: the boolean query over stat-line combinations.
//!
//! A [`WantExpr`] is an ordered list of [`WantTerm`]s. Requirement groups
//! hold `line -> value` constraints that must all hold within one outcome
//! combination; combinators reduce the groups before them with an
//! [`Operator`], optionally restricted to the `threshold` most recent
//! operands.
//!
//! The builder operations keep one invariant: field writes always land in
//! the trailing group, and a new group is only opened once the current one
//! holds something. A UI can therefore add fields one at a time without
//! tracking group boundaries itself.
//!
//! ## Evaluation
//!
//! [`WantExpr::evaluate`] runs the terms as a stack machine:
//!
//! - a group pushes whether every entry holds, where an entry holds when the
//!   values of the combination's lines overlapping the entry's line bits sum
//!   to at least the required value. A group containing [`Line::LINES`] `= n`
//!   instead holds when at least `n` lines overlap the union of its other keys;
//! - a combinator pops its `threshold` most recent operands (all of them
//!   without a threshold, clamped to the stack depth) and pushes their
//!   reduction. Zero operands reduce to the operator identity;
//! - operands left on the stack at the end are ANDed together. An empty
//!   stack never matches.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::enums::{Line, Operator};

/// `current_length` result when the trailing term is a combinator.
pub const CURRENT_IS_COMBINATOR: i64 = -1;

/// Conjunctive `line -> required value` constraints.
pub type RequirementGroup = BTreeMap<Line, i32>;

/// One element of a want expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WantTerm {
    Group(RequirementGroup),
    Combinator {
        op: Operator,
        /// `None` reduces every operand; `Some(n)` only the `n` most recent.
        threshold: Option<u32>,
    },
}

impl WantTerm {
    /// Build a combinator from a host-style threshold where negative means "none".
    pub fn combinator(op: Operator, threshold: i32) -> Self {
        WantTerm::Combinator {
            op,
            threshold: u32::try_from(threshold).ok(),
        }
    }

    pub fn is_empty_group(&self) -> bool {
        matches!(self, WantTerm::Group(g) if g.is_empty())
    }
}

impl fmt::Display for WantTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WantTerm::Group(group) => {
                write!(f, "{{")?;
                for (i, (line, value)) in group.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{line}: {value}")?;
                }
                write!(f, "}}")
            }
            WantTerm::Combinator { op, threshold } => match threshold {
                Some(n) => write!(f, "<{op}, {n}>"),
                None => write!(f, "<{op}, -1>"),
            },
        }
    }
}

/// Ordered sequence of requirement groups and combinators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WantExpr {
    terms: Vec<WantTerm>,
}

impl WantExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_terms(terms: Vec<WantTerm>) -> Self {
        Self { terms }
    }

    pub fn terms(&self) -> &[WantTerm] {
        &self.terms
    }

    pub fn last(&self) -> Option<&WantTerm> {
        self.terms.last()
    }

    /// Number of terms, groups and combinators alike.
    pub fn total_length(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Append an empty group if the expression is empty or ends in a
    /// non-empty group. Returns whether a group was appended.
    pub fn push_group(&mut self) -> bool {
        let open = match self.terms.last() {
            None => true,
            Some(WantTerm::Group(g)) => !g.is_empty(),
            Some(WantTerm::Combinator { .. }) => false,
        };
        if open {
            self.terms.push(WantTerm::Group(RequirementGroup::new()));
        }
        open
    }

    /// Entry count of the trailing group, 0 when there is none or it is
    /// empty, [`CURRENT_IS_COMBINATOR`] when the expression ends in a combinator.
    pub fn current_length(&self) -> i64 {
        match self.terms.last() {
            None => 0,
            Some(WantTerm::Group(g)) => g.len() as i64,
            Some(WantTerm::Combinator { .. }) => CURRENT_IS_COMBINATOR,
        }
    }

    /// Set `line -> value` in the trailing group, opening one first if the
    /// expression is empty or ends in a combinator.
    pub fn set_field(&mut self, line: Line, value: i32) {
        self.trailing_group().insert(line, value);
    }

    /// Insert a combinator at the current group boundary.
    ///
    /// A non-empty trailing group is closed first; the combinator then takes
    /// the empty trailing slot and a fresh group is opened after it for the
    /// next field writes.
    pub fn insert_combinator(&mut self, op: Operator, threshold: i32) {
        let term = WantTerm::combinator(op, threshold);
        match self.terms.last_mut() {
            Some(last) if last.is_empty_group() => *last = term,
            _ => self.terms.push(term),
        }
        self.terms.push(WantTerm::Group(RequirementGroup::new()));
    }

    pub fn clear(&mut self) {
        self.terms.clear();
    }

    /// Copy of the expression with empty groups removed, as handed to the engine.
    pub fn finalized(&self) -> WantExpr {
        WantExpr {
            terms: self
                .terms
                .iter()
                .filter(|t| !t.is_empty_group())
                .cloned()
                .collect(),
        }
    }

    /// Whether any requirement group has at least one entry.
    pub fn has_requirements(&self) -> bool {
        self.terms
            .iter()
            .any(|t| matches!(t, WantTerm::Group(g) if !g.is_empty()))
    }

    /// Union of every line the expression constrains, excluding `LINES`.
    pub fn relevant_lines(&self) -> Line {
        let mut mask = Line::EMPTY;
        for term in &self.terms {
            if let WantTerm::Group(group) = term {
                for line in group.keys() {
                    if *line != Line::LINES {
                        mask |= *line;
                    }
                }
            }
        }
        mask
    }

    /// Evaluate against one outcome combination of `(line, value)` pairs.
    pub fn evaluate(&self, combo: &[(Line, i32)]) -> bool {
        let mut stack: Vec<bool> = Vec::new();
        for term in &self.terms {
            match term {
                WantTerm::Group(group) => {
                    if !group.is_empty() {
                        stack.push(group_holds(group, combo));
                    }
                }
                WantTerm::Combinator { op, threshold } => {
                    let count = threshold
                        .map(|n| (n as usize).min(stack.len()))
                        .unwrap_or(stack.len());
                    let operands = stack.split_off(stack.len() - count);
                    let reduced = operands
                        .into_iter()
                        .reduce(|a, b| op.apply(a, b))
                        .unwrap_or_else(|| op.identity());
                    stack.push(reduced);
                }
            }
        }
        !stack.is_empty() && stack.into_iter().all(|v| v)
    }

    fn trailing_group(&mut self) -> &mut RequirementGroup {
        if !matches!(self.terms.last(), Some(WantTerm::Group(_))) {
            self.terms.push(WantTerm::Group(RequirementGroup::new()));
        }
        match self.terms.last_mut() {
            Some(WantTerm::Group(group)) => group,
            _ => unreachable!("a trailing group was just ensured"),
        }
    }
}

impl fmt::Display for WantExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{term}")?;
        }
        write!(f, "]")
    }
}

fn group_holds(group: &RequirementGroup, combo: &[(Line, i32)]) -> bool {
    if let Some(&wanted) = group.get(&Line::LINES) {
        let mask = group
            .keys()
            .filter(|l| **l != Line::LINES)
            .fold(Line::EMPTY, |acc, l| acc | *l);
        let count = combo.iter().filter(|(l, _)| l.intersects(mask)).count();
        return count as i64 >= i64::from(wanted);
    }
    group.iter().all(|(line, wanted)| {
        let total: i32 = combo
            .iter()
            .filter(|(l, _)| l.intersects(*line))
            .map(|(_, v)| *v)
            .sum();
        total >= *wanted
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(entries: &[(Line, i32)]) -> WantTerm {
        WantTerm::Group(entries.iter().copied().collect())
    }

    #[test]
    fn push_group_is_suppressed_on_empty_tail() {
        let mut w = WantExpr::new();
        assert!(w.push_group());
        assert!(!w.push_group());
        assert_eq!(w.total_length(), 1);

        w.set_field(Line::ATT_PERCENT, 21);
        assert!(w.push_group());
        assert_eq!(w.total_length(), 2);
    }

    #[test]
    fn push_group_is_suppressed_after_combinator() {
        let mut w = WantExpr::from_terms(vec![
            group(&[(Line::ATT_PERCENT, 21)]),
            WantTerm::combinator(Operator::Or, -1),
        ]);
        assert!(!w.push_group());
        assert_eq!(w.current_length(), CURRENT_IS_COMBINATOR);
    }

    #[test]
    fn current_length_counts_trailing_entries() {
        let mut w = WantExpr::new();
        assert_eq!(w.current_length(), 0);
        w.set_field(Line::BOSS, 30);
        w.set_field(Line::IED, 30);
        assert_eq!(w.current_length(), 2);
        w.set_field(Line::BOSS, 35);
        assert_eq!(w.current_length(), 2);
        assert_eq!(w.terms()[0], group(&[(Line::BOSS, 35), (Line::IED, 30)]));
    }

    #[test]
    fn set_field_after_combinator_opens_group() {
        let mut w = WantExpr::from_terms(vec![WantTerm::combinator(Operator::And, -1)]);
        w.set_field(Line::MESO, 20);
        assert_eq!(w.total_length(), 2);
        assert_eq!(w.current_length(), 1);
    }

    #[test]
    fn combinator_after_filled_group_adds_boundary() {
        let mut w = WantExpr::new();
        w.set_field(Line::ATT_PERCENT, 21);
        w.insert_combinator(Operator::Or, -1);
        assert_eq!(w.total_length(), 3);
        assert_eq!(
            w.terms()[1],
            WantTerm::Combinator {
                op: Operator::Or,
                threshold: None
            }
        );
        assert!(w.terms()[2].is_empty_group());
    }

    #[test]
    fn combinator_reuses_empty_slot() {
        let mut w = WantExpr::new();
        w.set_field(Line::ATT_PERCENT, 21);
        w.insert_combinator(Operator::Or, 2);
        w.insert_combinator(Operator::And, -1);
        assert_eq!(w.total_length(), 4);
        assert_eq!(w.terms()[1], WantTerm::combinator(Operator::Or, 2));
        assert_eq!(w.terms()[2], WantTerm::combinator(Operator::And, -1));
    }

    #[test]
    fn threshold_and_plain_forms_differ() {
        assert_eq!(
            WantTerm::combinator(Operator::And, 2),
            WantTerm::Combinator {
                op: Operator::And,
                threshold: Some(2)
            }
        );
        assert_ne!(
            WantTerm::combinator(Operator::And, 2),
            WantTerm::combinator(Operator::And, -1)
        );
    }

    #[test]
    fn finalized_drops_empty_groups() {
        let mut w = WantExpr::new();
        w.push_group();
        w.set_field(Line::DROP, 20);
        w.insert_combinator(Operator::Or, -1);
        let f = w.finalized();
        assert_eq!(f.total_length(), 2);
        assert!(f.has_requirements());
        assert!(!WantExpr::from_terms(vec![group(&[])]).has_requirements());
    }

    #[test]
    fn display_renders_groups_and_combinators() {
        let w = WantExpr::from_terms(vec![
            group(&[(Line::ATT_PERCENT, 21), (Line::BOSS, 30)]),
            WantTerm::combinator(Operator::Or, 2),
            WantTerm::combinator(Operator::And, -1),
        ]);
        assert_eq!(w.to_string(), "[{att%: 21, boss%: 30}, <or, 2>, <and, -1>]");
    }

    #[test]
    fn group_sums_overlapping_lines() {
        let w = WantExpr::from_terms(vec![group(&[(Line::ATT_PERCENT, 21)])]);
        let combo = [
            (Line::ATT_PERCENT, 12),
            (Line::ATT_PERCENT, 9),
            (Line::ANY, 0),
        ];
        assert!(w.evaluate(&combo));
        assert!(!w.evaluate(&combo[1..]));
    }

    #[test]
    fn composite_line_key_matches_either() {
        let w = WantExpr::from_terms(vec![group(&[(Line::ATT_PERCENT | Line::BOSS, 20)])]);
        assert!(w.evaluate(&[(Line::BOSS, 30), (Line::ANY, 0)]));
    }

    #[test]
    fn lines_pseudo_key_counts_matches() {
        let w = WantExpr::from_terms(vec![group(&[
            (Line::LINES, 3),
            (Line::ATT_PERCENT, 0),
            (Line::BOSS, 0),
        ])]);
        assert!(w.evaluate(&[(Line::ATT_PERCENT, 12), (Line::BOSS, 30), (Line::BOSS, 30)]));
        assert!(!w.evaluate(&[(Line::ATT_PERCENT, 12), (Line::BOSS, 30), (Line::IED, 30)]));
    }

    #[test]
    fn stack_machine_semantics() {
        // ((20 meso or 20 drop) and 10 str) or 23 str
        let w = WantExpr::from_terms(vec![
            group(&[(Line::MESO, 20)]),
            group(&[(Line::DROP, 20)]),
            WantTerm::combinator(Operator::Or, 2),
            group(&[(Line::STR_PERCENT, 10)]),
            WantTerm::combinator(Operator::And, 2),
            group(&[(Line::STR_PERCENT, 23)]),
            WantTerm::combinator(Operator::Or, 2),
        ]);
        assert!(w.evaluate(&[(Line::DROP, 20), (Line::STR_PERCENT, 12)]));
        assert!(!w.evaluate(&[(Line::DROP, 20), (Line::ATT_PERCENT, 12)]));
        assert!(w.evaluate(&[(Line::STR_PERCENT, 12), (Line::STR_PERCENT, 12)]));
        assert!(!w.evaluate(&[(Line::STR_PERCENT, 9), (Line::STR_PERCENT, 9)]));
    }

    #[test]
    fn threshold_limits_operands() {
        // a, b, <or, 1> leaves a and (b) on the stack, implicitly ANDed
        let w = WantExpr::from_terms(vec![
            group(&[(Line::MESO, 20)]),
            group(&[(Line::DROP, 20)]),
            WantTerm::combinator(Operator::Or, 1),
        ]);
        assert!(!w.evaluate(&[(Line::DROP, 20)]));
        assert!(w.evaluate(&[(Line::DROP, 20), (Line::MESO, 20)]));
    }

    #[test]
    fn plain_reduction_uses_whole_stack() {
        let w = WantExpr::from_terms(vec![
            group(&[(Line::MESO, 20)]),
            group(&[(Line::DROP, 20)]),
            group(&[(Line::IED, 30)]),
            WantTerm::combinator(Operator::Or, -1),
        ]);
        assert!(w.evaluate(&[(Line::IED, 30)]));
        assert!(!w.evaluate(&[(Line::BOSS, 30)]));
    }

    #[test]
    fn empty_expression_never_matches() {
        assert!(!WantExpr::new().evaluate(&[(Line::ATT_PERCENT, 12)]));
        let only_op = WantExpr::from_terms(vec![WantTerm::combinator(Operator::And, -1)]);
        assert!(only_op.evaluate(&[]));
    }

    #[test]
    fn relevant_lines_excludes_lines_key() {
        let w = WantExpr::from_terms(vec![
            group(&[(Line::LINES, 2), (Line::BOSS, 0)]),
            group(&[(Line::IED, 30)]),
        ]);
        assert_eq!(w.relevant_lines(), Line::BOSS | Line::IED);
    }
}
