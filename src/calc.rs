//! Calculator facade: every session operation keyed by session id.
//!
//! The `Calculator` owns the session registry, the line catalog, the
//! probability engine and the debug logger. Host layers (the shell, the CLI,
//! an embedding application) drive it one call at a time; it has no internal
//! locking, so a multi-threaded host serializes access itself.

use std::path::Path;

use crate::config::{CalcConfig, SessionDefaults};
use crate::debug::{CalcLogger, NoopLogger, Phase, TracingLogger};
use crate::engine::{EnumeratingEngine, ProbabilityEngine};
use crate::enums::{Line, Operator, Tier};
use crate::error::{CalcResult, SessionError, WantError};
use crate::lines::LineCatalog;
use crate::matching::Matching;
use crate::query;
use crate::registry::{ParamValue, Session, SessionId, SessionRegistry};
use crate::want::WantExpr;

/// Probability plus the tier the engine reports, when the engine ran.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalcOutcome {
    pub probability: f64,
    /// `None` when the calculation short-circuited to zero.
    pub achieved_tier: Option<Tier>,
}

impl CalcOutcome {
    const NOTHING: CalcOutcome = CalcOutcome {
        probability: 0.0,
        achieved_tier: None,
    };
}

/// Owner of sessions and the collaborators needed to compute them.
pub struct Calculator {
    registry: SessionRegistry,
    catalog: LineCatalog,
    engine: Box<dyn ProbabilityEngine>,
    logger: Box<dyn CalcLogger>,
    defaults: SessionDefaults,
}

impl Calculator {
    /// Build a calculator from configuration: line data from `config.lines`
    /// (or the built-in catalog), the enumerating engine capped at
    /// `config.max_combos`, debug logging per `config.debug`.
    pub fn new(config: &CalcConfig) -> CalcResult<Self> {
        let catalog = match &config.lines {
            Some(path) => LineCatalog::load(path)?,
            None => LineCatalog::builtin()?,
        };
        tracing::info!(
            tables = catalog.tables().len(),
            max_combos = config.max_combos,
            "calculator ready"
        );
        let mut calc = Self::with_parts(
            catalog,
            Box::new(EnumeratingEngine::new(config.max_combos)),
            config.defaults.clone(),
        );
        calc.set_debug(config.debug);
        Ok(calc)
    }

    /// Build a calculator from explicit collaborators, debug logging off.
    pub fn with_parts(
        catalog: LineCatalog,
        engine: Box<dyn ProbabilityEngine>,
        defaults: SessionDefaults,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(),
            catalog,
            engine,
            logger: Box::new(NoopLogger),
            defaults,
        }
    }

    // -----------------------------------------------------------------------
    // Instrumentation
    // -----------------------------------------------------------------------

    /// Switch between the no-op logger and the tracing logger.
    pub fn set_debug(&mut self, enabled: bool) {
        self.logger = if enabled {
            Box::new(TracingLogger)
        } else {
            Box::new(NoopLogger)
        };
    }

    pub fn debug_enabled(&self) -> bool {
        self.logger.enabled()
    }

    /// Install a custom logger.
    pub fn set_logger(&mut self, logger: Box<dyn CalcLogger>) {
        self.logger = logger;
    }

    fn log(&self, op: &str, phase: Phase, id: SessionId) {
        if self.logger.enabled() {
            self.logger.log(op, phase, id, self.registry.get(id));
        }
    }

    fn mutate<T>(&mut self, op: &str, id: SessionId, f: impl FnOnce(&mut Session) -> T) -> T {
        self.log(op, Phase::Before, id);
        let out = f(self.registry.ensure(id));
        self.log(op, Phase::After, id);
        out
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &LineCatalog {
        &self.catalog
    }

    pub fn defaults(&self) -> &SessionDefaults {
        &self.defaults
    }

    pub fn ensure(&mut self, id: SessionId) -> &Session {
        self.registry.ensure(id)
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.registry.get(id)
    }

    pub fn free(&mut self, id: SessionId) {
        self.log("free", Phase::Before, id);
        self.registry.free(id);
        self.log("free", Phase::After, id);
    }

    pub fn set(&mut self, id: SessionId, value: ParamValue) {
        self.mutate("set", id, |s| s.set(value));
    }

    // -----------------------------------------------------------------------
    // Want-expression builder
    // -----------------------------------------------------------------------

    pub fn wants(&self, id: SessionId) -> Option<&WantExpr> {
        self.registry.get(id).and_then(|s| s.wants.as_ref())
    }

    pub fn push_group(&mut self, id: SessionId) -> bool {
        self.mutate("push_group", id, |s| s.wants_mut().push_group())
    }

    pub fn current_length(&self, id: SessionId) -> i64 {
        self.wants(id).map_or(0, WantExpr::current_length)
    }

    pub fn total_length(&self, id: SessionId) -> usize {
        self.wants(id).map_or(0, WantExpr::total_length)
    }

    pub fn set_field(&mut self, id: SessionId, line: Line, value: i32) {
        self.mutate("set_field", id, |s| s.wants_mut().set_field(line, value));
    }

    pub fn insert_combinator(&mut self, id: SessionId, op: Operator, threshold: i32) {
        self.mutate("insert_combinator", id, |s| {
            s.wants_mut().insert_combinator(op, threshold)
        });
    }

    /// [`Calculator::insert_combinator`] with a host integer operator token.
    pub fn insert_combinator_token(
        &mut self,
        id: SessionId,
        token: i64,
        threshold: i32,
    ) -> Result<(), WantError> {
        let op = Operator::try_from(token)?;
        self.insert_combinator(id, op, threshold);
        Ok(())
    }

    pub fn clear_wants(&mut self, id: SessionId) {
        self.mutate("clear_wants", id, |s| s.wants_mut().clear());
    }

    // -----------------------------------------------------------------------
    // Compute
    // -----------------------------------------------------------------------

    /// Aggregate probability for session `id`. See [`Calculator::calc_outcome`].
    pub fn calc(&mut self, id: SessionId) -> CalcResult<f64> {
        Ok(self.calc_outcome(id)?.probability)
    }

    /// Run the engine for session `id` and cache its matching combinations.
    ///
    /// With no requirement groups, or no line table for the mechanism, the
    /// result is zero and the cached matching is left untouched.
    pub fn calc_outcome(&mut self, id: SessionId) -> CalcResult<CalcOutcome> {
        self.log("calc", Phase::Before, id);

        let Some(params) = query::assemble(&mut self.registry, &self.catalog, &self.defaults, id)
        else {
            tracing::debug!(session = id, "no requirements, probability is zero");
            self.log("calc", Phase::After, id);
            return Ok(CalcOutcome::NOTHING);
        };
        if params.lines.is_empty() {
            tracing::debug!(session = id, cube = %params.cube, "no line table, probability is zero");
            self.log("calc", Phase::After, id);
            return Ok(CalcOutcome::NOTHING);
        }

        let output = self.engine.compute(&params)?;
        tracing::debug!(
            session = id,
            probability = output.probability,
            tier = %output.achieved_tier,
            matches = output.matching.outer_length(),
            "calc finished"
        );
        let outcome = CalcOutcome {
            probability: output.probability,
            achieved_tier: Some(output.achieved_tier),
        };
        self.registry.set(id, ParamValue::Matching(output.matching));
        self.log("calc", Phase::After, id);
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Result cache
    // -----------------------------------------------------------------------

    pub fn matching(&self, id: SessionId) -> Result<&Matching, SessionError> {
        self.registry.matching(id)
    }

    pub fn matching_outer_length(&self, id: SessionId) -> Result<usize, SessionError> {
        self.registry.matching_outer_length(id)
    }

    pub fn matching_inner_length(&self, id: SessionId) -> Result<usize, SessionError> {
        self.registry.matching_inner_length(id)
    }

    pub fn matching_types(&self, id: SessionId) -> Result<&[Vec<Line>], SessionError> {
        self.registry.matching_types(id)
    }

    pub fn matching_values(&self, id: SessionId) -> Result<&[Vec<i32>], SessionError> {
        self.registry.matching_values(id)
    }

    pub fn matching_probabilities(&self, id: SessionId) -> Result<&[Vec<f64>], SessionError> {
        self.registry.matching_probabilities(id)
    }

    pub fn matching_is_primes(&self, id: SessionId) -> Result<&[Vec<bool>], SessionError> {
        self.registry.matching_is_primes(id)
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Write session `id` (created if absent) as a JSON snapshot.
    pub fn save_session(&mut self, id: SessionId, path: &Path) -> CalcResult<()> {
        self.registry.ensure(id).save(path)?;
        tracing::info!(session = id, path = %path.display(), "session saved");
        Ok(())
    }

    /// Replace session `id` with a snapshot. The cached matching is dropped.
    pub fn load_session(&mut self, id: SessionId, path: &Path) -> CalcResult<()> {
        let session = Session::load(path)?;
        self.log("load", Phase::Before, id);
        self.registry.replace(id, session);
        self.log("load", Phase::After, id);
        tracing::info!(session = id, path = %path.display(), "session loaded");
        Ok(())
    }
}

impl std::fmt::Debug for Calculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Calculator")
            .field("sessions", &self.registry.len())
            .field("tables", &self.catalog.tables().len())
            .field("debug", &self.logger.enabled())
            .field("defaults", &self.defaults)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineOutput;
    use crate::enums::{Category, Cube};
    use crate::query::CalcParams;
    use std::sync::{Arc, Mutex};

    /// Engine returning a fixed matching and counting its calls.
    struct FixedEngine {
        calls: Arc<Mutex<usize>>,
    }

    impl ProbabilityEngine for FixedEngine {
        fn compute(&self, params: &CalcParams<'_>) -> CalcResult<EngineOutput> {
            *self.calls.lock().unwrap() += 1;
            let mut matching = Matching::new();
            matching.push(&[crate::matching::MatchedLine {
                line: Line::ATT_PERCENT,
                value: 12,
                one_in: 8.0,
                prime: true,
            }]);
            Ok(EngineOutput {
                probability: 0.25,
                achieved_tier: params.tier,
                matching,
            })
        }
    }

    fn calculator() -> (Calculator, Arc<Mutex<usize>>) {
        let calls = Arc::new(Mutex::new(0));
        let calc = Calculator::with_parts(
            LineCatalog::builtin().unwrap(),
            Box::new(FixedEngine {
                calls: Arc::clone(&calls),
            }),
            SessionDefaults::default(),
        );
        (calc, calls)
    }

    #[derive(Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl CalcLogger for Recorder {
        fn log(&self, op: &str, phase: Phase, id: SessionId, _session: Option<&Session>) {
            self.0
                .lock()
                .unwrap()
                .push(format!("{op}:{}:{id}", phase.name()));
        }
    }

    #[test]
    fn calc_with_only_empty_groups_is_zero() {
        let (mut calc, calls) = calculator();
        calc.push_group(1);
        assert_eq!(calc.calc(1).unwrap(), 0.0);
        assert_eq!(*calls.lock().unwrap(), 0);
        assert!(calc.matching(1).is_err());
    }

    #[test]
    fn zero_result_keeps_previous_matching() {
        let (mut calc, _) = calculator();
        calc.set_field(1, Line::ATT_PERCENT, 12);
        calc.calc(1).unwrap();
        calc.clear_wants(1);
        assert_eq!(calc.calc(1).unwrap(), 0.0);
        assert_eq!(calc.matching_outer_length(1).unwrap(), 1);
    }

    #[test]
    fn calc_stores_engine_matching() {
        let (mut calc, calls) = calculator();
        calc.set(1, ParamValue::Tier(Tier::Unique));
        calc.set_field(1, Line::ATT_PERCENT, 12);
        let outcome = calc.calc_outcome(1).unwrap();
        assert_eq!(outcome.probability, 0.25);
        assert_eq!(outcome.achieved_tier, Some(Tier::Unique));
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(calc.matching_types(1).unwrap(), &[vec![Line::ATT_PERCENT]]);
        assert_eq!(calc.matching_probabilities(1).unwrap(), &[vec![8.0]]);
    }

    #[test]
    fn uncovered_mechanism_skips_engine() {
        let (mut calc, calls) = calculator();
        calc.set(1, ParamValue::Cube(Cube::FAMILIAR));
        calc.set_field(1, Line::ATT_PERCENT, 12);
        assert_eq!(calc.calc(1).unwrap(), 0.0);
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn operator_tokens() {
        let (mut calc, _) = calculator();
        calc.set_field(1, Line::BOSS, 30);
        calc.insert_combinator_token(1, 2, 2).unwrap();
        assert_eq!(
            calc.insert_combinator_token(1, 9, -1),
            Err(WantError::UnknownOperator { token: "9".into() })
        );
        assert_eq!(calc.total_length(1), 3);
    }

    #[test]
    fn lengths_of_absent_session_are_zero() {
        let (calc, _) = calculator();
        assert_eq!(calc.current_length(5), 0);
        assert_eq!(calc.total_length(5), 0);
        assert!(calc.session(5).is_none());
    }

    #[test]
    fn logger_sees_before_and_after() {
        let (mut calc, _) = calculator();
        let lines = Arc::new(Mutex::new(Vec::new()));
        calc.set_logger(Box::new(Recorder(Arc::clone(&lines))));
        calc.set(2, ParamValue::Category(Category::HAT));
        calc.calc(2).unwrap();
        calc.free(2);
        assert_eq!(
            *lines.lock().unwrap(),
            vec![
                "set:before:2",
                "set:after:2",
                "calc:before:2",
                "calc:after:2",
                "free:before:2",
                "free:after:2",
            ]
        );
    }

    #[test]
    fn debug_toggle_does_not_change_results() {
        let (mut calc, _) = calculator();
        calc.set_field(1, Line::ATT_PERCENT, 12);
        let quiet = calc.calc(1).unwrap();
        calc.set_debug(true);
        assert!(calc.debug_enabled());
        assert_eq!(calc.calc(1).unwrap(), quiet);
        calc.set_debug(false);
        assert!(!calc.debug_enabled());
    }

    #[test]
    fn snapshot_roundtrip_through_calculator() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("s.json");
        let (mut calc, _) = calculator();
        calc.set(1, ParamValue::Cube(Cube::BLACK));
        calc.set_field(1, Line::IED, 30);
        calc.calc(1).unwrap();
        calc.save_session(1, &path).unwrap();

        calc.load_session(9, &path).unwrap();
        assert_eq!(calc.wants(9), calc.wants(1));
        assert!(calc.matching(9).is_err());
    }
}
