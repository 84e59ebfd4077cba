//! Session registry: session id → mutable parameter record.
//!
//! Sessions are created lazily on first access and live until the caller
//! frees them; there is no implicit expiry. The registry is a plain owned
//! value with no internal locking. Callers embedding it in a multi-threaded
//! host must serialize access themselves (one registry per worker, or a
//! mutex around it).

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::enums::{Category, Cube, Region, Tier};
use crate::error::{SnapshotError, WantError};
use crate::matching::Matching;
use crate::want::WantExpr;

/// Opaque session key chosen by the caller.
pub type SessionId = i64;

/// Parameter kinds a session can hold.
///
/// The discriminants are the integer tokens used by host callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalcParam {
    Wants = 1,
    Cube = 2,
    Tier = 3,
    Category = 4,
    Level = 5,
    Region = 6,
    Matching = 7,
}

impl CalcParam {
    pub const ALL: [CalcParam; 7] = [
        CalcParam::Wants,
        CalcParam::Cube,
        CalcParam::Tier,
        CalcParam::Category,
        CalcParam::Level,
        CalcParam::Region,
        CalcParam::Matching,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CalcParam::Wants => "wants",
            CalcParam::Cube => "cube",
            CalcParam::Tier => "tier",
            CalcParam::Category => "category",
            CalcParam::Level => "level",
            CalcParam::Region => "region",
            CalcParam::Matching => "matching",
        }
    }
}

impl fmt::Display for CalcParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CalcParam {
    type Err = WantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_lowercase();
        CalcParam::ALL
            .into_iter()
            .find(|p| p.name() == token)
            .ok_or_else(|| WantError::UnknownName {
                kind: "parameter",
                token: s.to_string(),
            })
    }
}

/// A value for one parameter kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Wants(WantExpr),
    Cube(Cube),
    Tier(Tier),
    Category(Category),
    Level(u32),
    Region(Region),
    Matching(Matching),
}

impl ParamValue {
    pub fn kind(&self) -> CalcParam {
        match self {
            ParamValue::Wants(_) => CalcParam::Wants,
            ParamValue::Cube(_) => CalcParam::Cube,
            ParamValue::Tier(_) => CalcParam::Tier,
            ParamValue::Category(_) => CalcParam::Category,
            ParamValue::Level(_) => CalcParam::Level,
            ParamValue::Region(_) => CalcParam::Region,
            ParamValue::Matching(_) => CalcParam::Matching,
        }
    }

    /// Parse a textual value for `kind`. `wants` accepts the JSON form of a
    /// want expression; `matching` cannot be parsed.
    pub fn parse(kind: CalcParam, text: &str) -> Result<Self, WantError> {
        let invalid = || WantError::UnknownName {
            kind: "value",
            token: text.to_string(),
        };
        Ok(match kind {
            CalcParam::Wants => ParamValue::Wants(serde_json::from_str(text).map_err(|e| {
                WantError::Malformed {
                    message: e.to_string(),
                }
            })?),
            CalcParam::Cube => ParamValue::Cube(text.parse()?),
            CalcParam::Tier => ParamValue::Tier(text.parse()?),
            CalcParam::Category => ParamValue::Category(text.parse()?),
            CalcParam::Level => ParamValue::Level(text.trim().parse().map_err(|_| invalid())?),
            CalcParam::Region => ParamValue::Region(text.parse()?),
            CalcParam::Matching => return Err(invalid()),
        })
    }
}

/// Parameters of one calculation session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wants: Option<WantExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cube: Option<Cube>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    /// Written only by the compute step; never persisted.
    #[serde(skip)]
    pub matching: Option<Matching>,
}

impl Session {
    /// Overwrite the value for the parameter kind carried by `value`.
    pub fn set(&mut self, value: ParamValue) {
        match value {
            ParamValue::Wants(w) => self.wants = Some(w),
            ParamValue::Cube(c) => self.cube = Some(c),
            ParamValue::Tier(t) => self.tier = Some(t),
            ParamValue::Category(c) => self.category = Some(c),
            ParamValue::Level(l) => self.level = Some(l),
            ParamValue::Region(r) => self.region = Some(r),
            ParamValue::Matching(m) => self.matching = Some(m),
        }
    }

    pub fn has(&self, kind: CalcParam) -> bool {
        match kind {
            CalcParam::Wants => self.wants.is_some(),
            CalcParam::Cube => self.cube.is_some(),
            CalcParam::Tier => self.tier.is_some(),
            CalcParam::Category => self.category.is_some(),
            CalcParam::Level => self.level.is_some(),
            CalcParam::Region => self.region.is_some(),
            CalcParam::Matching => self.matching.is_some(),
        }
    }

    /// The want expression, created empty if absent.
    pub fn wants_mut(&mut self) -> &mut WantExpr {
        self.wants.get_or_insert_with(WantExpr::new)
    }

    /// Write the persistable parameters (everything but the cached result) as JSON.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| SnapshotError::Encode {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| SnapshotError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    /// Read a session written by [`Session::save`].
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path).map_err(|source| SnapshotError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SnapshotError::Decode {
            path: path.display().to_string(),
            source,
        })
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt<T: fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map_or_else(|| "-".to_string(), |v| v.to_string())
        }
        write!(
            f,
            "wants={} cube={} tier={} category={} level={} region={}",
            opt(&self.wants),
            opt(&self.cube),
            opt(&self.tier),
            opt(&self.category),
            opt(&self.level),
            opt(&self.region),
        )?;
        match &self.matching {
            Some(m) => write!(f, " matching={} combos", m.outer_length()),
            None => write!(f, " matching=-"),
        }
    }
}

/// Owner of every live session.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for `id`, created empty if absent.
    pub fn ensure(&mut self, id: SessionId) -> &mut Session {
        self.sessions.entry(id).or_default()
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Remove the session if present. Other sessions are untouched.
    pub fn free(&mut self, id: SessionId) {
        self.sessions.remove(&id);
    }

    /// Ensure the session, then overwrite one parameter.
    pub fn set(&mut self, id: SessionId, value: ParamValue) {
        self.ensure(id).set(value);
    }

    /// Replace the whole session, e.g. with a loaded snapshot.
    pub fn replace(&mut self, id: SessionId, session: Session) {
        self.sessions.insert(id, session);
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Live session ids in ascending order.
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::Line;

    #[test]
    fn ensure_creates_empty_session() {
        let mut reg = SessionRegistry::new();
        assert!(reg.is_empty());
        let s = reg.ensure(7);
        assert_eq!(*s, Session::default());
        assert!(reg.contains(7));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn free_is_scoped_and_idempotent() {
        let mut reg = SessionRegistry::new();
        reg.set(1, ParamValue::Cube(Cube::RED));
        reg.set(2, ParamValue::Cube(Cube::BLACK));
        reg.free(1);
        reg.free(1);
        reg.free(99);
        assert!(!reg.contains(1));
        assert_eq!(reg.get(2).unwrap().cube, Some(Cube::BLACK));
    }

    #[test]
    fn free_then_ensure_is_fresh() {
        let mut reg = SessionRegistry::new();
        reg.ensure(1).wants_mut().set_field(Line::ATT_PERCENT, 21);
        reg.set(1, ParamValue::Matching(Matching::default()));
        reg.free(1);
        assert_eq!(*reg.ensure(1), Session::default());
    }

    #[test]
    fn set_overwrites_each_kind() {
        let mut reg = SessionRegistry::new();
        reg.set(1, ParamValue::Tier(Tier::Epic));
        reg.set(1, ParamValue::Tier(Tier::Legendary));
        reg.set(1, ParamValue::Level(150));
        reg.set(1, ParamValue::Wants(WantExpr::new()));
        let s = reg.get(1).unwrap();
        assert_eq!(s.tier, Some(Tier::Legendary));
        assert_eq!(s.level, Some(150));
        assert!(s.has(CalcParam::Wants));
        assert!(!s.has(CalcParam::Region));
    }

    #[test]
    fn param_value_parse() {
        assert_eq!(
            ParamValue::parse(CalcParam::Cube, "red").unwrap(),
            ParamValue::Cube(Cube::RED)
        );
        assert_eq!(
            ParamValue::parse(CalcParam::Level, "200").unwrap(),
            ParamValue::Level(200)
        );
        assert!(ParamValue::parse(CalcParam::Level, "high").is_err());
        assert!(ParamValue::parse(CalcParam::Matching, "[]").is_err());
        let wants = ParamValue::parse(CalcParam::Wants, r#"[{"group": {"att%": 21}}]"#).unwrap();
        assert_eq!(wants.kind(), CalcParam::Wants);
    }

    #[test]
    fn calc_param_names_roundtrip() {
        for p in CalcParam::ALL {
            assert_eq!(p.name().parse::<CalcParam>().unwrap(), p);
        }
    }

    #[test]
    fn snapshot_roundtrip_skips_matching() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let mut s = Session::default();
        s.set(ParamValue::Cube(Cube::VIOLET));
        s.set(ParamValue::Category(Category::WEAPON));
        s.wants_mut().set_field(Line::BOSS, 30);
        s.set(ParamValue::Matching(Matching::default()));
        s.save(&path).unwrap();

        let loaded = Session::load(&path).unwrap();
        assert_eq!(loaded.cube, Some(Cube::VIOLET));
        assert_eq!(loaded.wants, s.wants);
        assert!(loaded.matching.is_none());
    }

    #[test]
    fn malformed_wants_report_position() {
        let err = ParamValue::parse(CalcParam::Wants, "[{\"group\": ").unwrap_err();
        let WantError::Malformed { message } = err else {
            panic!("expected Malformed, got {err:?}");
        };
        assert!(message.contains("line 1"), "{message}");
        assert!(message.contains("column"), "{message}");
    }

    #[test]
    fn snapshot_errors_keep_their_cause() {
        use std::error::Error as _;

        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        let err = Session::load(&missing).unwrap_err();
        assert!(matches!(err, SnapshotError::Read { .. }));
        let io = err.source().unwrap().downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);

        let garbled = dir.path().join("garbled.json");
        std::fs::write(&garbled, "{\"cube\": ").unwrap();
        let err = Session::load(&garbled).unwrap_err();
        assert!(matches!(err, SnapshotError::Decode { .. }));
        let json = err.source().unwrap().downcast_ref::<serde_json::Error>().unwrap();
        assert!(json.is_eof());
    }

    #[test]
    fn display_lists_parameters() {
        let mut s = Session::default();
        s.set(ParamValue::Tier(Tier::Epic));
        s.wants_mut().set_field(Line::MESO, 20);
        let text = s.to_string();
        assert!(text.contains("wants=[{meso%: 20}]"));
        assert!(text.contains("tier=epic"));
        assert!(text.contains("cube=-"));
        assert!(text.ends_with("matching=-"));
    }
}
