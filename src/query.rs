//! Query assembly: collapse a session into the parameters a probability
//! engine consumes.

use crate::config::SessionDefaults;
use crate::enums::{Category, Cube, Region, Tier};
use crate::lines::{LineCatalog, LineTable};
use crate::registry::{SessionId, SessionRegistry};
use crate::want::WantExpr;

/// Everything an engine needs for one calculation.
#[derive(Debug, Clone)]
pub struct CalcParams<'a> {
    /// Want expression with empty groups removed; never empty.
    pub wants: WantExpr,
    pub cube: Cube,
    pub tier: Tier,
    pub category: Category,
    pub level: u32,
    pub region: Region,
    /// Line table resolved for `cube`; may be the empty table.
    pub lines: &'a LineTable,
}

/// Build engine parameters for session `id`, creating the session if needed.
///
/// Returns `None` when the finalized want expression has no requirements.
/// Selectors the session never set fall back to `defaults`.
pub fn assemble<'a>(
    registry: &mut SessionRegistry,
    catalog: &'a LineCatalog,
    defaults: &SessionDefaults,
    id: SessionId,
) -> Option<CalcParams<'a>> {
    let session = registry.ensure(id);
    let wants = session.wants.as_ref().map(WantExpr::finalized)?;
    if !wants.has_requirements() {
        return None;
    }
    let cube = session.cube.unwrap_or(defaults.cube);
    Some(CalcParams {
        wants,
        cube,
        tier: session.tier.unwrap_or(defaults.tier),
        category: session.category.unwrap_or(defaults.category),
        level: session.level.unwrap_or(defaults.level),
        region: session.region.unwrap_or(defaults.region),
        lines: catalog.resolve_line_source(cube),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::Line;
    use crate::registry::ParamValue;

    fn catalog() -> LineCatalog {
        LineCatalog::builtin().unwrap()
    }

    #[test]
    fn no_wants_assembles_nothing() {
        let mut reg = SessionRegistry::new();
        let catalog = catalog();
        let defaults = SessionDefaults::default();
        assert!(assemble(&mut reg, &catalog, &defaults, 4).is_none());
        assert!(reg.contains(4));

        reg.ensure(4).wants_mut().push_group();
        assert!(assemble(&mut reg, &catalog, &defaults, 4).is_none());
    }

    #[test]
    fn empty_groups_are_filtered() {
        let mut reg = SessionRegistry::new();
        let catalog = catalog();
        let defaults = SessionDefaults::default();
        let wants = reg.ensure(1).wants_mut();
        wants.set_field(Line::ATT_PERCENT, 21);
        wants.push_group();

        let params = assemble(&mut reg, &catalog, &defaults, 1).unwrap();
        assert_eq!(params.wants.total_length(), 1);
        assert_eq!(reg.get(1).unwrap().wants.as_ref().unwrap().total_length(), 2);
    }

    #[test]
    fn selectors_fall_back_to_defaults() {
        let mut reg = SessionRegistry::new();
        let catalog = catalog();
        let defaults = SessionDefaults::default();
        reg.set(1, ParamValue::Cube(Cube::VIOLET));
        reg.set(1, ParamValue::Tier(Tier::Unique));
        reg.ensure(1).wants_mut().set_field(Line::BOSS, 30);

        let params = assemble(&mut reg, &catalog, &defaults, 1).unwrap();
        assert_eq!(params.cube, Cube::VIOLET);
        assert_eq!(params.tier, Tier::Unique);
        assert_eq!(params.category, defaults.category);
        assert_eq!(params.level, 200);
        assert_eq!(params.lines.name, "tms");
    }

    #[test]
    fn uncovered_mechanism_gets_empty_table() {
        let mut reg = SessionRegistry::new();
        let catalog = catalog();
        reg.set(1, ParamValue::Cube(Cube::FAMILIAR));
        reg.ensure(1).wants_mut().set_field(Line::ATT_PERCENT, 9);
        let params = assemble(&mut reg, &catalog, &SessionDefaults::default(), 1).unwrap();
        assert!(params.lines.is_empty());
    }
}
