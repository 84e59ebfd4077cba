//! Line probability tables and line-source resolution.
//!
//! A [`LineTable`] lists, for a set of mechanism types, every line that can
//! roll on each category and tier together with its "one in N" chance. A
//! [`LineCatalog`] is an ordered list of tables; resolving a mechanism type
//! picks the first table whose `cubes` set overlaps it.
//!
//! The crate ships a built-in catalog (`data/lines.toml`). Users can replace
//! it with their own TOML or JSON file through the `lines` config key.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::enums::{Category, Cube, Line, Region, Tier};
use crate::error::DataError;

const BUILTIN_LINES: &str = include_str!("../data/lines.toml");

/// One rollable line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRow {
    /// Categories this row applies to.
    pub categories: Category,
    pub tier: Tier,
    pub line: Line,
    pub value: i32,
    /// Chance per slot, as "1 in N".
    pub one_in: f64,
    /// Minimum item level; 0 means every level.
    #[serde(default)]
    pub min_level: u32,
    /// Regions the row exists in; empty means every region.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<Region>,
}

impl LineRow {
    /// Per-slot probability of this row.
    pub fn chance(&self) -> f64 {
        1.0 / self.one_in
    }

    fn applies(&self, category: Category, tier: Tier, level: u32, region: Region) -> bool {
        self.tier == tier
            && self.categories.intersects(category)
            && level >= self.min_level
            && (self.regions.is_empty() || self.regions.contains(&region))
    }
}

/// Line data for a set of mechanism types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineTable {
    pub name: String,
    /// Mechanism types this table covers.
    pub cubes: Cube,
    #[serde(default, rename = "row")]
    pub rows: Vec<LineRow>,
}

impl LineTable {
    /// The sentinel returned when no table covers a mechanism type.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Union of the mechanism types this table is keyed by.
    pub fn key_mask(&self) -> Cube {
        self.cubes
    }

    /// Rows that can roll for one concrete item.
    pub fn rows_for(
        &self,
        category: Category,
        tier: Tier,
        level: u32,
        region: Region,
    ) -> Vec<&LineRow> {
        self.rows
            .iter()
            .filter(|r| r.applies(category, tier, level, region))
            .collect()
    }

    fn validate(&self) -> Result<(), DataError> {
        let invalid = |message: String| DataError::InvalidRow {
            table: self.name.clone(),
            message,
        };
        if self.cubes.is_empty() {
            return Err(invalid("table covers no mechanism types".into()));
        }
        for row in &self.rows {
            if !(row.one_in.is_finite() && row.one_in >= 1.0) {
                return Err(invalid(format!(
                    "{} {} has one_in {}",
                    row.line, row.value, row.one_in
                )));
            }
            if row.line.name().is_none() || row.line == Line::ANY || row.line == Line::LINES {
                return Err(invalid(format!("row line must be a single stat line, got {}", row.line)));
            }
        }
        Ok(())
    }
}

/// Ordered collection of line tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineCatalog {
    #[serde(default, rename = "table")]
    tables: Vec<LineTable>,
    #[serde(skip)]
    empty: LineTable,
}

impl LineCatalog {
    pub fn new(tables: Vec<LineTable>) -> Result<Self, DataError> {
        for table in &tables {
            table.validate()?;
        }
        Ok(Self {
            tables,
            empty: LineTable::empty(),
        })
    }

    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self, DataError> {
        Self::from_toml_str("<builtin>", BUILTIN_LINES)
    }

    /// Load a catalog file. `.json` files are read as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path).map_err(|e| DataError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let label = path.display().to_string();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&label, &content),
            _ => Self::from_toml_str(&label, &content),
        }
    }

    pub fn from_toml_str(label: &str, content: &str) -> Result<Self, DataError> {
        let parsed: LineCatalog = toml::from_str(content).map_err(|e| DataError::Parse {
            path: label.to_string(),
            message: e.to_string(),
        })?;
        Self::new(parsed.tables)
    }

    pub fn from_json_str(label: &str, content: &str) -> Result<Self, DataError> {
        let parsed: LineCatalog = serde_json::from_str(content).map_err(|e| DataError::Parse {
            path: label.to_string(),
            message: e.to_string(),
        })?;
        Self::new(parsed.tables)
    }

    pub fn tables(&self) -> &[LineTable] {
        &self.tables
    }

    /// Table for a mechanism type: the first whose key set overlaps `cube`,
    /// otherwise the empty table.
    pub fn resolve_line_source(&self, cube: Cube) -> &LineTable {
        self.tables
            .iter()
            .find(|t| t.key_mask().intersects(cube))
            .unwrap_or(&self.empty)
    }
}
