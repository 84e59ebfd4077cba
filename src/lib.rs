// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # cubecalc
//!
//! Session-based want-expression builder and probability calculator for
//! randomized item-enhancement outcomes ("lines").
//!
//! ## Architecture
//!
//! - **Vocabulary** (`enums`): mechanism types, tiers, categories, regions and stat lines
//! - **Want expressions** (`want`): requirement groups joined by threshold combinators
//! - **Sessions** (`registry`, `matching`): per-session selectors, wants and cached matches
//! - **Line data** (`lines`): per-mechanism probability tables, built-in or loaded from TOML/JSON
//! - **Computation** (`query`, `engine`, `calc`): parameter assembly and the enumerating engine
//! - **Front ends** (`shell`, `main.rs`): line-oriented command shell and CLI
//! - **Presets** (`presets`): bundled example query scripts for the shell
//!
//! ## Library usage
//!
//! ```no_run
//! use cubecalc::calc::Calculator;
//! use cubecalc::config::CalcConfig;
//! use cubecalc::enums::{Category, Cube, Line, Operator, Tier};
//! use cubecalc::registry::ParamValue;
//!
//! let mut calc = Calculator::new(&CalcConfig::default()).unwrap();
//! calc.set(1, ParamValue::Cube(Cube::RED));
//! calc.set(1, ParamValue::Category(Category::WEAPON));
//! calc.set(1, ParamValue::Tier(Tier::Legendary));
//! calc.set_field(1, Line::ATT_PERCENT, 21);
//! calc.insert_combinator(1, Operator::Or, -1);
//! calc.set_field(1, Line::BOSS, 30);
//! calc.set_field(1, Line::ATT_PERCENT, 12);
//! let p = calc.calc(1).unwrap();
//! println!("{p} over {} combos", calc.matching_outer_length(1).unwrap());
//! ```

pub mod calc;
pub mod config;
pub mod debug;
pub mod engine;
pub mod enums;
pub mod error;
pub mod humanize;
pub mod lines;
pub mod matching;
pub mod paths;
pub mod presets;
pub mod query;
pub mod registry;
pub mod shell;
pub mod want;
