//! Preset example queries.
//!
//! A preset is a shell script bundled into the binary with `include_str!`.
//! Its first line is a `#` comment describing the queries it runs; every
//! query ends in `calc` so running a preset prints one probability per
//! session it touches.

use std::io::Write;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use crate::shell::{Shell, ShellResult};

#[derive(Debug, Error, Diagnostic)]
pub enum PresetError {
    #[error("preset not found: \"{id}\"")]
    #[diagnostic(
        code(cubecalc::preset::not_found),
        help("List the bundled presets with `cubecalc presets`.")
    )]
    NotFound { id: String },

    #[error("failed to write preset: {path}")]
    #[diagnostic(
        code(cubecalc::preset::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A bundled query script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub id: &'static str,
    pub script: &'static str,
}

pub const PRESETS: &[Preset] = &[
    Preset {
        id: "weapon",
        script: include_str!("../data/presets/weapon.txt"),
    },
    Preset {
        id: "accessory",
        script: include_str!("../data/presets/accessory.txt"),
    },
    Preset {
        id: "glove",
        script: include_str!("../data/presets/glove.txt"),
    },
    Preset {
        id: "hat",
        script: include_str!("../data/presets/hat.txt"),
    },
    Preset {
        id: "armor",
        script: include_str!("../data/presets/armor.txt"),
    },
    Preset {
        id: "operators",
        script: include_str!("../data/presets/operators.txt"),
    },
    Preset {
        id: "bonus",
        script: include_str!("../data/presets/bonus.txt"),
    },
    Preset {
        id: "occult",
        script: include_str!("../data/presets/occult.txt"),
    },
    Preset {
        id: "master",
        script: include_str!("../data/presets/master.txt"),
    },
];

impl Preset {
    /// Text of the leading `#` comment.
    pub fn description(&self) -> &'static str {
        self.script
            .lines()
            .next()
            .and_then(|l| l.strip_prefix('#'))
            .map(str::trim)
            .unwrap_or("")
    }

    pub fn file_name(&self) -> String {
        format!("{}.txt", self.id)
    }

    /// Feed the script through `shell`. A strict shell stops at the first
    /// failing command.
    pub fn run<W: Write>(&self, shell: &mut Shell, out: &mut W) -> ShellResult<()> {
        tracing::debug!(preset = self.id, "running preset");
        shell.run(self.script.as_bytes(), out, false)
    }
}

/// Look up a bundled preset by id.
pub fn find(id: &str) -> Result<&'static Preset, PresetError> {
    PRESETS
        .iter()
        .find(|p| p.id.eq_ignore_ascii_case(id.trim()))
        .ok_or_else(|| PresetError::NotFound { id: id.to_string() })
}

/// Write every preset into `dir` as `<id>.txt`, creating `dir` if needed.
pub fn write_all(dir: &Path) -> Result<Vec<PathBuf>, PresetError> {
    let write_err = |path: &Path, source| PresetError::Write {
        path: path.display().to_string(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(|e| write_err(dir, e))?;
    let mut written = Vec::with_capacity(PRESETS.len());
    for preset in PRESETS {
        let path = dir.join(preset.file_name());
        std::fs::write(&path, preset.script).map_err(|e| write_err(&path, e))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_is_described() {
        for preset in PRESETS {
            assert!(preset.script.starts_with("# "), "{}", preset.id);
            assert!(!preset.description().is_empty(), "{}", preset.id);
            assert!(preset.script.contains("\ncalc"), "{}", preset.id);
        }
    }

    #[test]
    fn ids_are_unique_and_findable() {
        for preset in PRESETS {
            assert_eq!(find(preset.id).unwrap(), preset);
        }
        assert_eq!(find(" HAT ").unwrap().id, "hat");
        assert!(matches!(find("familiar"), Err(PresetError::NotFound { .. })));
    }

    #[test]
    fn write_all_creates_one_file_each() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("presets");
        let written = write_all(&target).unwrap();
        assert_eq!(written.len(), PRESETS.len());
        let glove = std::fs::read_to_string(target.join("glove.txt")).unwrap();
        assert_eq!(glove, find("glove").unwrap().script);
    }
}
