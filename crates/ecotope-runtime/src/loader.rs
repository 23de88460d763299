//! Profile loading from a directory of TOML documents.
//!
//! Layout:
//!
//! ```text
//! profiles/
//!   base.toml              optional, applied to every species
//!   archetypes/*.toml      shared fragments, named by file stem
//!   species/*.toml         one document per species
//! ```
//!
//! A species document lists the archetypes it builds on in
//! `identity.archetypes`. The final profile is base, then each archetype in
//! listed order, then the species document itself, deep-merged. Documents
//! that cannot be read, do not parse, or lack `identity.mob_id` are skipped
//! with a warning; loading as a whole never fails because of one bad file.

use ecotope_core::error::{ConfigError, Result};
use ecotope_core::profile::{deep_merge, parse_toml_table, species_of, Profile, ProfileTable};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const BASE_FILE: &str = "base.toml";
const ARCHETYPE_DIR: &str = "archetypes";
const SPECIES_DIR: &str = "species";
const ARCHETYPES_KEY: &str = "identity.archetypes";

/// Outcome of loading a profile directory.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Merged profiles, in file name order.
    pub profiles: Vec<Profile>,
    /// Documents that were skipped, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

impl LoadReport {
    pub fn get(&self, species: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.species().as_str() == species)
    }
}

/// Reads species profiles from a directory tree.
#[derive(Debug, Clone)]
pub struct ProfileLoader {
    root: PathBuf,
}

/// `*.toml` files directly under `dir`, sorted by name. A missing directory
/// is empty.
fn toml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_table(path: &Path) -> std::result::Result<ProfileTable, String> {
    let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
    parse_toml_table(&text).map_err(|e: ConfigError| e.to_string())
}

impl ProfileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load and merge every species document. Only directory listing
    /// failures are errors.
    pub fn load(&self) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        let base_path = self.root.join(BASE_FILE);
        let base = if base_path.is_file() {
            match read_table(&base_path) {
                Ok(table) => table,
                Err(reason) => {
                    warn!(path = %base_path.display(), %reason, "base profile skipped");
                    report.skipped.push((base_path, reason));
                    ProfileTable::new()
                }
            }
        } else {
            ProfileTable::new()
        };

        let mut archetypes = BTreeMap::new();
        for path in toml_files(&self.root.join(ARCHETYPE_DIR))? {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            match read_table(&path) {
                Ok(table) => {
                    archetypes.insert(name, table);
                }
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "archetype skipped");
                    report.skipped.push((path, reason));
                }
            }
        }

        for path in toml_files(&self.root.join(SPECIES_DIR))? {
            let table = match read_table(&path) {
                Ok(table) => table,
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "species profile skipped");
                    report.skipped.push((path, reason));
                    continue;
                }
            };
            let Some(species) = species_of(&table) else {
                let reason = "missing identity.mob_id".to_string();
                warn!(path = %path.display(), %reason, "species profile skipped");
                report.skipped.push((path, reason));
                continue;
            };

            let own = Profile::new(species.clone(), table);
            let listed = own.get_string_list(ARCHETYPES_KEY);
            let mut merged = base.clone();
            for name in &listed {
                match archetypes.get(name) {
                    Some(archetype) => deep_merge(&mut merged, archetype),
                    None => warn!(species = %species, archetype = %name, "unknown archetype"),
                }
            }
            deep_merge(&mut merged, own.table());
            debug!(species = %species, archetypes = listed.len(), "profile loaded");
            report.profiles.push(Profile::new(species, merged));
        }

        info!(
            root = %self.root.display(),
            loaded = report.profiles.len(),
            skipped = report.skipped.len(),
            "profiles loaded"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, text: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn merges_base_archetypes_and_species() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "base.toml", "[hunger]\nenabled = true\nmax_value = 100\ndecay_rate = 0.01\n");
        write(dir.path(), "archetypes/grazer.toml", "[hunger]\ndecay_rate = 0.02\n[social]\nenabled = true\n");
        write(dir.path(), "archetypes/skittish.toml", "[predation.as_prey]\nenabled = true\n");
        write(
            dir.path(),
            "species/sheep.toml",
            "[identity]\nmob_id = \"minecraft:sheep\"\narchetypes = [\"grazer\", \"skittish\", \"missing\"]\n\n[hunger]\nmax_value = 80\n",
        );

        let report = ProfileLoader::new(dir.path()).load().unwrap();
        assert!(report.skipped.is_empty());
        let sheep = report.get("minecraft:sheep").unwrap();
        assert!(sheep.get_bool("hunger.enabled", false));
        assert_eq!(sheep.get_i64("hunger.max_value", 0), 80);
        assert_eq!(sheep.get_f64("hunger.decay_rate", 0.0), 0.02);
        assert!(sheep.get_bool("social.enabled", false));
        assert!(sheep.get_bool("predation.as_prey.enabled", false));
    }

    #[test]
    fn bad_documents_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "species/anon.toml", "[hunger]\nenabled = true\n");
        write(dir.path(), "species/broken.toml", "[identity\nmob_id = ");
        write(dir.path(), "species/wolf.toml", "[identity]\nmob_id = \"minecraft:wolf\"\n");
        write(dir.path(), "species/notes.txt", "not a profile");

        let report = ProfileLoader::new(dir.path()).load().unwrap();
        assert_eq!(report.profiles.len(), 1);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.get("minecraft:wolf").is_some());
    }

    #[test]
    fn empty_directory_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let report = ProfileLoader::new(dir.path()).load().unwrap();
        assert!(report.profiles.is_empty());
        assert!(report.skipped.is_empty());
    }
}
