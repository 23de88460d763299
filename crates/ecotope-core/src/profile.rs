//! Species profiles.
//!
//! A profile is an immutable tree of named parameters addressed by dotted
//! paths such as `predation.as_predator.enabled`. Every agent of a species
//! shares one `Arc<Profile>`; a reload publishes a new profile rather than
//! mutating the old one.
//!
//! Lookups never fail. A missing key yields the caller's default; a key
//! present with the wrong type yields the default and logs one warning per
//! key for the species.

use crate::error::ConfigError;
use crate::types::SpeciesId;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// A table of profile values keyed by name.
pub type ProfileTable = BTreeMap<String, ProfileValue>;

/// One node of a profile tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ProfileValue>),
    Table(ProfileTable),
}

impl ProfileValue {
    fn type_name(&self) -> &'static str {
        match self {
            ProfileValue::Bool(_) => "bool",
            ProfileValue::Int(_) => "int",
            ProfileValue::Float(_) => "float",
            ProfileValue::Str(_) => "string",
            ProfileValue::List(_) => "list",
            ProfileValue::Table(_) => "table",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ProfileValue::Float(v) => Some(*v),
            ProfileValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ProfileValue::Int(v) => Some(*v),
            ProfileValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ProfileValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for ProfileValue {
    fn from(v: bool) -> Self {
        ProfileValue::Bool(v)
    }
}

impl From<i64> for ProfileValue {
    fn from(v: i64) -> Self {
        ProfileValue::Int(v)
    }
}

impl From<i32> for ProfileValue {
    fn from(v: i32) -> Self {
        ProfileValue::Int(v as i64)
    }
}

impl From<u64> for ProfileValue {
    fn from(v: u64) -> Self {
        ProfileValue::Int(v as i64)
    }
}

impl From<f64> for ProfileValue {
    fn from(v: f64) -> Self {
        ProfileValue::Float(v)
    }
}

impl From<&str> for ProfileValue {
    fn from(v: &str) -> Self {
        ProfileValue::Str(v.to_string())
    }
}

impl From<String> for ProfileValue {
    fn from(v: String) -> Self {
        ProfileValue::Str(v)
    }
}

impl<T: Into<ProfileValue>> From<Vec<T>> for ProfileValue {
    fn from(v: Vec<T>) -> Self {
        ProfileValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<ProfileTable> for ProfileValue {
    fn from(v: ProfileTable) -> Self {
        ProfileValue::Table(v)
    }
}

/// Parse a TOML document into a profile table.
pub fn parse_toml_table(text: &str) -> Result<ProfileTable, ConfigError> {
    toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Deep-merge `overlay` into `base`. Tables merge key by key; any other
/// value in `overlay` replaces the value in `base`.
pub fn deep_merge(base: &mut ProfileTable, overlay: &ProfileTable) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(ProfileValue::Table(existing)), ProfileValue::Table(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Set `value` at a dotted `path`, creating intermediate tables. A non-table
/// value sitting on the path is replaced by a table.
pub fn set_path(table: &mut ProfileTable, path: &str, value: ProfileValue) {
    let mut parts = path.split('.').peekable();
    let mut current = table;
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            current.insert(part.to_string(), value);
            return;
        }
        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| ProfileValue::Table(ProfileTable::new()));
        if !matches!(slot, ProfileValue::Table(_)) {
            *slot = ProfileValue::Table(ProfileTable::new());
        }
        current = match slot {
            ProfileValue::Table(t) => t,
            _ => return,
        };
    }
}

type CacheMap = HashMap<&'static str, Arc<dyn Any + Send + Sync>>;

/// Immutable per-species parameter tree.
pub struct Profile {
    species: SpeciesId,
    root: ProfileTable,
    generation: u64,
    warned: Mutex<HashSet<String>>,
    cache: Mutex<CacheMap>,
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("species", &self.species)
            .field("generation", &self.generation)
            .field("root", &self.root)
            .finish()
    }
}

impl Clone for Profile {
    /// Clones the parameter tree. Caches and warning history start empty.
    fn clone(&self) -> Self {
        Profile::new(self.species.clone(), self.root.clone()).with_generation(self.generation)
    }
}

impl PartialEq for Profile {
    fn eq(&self, other: &Self) -> bool {
        self.species == other.species && self.root == other.root
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Profile {
    pub fn new(species: impl Into<SpeciesId>, root: ProfileTable) -> Self {
        Self {
            species: species.into(),
            root,
            generation: 0,
            warned: Mutex::new(HashSet::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn empty(species: impl Into<SpeciesId>) -> Self {
        Self::new(species, ProfileTable::new())
    }

    /// Start building a profile in code.
    pub fn builder(species: impl Into<SpeciesId>) -> ProfileBuilder {
        ProfileBuilder {
            species: species.into(),
            root: ProfileTable::new(),
        }
    }

    /// Parse a standalone TOML profile. The species comes from
    /// `identity.mob_id`, which is required.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let root = parse_toml_table(text)?;
        let species = root_species(&root)
            .ok_or_else(|| ConfigError::MissingField("identity.mob_id".to_string()))?;
        Ok(Self::new(species, root))
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn species(&self) -> &SpeciesId {
        &self.species
    }

    /// Registry generation this profile was published under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn table(&self) -> &ProfileTable {
        &self.root
    }

    /// Look up the value at a dotted path.
    pub fn get(&self, path: &str) -> Option<&ProfileValue> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.root.get(first)?;
        for part in parts {
            match current {
                ProfileValue::Table(t) => current = t.get(part)?,
                _ => return None,
            }
        }
        Some(current)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        match self.get(path) {
            None => default,
            Some(ProfileValue::Bool(b)) => *b,
            Some(other) => self.mismatch(path, "bool", other, default),
        }
    }

    pub fn get_i64(&self, path: &str, default: i64) -> i64 {
        match self.get(path) {
            None => default,
            Some(value) => match value.as_i64() {
                Some(v) => v,
                None => self.mismatch(path, "int", value, default),
            },
        }
    }

    /// Integer lookup narrowed to `i32`; out-of-range values fall back to
    /// the default.
    pub fn get_i32(&self, path: &str, default: i32) -> i32 {
        let wide = self.get_i64(path, default as i64);
        match i32::try_from(wide) {
            Ok(v) => v,
            Err(_) => self.mismatch(path, "i32", &ProfileValue::Int(wide), default),
        }
    }

    /// Non-negative integer lookup.
    pub fn get_u64(&self, path: &str, default: u64) -> u64 {
        let wide = self.get_i64(path, default as i64);
        match u64::try_from(wide) {
            Ok(v) => v,
            Err(_) => self.mismatch(path, "non-negative int", &ProfileValue::Int(wide), default),
        }
    }

    pub fn get_f64(&self, path: &str, default: f64) -> f64 {
        match self.get(path) {
            None => default,
            Some(value) => match value.as_f64() {
                Some(v) if v.is_finite() => v,
                _ => self.mismatch(path, "number", value, default),
            },
        }
    }

    pub fn get_str<'a>(&'a self, path: &str, default: &'a str) -> &'a str {
        match self.get(path) {
            None => default,
            Some(ProfileValue::Str(s)) => s,
            Some(other) => self.mismatch(path, "string", other, default),
        }
    }

    /// A list of strings. A single string is accepted as a one-item list;
    /// non-string items are dropped.
    pub fn get_string_list(&self, path: &str) -> Vec<String> {
        match self.get(path) {
            None => Vec::new(),
            Some(ProfileValue::Str(s)) => vec![s.clone()],
            Some(ProfileValue::List(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(other) => self.mismatch(path, "string list", other, Vec::new()),
        }
    }

    pub fn get_table(&self, path: &str) -> Option<&ProfileTable> {
        match self.get(path)? {
            ProfileValue::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Memoize a value derived from this profile under `key`. The builder
    /// runs at most once per profile instance unless two callers race, in
    /// which case the first value stored wins.
    pub fn cached<T, F>(&self, key: &'static str, build: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce(&Profile) -> T,
    {
        if let Some(hit) = lock(&self.cache).get(key).cloned() {
            if let Ok(typed) = hit.downcast::<T>() {
                return typed;
            }
        }
        let built = Arc::new(build(self));
        let mut cache = lock(&self.cache);
        if let Some(existing) = cache.get(key).cloned() {
            if let Ok(typed) = existing.downcast::<T>() {
                return typed;
            }
        }
        cache.insert(key, built.clone());
        built
    }

    fn mismatch<T>(&self, path: &str, expected: &str, found: &ProfileValue, default: T) -> T {
        let first_time = lock(&self.warned).insert(path.to_string());
        if first_time {
            warn!(
                species = %self.species,
                key = path,
                expected,
                found = found.type_name(),
                "profile value has the wrong type, using default"
            );
        }
        default
    }
}

fn root_species(root: &ProfileTable) -> Option<SpeciesId> {
    match root.get("identity")? {
        ProfileValue::Table(identity) => identity
            .get("mob_id")
            .and_then(ProfileValue::as_str)
            .map(SpeciesId::from),
        _ => None,
    }
}

/// Species named by a profile table's `identity.mob_id`.
pub fn species_of(root: &ProfileTable) -> Option<SpeciesId> {
    root_species(root)
}

/// Builds profiles in code, mostly for species bundles and tests.
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    species: SpeciesId,
    root: ProfileTable,
}

impl ProfileBuilder {
    pub fn set(mut self, path: &str, value: impl Into<ProfileValue>) -> Self {
        set_path(&mut self.root, path, value.into());
        self
    }

    /// Merge a whole table over what has been set so far.
    pub fn merge(mut self, overlay: &ProfileTable) -> Self {
        deep_merge(&mut self.root, overlay);
        self
    }

    pub fn build(self) -> Profile {
        Profile::new(self.species, self.root)
    }
}
