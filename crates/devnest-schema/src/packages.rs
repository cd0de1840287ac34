//! The `packages` field of a project config.
//!
//! The field may be written as a legacy array of `name@version` strings, as an
//! object of `name: "version"` shorthands, as an object of `name: {...}`
//! records, or as any mix of the last two. [`PackageList`] remembers which
//! form each declaration came from so that an untouched list renders back to
//! exactly the value it was loaded from.

use crate::package_spec::LATEST;
use crate::syntax::InstallableSyntax;
use crate::types::Platform;
use crate::versioned::{join_versioned_name, split_versioned_name};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

pub const VERSION: &str = "version";
pub const PLATFORMS: &str = "platforms";
pub const EXCLUDED_PLATFORMS: &str = "excluded_platforms";
pub const OUTPUTS: &str = "outputs";
pub const ALLOW_INSECURE: &str = "allow_insecure";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackagesError {
    #[error("'packages' must be an array or an object, but found {0} instead")]
    InvalidShape(&'static str),
    #[error("'packages' array entries must be strings, but entry {index} is {found}")]
    InvalidListItem { index: usize, found: &'static str },
    #[error("package '{name}' must be a version string or an object, but found {found} instead")]
    InvalidEntry { name: String, found: &'static str },
    #[error("package '{0}' is not declared")]
    NotFound(String),
    #[error("package '{0}' is already declared")]
    AlreadyPresent(String),
    #[error("unsupported platform '{0}'")]
    UnsupportedPlatform(String),
}

/// How a declaration was written, used to render it back the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Shape {
    /// An entry of the legacy array, with the exact string it was read from.
    LegacyList { raw: String },
    /// `"name": "version"`.
    VersionString,
    /// `"name": { ... }`. Never rendered as a shorthand again.
    Record,
}

/// One package declaration.
///
/// Equality compares the name and fields only, not how the declaration was
/// written.
#[derive(Debug, Clone)]
pub struct Package {
    name: String,
    fields: Map<String, Value>,
    shape: Shape,
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.fields == other.fields
    }
}

impl Package {
    /// A declaration written as `"name": { ...fields }`.
    pub fn new(name: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            fields,
            shape: Shape::Record,
        }
    }

    /// A declaration written as `"name": "version"`.
    pub fn version_only(name: impl Into<String>, version: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(VERSION.to_owned(), Value::String(version.into()));
        Self {
            name: name.into(),
            fields,
            shape: Shape::VersionString,
        }
    }

    fn from_legacy(raw: &str) -> Self {
        let (name, version) = split_versioned_name(raw);
        let version = if version.is_empty() { LATEST } else { version };
        Self {
            shape: Shape::LegacyList {
                raw: raw.to_owned(),
            },
            ..Self::version_only(name, version)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared version, or an empty string when there is none.
    pub fn version(&self) -> &str {
        self.fields
            .get(VERSION)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// `name@version`, or just the name when no version is declared.
    pub fn versioned(&self) -> String {
        join_versioned_name(&self.name, self.version())
    }

    /// The string to resolve this declaration from.
    ///
    /// Plain names carry their version; flake and runx references are taken
    /// as written. An unchanged legacy array entry is taken exactly as it
    /// appeared, so `"go"` stays unversioned.
    pub fn spec_string(&self) -> String {
        if InstallableSyntax::detect(&self.name) != InstallableSyntax::PlainName {
            return self.name.clone();
        }
        if matches!(self.shape, Shape::LegacyList { .. }) {
            return self.legacy_string();
        }
        self.versioned()
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn platforms(&self) -> Vec<&str> {
        self.string_list(PLATFORMS)
    }

    pub fn excluded_platforms(&self) -> Vec<&str> {
        self.string_list(EXCLUDED_PLATFORMS)
    }

    pub fn outputs(&self) -> Vec<&str> {
        self.string_list(OUTPUTS)
    }

    pub fn allow_insecure(&self) -> Vec<&str> {
        self.string_list(ALLOW_INSECURE)
    }

    /// Whether this package should be installed on `system`.
    ///
    /// A non-empty `platforms` list is an allow list; `excluded_platforms`
    /// always wins.
    pub fn is_enabled_on_platform(&self, system: &str) -> bool {
        let platforms = self.platforms();
        if !platforms.is_empty() && !platforms.contains(&system) {
            return false;
        }
        !self.excluded_platforms().contains(&system)
    }

    fn string_list(&self, key: &str) -> Vec<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    fn is_version_only(&self) -> bool {
        self.fields.len() == 1 && self.fields.get(VERSION).is_some_and(Value::is_string)
    }

    /// The string for this entry inside a legacy array.
    fn legacy_string(&self) -> String {
        if let Shape::LegacyList { raw } = &self.shape {
            let (name, version) = split_versioned_name(raw);
            let version = if version.is_empty() { LATEST } else { version };
            if name == self.name && version == self.version() {
                return raw.clone();
            }
        }
        self.versioned()
    }

    /// The value for this entry inside a `packages` object.
    fn object_value(&self) -> Value {
        if self.shape != Shape::Record && self.is_version_only() {
            Value::String(self.version().to_owned())
        } else {
            Value::Object(self.fields.clone())
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Form {
    /// `["name@version", ...]`
    LegacyArray,
    /// `{"name": ...}`
    #[default]
    Object,
}

/// The ordered package declarations of one config file.
///
/// Order is declaration order. In object form names are unique; a legacy
/// array keeps duplicates. A legacy array is only ever converted to object
/// form, when an entry gains fields a `name@version` string cannot hold.
#[derive(Debug, Clone, Default)]
pub struct PackageList {
    packages: Vec<Package>,
    form: Form,
    modified: bool,
}

impl PackageList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the `packages` field of a config document.
    pub fn from_value(value: &Value) -> Result<Self, PackagesError> {
        match value {
            Value::Array(items) => {
                let packages = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        item.as_str()
                            .map(Package::from_legacy)
                            .ok_or(PackagesError::InvalidListItem {
                                index,
                                found: json_type(item),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self {
                    packages,
                    form: Form::LegacyArray,
                    modified: false,
                })
            }
            Value::Object(entries) => {
                let packages = entries
                    .iter()
                    .map(|(name, entry)| match entry {
                        Value::String(version) => Ok(Package::version_only(name, version)),
                        Value::Object(fields) => Ok(Package::new(name, fields.clone())),
                        other => Err(PackagesError::InvalidEntry {
                            name: name.clone(),
                            found: json_type(other),
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self {
                    packages,
                    form: Form::Object,
                    modified: false,
                })
            }
            other => Err(PackagesError::InvalidShape(json_type(other))),
        }
    }

    /// Render the list in the form it was loaded in, or in object form once
    /// it has been promoted.
    pub fn to_value(&self) -> Value {
        match self.form {
            Form::LegacyArray => Value::Array(
                self.packages
                    .iter()
                    .map(|pkg| Value::String(pkg.legacy_string()))
                    .collect(),
            ),
            Form::Object => Value::Object(
                self.packages
                    .iter()
                    .map(|pkg| (pkg.name.clone(), pkg.object_value()))
                    .collect(),
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Package> {
        self.packages.iter()
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// The first declaration named `name`.
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|pkg| pkg.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.packages.iter().map(Package::name).collect()
    }

    pub fn versioned_names(&self) -> Vec<String> {
        self.packages.iter().map(Package::versioned).collect()
    }

    /// True when the list is still a legacy array.
    pub fn is_legacy_array(&self) -> bool {
        self.form == Form::LegacyArray
    }

    /// True once any mutation changed the list.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Append a declaration.
    pub fn add(&mut self, mut pkg: Package) -> Result<(), PackagesError> {
        if self.form == Form::LegacyArray {
            if pkg.is_version_only() {
                pkg.shape = Shape::LegacyList {
                    raw: pkg.versioned(),
                };
                self.packages.push(pkg);
                self.modified = true;
                return Ok(());
            }
            self.promote();
        }

        if self.get(&pkg.name).is_some() {
            return Err(PackagesError::AlreadyPresent(pkg.name));
        }
        if matches!(pkg.shape, Shape::LegacyList { .. }) {
            pkg.shape = Shape::VersionString;
        }
        debug!("adding package '{}'", pkg.name);
        self.packages.push(pkg);
        self.modified = true;
        Ok(())
    }

    /// Remove the first declaration named `name`.
    pub fn remove(&mut self, name: &str) -> Option<Package> {
        let index = self.packages.iter().position(|pkg| pkg.name == name)?;
        debug!("removing package '{name}'");
        self.modified = true;
        Some(self.packages.remove(index))
    }

    /// Set one field of the first declaration named `name`.
    ///
    /// A shorthand declaration that gains fields other than `version` becomes
    /// a record; in a legacy array this converts the whole list to object form.
    pub fn set_field(&mut self, name: &str, key: &str, value: Value) -> Result<(), PackagesError> {
        let index = self
            .packages
            .iter()
            .position(|pkg| pkg.name == name)
            .ok_or_else(|| PackagesError::NotFound(name.to_owned()))?;

        let pkg = &mut self.packages[index];
        if pkg.fields.get(key) == Some(&value) {
            return Ok(());
        }
        pkg.fields.insert(key.to_owned(), value);
        self.modified = true;

        if pkg.is_version_only() {
            return Ok(());
        }
        let was_legacy = matches!(pkg.shape, Shape::LegacyList { .. });
        pkg.shape = Shape::Record;
        if was_legacy {
            self.promote();
        }
        Ok(())
    }

    pub fn set_version(&mut self, name: &str, version: &str) -> Result<(), PackagesError> {
        self.set_field(name, VERSION, Value::String(version.to_owned()))
    }

    /// Restrict a package to the given platforms, in addition to any it is
    /// already restricted to.
    pub fn add_platforms(&mut self, name: &str, platforms: &[&str]) -> Result<(), PackagesError> {
        self.extend_string_list(name, PLATFORMS, platforms, true)
    }

    pub fn exclude_platforms(
        &mut self,
        name: &str,
        platforms: &[&str],
    ) -> Result<(), PackagesError> {
        self.extend_string_list(name, EXCLUDED_PLATFORMS, platforms, true)
    }

    pub fn set_outputs(&mut self, name: &str, outputs: &[&str]) -> Result<(), PackagesError> {
        self.set_field(name, OUTPUTS, string_array(outputs.iter().copied()))
    }

    /// Allow the listed insecure store paths for a package.
    pub fn set_allow_insecure(
        &mut self,
        name: &str,
        store_paths: &[&str],
    ) -> Result<(), PackagesError> {
        self.extend_string_list(name, ALLOW_INSECURE, store_paths, false)
    }

    fn extend_string_list(
        &mut self,
        name: &str,
        key: &str,
        values: &[&str],
        platforms: bool,
    ) -> Result<(), PackagesError> {
        if platforms {
            if let Some(bad) = values.iter().find(|p| !Platform::from(**p).is_supported()) {
                return Err(PackagesError::UnsupportedPlatform((*bad).to_owned()));
            }
        }
        let pkg = self
            .get(name)
            .ok_or_else(|| PackagesError::NotFound(name.to_owned()))?;

        let mut merged: Vec<&str> = pkg.string_list(key);
        for value in values {
            if !merged.contains(value) {
                merged.push(*value);
            }
        }
        let merged = string_array(merged);
        self.set_field(name, key, merged)
    }

    /// Convert a legacy array to object form. One-way.
    fn promote(&mut self) {
        if self.form == Form::Object {
            return;
        }
        debug!("converting legacy 'packages' array to an object");
        self.form = Form::Object;

        let mut seen = Vec::with_capacity(self.packages.len());
        self.packages.retain(|pkg| {
            if seen.contains(&pkg.name) {
                debug!("dropping duplicate declaration of '{}'", pkg.name);
                return false;
            }
            seen.push(pkg.name.clone());
            true
        });
        for pkg in &mut self.packages {
            if matches!(pkg.shape, Shape::LegacyList { .. }) {
                pkg.shape = Shape::VersionString;
            }
        }
        self.modified = true;
    }
}

impl<'a> IntoIterator for &'a PackageList {
    type Item = &'a Package;
    type IntoIter = std::slice::Iter<'a, Package>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.iter()
    }
}

fn string_array<'a>(values: impl IntoIterator<Item = &'a str>) -> Value {
    Value::Array(
        values
            .into_iter()
            .map(|v| Value::String(v.to_owned()))
            .collect(),
    )
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
