use crate::package_spec::PackageSpec;
use crate::packages::{json_type, Package, PackageList, PackagesError};
use crate::types::IndexRevision;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "devnest.json";

const PACKAGES_KEY: &str = "packages";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config file must contain a JSON object, but found {0} instead")]
    NotAnObject(&'static str),
    #[error("invalid packages: {0}")]
    Packages(#[from] PackagesError),
    #[error("'nixpkgs' must be an object, but found {0} instead")]
    InvalidNixpkgs(&'static str),
    #[error("'nixpkgs.commit' must be a string, but found {0} instead")]
    InvalidNixpkgsCommit(&'static str),
}

/// Borrows the exact text of the top-level `packages` value.
#[derive(Deserialize)]
struct PackagesText<'a> {
    #[serde(borrow, default)]
    packages: Option<&'a RawValue>,
}

/// A project config file.
///
/// Holds the text it was loaded from. Until the package list changes,
/// [`ConfigFile::to_json_string`] returns that text unchanged; afterwards only
/// the `packages` value is rewritten in place.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    raw: String,
    root: Map<String, Value>,
    packages: PackageList,
    packages_span: Option<Range<usize>>,
    legacy_pin: Option<IndexRevision>,
}

impl ConfigFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("loading config from {}", path.display());
        let content = fs::read_to_string(path)?;
        content.parse()
    }

    /// Write the config atomically: temp file in the same directory, fsync,
    /// then rename over `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = self.to_json_string()?;
        let dir = path.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        io::Write::write_all(&mut tmp, content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| ConfigError::Io(e.error))?;
        if let Ok(f) = fs::File::open(dir) {
            let _ = f.sync_all();
        }
        Ok(())
    }

    pub fn packages(&self) -> &PackageList {
        &self.packages
    }

    pub fn packages_mut(&mut self) -> &mut PackageList {
        &mut self.packages
    }

    /// The deprecated `nixpkgs.commit` pin, if set to a non-empty value.
    pub fn legacy_pin(&self) -> Option<&IndexRevision> {
        self.legacy_pin.as_ref()
    }

    /// A top-level field of the document as it was loaded.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// Resolve every declaration against this config's pin, in declaration order.
    pub fn package_specs(&self) -> Vec<(&Package, PackageSpec)> {
        self.packages
            .iter()
            .map(|pkg| {
                let spec = PackageSpec::parse(&pkg.spec_string(), self.legacy_pin());
                if spec.is_unresolved() {
                    debug!("package '{}' did not resolve to anything", pkg.name());
                }
                (pkg, spec)
            })
            .collect()
    }

    /// The document text, with the current package list.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        if !self.packages.is_modified() {
            return Ok(self.raw.clone());
        }
        let value = self.packages.to_value();

        let Some(span) = self.packages_span.clone() else {
            return self.insert_packages(&value);
        };

        let original = &self.raw[span.clone()];
        let rendered = match original.split('\n').nth(1) {
            Some(nested) => {
                let indent = line_indent(&self.raw, span.start);
                render_pretty(&value, indent_step(nested, indent), indent)?
            }
            None => serde_json::to_string(&value)?,
        };

        let mut out = String::with_capacity(self.raw.len() + rendered.len());
        out.push_str(&self.raw[..span.start]);
        out.push_str(&rendered);
        out.push_str(&self.raw[span.end..]);
        Ok(out)
    }

    /// Append a `packages` member before the root's closing brace, laid out
    /// like the members already there.
    fn insert_packages(&self, value: &Value) -> Result<String, ConfigError> {
        let raw = &self.raw;
        let close = raw.trim_end().len().saturating_sub(1);
        let head = raw[..close].trim_end();
        let open = raw.len() - raw.trim_start().len();
        let first_member = raw[open + 1..]
            .find(|c: char| !c.is_ascii_whitespace())
            .map_or(close, |i| open + 1 + i);
        let separator = if self.root.is_empty() { "" } else { "," };

        let member = if raw[open..first_member].contains('\n') {
            let closing_indent = line_indent(raw, close);
            let member_indent = if self.root.is_empty() {
                format!("{closing_indent}  ")
            } else {
                line_indent(raw, first_member).to_owned()
            };
            let rendered = render_pretty(
                value,
                indent_step(&member_indent, closing_indent),
                &member_indent,
            )?;
            format!("{separator}\n{member_indent}\"{PACKAGES_KEY}\": {rendered}")
        } else {
            let rendered = serde_json::to_string(value)?;
            format!("{separator}\"{PACKAGES_KEY}\":{rendered}")
        };

        let mut out = String::with_capacity(raw.len() + member.len());
        out.push_str(head);
        out.push_str(&member);
        out.push_str(&raw[head.len()..]);
        Ok(out)
    }
}

impl FromStr for ConfigFile {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let root = match serde_json::from_str::<Value>(input)? {
            Value::Object(root) => root,
            other => return Err(ConfigError::NotAnObject(json_type(&other))),
        };

        let packages = match root.get(PACKAGES_KEY) {
            Some(value) => PackageList::from_value(value)?,
            None => PackageList::new(),
        };

        let text: PackagesText<'_> = serde_json::from_str(input)?;
        let packages_span = text.packages.map(|raw| {
            let start = raw.get().as_ptr() as usize - input.as_ptr() as usize;
            start..start + raw.get().len()
        });

        let legacy_pin = legacy_pin(&root)?;
        if let Some(pin) = &legacy_pin {
            debug!("resolving plain package names against pinned revision {pin}");
        }

        Ok(Self {
            raw: input.to_owned(),
            root,
            packages,
            packages_span,
            legacy_pin,
        })
    }
}

fn legacy_pin(root: &Map<String, Value>) -> Result<Option<IndexRevision>, ConfigError> {
    let nixpkgs = match root.get("nixpkgs") {
        None => return Ok(None),
        Some(Value::Object(nixpkgs)) => nixpkgs,
        Some(other) => return Err(ConfigError::InvalidNixpkgs(json_type(other))),
    };
    match nixpkgs.get("commit") {
        None => Ok(None),
        Some(Value::String(commit)) => Ok(IndexRevision::from_setting(commit)),
        Some(other) => Err(ConfigError::InvalidNixpkgsCommit(json_type(other))),
    }
}

/// Leading whitespace of the line containing byte `pos`.
fn line_indent(text: &str, pos: usize) -> &str {
    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    leading_whitespace(&text[line_start..pos])
}

fn leading_whitespace(line: &str) -> &str {
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

/// One level of indentation, read off a nested line relative to its parent.
/// Falls back to two spaces when the nesting shows none.
fn indent_step<'a>(nested_line: &'a str, parent_indent: &str) -> &'a str {
    match leading_whitespace(nested_line).strip_prefix(parent_indent) {
        Some(step) if !step.is_empty() => step,
        _ => "  ",
    }
}

/// Pretty-print `value` with `step` per level, continuing each line at `indent`.
fn render_pretty(value: &Value, step: &str, indent: &str) -> Result<String, ConfigError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(step.as_bytes());
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    let out = String::from_utf8(buf)
        .map_err(|e| ConfigError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    Ok(out.replace('\n', &format!("\n{indent}")))
}
