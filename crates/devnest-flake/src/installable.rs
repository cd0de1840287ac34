use crate::reference::{FlakeError, FlakeRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A flake reference plus the attribute path (and optional outputs) to build
/// from it, as in `nixpkgs#hello^out,man`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Installable {
    #[serde(rename = "ref")]
    pub flake_ref: FlakeRef,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub attr_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
}

impl Installable {
    pub fn new(flake_ref: FlakeRef, attr_path: impl Into<String>) -> Self {
        Self {
            flake_ref,
            attr_path: attr_path.into(),
            outputs: Vec::new(),
        }
    }

    /// Parse an installable string.
    ///
    /// The fragment starts at the first `#`; an output selection starts at the
    /// last `^` inside the fragment. An empty fragment is the same as none.
    pub fn parse(input: &str) -> Result<Self, FlakeError> {
        let (flake_part, fragment) = input.split_once('#').unwrap_or((input, ""));
        let (attr_path, outputs) = match fragment.rsplit_once('^') {
            Some((attr_path, outputs)) => (
                attr_path,
                outputs
                    .split(',')
                    .filter(|o| !o.is_empty())
                    .map(str::to_owned)
                    .collect(),
            ),
            None => (fragment, Vec::new()),
        };

        Ok(Self {
            flake_ref: FlakeRef::parse(flake_part)?,
            attr_path: attr_path.to_owned(),
            outputs,
        })
    }
}

impl FromStr for Installable {
    type Err = FlakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Installable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flake_ref)?;
        if !self.attr_path.is_empty() || !self.outputs.is_empty() {
            write!(f, "#{}", self.attr_path)?;
        }
        if !self.outputs.is_empty() {
            write!(f, "^{}", self.outputs.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::FlakeRefType;

    #[test]
    fn splits_attr_path_at_first_hash() {
        let installable = Installable::parse("nixpkgs#go").unwrap();
        assert_eq!(installable.flake_ref, FlakeRef::indirect("nixpkgs"));
        assert_eq!(installable.attr_path, "go");
    }

    #[test]
    fn empty_fragment_equals_no_fragment() {
        assert_eq!(
            Installable::parse("flake:cachix#").unwrap(),
            Installable::parse("flake:cachix").unwrap()
        );
    }

    #[test]
    fn keeps_at_signs_in_attr_path() {
        let installable = Installable::parse("nixpkgs#emacsPackages.@@latest").unwrap();
        assert_eq!(installable.attr_path, "emacsPackages.@@latest");
    }

    #[test]
    fn parses_outputs() {
        let installable = Installable::parse("nixpkgs#hello^out,man").unwrap();
        assert_eq!(installable.attr_path, "hello");
        assert_eq!(installable.outputs, vec!["out", "man"]);
        assert_eq!(installable.to_string(), "flake:nixpkgs#hello^out,man");
    }

    #[test]
    fn local_path_with_attr() {
        let installable = Installable::parse("./my-php-flake#hello").unwrap();
        assert_eq!(installable.flake_ref.ref_type, FlakeRefType::Path);
        assert_eq!(installable.flake_ref.path, "./my-php-flake");
        assert_eq!(installable.to_string(), "path:./my-php-flake#hello");
    }

    #[test]
    fn propagates_reference_errors() {
        assert!(Installable::parse("mail:nixpkgs#go").is_err());
        assert!(Installable::parse("#go").is_err());
    }
}
