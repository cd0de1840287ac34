use crate::runx::RunxRef;
use crate::syntax::InstallableSyntax;
use crate::types::IndexRevision;
use crate::versioned::{join_versioned_name, split_versioned_name};
use devnest_flake::{FlakeRef, Installable};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Registry id of the package index plain names are looked up in.
pub const DEFAULT_INDEX: &str = "nixpkgs";

/// Version assumed for a plain name written without `@version`.
pub const LATEST: &str = "latest";

/// Everything a package string can be installed as.
///
/// At most one family is set: `runx`, a lone `installable` for flake
/// references, or the `attr_path_installable` pair for plain names. A plain
/// name without a legacy pin sets both `installable` and
/// `attr_path_installable`; callers try them in the order returned by
/// [`PackageSpec::candidates`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installable: Option<Installable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr_path_installable: Option<Installable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runx: Option<RunxRef>,
}

impl PackageSpec {
    /// Resolve a raw package string.
    ///
    /// Never fails. Strings that cannot be resolved produce a spec for which
    /// [`PackageSpec::is_unresolved`] is true. `legacy_pin` fixes the default
    /// index to one revision; it changes how plain names resolve and has no
    /// effect on runx or flake references.
    pub fn parse(raw: &str, legacy_pin: Option<&IndexRevision>) -> Self {
        match InstallableSyntax::detect(raw) {
            InstallableSyntax::Empty => Self::default(),
            InstallableSyntax::Runx => match raw.parse::<RunxRef>() {
                Ok(runx) => Self {
                    runx: Some(runx),
                    ..Self::default()
                },
                Err(e) => {
                    debug!("dropping package '{raw}': {e}");
                    Self::default()
                }
            },
            InstallableSyntax::Flake => match Installable::parse(raw) {
                Ok(installable) => Self {
                    installable: Some(installable),
                    ..Self::default()
                },
                Err(e) => {
                    debug!("dropping package '{raw}': {e}");
                    Self::default()
                }
            },
            InstallableSyntax::PlainName => Self::parse_plain_name(raw, legacy_pin),
        }
    }

    fn parse_plain_name(raw: &str, legacy_pin: Option<&IndexRevision>) -> Self {
        let (name, version) = split_versioned_name(raw);

        let Some(pin) = legacy_pin else {
            // The defaulted version is not written into either installable.
            let (version, token) = if version.is_empty() {
                (LATEST, name.to_owned())
            } else {
                (version, join_versioned_name(name, version))
            };
            let installable = match Installable::parse(&format!("flake:{token}")) {
                Ok(installable) => Some(installable),
                Err(e) => {
                    debug!("'{token}' is not a flake id: {e}");
                    None
                }
            };
            return Self {
                name: name.to_owned(),
                version: version.to_owned(),
                installable,
                attr_path_installable: Some(default_index_installable(&token, None)),
                runx: None,
            };
        };

        if version.is_empty() {
            // A pinned index has no notion of "latest", so the name stays unversioned.
            return Self {
                attr_path_installable: Some(default_index_installable(name, Some(pin))),
                ..Self::default()
            };
        }
        Self {
            name: name.to_owned(),
            version: version.to_owned(),
            attr_path_installable: Some(default_index_installable(
                &join_versioned_name(name, version),
                Some(pin),
            )),
            ..Self::default()
        }
    }

    /// True when nothing about the input could be resolved.
    pub fn is_unresolved(&self) -> bool {
        *self == Self::default()
    }

    /// Installables to try, in priority order.
    pub fn candidates(&self) -> Vec<&Installable> {
        self.installable
            .iter()
            .chain(self.attr_path_installable.iter())
            .collect()
    }
}

fn default_index_installable(attr_path: &str, pin: Option<&IndexRevision>) -> Installable {
    let mut flake_ref = FlakeRef::indirect(DEFAULT_INDEX);
    if let Some(pin) = pin {
        flake_ref = flake_ref.with_ref_or_rev(pin);
    }
    Installable::new(flake_ref, attr_path)
}
