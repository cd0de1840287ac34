//! Package declarations for devnest projects.
//!
//! This crate turns the package strings users write in `devnest.json` into
//! installable targets (`PackageSpec`), and edits the `packages` field of that
//! file without disturbing anything else in it (`PackageList`, `ConfigFile`).
//! Flake reference parsing lives in `devnest-flake`.

pub mod config;
pub mod package_spec;
pub mod packages;
pub mod runx;
pub mod syntax;
pub mod types;
pub mod versioned;

pub use config::{ConfigError, ConfigFile, CONFIG_FILE_NAME};
pub use devnest_flake::{FlakeError, FlakeRef, FlakeRefType, Installable};
pub use package_spec::{PackageSpec, DEFAULT_INDEX, LATEST};
pub use packages::{Package, PackageList, PackagesError};
pub use runx::{RunxRef, RunxRefError};
pub use syntax::InstallableSyntax;
pub use types::{IndexRevision, Platform, SUPPORTED_PLATFORMS};
pub use versioned::{join_versioned_name, split_versioned_name};
