//! Flake references and installables for devnest.
//!
//! This crate knows the flake reference grammar (`flake:`, `path:`,
//! `github:`, `git+https:` and friends) and nothing else. Callers sniff a
//! string, hand it to [`Installable::parse`], and compare the results by
//! equality.

pub mod installable;
pub mod reference;

pub use installable::Installable;
pub use reference::{is_rev, FlakeError, FlakeRef, FlakeRefType};
