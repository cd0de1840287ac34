use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlakeError {
    #[error("flake reference must not be empty")]
    Empty,
    #[error("unsupported flake reference scheme '{scheme}' in '{input}'")]
    UnsupportedScheme { scheme: String, input: String },
    #[error("invalid flake id in '{0}'")]
    InvalidId(String),
    #[error("flake reference '{0}' is missing an owner or repository")]
    MissingOwnerOrRepo(String),
    #[error("flake reference '{0}' has an empty path")]
    InvalidPath(String),
    #[error("flake reference '{0}' has an invalid url")]
    InvalidUrl(String),
}

/// The kind of source a [`FlakeRef`] points at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlakeRefType {
    /// A flake registry id such as `nixpkgs`, resolved through the registry.
    #[default]
    Indirect,
    Path,
    File,
    Git,
    GitHub,
    GitLab,
    SourceHut,
    Tarball,
}

/// A parsed flake reference.
///
/// Only the fields relevant to [`FlakeRef::ref_type`] are populated; the rest
/// stay empty so that two references compare equal exactly when they denote
/// the same source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlakeRef {
    #[serde(rename = "type")]
    pub ref_type: FlakeRefType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(default, rename = "ref", skip_serializing_if = "String::is_empty")]
    pub git_ref: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rev: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dir: String,
}

const ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar", ".tar.gz", ".tgz", ".tar.xz", ".txz", ".tar.bz2", ".tar.zst", ".zip",
];

impl FlakeRef {
    /// An indirect (registry) reference with no ref or rev.
    pub fn indirect(id: impl Into<String>) -> Self {
        Self {
            ref_type: FlakeRefType::Indirect,
            id: id.into(),
            ..Self::default()
        }
    }

    /// Pin this reference to a git ref, or to a revision when `ref_or_rev`
    /// looks like a full commit hash.
    #[must_use]
    pub fn with_ref_or_rev(mut self, ref_or_rev: &str) -> Self {
        if is_rev(ref_or_rev) {
            self.rev = ref_or_rev.to_owned();
        } else {
            self.git_ref = ref_or_rev.to_owned();
        }
        self
    }

    pub fn parse(input: &str) -> Result<Self, FlakeError> {
        if input.is_empty() {
            return Err(FlakeError::Empty);
        }
        if input.starts_with('.') || input.starts_with('/') {
            let (body, query) = split_query(input);
            return parse_path(input, body, query);
        }

        let Some((scheme, rest)) = split_scheme(input) else {
            let (body, query) = split_query(input);
            return parse_indirect(input, body, query, true);
        };

        match scheme {
            "flake" => {
                let (body, query) = split_query(rest);
                parse_indirect(input, body, query, false)
            }
            "path" => {
                let (body, query) = split_query(rest);
                parse_path(input, body, query)
            }
            "github" => parse_forge(input, FlakeRefType::GitHub, rest),
            "gitlab" => parse_forge(input, FlakeRefType::GitLab, rest),
            "sourcehut" => parse_forge(input, FlakeRefType::SourceHut, rest),
            "http" | "https" => {
                let ref_type = if has_archive_suffix(split_query(input).0) {
                    FlakeRefType::Tarball
                } else {
                    FlakeRefType::File
                };
                Ok(Self {
                    ref_type,
                    url: input.to_owned(),
                    ..Self::default()
                })
            }
            _ => {
                if let Some(transport) = scheme.strip_prefix("git+") {
                    parse_git(input, transport, rest)
                } else if let Some(transport) = scheme.strip_prefix("tarball+") {
                    parse_url(input, FlakeRefType::Tarball, transport, rest)
                } else if let Some(transport) = scheme.strip_prefix("file+") {
                    parse_url(input, FlakeRefType::File, transport, rest)
                } else {
                    Err(FlakeError::UnsupportedScheme {
                        scheme: scheme.to_owned(),
                        input: input.to_owned(),
                    })
                }
            }
        }
    }
}

impl FromStr for FlakeRef {
    type Err = FlakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FlakeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut query: Vec<(&str, &str)> = Vec::new();
        match self.ref_type {
            FlakeRefType::Indirect => {
                write!(f, "flake:{}", self.id)?;
                for segment in [&self.git_ref, &self.rev] {
                    if !segment.is_empty() {
                        write!(f, "/{segment}")?;
                    }
                }
            }
            FlakeRefType::Path => write!(f, "path:{}", self.path)?,
            FlakeRefType::GitHub | FlakeRefType::GitLab | FlakeRefType::SourceHut => {
                let scheme = match self.ref_type {
                    FlakeRefType::GitHub => "github",
                    FlakeRefType::GitLab => "gitlab",
                    _ => "sourcehut",
                };
                write!(f, "{scheme}:{}/{}", self.owner, self.repo)?;
                if !self.rev.is_empty() {
                    write!(f, "/{}", self.rev)?;
                } else if !self.git_ref.is_empty() {
                    write!(f, "/{}", self.git_ref)?;
                }
                if !self.host.is_empty() {
                    query.push(("host", &self.host));
                }
            }
            FlakeRefType::Git => {
                write!(f, "git+{}", self.url)?;
                if !self.git_ref.is_empty() {
                    query.push(("ref", &self.git_ref));
                }
                if !self.rev.is_empty() {
                    query.push(("rev", &self.rev));
                }
            }
            FlakeRefType::Tarball => write!(f, "tarball+{}", self.url)?,
            FlakeRefType::File => write!(f, "file+{}", self.url)?,
        }
        if !self.dir.is_empty() {
            query.push(("dir", &self.dir));
        }
        for (i, (key, value)) in query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

/// Returns true for a full 40-character hex commit hash.
pub fn is_rev(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn split_scheme(input: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = input.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic()
        || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    Some((scheme, rest))
}

fn split_query(s: &str) -> (&str, &str) {
    s.split_once('?').unwrap_or((s, ""))
}

fn query_params(query: &str) -> impl Iterator<Item = (&str, &str)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
}

fn apply_query(flake: &mut FlakeRef, query: &str) {
    for (key, value) in query_params(query) {
        match key {
            "dir" => flake.dir = value.to_owned(),
            "ref" => flake.git_ref = value.to_owned(),
            "rev" => flake.rev = value.to_owned(),
            "host" => flake.host = value.to_owned(),
            _ => {}
        }
    }
}

fn is_registry_id(id: &str) -> bool {
    let mut chars = id.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}

fn parse_indirect(
    input: &str,
    body: &str,
    query: &str,
    strict: bool,
) -> Result<FlakeRef, FlakeError> {
    let mut segments = body.split('/');
    let id = segments.next().unwrap_or_default();
    let valid = if strict {
        is_registry_id(id)
    } else {
        !id.is_empty() && !id.contains(':')
    };
    if !valid {
        return Err(FlakeError::InvalidId(input.to_owned()));
    }

    let mut flake = FlakeRef::indirect(id);
    match (segments.next(), segments.next(), segments.next()) {
        (None, ..) => {}
        (Some(ref_or_rev), None, _) if !ref_or_rev.is_empty() => {
            flake = flake.with_ref_or_rev(ref_or_rev);
        }
        (Some(git_ref), Some(rev), None) if !git_ref.is_empty() && is_rev(rev) => {
            flake.git_ref = git_ref.to_owned();
            flake.rev = rev.to_owned();
        }
        _ => return Err(FlakeError::InvalidId(input.to_owned())),
    }
    apply_query(&mut flake, query);
    Ok(flake)
}

fn parse_path(input: &str, path: &str, query: &str) -> Result<FlakeRef, FlakeError> {
    if path.is_empty() {
        return Err(FlakeError::InvalidPath(input.to_owned()));
    }
    let mut flake = FlakeRef {
        ref_type: FlakeRefType::Path,
        path: path.to_owned(),
        ..FlakeRef::default()
    };
    apply_query(&mut flake, query);
    Ok(flake)
}

fn parse_forge(input: &str, ref_type: FlakeRefType, rest: &str) -> Result<FlakeRef, FlakeError> {
    let (body, query) = split_query(rest);
    let mut segments = body.splitn(3, '/');
    let owner = segments.next().unwrap_or_default();
    let repo = segments.next().unwrap_or_default();
    if owner.is_empty() || repo.is_empty() {
        return Err(FlakeError::MissingOwnerOrRepo(input.to_owned()));
    }

    let mut flake = FlakeRef {
        ref_type,
        owner: owner.to_owned(),
        repo: repo.to_owned(),
        ..FlakeRef::default()
    };
    if let Some(ref_or_rev) = segments.next().filter(|s| !s.is_empty()) {
        flake = flake.with_ref_or_rev(ref_or_rev);
    }
    apply_query(&mut flake, query);
    Ok(flake)
}

fn parse_git(input: &str, transport: &str, rest: &str) -> Result<FlakeRef, FlakeError> {
    let (body, query) = split_query(rest);
    if transport.is_empty() || body.is_empty() {
        return Err(FlakeError::InvalidUrl(input.to_owned()));
    }
    let mut flake = FlakeRef {
        ref_type: FlakeRefType::Git,
        url: format!("{transport}:{body}"),
        ..FlakeRef::default()
    };
    apply_query(&mut flake, query);
    Ok(flake)
}

fn parse_url(
    input: &str,
    ref_type: FlakeRefType,
    transport: &str,
    rest: &str,
) -> Result<FlakeRef, FlakeError> {
    if transport.is_empty() || rest.is_empty() {
        return Err(FlakeError::InvalidUrl(input.to_owned()));
    }
    Ok(FlakeRef {
        ref_type,
        url: format!("{transport}:{rest}"),
        ..FlakeRef::default()
    })
}

fn has_archive_suffix(url: &str) -> bool {
    ARCHIVE_SUFFIXES.iter().any(|suffix| url.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REV: &str = "5233fd2ba76a3accb5aaa999c00509a11fd0793c";

    #[test]
    fn parses_bare_registry_id() {
        let flake = FlakeRef::parse("nixpkgs").unwrap();
        assert_eq!(flake, FlakeRef::indirect("nixpkgs"));
        assert_eq!(flake.to_string(), "flake:nixpkgs");
    }

    #[test]
    fn bare_and_explicit_indirect_refs_are_equal() {
        assert_eq!(
            FlakeRef::parse("nixpkgs/nixpkgs-unstable").unwrap(),
            FlakeRef::parse("flake:nixpkgs/nixpkgs-unstable").unwrap()
        );
    }

    #[test]
    fn indirect_rev_is_detected() {
        let flake = FlakeRef::parse(&format!("nixpkgs/{REV}")).unwrap();
        assert_eq!(flake.rev, REV);
        assert!(flake.git_ref.is_empty());
    }

    #[test]
    fn indirect_ref_and_rev() {
        let flake = FlakeRef::parse(&format!("flake:nixpkgs/unstable/{REV}")).unwrap();
        assert_eq!(flake.git_ref, "unstable");
        assert_eq!(flake.rev, REV);
        assert_eq!(flake.to_string(), format!("flake:nixpkgs/unstable/{REV}"));
    }

    #[test]
    fn explicit_flake_scheme_is_lenient_about_ids() {
        let flake = FlakeRef::parse("flake:go@1.22.0").unwrap();
        assert_eq!(flake.id, "go@1.22.0");

        let flake = FlakeRef::parse("flake:@angular/cli").unwrap();
        assert_eq!(flake.id, "@angular");
        assert_eq!(flake.git_ref, "cli");
    }

    #[test]
    fn explicit_flake_scheme_rejects_colons_in_id() {
        assert!(matches!(
            FlakeRef::parse("flake:mail:nixpkgs"),
            Err(FlakeError::InvalidId(_))
        ));
    }

    #[test]
    fn bare_ids_are_strict() {
        assert!(matches!(
            FlakeRef::parse("go@1.22.0"),
            Err(FlakeError::InvalidId(_))
        ));
    }

    #[test]
    fn rejects_unknown_scheme() {
        let err = FlakeRef::parse("mail:nixpkgs").unwrap_err();
        assert_eq!(
            err,
            FlakeError::UnsupportedScheme {
                scheme: "mail".to_owned(),
                input: "mail:nixpkgs".to_owned(),
            }
        );
    }

    #[test]
    fn path_like_and_path_scheme_agree() {
        let implicit = FlakeRef::parse("./my-php-flake").unwrap();
        let explicit = FlakeRef::parse("path:./my-php-flake").unwrap();
        assert_eq!(implicit, explicit);
        assert_eq!(implicit.ref_type, FlakeRefType::Path);
        assert_eq!(implicit.to_string(), "path:./my-php-flake");
    }

    #[test]
    fn rejects_empty_path() {
        assert!(matches!(
            FlakeRef::parse("path:"),
            Err(FlakeError::InvalidPath(_))
        ));
    }

    #[test]
    fn parses_github_ref() {
        let flake = FlakeRef::parse("github:F1bonacc1/process-compose/v0.43.1").unwrap();
        assert_eq!(flake.ref_type, FlakeRefType::GitHub);
        assert_eq!(flake.owner, "F1bonacc1");
        assert_eq!(flake.repo, "process-compose");
        assert_eq!(flake.git_ref, "v0.43.1");
    }

    #[test]
    fn github_query_params() {
        let flake = FlakeRef::parse("github:owner/repo?dir=sub&host=git.example.com").unwrap();
        assert_eq!(flake.dir, "sub");
        assert_eq!(flake.host, "git.example.com");
        assert_eq!(
            flake.to_string(),
            "github:owner/repo?host=git.example.com&dir=sub"
        );
    }

    #[test]
    fn github_requires_owner_and_repo() {
        assert!(matches!(
            FlakeRef::parse("github:owner"),
            Err(FlakeError::MissingOwnerOrRepo(_))
        ));
    }

    #[test]
    fn parses_git_transport() {
        let flake = FlakeRef::parse("git+https://example.com/repo.git?ref=main").unwrap();
        assert_eq!(flake.ref_type, FlakeRefType::Git);
        assert_eq!(flake.url, "https://example.com/repo.git");
        assert_eq!(flake.git_ref, "main");
        assert_eq!(flake.to_string(), "git+https://example.com/repo.git?ref=main");
    }

    #[test]
    fn https_archive_is_tarball() {
        let flake = FlakeRef::parse("https://example.com/src.tar.gz").unwrap();
        assert_eq!(flake.ref_type, FlakeRefType::Tarball);
        let flake = FlakeRef::parse("https://example.com/flake.nix").unwrap();
        assert_eq!(flake.ref_type, FlakeRefType::File);
    }

    #[test]
    fn serializes_without_empty_fields() {
        let json = serde_json::to_string(&FlakeRef::indirect("nixpkgs")).unwrap();
        assert_eq!(json, r#"{"type":"indirect","id":"nixpkgs"}"#);
    }
}
