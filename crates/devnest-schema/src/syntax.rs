/// Scheme prefix for tools fetched from the runx registry.
pub const RUNX_PREFIX: &str = "runx:";

/// Separates a flake reference from its attribute path.
pub const ATTR_PATH_SEPARATOR: char = '#';

const FLAKE_PREFIXES: &[&str] = &[
    "flake:",
    "path:",
    "github:",
    "gitlab:",
    "sourcehut:",
    "git+",
    "tarball+",
    "file+",
    "http:",
    "https:",
];

/// Which resolver path a raw package string belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallableSyntax {
    Empty,
    Runx,
    Flake,
    PlainName,
}

impl InstallableSyntax {
    /// Classify `s` by prefix alone, before any backend-specific parsing.
    ///
    /// Anything containing `#` counts as a flake reference, even when the part
    /// before it is not a scheme we know. Such strings fail to parse later and
    /// are dropped rather than treated as plain names.
    pub fn detect(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else if s.starts_with(RUNX_PREFIX) {
            Self::Runx
        } else if s.starts_with('.')
            || s.starts_with('/')
            || FLAKE_PREFIXES.iter().any(|prefix| s.starts_with(prefix))
            || s.contains(ATTR_PATH_SEPARATOR)
        {
            Self::Flake
        } else {
            Self::PlainName
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_family() {
        assert_eq!(InstallableSyntax::detect(""), InstallableSyntax::Empty);
        assert_eq!(
            InstallableSyntax::detect("runx:golangci/golangci-lint"),
            InstallableSyntax::Runx
        );
        assert_eq!(
            InstallableSyntax::detect("flake:nixpkgs"),
            InstallableSyntax::Flake
        );
        assert_eq!(
            InstallableSyntax::detect("./my-php-flake"),
            InstallableSyntax::Flake
        );
        assert_eq!(
            InstallableSyntax::detect("/my-php-flake"),
            InstallableSyntax::Flake
        );
        assert_eq!(InstallableSyntax::detect("go@1.22"), InstallableSyntax::PlainName);
    }

    #[test]
    fn hash_means_flake_even_with_unknown_scheme() {
        assert_eq!(
            InstallableSyntax::detect("mail:nixpkgs#go"),
            InstallableSyntax::Flake
        );
        assert_eq!(
            InstallableSyntax::detect("nixpkgs#go"),
            InstallableSyntax::Flake
        );
    }

    #[test]
    fn unknown_scheme_without_hash_is_a_plain_name() {
        assert_eq!(
            InstallableSyntax::detect("mail:nixpkgs"),
            InstallableSyntax::PlainName
        );
        assert_eq!(
            InstallableSyntax::detect("golangci/golangci-lint"),
            InstallableSyntax::PlainName
        );
    }
}
