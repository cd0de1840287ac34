//! `name@version` tokens.

/// Split a `name@version` token at its last `@`.
///
/// The token is left whole when there is no `@`, when the only split point
/// would leave an empty name (`@angular/cli`), or when nothing follows the
/// last `@` (`emacsPackages.@`).
pub fn split_versioned_name(s: &str) -> (&str, &str) {
    match s.rfind('@') {
        Some(i) if i > 0 && i + 1 < s.len() => (&s[..i], &s[i + 1..]),
        _ => (s, ""),
    }
}

/// Inverse of [`split_versioned_name`] for a non-empty version.
pub fn join_versioned_name(name: &str, version: &str) -> String {
    if version.is_empty() {
        name.to_owned()
    } else {
        format!("{name}@{version}")
    }
}
