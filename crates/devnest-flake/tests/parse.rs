use devnest_flake::{FlakeRef, FlakeRefType, Installable};
use pretty_assertions::assert_eq;

const NIXPKGS_REV: &str = "5233fd2ba76a3accb5aaa999c00509a11fd0793c";

#[test]
fn display_is_reparseable() {
    let inputs = [
        "nixpkgs#go".to_owned(),
        "flake:nixpkgs".to_owned(),
        "nixpkgs/branch#go".to_owned(),
        "./my-php-flake#hello".to_owned(),
        "/my-php-flake".to_owned(),
        "path:my-php-flake#hello".to_owned(),
        "github:F1bonacc1/process-compose/v0.43.1".to_owned(),
        format!("github:nixos/nixpkgs/{NIXPKGS_REV}#hello"),
        "gitlab:group/project?dir=nix".to_owned(),
        "git+ssh://git@example.com/repo.git?ref=main#pkg".to_owned(),
        "tarball+https://example.com/archive.tar.gz#default".to_owned(),
        "https://example.com/archive.zip".to_owned(),
    ];

    for input in &inputs {
        let parsed = Installable::parse(input).unwrap();
        let rendered = parsed.to_string();
        assert_eq!(
            Installable::parse(&rendered).unwrap(),
            parsed,
            "{input} rendered as {rendered}"
        );
    }
}

#[test]
fn nixpkgs_commit_reference() {
    let installable = Installable::parse(&format!(
        "github:nixos/nixpkgs/{NIXPKGS_REV}#hello"
    ))
    .unwrap();
    assert_eq!(
        installable.flake_ref,
        FlakeRef {
            ref_type: FlakeRefType::GitHub,
            owner: "nixos".to_owned(),
            repo: "nixpkgs".to_owned(),
            rev: NIXPKGS_REV.to_owned(),
            ..FlakeRef::default()
        }
    );
    assert_eq!(installable.attr_path, "hello");
}

#[test]
fn pinned_default_index_matches_manual_construction() {
    let parsed = Installable::parse("nixpkgs/nixpkgs-unstable#go").unwrap();
    let built = Installable::new(
        FlakeRef::indirect("nixpkgs").with_ref_or_rev("nixpkgs-unstable"),
        "go",
    );
    assert_eq!(parsed, built);
}

#[test]
fn installable_serializes_compactly() {
    let installable = Installable::parse("nixpkgs#hello").unwrap();
    let json = serde_json::to_string(&installable).unwrap();
    assert_eq!(
        json,
        r#"{"ref":{"type":"indirect","id":"nixpkgs"},"attr_path":"hello"}"#
    );
    let back: Installable = serde_json::from_str(&json).unwrap();
    assert_eq!(back, installable);
}
