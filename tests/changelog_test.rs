use sbml2dae::changelog::Changelog;
use std::path::Path;

#[test]
fn test_repository_changelog_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("CHANGELOG.md");
    let text = std::fs::read_to_string(&path).expect("CHANGELOG.md should exist");

    let changelog = Changelog::parse(&text);
    if let Err(e) = changelog.validate() {
        panic!("{}", e.user_friendly_message());
    }

    let current = changelog
        .releases
        .first()
        .expect("at least one release");
    assert_eq!(current.version, env!("CARGO_PKG_VERSION"));
}
