use std::path::Path;

fn target_recipe(makefile: &str, target: &str) -> Vec<String> {
    makefile
        .lines()
        .skip_while(|line| !line.starts_with(&format!("{}:", target)))
        .skip(1)
        .take_while(|line| line.starts_with('\t'))
        .map(|line| line.trim().to_string())
        .collect()
}

#[test]
fn test_clean_removes_python_artifacts_everywhere() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("Makefile");
    let makefile = std::fs::read_to_string(path).expect("Makefile should exist");

    let clean = target_recipe(&makefile, "clean");
    assert_eq!(clean[0], "cargo clean");
    assert!(clean.iter().any(|cmd| cmd.contains("-name '__pycache__'")));
    assert!(clean
        .iter()
        .any(|cmd| cmd.contains("'*.pyc'") && cmd.contains("'*.pyo'")));
    assert!(
        clean.iter().all(|cmd| !cmd.contains("-prune")),
        "clean must not skip any directory: {:?}",
        clean
    );
}

#[test]
fn test_test_and_lint_targets_delegate_to_cargo() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("Makefile");
    let makefile = std::fs::read_to_string(path).expect("Makefile should exist");

    assert_eq!(target_recipe(&makefile, "test"), vec!["cargo test --all-features"]);
    assert!(target_recipe(&makefile, "lint")[0].starts_with("cargo clippy"));
}
