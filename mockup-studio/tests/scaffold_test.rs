// Integration tests for the mockup studio scaffold.

use std::path::Path;

/// Verify that defaults/mockup.toml is valid TOML with the expected tables.
#[test]
fn default_mockup_toml_is_valid() {
    let content =
        std::fs::read_to_string("defaults/mockup.toml").expect("defaults/mockup.toml should exist");
    let parsed: toml::Value = toml::from_str(&content).expect("defaults/mockup.toml is not valid TOML");
    for table in ["gemini", "generation", "output"] {
        assert!(parsed.get(table).is_some(), "missing [{table}] table");
    }
}

/// Verify that defaults/credentials.toml.example is valid TOML.
#[test]
fn credentials_example_is_valid_toml() {
    let content = std::fs::read_to_string("defaults/credentials.toml.example")
        .expect("defaults/credentials.toml.example should exist");
    let parsed: Result<toml::Value, _> = toml::from_str(&content);
    assert!(
        parsed.is_ok(),
        "defaults/credentials.toml.example is not valid TOML: {:?}",
        parsed.err()
    );
}

/// Verify that all expected directories exist.
#[test]
fn directory_structure_exists() {
    let expected_dirs = ["src", "src/llm", "defaults", "tests"];
    for dir in &expected_dirs {
        assert!(Path::new(dir).is_dir(), "Expected directory {dir} to exist");
    }
}
