use lex_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

/// scenario_unused_keys_warn_or_fail
///
/// 1) Unused keys are reported under Warn without erroring.
/// 2) The same document errors under Fail.
/// 3) Keys under consumed sections are never flagged.
/// 4) Unused pointers come back sorted.

const YAML: &str = r#"
paging:
  page_size: 25

schedule:
  reconcile_interval_secs: 3600

telegram:
  token_env: "TG_TOKEN"
  chat: "main"
"#;

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).expect("config load must succeed");

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)
        .expect("warn mode must not error");

    assert!(!report.is_clean());
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/telegram/chat".to_string(), "/telegram/token_env".to_string()]
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));
}

#[test]
fn consumed_sections_are_clean() {
    let yaml = r#"
archive:
  base_url: "http://localhost:9000"
news:
  source_url: "http://localhost:9001/news"
daemon:
  addr: "127.0.0.1:0"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}
