use edbridge::bridge::BridgeOptions;
use edbridge::config::{ConfigFlags, load_config_flags, parse_flag_tokens};

#[test]
fn test_config_file_parsing_ignores_comments_and_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".edbridgerc");
    let content = r"
# comment
--ignore-selection-change

--subscribers 3

--pretty
";
    std::fs::write(&path, content).unwrap();

    let flags = load_config_flags(&path).unwrap();
    assert!(flags.ignore_selection_change);
    assert!(flags.pretty);
    assert_eq!(flags.subscribers, Some(3));
    assert!(!flags.watch);
}

#[test]
fn test_cli_flags_override_file_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".edbridgerc");
    std::fs::write(&path, "--watch\n--subscribers 2\n").unwrap();

    let file_flags = load_config_flags(&path).unwrap();
    let cli_flags = parse_flag_tokens(&[
        "edbridge".to_string(),
        "--subscribers=4".to_string(),
        "--keep-initial-change".to_string(),
    ]);

    let effective = file_flags.union(&cli_flags);
    assert!(effective.watch, "file flags should remain enabled");
    assert!(effective.keep_initial_change, "cli flags should be applied");
    assert_eq!(effective.subscribers, Some(4), "cli should override subscriber count");
    assert_eq!(
        effective.bridge_options(),
        BridgeOptions::new().with_ignore_initial_change(false)
    );
}

#[test]
fn test_unparseable_subscriber_count_is_dropped() {
    let flags = parse_flag_tokens(&["--subscribers".to_string(), "many".to_string()]);
    assert_eq!(flags, ConfigFlags::default());
}
