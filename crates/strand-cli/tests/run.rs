use std::io::Write;

use strand_cli::{load_config, run, CliError, Config, ConfigError, RunSummary};
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("should create temp file");
    file.write_all(contents.as_bytes())
        .expect("should write config");
    file
}

fn replay(config: &Config, input: &str) -> (RunSummary, String) {
    let mut output = Vec::new();
    let summary = run(config, input.as_bytes(), &mut output).expect("replay should succeed");
    (summary, String::from_utf8(output).expect("output should be utf-8"))
}

#[test]
fn default_config_prints_every_message_event() {
    let input = r#"{"type": "message", "detail": {"text": "hi"}}
{"type": "other", "detail": 1}
{"type": "message", "detail": 2}
"#;

    let (summary, output) = replay(&Config::default(), input);

    assert_eq!(output, "{\"text\":\"hi\"}\n2\n");
    assert_eq!(
        summary,
        RunSummary {
            lines: 3,
            dispatched: 3,
            skipped: 0
        }
    );
}

#[test]
fn configured_pipeline_filters_and_maps() {
    let file = write_config(
        r#"
        [source]
        types = "key click"

        [[pipeline.stages]]
        op = "filter"
        callback = "is_number"

        [[pipeline.stages]]
        op = "map"
        callback = "negate"

        [[pipeline.stages]]
        op = "for_each"
        callback = "print"
        "#,
    );
    let config = load_config(file.path().to_str()).expect("config should load");

    let input = r#"{"type": "key", "detail": 1}
{"type": "click", "detail": "x"}
{"type": "click", "detail": 2.5}
{"type": "scroll", "detail": 3}
"#;
    let (_, output) = replay(&config, input);

    assert_eq!(output, "-1\n-2.5\n");
}

#[test]
fn until_stage_ends_the_stream() {
    let file = write_config(
        r#"
        [[pipeline.stages]]
        op = "for_each"
        callback = "print"

        [[pipeline.stages]]
        op = "until"
        callback = "falsy"
        "#,
    );
    let config = load_config(file.path().to_str()).expect("config should load");

    let input = r#"{"type": "message", "detail": "a"}
{"type": "message", "detail": 0}
{"type": "message", "detail": "b"}
"#;
    let (summary, output) = replay(&config, input);

    assert_eq!(output, "\"a\"\n0\n");
    assert_eq!(summary.dispatched, 3);
}

#[test]
fn malformed_and_blank_lines_are_skipped() {
    let input = "not json\n\n{\"detail\": 1}\n{\"type\": \"message\"}\n";

    let (summary, output) = replay(&Config::default(), input);

    assert_eq!(output, "null\n");
    assert_eq!(
        summary,
        RunSummary {
            lines: 4,
            dispatched: 1,
            skipped: 2
        }
    );
}

#[test]
fn unknown_callback_is_reported_before_any_input_is_read() {
    let file = write_config(
        r#"
        [[pipeline.stages]]
        op = "filter"
        callback = "does_not_exist"
        "#,
    );
    let config = load_config(file.path().to_str()).expect("config should load");

    let mut output = Vec::new();
    let err = run(&config, "{\"type\": \"message\"}\n".as_bytes(), &mut output).unwrap_err();

    assert!(matches!(err, CliError::Pipeline(_)));
    assert_eq!(
        err.to_string(),
        "invalid pipeline: filter() requires a valid callback"
    );
    assert!(output.is_empty());
}

#[test]
fn missing_config_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("absent.toml");

    let config = load_config(path.to_str()).expect("missing file should not be an error");
    assert_eq!(config.pipeline.stages.len(), 1);
}

#[test]
fn invalid_config_file_is_a_parse_error() {
    let file = write_config("[source\ntypes = ");

    let err = load_config(file.path().to_str()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}
