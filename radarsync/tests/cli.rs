use std::time::Duration;

use chrono::NaiveDate;
use clap::Parser;
use radarsync::{app, cli::Cli};
use radarsync_config::Config;

#[test]
fn parses_scan_time_and_flags() {
    let cli = Cli::try_parse_from([
        "radarsync",
        "--scan-time",
        "202401010605",
        "--skip-georeferenced",
        "--pass-timeout",
        "90s",
        "--max-parallel-scans",
        "4",
    ])
    .unwrap();

    assert_eq!(
        cli.scan_time,
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(6, 5, 0)
    );
    assert!(cli.skip_georeferenced);

    let mut config = Config::default();
    cli.apply(&mut config);
    assert_eq!(config.pipeline.pass_timeout, Some(Duration::from_secs(90)));
    assert_eq!(config.pipeline.max_parallel_scans, 4);
}

#[test]
fn rejects_malformed_scan_time() {
    assert!(Cli::try_parse_from(["radarsync", "--scan-time", "2024-01-01"]).is_err());
    assert!(Cli::try_parse_from(["radarsync", "--scan-time", "202413010000"]).is_err());
}

#[test]
fn flags_are_optional() {
    let cli = Cli::try_parse_from(["radarsync"]).unwrap();
    assert!(cli.scan_time.is_none());
    assert!(!cli.skip_georeferenced);

    let mut config = Config::default();
    let before = config.pipeline.clone();
    cli.apply(&mut config);
    assert_eq!(config.pipeline.max_parallel_scans, before.max_parallel_scans);
    assert_eq!(config.pipeline.pass_timeout, before.pass_timeout);
}

#[tokio::test]
async fn pass_against_empty_mirror_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = dir.path().join("mirror");
    std::fs::create_dir_all(&mirror).unwrap();
    std::fs::write(mirror.join("dir.list"), "").unwrap();
    let status_file = dir.path().join("status.log");

    let config_path = dir.path().join("radarsync.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[source]
mirror_root = '{mirror}'

[paths]
staging_dir = '{staging}'
output_root = '{output}'

[status]
status_file = '{status}'
"#,
            mirror = mirror.display(),
            staging = dir.path().join("staging").display(),
            output = dir.path().join("output").display(),
            status = status_file.display(),
        ),
    )
    .unwrap();

    let cli = Cli {
        config: Some(config_path),
        ..Cli::default()
    };
    let summary = app::run(cli).await.unwrap();
    assert_eq!(summary.listed, 0);
    assert!(dir.path().join("staging").is_dir());
}
