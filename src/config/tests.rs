//! Unit tests for configuration loading and validation.

use std::time::Duration;

use ortho_config::MergeComposer;
use rstest::rstest;
use serde_json::{Value, json};

use super::{DEFAULT_DOWNLOAD_SIZE_LIMIT, OperationMode, PreviewConfig};
use crate::error::PreviewError;

/// Applies a configuration layer to the composer based on the layer type.
fn apply_layer(composer: &mut MergeComposer, layer_type: &str, value: Value) {
    match layer_type {
        "defaults" => composer.push_defaults(value),
        "file" => composer.push_file(value, None),
        "environment" => composer.push_environment(value),
        "cli" => composer.push_cli(value),
        _ => panic!("unknown layer type: {layer_type}"),
    }
}

fn merge(layers: Vec<(&str, Value)>) -> PreviewConfig {
    let mut composer = MergeComposer::new();
    for (layer_type, value) in layers {
        apply_layer(&mut composer, layer_type, value);
    }
    PreviewConfig::merge_from_layers(composer.layers()).expect("merge should succeed")
}

#[rstest]
#[case::file_overrides_defaults(
    vec![("defaults", json!({"github_org": "default"})), ("file", json!({"github_org": "file"}))],
    "file"
)]
#[case::environment_overrides_file(
    vec![("file", json!({"github_org": "file"})), ("environment", json!({"github_org": "env"}))],
    "env"
)]
#[case::cli_overrides_environment(
    vec![("environment", json!({"github_org": "env"})), ("cli", json!({"github_org": "cli"}))],
    "cli"
)]
fn layer_precedence(#[case] layers: Vec<(&str, Value)>, #[case] expected: &str) {
    let config = merge(layers);
    assert_eq!(config.github_org.as_deref(), Some(expected));
}

#[rstest]
fn partial_overrides_preserve_lower_values() {
    let config = merge(vec![
        ("file", json!({"trusted_pr_label": "aio: preview", "preview_job_name": "docs"})),
        ("cli", json!({"preview_job_name": "aio_preview_v2"})),
    ]);

    assert_eq!(config.trusted_pr_label.as_deref(), Some("aio: preview"));
    assert_eq!(config.preview_job_name, "aio_preview_v2");
}

#[rstest]
fn unset_fields_take_built_in_defaults() {
    let config = merge(vec![("file", json!({"builds_dir": "/srv/builds"}))]);

    assert_eq!(config.download_size_limit, DEFAULT_DOWNLOAD_SIZE_LIMIT);
    assert_eq!(config.artifact_path, "aio/tmp/dist.tgz");
    assert_eq!(config.preview_job_name, "aio_preview");
    assert_eq!(config.circle_ci_api_base, "https://circleci.com/api/v1.1");
    assert_eq!(config.github_api_base, "https://api.github.com");
    assert_eq!(config.request_timeout(), None);
    assert_eq!(config.operation_mode(), OperationMode::Idle);
}

#[rstest]
fn configured_token_wins_over_legacy_variable() {
    let config = PreviewConfig {
        github_token: Some("configured".to_owned()),
        ..Default::default()
    };

    let token = config.resolve_token_with(|_| Some("legacy".to_owned()));

    assert_eq!(token.ok(), Some("configured".to_owned()));
}

#[rstest]
#[case::unset(None)]
#[case::blank(Some("   "))]
fn legacy_token_is_used_when_unset(#[case] configured: Option<&str>) {
    let config = PreviewConfig {
        github_token: configured.map(str::to_owned),
        ..Default::default()
    };

    let token = config.resolve_token_with(|name| {
        assert_eq!(name, "GITHUB_TOKEN");
        Some("legacy".to_owned())
    });

    assert_eq!(token.ok(), Some("legacy".to_owned()));
}

#[rstest]
fn missing_token_is_a_configuration_error() {
    let config = PreviewConfig::default();

    let result = config.resolve_token_with(|_| None);

    assert!(matches!(result, Err(PreviewError::Configuration { .. })));
}

#[rstest]
fn team_slugs_are_split_and_trimmed() {
    let config = PreviewConfig {
        github_team_slugs: Some(" aio-contributors, ,angular-core ,".to_owned()),
        ..Default::default()
    };

    assert_eq!(config.team_slugs(), vec!["aio-contributors", "angular-core"]);
    assert!(PreviewConfig::default().team_slugs().is_empty());
}

#[rstest]
fn required_fields_report_their_flag() {
    let config = PreviewConfig {
        github_org: Some("angular".to_owned()),
        domain_name: Some("  ".to_owned()),
        ..Default::default()
    };

    let repository = config.require_repository_info();
    let domain = config.require_domain_name();

    assert!(
        matches!(&repository, Err(PreviewError::Configuration { message }) if message.contains("--github-repo")),
        "unexpected result {repository:?}"
    );
    assert!(
        matches!(&domain, Err(PreviewError::Configuration { message }) if message.contains("--domain-name")),
        "unexpected result {domain:?}"
    );
    assert!(config.require_builds_dir().is_err());
    assert!(config.require_trusted_pr_label().is_err());
    assert!(config.require_circle_ci_token().is_err());
}

#[rstest]
fn repository_info_is_trimmed() {
    let config = PreviewConfig {
        github_org: Some(" angular ".to_owned()),
        github_repo: Some("angular".to_owned()),
        ..Default::default()
    };

    assert_eq!(config.require_repository_info().ok(), Some(("angular", "angular")));
}

#[rstest]
fn explicit_downloads_dir_is_used() {
    let config = PreviewConfig {
        downloads_dir: Some("/srv/downloads".to_owned()),
        ..Default::default()
    };

    assert_eq!(
        config.downloads_dir().ok().as_ref().map(|dir| dir.as_str()),
        Some("/srv/downloads")
    );
    let fallback = PreviewConfig::default()
        .downloads_dir()
        .expect("temp dir should be UTF-8");
    assert!(fallback.ends_with("preview-builds-downloads"));
}

#[rstest]
fn invalid_significant_files_pattern_is_rejected() {
    let config = PreviewConfig {
        significant_files_pattern: "(".to_owned(),
        ..Default::default()
    };

    assert!(matches!(
        config.significant_files(),
        Err(PreviewError::Configuration { .. })
    ));
    let default_pattern = PreviewConfig::default()
        .significant_files()
        .expect("default pattern compiles");
    assert_eq!(default_pattern.is_match("aio/content/index.md").ok(), Some(true));
    assert_eq!(default_pattern.is_match("packages/core/aio/index.ts").ok(), Some(false));
}

#[rstest]
#[case::docs_source("aio/src/app/app.component.ts", true)]
#[case::framework_source("packages/core/src/render3/index.ts", true)]
#[case::docs_unit_test("aio/src/app/app.component.spec.ts", false)]
#[case::underscore_test("packages/core/test/render_spec.js", false)]
#[case::outside_tree("modules/benchmarks/index.ts", false)]
fn significant_files_pattern_supports_lookahead(#[case] file: &str, #[case] expected: bool) {
    let config = PreviewConfig {
        significant_files_pattern: r"^(?:aio|packages)\/(?!.*[._]spec\.[jt]s$)".to_owned(),
        ..Default::default()
    };

    let pattern = config
        .significant_files()
        .expect("look-ahead pattern should compile");

    assert_eq!(pattern.is_match(file).ok(), Some(expected));
}

#[rstest]
fn request_timeout_converts_seconds() {
    let config = PreviewConfig {
        request_timeout_seconds: 30,
        ..Default::default()
    };

    assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
}

#[rstest]
#[case::build(Some(12), None, false, OperationMode::BuildCompleted)]
#[case::build_wins(Some(12), Some(4), false, OperationMode::BuildCompleted)]
#[case::pull_request(None, Some(4), false, OperationMode::PullRequestUpdated)]
#[case::query(None, Some(4), true, OperationMode::PublicPreviewQuery)]
#[case::query_without_pr(None, None, true, OperationMode::Idle)]
fn operation_mode_follows_notification_fields(
    #[case] build_num: Option<u64>,
    #[case] pr: Option<u64>,
    #[case] check_public_preview: bool,
    #[case] expected: OperationMode,
) {
    let config = PreviewConfig {
        build_num,
        pr,
        check_public_preview,
        ..Default::default()
    };

    assert_eq!(config.operation_mode(), expected);
}
