//! preview-builds entrypoint.
//!
//! Each invocation handles one notification: a finished CI build, a pull
//! request update, or a query whether a pull request may have a public
//! preview. Comments announcing public previews are posted before exit.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use ortho_config::OrthoConfig;
use preview_builds::telemetry::{DEFAULT_DIRECTIVE, init_tracing};
use preview_builds::{
    ArtifactFetcher, BuildNotification, BuildStore, CircleCiClient, CommentNotifier,
    OctocrabGateway, OperationMode, PersonalAccessToken, PrNotification, PreviewConfig,
    PreviewError, PreviewService, RepositoryLocator, ServiceSettings, TrustEvaluator, events,
};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(DEFAULT_DIRECTIVE);
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(retryable = error.is_retryable(), "{error}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), PreviewError> {
    let config = load_config()?;
    let mode = config.operation_mode();
    if mode == OperationMode::Idle {
        tracing::info!("no build number or pull request supplied, nothing to do");
        return Ok(());
    }

    let (org, repo) = config.require_repository_info()?;
    let token = PersonalAccessToken::new(config.resolve_token()?)?;
    let locator = RepositoryLocator::new(&config.github_api_base, org, repo)?;
    let github = Arc::new(OctocrabGateway::for_token(&token, locator)?);

    let http = reqwest::Client::new();
    let circle_ci = CircleCiClient::new(
        http.clone(),
        &config.circle_ci_api_base,
        org,
        repo,
        config.require_circle_ci_token()?,
    )?;
    let fetcher = ArtifactFetcher::new(
        Arc::new(circle_ci),
        http,
        config.downloads_dir()?,
        config.download_size_limit,
    );
    let trust = TrustEvaluator::new(
        github.clone(),
        github.clone(),
        config.team_slugs(),
        config.require_trusted_pr_label()?,
    )?;

    let notifier = CommentNotifier::new(github.clone(), config.require_domain_name()?)?;
    let (emitter, receiver) = events::channel();
    let store = Arc::new(BuildStore::open(&config.require_builds_dir()?, emitter)?);
    let service = PreviewService::new(
        ServiceSettings::from_config(&config)?,
        fetcher,
        trust,
        github,
        store,
    );

    let notifications = tokio::spawn(notifier.run(receiver));
    let result = dispatch(&service, &config, mode).await;

    // Dropping the service closes the event channel so the notifier drains
    // and returns.
    drop(service);
    if let Err(error) = notifications.await {
        tracing::warn!("comment notifier stopped abnormally: {error}");
    }
    result
}

async fn dispatch(
    service: &PreviewService,
    config: &PreviewConfig,
    mode: OperationMode,
) -> Result<(), PreviewError> {
    match mode {
        OperationMode::BuildCompleted => {
            let notification = BuildNotification {
                build_num: config.build_num.unwrap_or_default(),
                job: config.job.clone().unwrap_or_default(),
            };
            let outcome = match config.request_timeout() {
                Some(deadline) => {
                    service
                        .handle_build_completed_within(&notification, deadline)
                        .await?
                }
                None => service.handle_build_completed(&notification).await?,
            };
            tracing::info!(build_num = notification.build_num, ?outcome, "build handled");
        }
        OperationMode::PullRequestUpdated => {
            let notification = PrNotification {
                pr: config.pr.unwrap_or_default(),
                action: config.action.clone(),
            };
            let outcome = service.handle_pr_updated(&notification).await?;
            tracing::info!(pr = notification.pr, ?outcome, "pull request handled");
        }
        OperationMode::PublicPreviewQuery => {
            let pr = config.pr.unwrap_or_default();
            let allowed = service.can_have_public_preview(pr).await?;
            writeln!(io::stdout().lock(), "{allowed}").map_err(|error| PreviewError::Storage {
                operation: "writing the public preview answer".to_owned(),
                message: error.to_string(),
            })?;
        }
        OperationMode::Idle => {}
    }
    Ok(())
}

/// Loads configuration from CLI, environment, and files.
///
/// # Errors
///
/// Returns [`PreviewError::Configuration`] when ortho-config fails to parse
/// arguments or load configuration files.
fn load_config() -> Result<PreviewConfig, PreviewError> {
    PreviewConfig::load().map_err(|error| PreviewError::Configuration {
        message: error.to_string(),
    })
}
