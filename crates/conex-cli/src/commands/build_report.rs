//! Build report commands - per-configuration reports of a CI build
//!
//! Reports are kept in a generic repository under
//! `<pr>/<build>/<id>/report.json` with their logs and profiles next to them.

use conex_core::json::to_string_pretty4;
use conex_core::report::{REPORT_FILE, SUMMARY_FILE, report_base_path};
use conex_core::{BuildReport, ReportUpdate};
use conex_repo::{ArtifactoryClient, ConnectionArgs};
use futures::future::try_join_all;
use serde_json::Value;

use crate::error::Result;
use crate::output;

async fn current_report(
    client: &ArtifactoryClient,
    repository: &str,
    report_path: &str,
) -> Result<BuildReport> {
    match client.read(repository, report_path).await {
        Ok(content) => Ok(serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable report {}: {}", report_path, e);
            BuildReport::default()
        })),
        Err(e) if e.is_not_found() => Ok(BuildReport::default()),
        Err(e) => Err(e.into()),
    }
}

/// Create or update one report and upload the files it points to
pub async fn add(
    pull_request: &str,
    build: &str,
    id: &str,
    repository: &str,
    update: ReportUpdate,
    connection: &ConnectionArgs,
) -> Result<()> {
    let base_path = report_base_path(pull_request, build, id);
    let report_path = format!("{}/{}", base_path, REPORT_FILE);
    let client = super::connect(connection)?;

    let mut report = current_report(&client, repository, &report_path).await?;
    let files = report.apply(&base_path, &update);

    for file in &files {
        let content = std::fs::read(&file.local)?;
        client.upload(repository, &file.remote_path, content).await?;
        tracing::debug!("Uploaded {} to {}", file.local.display(), file.remote_path);
    }

    let document = to_string_pretty4(&report)?;
    client
        .upload(repository, &report_path, document.into_bytes())
        .await?;
    output::success(format!("Report uploaded to {}/{}", repository, report_path));
    Ok(())
}

/// Gather every report of a build into `summary.json`
pub async fn summary(
    pull_request: &str,
    build: &str,
    repository: &str,
    connection: &ConnectionArgs,
) -> Result<()> {
    let build_path = format!("{}/{}", pull_request, build);
    let client = super::connect(connection)?;

    let spinner = output::spinner(format!("Reading reports of {}", build_path));
    let folders = client.list_folders(repository, &build_path).await?;
    let client = &client;
    let reads = folders.iter().map(|folder| {
        let path = format!("{}/{}/{}", build_path, folder, REPORT_FILE);
        async move { client.read(repository, &path).await }
    });
    let contents = try_join_all(reads).await;
    spinner.finish_and_clear();

    let reports = contents?
        .iter()
        .map(|content| serde_json::from_str::<Value>(content))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let summary_path = format!("{}/{}", build_path, SUMMARY_FILE);
    client
        .upload(repository, &summary_path, to_string_pretty4(&reports)?.into_bytes())
        .await?;
    output::print_json(&reports)?;
    output::success(format!(
        "Summary of {} reports uploaded to {}/{}",
        reports.len(),
        repository,
        summary_path
    ));
    Ok(())
}
