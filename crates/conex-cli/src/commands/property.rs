//! Property commands - tag artifacts in Artifactory

use std::path::Path;

use conex_core::properties::parse_properties;
use conex_core::{AnyReference, BuildInfo};
use conex_repo::ConnectionArgs;

use crate::error::{CliError, Result};
use crate::output;

fn required_properties(properties: &[String]) -> Result<Vec<(String, String)>> {
    if properties.is_empty() {
        return Err(CliError::input(
            "Please, add at least one property with the --property argument.",
        ));
    }
    Ok(parse_properties(properties)?)
}

/// Append properties to everything below a reference
pub async fn add(
    repository: &str,
    reference: &str,
    properties: &[String],
    connection: &ConnectionArgs,
) -> Result<()> {
    let properties = required_properties(properties)?;
    let root = AnyReference::parse(reference)?.storage_path();
    let client = super::connect(connection)?;

    let spinner = output::spinner(format!("Updating properties of {}", reference));
    let updated = client
        .append_properties_recursive(repository, &root, &properties)
        .await;
    spinner.finish_and_clear();

    output::success(format!("Properties added to {} items under {}", updated?, reference));
    Ok(())
}

/// Replace properties of a reference, recursively by default
pub async fn set(
    repository: &str,
    reference: &str,
    properties: &[String],
    recursive: bool,
    connection: &ConnectionArgs,
) -> Result<()> {
    let properties = required_properties(properties)?;
    let root = AnyReference::parse(reference)?.storage_path();
    let client = super::connect(connection)?;
    client
        .set_properties(repository, &root, &properties, recursive)
        .await?;
    output::success(format!("Properties set for {}", reference));
    Ok(())
}

/// Add `build.name`, `build.number` and any extra property to the artifacts
/// of a build info
pub async fn build_info_add(
    path: &Path,
    properties: &[String],
    connection: &ConnectionArgs,
) -> Result<()> {
    let build_info = BuildInfo::load(path)?;
    let extra = parse_properties(properties)?;
    let client = super::connect(connection)?;
    let tagged = client.tag_build_artifacts(&build_info, &extra).await?;
    output::success(format!(
        "Properties added to {} artifacts of build {}/{}",
        tagged, build_info.name, build_info.number
    ));
    Ok(())
}
