//! Build info commands - create, publish and combine build info documents

use std::path::Path;

use conex_core::build_info::merge_modules;
use conex_core::{AssemblyOptions, BuildInfo, BuildInfoAssembler, BundleManifest, Graph};
use conex_repo::{BuildDeletion, BuildPromotion, ConnectionArgs};

use crate::error::{CliError, Result};
use crate::output;

/// Options of `build-info create`
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub with_dependencies: bool,
    pub add_cached_deps: bool,
    pub build_url: Option<String>,
    pub conan_version: Option<String>,
}

/// Describe what a Conan graph built and print the document
///
/// The server is only contacted for artifacts missing from the local cache,
/// anonymously when `--url` comes without credentials.
pub async fn create(
    graph_path: &Path,
    name: &str,
    number: &str,
    repository: &str,
    options: CreateOptions,
    connection: &ConnectionArgs,
) -> Result<()> {
    let graph = Graph::load(graph_path)?;
    let client = if connection.is_empty() {
        None
    } else {
        Some(super::connect_anonymous(connection)?)
    };

    let mut assembler = BuildInfoAssembler::new(
        &graph,
        name,
        number,
        repository,
        AssemblyOptions {
            with_dependencies: options.with_dependencies,
            add_cached_deps: options.add_cached_deps,
            build_url: options.build_url,
            agent_version: options.conan_version.unwrap_or_default(),
        },
    );
    if let Some(client) = &client {
        assembler = assembler.with_source(client);
    }

    let spinner = output::spinner("Collecting artifacts");
    let build_info = assembler.assemble().await;
    spinner.finish_and_clear();

    output::print_json(&build_info?)
}

/// Link the artifacts to the build, then publish the document
pub async fn upload(path: &Path, project: Option<&str>, connection: &ConnectionArgs) -> Result<()> {
    let build_info = BuildInfo::load(path)?;
    let client = super::connect(connection)?;

    let spinner = output::spinner("Setting build properties");
    let tagged = client.tag_build_artifacts(&build_info, &[]).await;
    spinner.finish_and_clear();
    tracing::debug!("Set build properties on {} artifacts", tagged?);

    client.put_build(&build_info, project).await?;
    output::success("Build info uploaded successfully.");
    Ok(())
}

pub async fn get(
    name: &str,
    number: &str,
    project: Option<&str>,
    connection: &ConnectionArgs,
) -> Result<()> {
    let client = super::connect(connection)?;
    let build = client.get_build(name, number, project).await?;
    output::print_json(&build)
}

/// Copy the build artifacts from one repository to another
#[allow(clippy::too_many_arguments)]
pub async fn promote(
    name: &str,
    number: &str,
    source: &str,
    target: &str,
    dependencies: bool,
    comment: Option<String>,
    project: Option<&str>,
    connection: &ConnectionArgs,
) -> Result<()> {
    let client = super::connect(connection)?;
    let promotion = BuildPromotion::new(source, target, dependencies, comment);
    let response = client.promote_build(name, number, &promotion, project).await?;
    println!("{}", response);
    Ok(())
}

pub async fn delete(
    name: &str,
    numbers: Vec<String>,
    delete_artifacts: bool,
    delete_all: bool,
    project: Option<&str>,
    connection: &ConnectionArgs,
) -> Result<()> {
    let client = super::connect(connection)?;
    let deletion = BuildDeletion::new(name, numbers, delete_artifacts, delete_all);
    let response = client.delete_builds(&deletion, project).await?;
    println!("{}", response);
    Ok(())
}

/// Split `name,number`
fn parse_build_spec(spec: &str) -> Result<(&str, &str)> {
    let mut parts = spec.splitn(3, ',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(number), None) if !name.is_empty() && !number.is_empty() => {
            Ok((name, number))
        }
        _ => Err(CliError::input(
            "Please, provide the build name and number to append in the format: --build-info=build_name,build_number",
        )),
    }
}

/// Print a new build info holding the modules of published builds
pub async fn append(
    name: &str,
    number: &str,
    builds: &[String],
    conan_version: Option<String>,
    project: Option<&str>,
    connection: &ConnectionArgs,
) -> Result<()> {
    let specs = builds
        .iter()
        .map(|b| parse_build_spec(b))
        .collect::<Result<Vec<_>>>()?;
    if specs.is_empty() {
        return Err(CliError::input(
            "Please, provide at least one build with the --build-info argument.",
        ));
    }

    let client = super::connect(connection)?;
    let mut published = Vec::with_capacity(specs.len());
    for (build_name, build_number) in specs {
        published.push(client.get_build_info(build_name, build_number, project).await?);
    }

    let mut build_info = BuildInfo::new(name, number, conan_version.unwrap_or_default())?;
    build_info.modules = merge_modules(published);
    output::print_json(&build_info)
}

/// Create a signed release bundle with every file of a build info
pub async fn create_bundle(
    path: &Path,
    repository: &str,
    bundle: &str,
    version: &str,
    sign_key: &str,
    connection: &ConnectionArgs,
) -> Result<()> {
    let build_info = BuildInfo::load(path)?;
    let manifest = BundleManifest::from_build_info(&build_info, repository, true)?;
    let client = super::connect(connection)?;
    let response = client
        .release_bundle(bundle, version, sign_key, &manifest)
        .await?;
    println!("{}", response);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build_spec() {
        assert_eq!(parse_build_spec("app,42").unwrap(), ("app", "42"));
        assert!(parse_build_spec("app").is_err());
        assert!(parse_build_spec(",42").is_err());
        assert!(parse_build_spec("app,").is_err());

        let err = parse_build_spec("app,4,2").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please, provide the build name and number to append in the format: --build-info=build_name,build_number"
        );
    }
}
