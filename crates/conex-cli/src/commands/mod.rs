//! CLI command implementations

pub mod build_info;
pub mod build_report;
pub mod generic_repo;
pub mod lipo;
pub mod profile;
pub mod promote;
pub mod property;
pub mod sbom;
pub mod statuspage;

use clap::ValueEnum;
use conex_repo::{ArtifactoryClient, ConnectionArgs};

use crate::error::Result;

/// Rendering of command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Client for the Artifactory selected by `--server` or `--url`
pub(crate) fn connect(connection: &ConnectionArgs) -> Result<ArtifactoryClient> {
    let connection = connection.resolve()?;
    tracing::debug!("Using Artifactory at {}", connection.url);
    Ok(ArtifactoryClient::new(&connection)?)
}

/// Like [`connect`], but a bare `--url` reads without credentials
pub(crate) fn connect_anonymous(connection: &ConnectionArgs) -> Result<ArtifactoryClient> {
    let connection = connection.resolve_anonymous()?;
    if connection.credentials.is_none() {
        tracing::debug!("Reading from Artifactory at {} anonymously", connection.url);
    }
    Ok(ArtifactoryClient::new(&connection)?)
}
