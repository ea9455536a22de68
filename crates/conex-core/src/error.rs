//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("JSON does not contain graph information")]
    MissingGraph,

    #[error("Node {id} is required but not present in the graph")]
    UnknownNode { id: String },

    #[error("Invalid build info: {message}")]
    InvalidBuildInfo { message: String },

    #[error(
        "Missing information in the Conan local cache, please provide the --url and --repository arguments to retrieve the information from Artifactory."
    )]
    MissingChecksumSource,

    #[error(
        "There are no artifacts for the {reference} {kind}. Probably the package was not uploaded before creating the Build Info. Please upload the package to the server and try again."
    )]
    NoArtifacts { reference: String, kind: String },

    #[error("Invalid package list: {message}")]
    InvalidPackageList { message: String },

    #[error("Invalid property '{property}': expected key=value")]
    InvalidProperty { property: String },

    #[error("Time format does not match BuildInfo required format: {value}")]
    InvalidTimestamp { value: String },

    #[error("lipo failed: {message}")]
    Lipo { message: String },

    #[error("The input path is not valid.")]
    InvalidInputPath { path: String },

    #[error("Checksum lookup failed: {message}")]
    ChecksumLookup { message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
