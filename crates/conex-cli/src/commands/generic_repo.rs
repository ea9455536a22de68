//! Generic repository commands - plain files in Artifactory

use std::path::Path;

use conex_repo::ConnectionArgs;

use crate::error::{CliError, Result};
use crate::output;

/// Upload `file` into the `upload_path` folder, keeping its name
pub async fn upload(
    repository: &str,
    file: &Path,
    upload_path: &str,
    connection: &ConnectionArgs,
) -> Result<()> {
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CliError::input(format!("{} is not a file", file.display())))?;
    let content = std::fs::read(file)?;
    let target = format!("{}/{}", upload_path.trim_matches('/'), file_name);

    let client = super::connect(connection)?;
    let response = client.upload(repository, &target, content).await?;
    println!("{}", response);
    Ok(())
}

pub async fn read(repository: &str, file: &str, connection: &ConnectionArgs) -> Result<()> {
    let client = super::connect(connection)?;
    println!("{}", client.read(repository, file).await?);
    Ok(())
}

/// Print the names of the folders below `path`
pub async fn list(repository: &str, path: &str, connection: &ConnectionArgs) -> Result<()> {
    let client = super::connect(connection)?;
    let folders = client.list_folders(repository, path).await?;
    output::print_json(&folders)
}
