//! Lipo commands - universal binaries out of a Conan full deploy

use std::path::{Path, PathBuf};

use conex_core::lipo::{LayoutFilters, LipoRunner, SystemLipo, deploy_layout, merge_architectures};

use crate::error::Result;
use crate::output;

/// Merge the arch folders of every `<name>/<version>/<build_type>` folder
pub fn create(input: &Path, filters: LayoutFilters, keep_arch_folders: bool) -> Result<()> {
    let targets = deploy_layout(input, &filters)?;
    if targets.is_empty() {
        output::warning(format!("No architecture folders found in {}", input.display()));
        return Ok(());
    }

    for target in &targets {
        let archs: Vec<String> = target
            .archs
            .iter()
            .filter_map(|a| a.file_name())
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        output::info(format!(
            "Merging {} into {}",
            archs.join(", "),
            target.folder.display()
        ));
        merge_architectures(&target.folder, &target.archs, &SystemLipo)?;
        if !keep_arch_folders {
            remove_folders(&target.archs)?;
        }
    }

    output::success(format!("Created universal binaries in {} folders", targets.len()));
    Ok(())
}

fn remove_folders(folders: &[PathBuf]) -> Result<()> {
    for folder in folders {
        std::fs::remove_dir_all(folder)?;
    }
    Ok(())
}

/// Print the architectures of each file
pub fn info(files: &[PathBuf]) -> Result<()> {
    for file in files {
        println!("{}", SystemLipo.info(file)?);
    }
    Ok(())
}
