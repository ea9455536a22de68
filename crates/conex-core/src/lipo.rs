//! Universal (multi-architecture) Apple binaries
//!
//! A Conan `full_deploy` lays packages out as
//! `<root>/<name>/<version>/<build_type>/<arch>`. Merging grafts every arch
//! folder into its build-type folder and combines Mach-O files found in more
//! than one arch with `lipo`.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

use walkdir::WalkDir;

use crate::error::{CoreError, Result};

/// Arch folder names Conan can produce
pub const VALID_ARCHS: &[&str] = &[
    "x86", "x86_64", "armv7", "armv8", "armv8_32", "armv8.3", "armv7s", "armv7k",
];

const BINARY_EXTENSIONS: &[&str] = &["a", "dylib"];
const TEXT_EXTENSIONS: &[&str] = &[
    "h", "hpp", "hxx", "c", "cc", "cxx", "cpp", "m", "mm", "txt", "md", "html", "jpg", "png",
];

const MACHO_MAGIC: [u8; 4] = [0xcf, 0xfa, 0xed, 0xfe];
const FAT_MAGIC: [u8; 4] = [0xca, 0xfe, 0xba, 0xbe];
const AR_MAGIC: &[u8; 8] = b"!<arch>\n";

/// Runs the `lipo` tool
pub trait LipoRunner {
    /// `lipo -output <output> -create <inputs...>`
    fn create(&self, output: &Path, inputs: &[PathBuf]) -> Result<()>;

    /// `lipo -info <file>`
    fn info(&self, file: &Path) -> Result<String>;
}

/// Spawns the `lipo` found on `PATH`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLipo;

impl SystemLipo {
    fn run(command: &mut Command) -> Result<String> {
        let output = command.output().map_err(|e| CoreError::Lipo {
            message: format!("unable to run lipo: {}", e),
        })?;
        if !output.status.success() {
            return Err(CoreError::Lipo {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl LipoRunner for SystemLipo {
    fn create(&self, output: &Path, inputs: &[PathBuf]) -> Result<()> {
        Self::run(
            Command::new("lipo")
                .arg("-output")
                .arg(output)
                .arg("-create")
                .args(inputs),
        )
        .map(|_| ())
    }

    fn info(&self, file: &Path) -> Result<String> {
        Self::run(Command::new("lipo").arg("-info").arg(file))
    }
}

/// Whether `path` looks like a Mach-O binary or a static archive
///
/// The extension decides for common cases; anything else is sniffed.
pub fn is_macho_binary(path: &Path) -> Result<bool> {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if BINARY_EXTENSIONS.contains(&ext) {
            return Ok(true);
        }
        if TEXT_EXTENSIONS.contains(&ext) {
            return Ok(false);
        }
    }

    let mut header = Vec::with_capacity(AR_MAGIC.len());
    File::open(path)?
        .take(AR_MAGIC.len() as u64)
        .read_to_end(&mut header)?;

    Ok(header.starts_with(&MACHO_MAGIC)
        || header.starts_with(&FAT_MAGIC)
        || header.as_slice() == AR_MAGIC)
}

/// Graft every folder of `arch_folders` into `dst`
///
/// Existing files and symlinks in `dst` are never overwritten, except for
/// binaries merged by `lipo`.
pub fn merge_architectures(
    dst: &Path,
    arch_folders: &[PathBuf],
    runner: &dyn LipoRunner,
) -> Result<()> {
    fs::create_dir_all(dst)?;
    let mut merged: HashSet<PathBuf> = HashSet::new();

    for top in arch_folders {
        for entry in WalkDir::new(top).min_depth(1).follow_links(false) {
            let entry = entry?;
            let Ok(relative) = entry.path().strip_prefix(top) else {
                continue;
            };
            let target = dst.join(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                fs::create_dir_all(&target)?;
            } else if file_type.is_symlink() {
                if fs::symlink_metadata(&target).is_ok() {
                    continue;
                }
                let link = fs::read_link(entry.path())?;
                make_symlink(&link, &target)?;
            } else if file_type.is_file() {
                if merged.contains(relative) {
                    continue;
                }
                if is_macho_binary(entry.path())? {
                    let inputs: Vec<PathBuf> = arch_folders
                        .iter()
                        .map(|arch| arch.join(relative))
                        .filter(|p| p.is_file())
                        .collect();
                    if inputs.len() > 1 {
                        tracing::debug!("lipo {} from {} archs", target.display(), inputs.len());
                        runner.create(&target, &inputs)?;
                        merged.insert(relative.to_path_buf());
                        continue;
                    }
                }
                if !target.exists() {
                    fs::copy(entry.path(), &target)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
fn make_symlink(link: &Path, target: &Path) -> Result<()> {
    std::os::unix::fs::symlink(link, target)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_symlink(link: &Path, target: &Path) -> Result<()> {
    let source = target.parent().map(|p| p.join(link)).unwrap_or_else(|| link.to_path_buf());
    fs::copy(source, target)?;
    Ok(())
}

/// Filters for [`deploy_layout`]; empty means everything
#[derive(Debug, Clone, Default)]
pub struct LayoutFilters {
    pub names: Vec<String>,
    pub build_types: Vec<String>,
    pub archs: Vec<String>,
}

fn accepts(filter: &[String], value: &str) -> bool {
    filter.is_empty() || filter.iter().any(|f| f == value)
}

/// One build-type folder and the arch folders to merge into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeTarget {
    pub folder: PathBuf,
    pub archs: Vec<PathBuf>,
}

fn sorted_dirs(path: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Find the build-type folders of a `full_deploy` tree
pub fn deploy_layout(root: &Path, filters: &LayoutFilters) -> Result<Vec<MergeTarget>> {
    if !root.is_dir() {
        tracing::error!("Not a directory: {}", root.display());
        return Err(CoreError::InvalidInputPath {
            path: root.display().to_string(),
        });
    }

    let mut targets = Vec::new();
    for (name, package_dir) in sorted_dirs(root)? {
        if !accepts(&filters.names, &name) {
            continue;
        }
        for (_, version_dir) in sorted_dirs(&package_dir)? {
            for (build_type, build_dir) in sorted_dirs(&version_dir)? {
                if !accepts(&filters.build_types, &build_type) {
                    continue;
                }
                let archs: Vec<PathBuf> = sorted_dirs(&build_dir)?
                    .into_iter()
                    .filter(|(arch, _)| {
                        VALID_ARCHS.contains(&arch.as_str()) && accepts(&filters.archs, arch)
                    })
                    .map(|(_, path)| path)
                    .collect();
                if !archs.is_empty() {
                    targets.push(MergeTarget {
                        folder: build_dir,
                        archs,
                    });
                }
            }
        }
    }
    Ok(targets)
}
