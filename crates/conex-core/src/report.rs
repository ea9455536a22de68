//! Build reports stored in a generic repository
//!
//! Reports live at `<pr>/<build>/<id>/report.json`; log and profile files are
//! uploaded next to them and the report keeps their repository paths.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the report document in each report folder
pub const REPORT_FILE: &str = "report.json";

/// Name of the aggregated document in each build folder
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    #[serde(default)]
    pub build_status: Option<String>,
    #[serde(default)]
    pub build_log: Option<String>,
    #[serde(default)]
    pub build_profile_build: Option<String>,
    #[serde(default)]
    pub build_profile_host: Option<String>,
    #[serde(default)]
    pub test_status: Option<String>,
    #[serde(default)]
    pub test_log: Option<String>,
    #[serde(default)]
    pub test_profile_build: Option<String>,
    #[serde(default)]
    pub test_profile_host: Option<String>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// Values given on the command line for one report
#[derive(Debug, Clone, Default)]
pub struct ReportUpdate {
    pub build_status: Option<String>,
    pub build_log: Option<PathBuf>,
    pub build_profile_build: Option<PathBuf>,
    pub build_profile_host: Option<PathBuf>,
    pub test_status: Option<String>,
    pub test_log: Option<PathBuf>,
    pub test_profile_build: Option<PathBuf>,
    pub test_profile_host: Option<PathBuf>,
}

/// A local file to upload to `remote_path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    pub local: PathBuf,
    pub remote_path: String,
}

/// `<pr>/<build>/<id>`
pub fn report_base_path(pull_request: &str, build: &str, id: &str) -> String {
    format!("{}/{}/{}", pull_request, build, id)
}

fn file_slot(base_path: &str, slot: &mut Option<String>, local: Option<&Path>, files: &mut Vec<ReportFile>) {
    let Some(local) = local else { return };
    let Some(name) = local.file_name() else { return };
    let remote_path = format!("{}/{}", base_path, name.to_string_lossy());
    *slot = Some(remote_path.clone());
    files.push(ReportFile {
        local: local.to_path_buf(),
        remote_path,
    });
}

impl BuildReport {
    /// Merge `update` into the report
    ///
    /// Status values are stored as given. File values become
    /// `<base_path>/<file name>` and are returned for upload.
    pub fn apply(&mut self, base_path: &str, update: &ReportUpdate) -> Vec<ReportFile> {
        if let Some(status) = update.build_status.as_ref().filter(|s| !s.is_empty()) {
            self.build_status = Some(status.clone());
        }
        if let Some(status) = update.test_status.as_ref().filter(|s| !s.is_empty()) {
            self.test_status = Some(status.clone());
        }

        let mut files = Vec::new();
        file_slot(base_path, &mut self.build_log, update.build_log.as_deref(), &mut files);
        file_slot(
            base_path,
            &mut self.build_profile_build,
            update.build_profile_build.as_deref(),
            &mut files,
        );
        file_slot(
            base_path,
            &mut self.build_profile_host,
            update.build_profile_host.as_deref(),
            &mut files,
        );
        file_slot(base_path, &mut self.test_log, update.test_log.as_deref(), &mut files);
        file_slot(
            base_path,
            &mut self.test_profile_build,
            update.test_profile_build.as_deref(),
            &mut files,
        );
        file_slot(
            base_path,
            &mut self.test_profile_host,
            update.test_profile_host.as_deref(),
            &mut files,
        );
        files
    }
}
