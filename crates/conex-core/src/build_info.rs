//! JFrog Build Info documents
//!
//! Only the fields this tool produces or reads are typed; anything else a
//! server sends back is kept in `extra` so documents survive a round trip.

use std::path::Path;

use chrono::Local;
use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::hashes::Checksums;
use crate::reference::{PackageReference, RecipeReference};

/// Build Info schema version written in the header
pub const BUILD_INFO_VERSION: &str = "1.0.1";

/// Module type of every Conan module
pub const MODULE_TYPE: &str = "conan";

/// `started` format required by the build-info schema
static STARTED_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}(Z|[+-]\d{4})$")
        .expect("unable to compile started time regex")
});

/// Current local time as `YYYY-MM-DDTHH:MM:SS.mmm+HHMM`
pub fn formatted_now() -> Result<String> {
    let value = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string();
    validate_started(&value)?;
    Ok(value)
}

pub fn validate_started(value: &str) -> Result<()> {
    if STARTED_FORMAT.is_match(value) {
        Ok(())
    } else {
        Err(CoreError::InvalidTimestamp {
            value: value.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildAgent {
    pub name: String,
    pub version: String,
}

/// A build-info document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version: String,
    pub name: String,
    pub number: String,
    #[serde(default = "empty_object")]
    pub agent: Value,
    pub started: String,
    #[serde(rename = "buildAgent", default)]
    pub build_agent: BuildAgent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl BuildInfo {
    /// A header with no modules, started now
    pub fn new(
        name: impl Into<String>,
        number: impl Into<String>,
        agent_version: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            version: BUILD_INFO_VERSION.to_string(),
            name: name.into(),
            number: number.into(),
            agent: empty_object(),
            started: formatted_now()?,
            build_agent: BuildAgent {
                name: "conan".to_string(),
                version: agent_version.into(),
            },
            url: None,
            modules: Vec::new(),
            extra: IndexMap::new(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Paths of every artifact owned by a module (dependencies excluded)
    pub fn artifact_paths(&self) -> impl Iterator<Item = &str> {
        self.modules
            .iter()
            .flat_map(|m| m.artifacts.iter())
            .filter_map(|a| a.path.as_deref())
    }

    /// Append a module unless one with the same id is already present
    ///
    /// Returns whether the module was added.
    pub fn push_module(&mut self, module: Module) -> bool {
        if self.modules.iter().any(|m| m.id == module.id) {
            return false;
        }
        self.modules.push(module);
        true
    }
}

/// A recipe or package module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    #[serde(rename = "type", default = "default_module_type")]
    pub module_type: String,
    pub id: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<Artifact>>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

fn default_module_type() -> String {
    MODULE_TYPE.to_string()
}

impl Module {
    pub fn new(id: impl Into<String>, artifacts: Vec<Artifact>) -> Self {
        Self {
            module_type: default_module_type(),
            id: id.into(),
            artifacts,
            dependencies: None,
            extra: IndexMap::new(),
        }
    }
}

/// One file of a module or of a dependency
///
/// Module-owned artifacts carry `name` and `path`; dependency artifacts carry
/// `id` (`<module id> :: <file>`) and `requestedBy` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type", default)]
    pub artifact_type: String,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "requestedBy", default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<Vec<Vec<String>>>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Artifact {
    fn with_checksums(file_name: &str, checksums: &Checksums) -> Self {
        Self {
            artifact_type: file_type(file_name),
            sha256: Some(checksums.sha256.clone()),
            sha1: Some(checksums.sha1.clone()),
            md5: Some(checksums.md5.clone()),
            name: None,
            path: None,
            id: None,
            requested_by: None,
            extra: IndexMap::new(),
        }
    }

    /// An artifact owned by the module being described
    pub fn owned(file_name: &str, path: impl Into<String>, checksums: &Checksums) -> Self {
        Self {
            name: Some(file_name.to_string()),
            path: Some(path.into()),
            ..Self::with_checksums(file_name, checksums)
        }
    }

    /// An artifact of a dependency, identified by `<module id> :: <file>`
    pub fn dependency(module_id: &str, file_name: &str, checksums: &Checksums) -> Self {
        Self {
            id: Some(format!("{} :: {}", module_id, file_name)),
            ..Self::with_checksums(file_name, checksums)
        }
    }
}

/// Extension of a file name without the dot, empty when there is none
pub fn file_type(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Modules of several builds, skipping ids seen in an earlier build
///
/// Builds commonly share recipe modules; the first occurrence wins.
pub fn merge_modules<I>(builds: I) -> Vec<Module>
where
    I: IntoIterator<Item = BuildInfo>,
{
    let mut seen = IndexSet::new();
    let mut merged = Vec::new();
    for build in builds {
        for module in build.modules {
            if seen.insert(module.id.clone()) {
                merged.push(module);
            }
        }
    }
    merged
}

/// Release bundle file spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub files: Vec<BundleFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleFile {
    pub path: String,
    pub checksum: Option<String>,
}

impl BundleManifest {
    /// Files for a release bundle: every module artifact, optionally followed
    /// by the dependency artifacts located in `repository`
    ///
    /// Dependency paths are rebuilt from the artifact id, and a path already
    /// listed is not repeated.
    pub fn from_build_info(
        build_info: &BuildInfo,
        repository: &str,
        with_dependencies: bool,
    ) -> Result<Self> {
        let mut manifest = Self::default();

        for module in &build_info.modules {
            for artifact in &module.artifacts {
                let path = artifact.path.clone().ok_or_else(|| CoreError::InvalidBuildInfo {
                    message: format!("artifact of module {} has no path", module.id),
                })?;
                manifest.files.push(BundleFile {
                    path,
                    checksum: artifact.sha256.clone(),
                });
            }

            if !with_dependencies {
                continue;
            }
            for dependency in module.dependencies.iter().flatten() {
                let path = dependency_path(dependency, repository)?;
                if !manifest.files.iter().any(|f| f.path == path) {
                    manifest.files.push(BundleFile {
                        path,
                        checksum: dependency.sha256.clone(),
                    });
                }
            }
        }

        Ok(manifest)
    }
}

/// `<repository>/<remote path>/<file>` for a dependency artifact id
fn dependency_path(artifact: &Artifact, repository: &str) -> Result<String> {
    let id = artifact.id.as_deref().ok_or_else(|| CoreError::InvalidBuildInfo {
        message: "dependency artifact has no id".to_string(),
    })?;
    let (reference, file_name) = id.split_once("::").ok_or_else(|| CoreError::InvalidBuildInfo {
        message: format!("dependency id '{}' is not '<reference> :: <file>'", id),
    })?;
    let reference = reference.trim();

    let folder = if reference.contains(':') {
        PackageReference::parse(reference)?.package_path()?
    } else {
        RecipeReference::parse(reference)?.export_path()?
    };
    Ok(format!("{}/{}/{}", repository, folder, file_name.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sums(tag: &str) -> Checksums {
        Checksums {
            sha256: format!("{tag}-256"),
            sha1: format!("{tag}-1"),
            md5: format!("{tag}-5"),
        }
    }

    #[test]
    fn test_formatted_now_matches_schema() {
        let now = formatted_now().unwrap();
        assert!(STARTED_FORMAT.is_match(&now), "{now}");
    }

    #[test]
    fn test_validate_started() {
        assert!(validate_started("2024-01-02T03:04:05.678+0100").is_ok());
        assert!(validate_started("2024-01-02T03:04:05.678Z").is_ok());
        assert!(validate_started("2024-01-02T03:04:05+0100").is_err());
        assert!(validate_started("2024-01-02 03:04:05.678+01:00").is_err());
    }

    #[test]
    fn test_header_serialization() {
        let mut bi = BuildInfo::new("mybuild", "42", "2.0.17").unwrap();
        bi.started = "2024-01-02T03:04:05.678+0000".to_string();
        let value = serde_json::to_value(&bi).unwrap();
        assert_eq!(value["version"], "1.0.1");
        assert_eq!(value["agent"], serde_json::json!({}));
        assert_eq!(value["buildAgent"]["name"], "conan");
        assert_eq!(value["buildAgent"]["version"], "2.0.17");
        assert!(value.get("url").is_none());
        assert_eq!(value["modules"], serde_json::json!([]));
    }

    #[test]
    fn test_artifact_shapes() {
        let owned = Artifact::owned("conan_package.tgz", "repo/x/conan_package.tgz", &sums("a"));
        let value = serde_json::to_value(&owned).unwrap();
        assert_eq!(value["type"], "tgz");
        assert_eq!(value["name"], "conan_package.tgz");
        assert!(value.get("id").is_none());
        assert!(value.get("requestedBy").is_none());

        let dep = Artifact::dependency("liba/1.0#r", "conanfile.py", &sums("b"));
        let value = serde_json::to_value(&dep).unwrap();
        assert_eq!(value["type"], "py");
        assert_eq!(value["id"], "liba/1.0#r :: conanfile.py");
        assert!(value.get("path").is_none());
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let json = r#"{"version":"1.0.1","name":"n","number":"1","started":"s",
            "agent":{"name":"x"},"properties":{"k":"v"},
            "modules":[{"id":"m","type":"conan","artifacts":[],"repository":"r"}]}"#;
        let bi = BuildInfo::from_json(json).unwrap();
        let value = serde_json::to_value(&bi).unwrap();
        assert_eq!(value["properties"]["k"], "v");
        assert_eq!(value["modules"][0]["repository"], "r");
    }

    #[test]
    fn test_missing_agent_is_an_empty_object() {
        let json = r#"{"version":"1.0.1","name":"n","number":"1","started":"s","modules":[]}"#;
        let bi = BuildInfo::from_json(json).unwrap();
        assert_eq!(bi.agent, serde_json::json!({}));
        let value = serde_json::to_value(&bi).unwrap();
        assert_eq!(value["agent"], serde_json::json!({}));
    }

    #[test]
    fn test_merge_modules_keeps_first() {
        let mut a = BuildInfo::new("a", "1", "2").unwrap();
        a.modules = vec![Module::new("shared", vec![]), Module::new("a-only", vec![])];
        let mut b = BuildInfo::new("b", "1", "2").unwrap();
        let mut shared = Module::new("shared", vec![]);
        shared.module_type = "other".to_string();
        b.modules = vec![shared, Module::new("b-only", vec![])];

        let merged = merge_modules(vec![a, b]);
        let ids: Vec<_> = merged.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["shared", "a-only", "b-only"]);
        assert_eq!(merged[0].module_type, "conan");
    }

    #[test]
    fn test_push_module_rejects_duplicates() {
        let mut bi = BuildInfo::new("a", "1", "2").unwrap();
        assert!(bi.push_module(Module::new("m", vec![])));
        assert!(!bi.push_module(Module::new("m", vec![])));
        assert_eq!(bi.modules.len(), 1);
    }

    #[test]
    fn test_bundle_manifest() {
        let mut bi = BuildInfo::new("a", "1", "2").unwrap();
        let mut module = Module::new(
            "app/1.0#r1",
            vec![Artifact::owned("conanfile.py", "repo/_/app/1.0/_/r1/export/conanfile.py", &sums("app"))],
        );
        module.dependencies = Some(vec![
            Artifact::dependency("liba/1.0#r5", "conanfile.py", &sums("liba")),
            Artifact::dependency("liba/1.0#r5:p5#v5", "conan_package.tgz", &sums("pkg")),
            Artifact::dependency("liba/1.0#r5", "conanfile.py", &sums("liba")),
        ]);
        bi.modules.push(module);

        let manifest = BundleManifest::from_build_info(&bi, "repo", true).unwrap();
        let paths: Vec<_> = manifest.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "repo/_/app/1.0/_/r1/export/conanfile.py",
                "repo/_/liba/1.0/_/r5/export/conanfile.py",
                "repo/_/liba/1.0/_/r5/package/p5/v5/conan_package.tgz",
            ]
        );
        assert_eq!(manifest.files[2].checksum.as_deref(), Some("pkg-256"));

        let manifest = BundleManifest::from_build_info(&bi, "repo", false).unwrap();
        assert_eq!(manifest.files.len(), 1);
    }
}
