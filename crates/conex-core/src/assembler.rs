//! Build-info assembly from a Conan graph
//!
//! Every node Conan built becomes a recipe module and, when the binary is
//! known, a package module. Artifact checksums come from the download folder
//! of the local cache when it is populated, otherwise from a
//! [`ChecksumSource`] (an Artifactory instance in practice).

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::build_info::{Artifact, BuildInfo, Module};
use crate::error::{CoreError, Result};
use crate::graph::{ArtifactKind, BinaryStatus, Graph, Node, NodeId, unique_requires};
use crate::hashes::Checksums;

/// Files Conan uploads for a recipe revision
pub const RECIPE_FILES: &[&str] = &[
    "conan_sources.tgz",
    "conan_export.tgz",
    "conanfile.py",
    "conanmanifest.txt",
];

/// Files Conan uploads for a package revision
pub const PACKAGE_FILES: &[&str] = &["conan_package.tgz", "conaninfo.txt", "conanmanifest.txt"];

/// A download folder with fewer entries than this was never fully populated
const MIN_DOWNLOAD_ENTRIES: usize = 3;

/// Remote lookup of artifact checksums
#[async_trait]
pub trait ChecksumSource: Send + Sync {
    /// Checksums of a file given as `<repository>/<path>`, `None` when absent
    async fn checksums(&self, path: &str) -> Result<Option<Checksums>>;
}

/// Knobs of one assembly
#[derive(Debug, Clone, Default)]
pub struct AssemblyOptions {
    /// Attach the artifacts of transitive requirements to each module
    pub with_dependencies: bool,
    /// Also describe nodes whose binary came from the cache
    pub add_cached_deps: bool,
    /// CI job url recorded in the document
    pub build_url: Option<String>,
    /// Version reported in `buildAgent`
    pub agent_version: String,
}

/// Builds one build-info document out of a graph
pub struct BuildInfoAssembler<'a> {
    graph: &'a Graph,
    name: String,
    number: String,
    repository: String,
    options: AssemblyOptions,
    source: Option<&'a dyn ChecksumSource>,
    remote_cache: HashMap<String, Option<Checksums>>,
    root_paths: Option<Vec<Vec<NodeId>>>,
}

impl<'a> BuildInfoAssembler<'a> {
    pub fn new(
        graph: &'a Graph,
        name: impl Into<String>,
        number: impl Into<String>,
        repository: impl Into<String>,
        options: AssemblyOptions,
    ) -> Self {
        Self {
            graph,
            name: name.into(),
            number: number.into(),
            repository: repository.into(),
            options,
            source: None,
            remote_cache: HashMap::new(),
            root_paths: None,
        }
    }

    /// Use `source` for artifacts missing from the local cache
    pub fn with_source(mut self, source: &'a dyn ChecksumSource) -> Self {
        self.source = Some(source);
        self
    }

    pub async fn assemble(mut self) -> Result<BuildInfo> {
        let mut build_info = BuildInfo::new(
            self.name.clone(),
            self.number.clone(),
            self.options.agent_version.clone(),
        )?;
        build_info.url = self.options.build_url.clone();

        for module in self.modules().await? {
            if !build_info.push_module(module) {
                debug!("Duplicate module skipped");
            }
        }
        Ok(build_info)
    }

    fn describes(&self, node: &Node) -> bool {
        node.is_package()
            && match node.binary {
                BinaryStatus::Build => true,
                BinaryStatus::Cache => self.options.add_cached_deps,
                _ => false,
            }
    }

    async fn modules(&mut self) -> Result<Vec<Module>> {
        let graph = self.graph;
        let mut modules = Vec::new();

        for node in graph.nodes() {
            if !self.describes(node) {
                continue;
            }
            debug!("Describing {}", node.ref_str());

            let requires = if self.options.with_dependencies {
                unique_requires(&graph.transitive_requires(&node.id, false, false))
            } else {
                Vec::new()
            };

            let mut recipe = Module::new(
                node.module_id(ArtifactKind::Recipe),
                self.artifacts(node, ArtifactKind::Recipe, false).await?,
            );
            if self.options.with_dependencies {
                recipe.dependencies = Some(self.dependencies(&requires, ArtifactKind::Recipe).await?);
            }
            modules.push(recipe);

            if node.package_id.is_some() && node.prev.is_some() {
                let mut package = Module::new(
                    node.module_id(ArtifactKind::Package),
                    self.artifacts(node, ArtifactKind::Package, false).await?,
                );
                if self.options.with_dependencies {
                    package.dependencies =
                        Some(self.dependencies(&requires, ArtifactKind::Package).await?);
                }
                modules.push(package);
            }
        }

        Ok(modules)
    }

    async fn dependencies(&mut self, requires: &[NodeId], kind: ArtifactKind) -> Result<Vec<Artifact>> {
        let graph = self.graph;
        let mut all = Vec::new();
        for id in requires {
            let node = graph.node(id).ok_or_else(|| CoreError::UnknownNode { id: id.to_string() })?;
            all.extend(self.artifacts(node, kind, true).await?);
        }
        Ok(all)
    }

    async fn artifacts(
        &mut self,
        node: &Node,
        kind: ArtifactKind,
        as_dependency: bool,
    ) -> Result<Vec<Artifact>> {
        if as_dependency && kind == ArtifactKind::Package && node.binary == BinaryStatus::Skip {
            warn!("Package marked as 'Skip' for {}", node.ref_str());
            return Ok(Vec::new());
        }

        let remote_path = node.remote_path(kind)?;
        let module_id = node.module_id(kind);

        let mut files = local_checksums(node, kind)?;
        if files.is_empty() {
            files = self.remote_checksums(&remote_path, kind).await?;
        }
        if files.is_empty() {
            return Err(CoreError::NoArtifacts {
                reference: node.ref_str().to_string(),
                kind: kind.to_string(),
            });
        }

        let requested_by = if as_dependency {
            Some(self.requested_by(&node.id, kind))
        } else {
            None
        };

        Ok(files
            .into_iter()
            .map(|(file_name, sums)| {
                if as_dependency {
                    let mut artifact = Artifact::dependency(&module_id, &file_name, &sums);
                    artifact.requested_by = requested_by.clone();
                    artifact
                } else {
                    let path = format!("{}/{}/{}", self.repository, remote_path, file_name);
                    Artifact::owned(&file_name, path, &sums)
                }
            })
            .collect())
    }

    async fn remote_checksums(
        &mut self,
        remote_path: &str,
        kind: ArtifactKind,
    ) -> Result<Vec<(String, Checksums)>> {
        let source = self.source.ok_or(CoreError::MissingChecksumSource)?;
        let names = match kind {
            ArtifactKind::Recipe => RECIPE_FILES,
            ArtifactKind::Package => PACKAGE_FILES,
        };

        let mut found = Vec::new();
        for name in names {
            let path = format!("{}/{}/{}", self.repository, remote_path, name);
            let sums = match self.remote_cache.get(&path) {
                Some(cached) => cached.clone(),
                None => {
                    let looked_up = match source.checksums(&path).await {
                        Ok(sums) => sums,
                        Err(e) => {
                            warn!("Could not get checksums of {}: {}", path, e);
                            None
                        }
                    };
                    self.remote_cache.insert(path, looked_up.clone());
                    looked_up
                }
            };
            if let Some(sums) = sums {
                found.push((name.to_string(), sums));
            }
        }
        Ok(found)
    }

    fn requested_by(&mut self, id: &NodeId, kind: ArtifactKind) -> Vec<Vec<String>> {
        let graph = self.graph;
        let paths = self
            .root_paths
            .get_or_insert_with(|| graph.transitive_requires(&NodeId::root(), false, true));
        graph.requested_by_in(paths, id, kind)
    }
}

/// Hash the files of the node's download folder (`<cache folder>/../d`)
///
/// Returns nothing unless the folder holds a complete download. Hidden
/// entries are ignored.
fn local_checksums(node: &Node, kind: ArtifactKind) -> Result<Vec<(String, Checksums)>> {
    let Some(folder) = node.cache_folder(kind) else {
        return Ok(Vec::new());
    };
    let Some(download) = folder.parent().map(|p| p.join("d")) else {
        return Ok(Vec::new());
    };
    let Ok(entries) = std::fs::read_dir(&download) else {
        return Ok(Vec::new());
    };

    let mut entries = entries.collect::<std::io::Result<Vec<_>>>()?;
    entries.retain(|e| !e.file_name().to_string_lossy().starts_with('.'));
    if entries.len() < MIN_DOWNLOAD_ENTRIES {
        return Ok(Vec::new());
    }
    entries.sort_by_key(|e| e.file_name());

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        files.push((name, Checksums::of_file(&path)?));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Answers every lookup with checksums derived from the path and records calls
    #[derive(Default)]
    struct FakeSource {
        missing: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChecksumSource for FakeSource {
        async fn checksums(&self, path: &str) -> Result<Option<Checksums>> {
            self.calls.lock().unwrap().push(path.to_string());
            if self.missing.iter().any(|m| path.ends_with(m)) {
                return Ok(None);
            }
            Ok(Some(Checksums::of_bytes(path.as_bytes())))
        }
    }

    fn options(with_dependencies: bool, add_cached_deps: bool) -> AssemblyOptions {
        AssemblyOptions {
            with_dependencies,
            add_cached_deps,
            build_url: None,
            agent_version: "2.0.0".to_string(),
        }
    }

    /// consumer -> app (Build) -> liba (Cache); app -> tool (Skip)
    fn graph() -> Graph {
        Graph::from_json(
            r#"{"graph": {"nodes": {
                "0": {"ref": "conanfile", "id": "0", "requires": {"1": "app/1.0"}},
                "1": {"ref": "app/1.0#ra", "id": "1", "binary": "Build", "package_id": "pa", "prev": "va",
                      "requires": {"2": "liba/1.0", "3": "tool/1.0"}},
                "2": {"ref": "liba/1.0#rl", "id": "2", "binary": "Cache", "package_id": "pl", "prev": "vl",
                      "requires": {}},
                "3": {"ref": "tool/1.0#rt", "id": "3", "binary": "Skip", "package_id": "pt",
                      "requires": {}}
            }}}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_modules_for_built_nodes_only() {
        let graph = graph();
        let source = FakeSource::default();
        let bi = BuildInfoAssembler::new(&graph, "b", "1", "repo", options(false, false))
            .with_source(&source)
            .assemble()
            .await
            .unwrap();

        let ids: Vec<_> = bi.modules.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["app/1.0#ra", "app/1.0#ra:pa#va"]);
        assert!(bi.modules[0].dependencies.is_none());

        let recipe_files: Vec<_> = bi.modules[0]
            .artifacts
            .iter()
            .map(|a| a.path.as_deref().unwrap())
            .collect();
        assert_eq!(recipe_files[0], "repo/_/app/1.0/_/ra/export/conan_sources.tgz");
        assert_eq!(recipe_files.len(), 4);
        assert_eq!(bi.modules[1].artifacts.len(), 3);
    }

    #[tokio::test]
    async fn test_cached_deps_become_modules() {
        let graph = graph();
        let source = FakeSource::default();
        let bi = BuildInfoAssembler::new(&graph, "b", "1", "repo", options(false, true))
            .with_source(&source)
            .assemble()
            .await
            .unwrap();
        assert_eq!(bi.modules.len(), 4);
        assert_eq!(bi.modules[2].id, "liba/1.0#rl");
    }

    #[tokio::test]
    async fn test_dependencies_skip_skipped_packages() {
        let graph = graph();
        let source = FakeSource::default();
        let bi = BuildInfoAssembler::new(&graph, "b", "1", "repo", options(true, false))
            .with_source(&source)
            .assemble()
            .await
            .unwrap();

        // recipe deps: liba (4 files) + tool (4 files)
        let recipe_deps = bi.modules[0].dependencies.as_ref().unwrap();
        assert_eq!(recipe_deps.len(), 8);
        assert_eq!(
            recipe_deps[0].id.as_deref(),
            Some("liba/1.0#rl :: conan_sources.tgz")
        );
        assert_eq!(
            recipe_deps[0].requested_by,
            Some(vec![vec!["app/1.0#ra".to_string()]])
        );

        // package deps: only liba, tool was skipped
        let package_deps = bi.modules[1].dependencies.as_ref().unwrap();
        assert_eq!(package_deps.len(), 3);
        assert!(package_deps.iter().all(|a| a.id.as_deref().unwrap().starts_with("liba/1.0#rl:pl#vl")));
        assert_eq!(
            package_deps[0].requested_by,
            Some(vec![vec!["app/1.0#ra:pa#va".to_string()]])
        );
    }

    #[tokio::test]
    async fn test_remote_lookups_are_memoized() {
        let graph = graph();
        let source = FakeSource {
            missing: vec!["conan_sources.tgz"],
            ..Default::default()
        };
        let bi = BuildInfoAssembler::new(&graph, "b", "1", "repo", options(true, true))
            .with_source(&source)
            .assemble()
            .await
            .unwrap();

        assert_eq!(bi.modules[0].artifacts.len(), 3);
        let calls = source.calls.lock().unwrap();
        let mut unique = calls.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(calls.len(), unique.len(), "a path was looked up twice");
    }

    #[tokio::test]
    async fn test_no_artifacts_is_an_error() {
        let graph = graph();
        let source = FakeSource {
            missing: vec!["tgz", "py", "txt"],
            ..Default::default()
        };
        let err = BuildInfoAssembler::new(&graph, "b", "1", "repo", options(false, false))
            .with_source(&source)
            .assemble()
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("There are no artifacts for the app/1.0#ra recipe."));
    }

    #[tokio::test]
    async fn test_remote_lookup_needs_a_source() {
        let graph = graph();
        let err = BuildInfoAssembler::new(&graph, "b", "1", "repo", options(false, false))
            .assemble()
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingChecksumSource));
    }

    fn populate(dir: &Path, files: &[(&str, &[u8])]) {
        std::fs::create_dir_all(dir).unwrap();
        for (name, data) in files {
            std::fs::write(dir.join(name), data).unwrap();
        }
    }

    #[tokio::test]
    async fn test_local_download_folder_is_hashed() {
        let temp = TempDir::new().unwrap();
        let recipe = temp.path().join("recipe");
        let package = temp.path().join("package");
        populate(
            &recipe.join("d"),
            &[
                ("conanfile.py", b"py"),
                ("conanmanifest.txt", b"m"),
                ("conan_export.tgz", b"x"),
                (".DS_Store", b"junk"),
            ],
        );
        std::fs::create_dir_all(recipe.join("e")).unwrap();
        // two visible entries: not a complete download
        populate(
            &package.join("d"),
            &[("conaninfo.txt", b"i"), ("conanmanifest.txt", b"m"), (".conan.lock", b"")],
        );

        let json = serde_json::json!({"graph": {"nodes": {
            "0": {"ref": "pkg/1.0#r", "id": "0", "binary": "Build", "package_id": "p", "prev": "v",
                  "recipe_folder": recipe.join("e"), "package_folder": package.join("p"),
                  "requires": {}}
        }}});
        let graph = Graph::from_value(json).unwrap();
        let source = FakeSource::default();

        let bi = BuildInfoAssembler::new(&graph, "b", "1", "repo", options(false, false))
            .with_source(&source)
            .assemble()
            .await
            .unwrap();

        let recipe = &bi.modules[0].artifacts;
        let names: Vec<_> = recipe.iter().map(|a| a.name.as_deref().unwrap()).collect();
        assert_eq!(names, ["conan_export.tgz", "conanfile.py", "conanmanifest.txt"]);
        assert_eq!(recipe[1].sha256, Some(Checksums::of_bytes(b"py").sha256));
        assert_eq!(recipe[1].artifact_type, "py");

        // package fell back to the remote source
        let calls = source.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| c.starts_with("repo/_/pkg/1.0/_/r/package/p/v/")));
    }
}
