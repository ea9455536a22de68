//! Dependency graph as serialized by `conan create/install --format json`
//!
//! Conan emits `{"graph": {"nodes": ...}}` where `nodes` is an object keyed by
//! node id (`"0"`, `"1"`, ...). Older outputs use a plain array. Node ids show
//! up either as JSON strings or numbers, and `requires` is a map of
//! `id -> reference` (or a bare list of ids).

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::reference::{PackageReference, RecipeReference};

/// Reference used by Conan for the consumer node of `conan install`
pub const CONSUMER_REF: &str = "conanfile";

/// Identifier of a node inside one graph
///
/// Numeric ids order numerically, so `"2"` sorts before `"10"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn root() -> Self {
        Self("0".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<u64>(), other.0.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What Conan decided to do with a node's binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryStatus {
    Build,
    Cache,
    Download,
    Update,
    Skip,
    Missing,
    Invalid,
    Editable,
    EditableBuild,
    /// No binary (consumer nodes) or an unknown status string
    Other(Option<String>),
}

impl BinaryStatus {
    fn from_str_opt(value: Option<&str>) -> Self {
        match value {
            Some("Build") => BinaryStatus::Build,
            Some("Cache") => BinaryStatus::Cache,
            Some("Download") => BinaryStatus::Download,
            Some("Update") => BinaryStatus::Update,
            Some("Skip") => BinaryStatus::Skip,
            Some("Missing") => BinaryStatus::Missing,
            Some("Invalid") => BinaryStatus::Invalid,
            Some("Editable") => BinaryStatus::Editable,
            Some("EditableBuild") => BinaryStatus::EditableBuild,
            other => BinaryStatus::Other(other.map(str::to_string)),
        }
    }
}

/// Which half of a node an artifact belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Recipe,
    Package,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Recipe => f.write_str("recipe"),
            ArtifactKind::Package => f.write_str("package"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(default)]
    id: Option<Value>,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    binary: Option<String>,
    #[serde(default)]
    package_id: Option<String>,
    #[serde(default)]
    prev: Option<String>,
    #[serde(default)]
    recipe_folder: Option<PathBuf>,
    #[serde(default)]
    package_folder: Option<PathBuf>,
    #[serde(default)]
    requires: Option<Value>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    package_type: Option<String>,
    #[serde(default)]
    license: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    remote: Option<Value>,
}

/// One node of the dependency graph
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// Reference as written by Conan, usually `name/version#rrev`
    pub reference: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub user: Option<String>,
    pub channel: Option<String>,
    pub binary: BinaryStatus,
    pub package_id: Option<String>,
    pub prev: Option<String>,
    pub recipe_folder: Option<PathBuf>,
    pub package_folder: Option<PathBuf>,
    /// Direct requirements, in declaration order
    pub requires: Vec<NodeId>,
    pub context: Option<String>,
    pub package_type: Option<String>,
    pub licenses: Vec<String>,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub remote: Option<String>,
}

impl Node {
    fn from_raw(key: Option<&str>, raw: RawNode) -> Result<Self> {
        let id = raw
            .id
            .as_ref()
            .and_then(NodeId::from_value)
            .or_else(|| key.map(NodeId::from))
            .ok_or_else(|| CoreError::UnknownNode {
                id: "<missing id>".to_string(),
            })?;

        let requires = match raw.requires {
            Some(Value::Object(map)) => map.keys().map(|k| NodeId::new(k.as_str())).collect(),
            Some(Value::Array(items)) => items.iter().filter_map(NodeId::from_value).collect(),
            _ => Vec::new(),
        };

        let licenses = match raw.license {
            Some(Value::String(s)) => vec![s],
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        let remote = match raw.remote {
            Some(Value::String(s)) => Some(s),
            Some(Value::Object(map)) => map
                .get("url")
                .or_else(|| map.get("name"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            _ => None,
        };

        Ok(Self {
            id,
            reference: raw.reference.filter(|r| !r.is_empty()),
            name: raw.name,
            version: raw.version,
            user: raw.user,
            channel: raw.channel,
            binary: BinaryStatus::from_str_opt(raw.binary.as_deref()),
            package_id: raw.package_id,
            prev: raw.prev,
            recipe_folder: raw.recipe_folder,
            package_folder: raw.package_folder,
            requires,
            context: raw.context,
            package_type: raw.package_type,
            licenses,
            description: raw.description,
            homepage: raw.homepage,
            remote,
        })
    }

    /// Whether this node stands for a real package rather than the consumer
    pub fn is_package(&self) -> bool {
        matches!(&self.reference, Some(r) if r != CONSUMER_REF)
    }

    /// The reference string, empty for the consumer
    pub fn ref_str(&self) -> &str {
        self.reference.as_deref().unwrap_or_default()
    }

    pub fn recipe_reference(&self) -> Result<RecipeReference> {
        RecipeReference::parse(self.ref_str())
    }

    pub fn package_reference(&self) -> Result<PackageReference> {
        let recipe = self.recipe_reference()?;
        let package_id = self
            .package_id
            .clone()
            .ok_or_else(|| CoreError::InvalidReference {
                reference: self.ref_str().to_string(),
                reason: "node has no package id".to_string(),
            })?;
        Ok(PackageReference::new(recipe, package_id, self.prev.clone()))
    }

    /// Build-info id of this node: the reference, plus `:pkgid#prev` for packages
    pub fn module_id(&self, kind: ArtifactKind) -> String {
        match kind {
            ArtifactKind::Recipe => self.ref_str().to_string(),
            ArtifactKind::Package => format!(
                "{}:{}#{}",
                self.ref_str(),
                self.package_id.as_deref().unwrap_or("None"),
                self.prev.as_deref().unwrap_or("None")
            ),
        }
    }

    /// Folder of this node inside an Artifactory Conan repository
    pub fn remote_path(&self, kind: ArtifactKind) -> Result<String> {
        match kind {
            ArtifactKind::Recipe => self.recipe_reference()?.export_path(),
            ArtifactKind::Package => self.package_reference()?.package_path(),
        }
    }

    /// Local cache folder of the recipe or the package
    pub fn cache_folder(&self, kind: ArtifactKind) -> Option<&Path> {
        match kind {
            ArtifactKind::Recipe => self.recipe_folder.as_deref(),
            ArtifactKind::Package => self.package_folder.as_deref(),
        }
    }
}

/// A pre-computed Conan dependency graph
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: IndexMap<NodeId, Node>,
}

impl Graph {
    /// Load a graph from a `--format json` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(value)
    }

    pub fn from_value(mut value: Value) -> Result<Self> {
        let nodes_value = value
            .get_mut("graph")
            .and_then(|g| g.get_mut("nodes"))
            .map(Value::take)
            .ok_or(CoreError::MissingGraph)?;

        let mut nodes = IndexMap::new();
        match nodes_value {
            Value::Object(map) => {
                for (key, raw) in map {
                    let raw: RawNode = serde_json::from_value(raw)?;
                    let node = Node::from_raw(Some(key.as_str()), raw)?;
                    nodes.insert(node.id.clone(), node);
                }
            }
            Value::Array(items) => {
                for raw in items {
                    let raw: RawNode = serde_json::from_value(raw)?;
                    let node = Node::from_raw(None, raw)?;
                    nodes.insert(node.id.clone(), node);
                }
            }
            _ => return Err(CoreError::MissingGraph),
        }

        let graph = Self { nodes };
        graph.check_edges()?;
        Ok(graph)
    }

    fn check_edges(&self) -> Result<()> {
        for node in self.nodes.values() {
            if let Some(missing) = node.requires.iter().find(|r| !self.nodes.contains_key(*r)) {
                return Err(CoreError::UnknownNode {
                    id: missing.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Nodes in document order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The root node: id `0` when present, else the first node
    pub fn root(&self) -> Option<&Node> {
        self.nodes
            .get(&NodeId::root())
            .or_else(|| self.nodes.values().next())
    }

    /// Every path from `id` down to a leaf, found depth first in declaration order
    ///
    /// A node already on the current path is not entered again. The start node
    /// is left out unless `include_root`; `invert` puts each path leaf first.
    pub fn transitive_requires(
        &self,
        id: &NodeId,
        include_root: bool,
        invert: bool,
    ) -> Vec<Vec<NodeId>> {
        let mut result = Vec::new();
        if self.nodes.contains_key(id) {
            let mut on_path = HashSet::new();
            let mut path = Vec::new();
            self.dfs_paths(id, &mut on_path, &mut path, &mut result);
        }

        result
            .into_iter()
            .map(|mut path| {
                if !include_root {
                    path.remove(0);
                }
                if invert {
                    path.reverse();
                }
                path
            })
            .collect()
    }

    fn dfs_paths<'a>(
        &'a self,
        id: &'a NodeId,
        on_path: &mut HashSet<&'a NodeId>,
        path: &mut Vec<NodeId>,
        result: &mut Vec<Vec<NodeId>>,
    ) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        on_path.insert(id);
        path.push(id.clone());

        if node.requires.is_empty() {
            result.push(path.clone());
        } else {
            for required in &node.requires {
                if !on_path.contains(required) {
                    self.dfs_paths(required, on_path, path, result);
                }
            }
        }

        on_path.remove(id);
        path.pop();
    }

    /// Chains of dependents that pull `id` into the graph
    ///
    /// Each chain lists, nearest first, the nodes between `id` and the root
    /// (the root itself excluded), rendered as module ids of `kind`.
    pub fn requested_by(&self, id: &NodeId, kind: ArtifactKind) -> Vec<Vec<String>> {
        let root_paths = self.transitive_requires(&NodeId::root(), false, true);
        self.requested_by_in(&root_paths, id, kind)
    }

    /// Same as [`Graph::requested_by`] over already computed inverted root paths
    pub fn requested_by_in(
        &self,
        inverted_root_paths: &[Vec<NodeId>],
        id: &NodeId,
        kind: ArtifactKind,
    ) -> Vec<Vec<String>> {
        inverted_root_paths
            .iter()
            .filter_map(|path| {
                let index = path.iter().position(|n| n == id)?;
                Some(
                    path[index + 1..]
                        .iter()
                        .filter_map(|n| self.nodes.get(n))
                        .map(|n| n.module_id(kind))
                        .collect(),
                )
            })
            .collect()
    }
}

/// Deduplicated, ascending ids over a set of paths
pub fn unique_requires(paths: &[Vec<NodeId>]) -> Vec<NodeId> {
    paths
        .iter()
        .flatten()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
