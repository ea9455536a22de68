//! Conex Core - Conan graph and Artifactory document types
//!
//! This crate holds everything that does not talk to a server:
//! - `Graph`: the dependency graph printed by `conan graph info --format json`
//! - `BuildInfo`: JFrog build-info documents and their assembly from a graph
//! - `PackageList`: Conan package lists and the folders they promote
//! - `sbom`: CycloneDX export of a graph
//! - `lipo`: universal binaries from a `full_deploy` tree

pub mod assembler;
pub mod build_info;
pub mod error;
pub mod graph;
pub mod hashes;
pub mod json;
pub mod lipo;
pub mod pkglist;
pub mod properties;
pub mod reference;
pub mod report;
pub mod sbom;

pub use assembler::{AssemblyOptions, BuildInfoAssembler, ChecksumSource};
pub use build_info::{Artifact, BuildAgent, BuildInfo, BundleFile, BundleManifest, Module};
pub use error::{CoreError, Result};
pub use graph::{ArtifactKind, BinaryStatus, Graph, Node, NodeId};
pub use hashes::Checksums;
pub use pkglist::{PackageList, PromotionItem};
pub use properties::Properties;
pub use reference::{AnyReference, PackageReference, RecipeReference};
pub use report::{BuildReport, ReportUpdate};
