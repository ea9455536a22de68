//! SBOM command - CycloneDX document of a Conan graph

use std::path::Path;

use conex_core::Graph;
use conex_core::sbom::cyclonedx_from_graph;

use crate::error::Result;
use crate::output;

pub fn cyclonedx(graph_path: &Path) -> Result<()> {
    let graph = Graph::load(graph_path)?;
    output::print_json(&cyclonedx_from_graph(&graph))
}
