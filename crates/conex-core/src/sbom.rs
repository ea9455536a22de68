//! CycloneDX 1.4 SBOM export of a Conan graph

use chrono::Utc;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::graph::{Graph, Node, NodeId};

/// Default remote recorded for packages with no known origin
pub const CONAN_CENTER: &str = "https://center.conan.io";

const SCHEMA: &str = "http://cyclonedx.org/schema/bom-1.4.schema.json";

/// Characters left as-is in purl names and versions
const PURL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Qualifier values may also keep `:` and `/` (urls)
const PURL_QUALIFIER: &AsciiSet = &PURL_COMPONENT.remove(b':').remove(b'/');

/// CycloneDX 1.4 structures, reduced to what a Conan graph can fill
pub mod cyclonedx {
    use serde::Serialize;

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Bom {
        #[serde(rename = "$schema")]
        pub schema: String,
        pub bom_format: String,
        pub spec_version: String,
        pub version: u32,
        pub metadata: Metadata,
        pub components: Vec<Component>,
        pub dependencies: Vec<Dependency>,
    }

    #[derive(Debug, Serialize)]
    pub struct Metadata {
        pub timestamp: String,
        pub tools: Vec<Tool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub component: Option<Component>,
    }

    #[derive(Debug, Serialize)]
    pub struct Tool {
        pub vendor: String,
        pub name: String,
        pub version: String,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Component {
        #[serde(rename = "type")]
        pub component_type: String,
        #[serde(rename = "bom-ref")]
        pub bom_ref: String,
        pub name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub version: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub purl: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub licenses: Vec<LicenseChoice>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub external_references: Vec<ExternalReference>,
    }

    #[derive(Debug, Serialize)]
    pub struct LicenseChoice {
        pub license: License,
    }

    #[derive(Debug, Serialize)]
    pub struct License {
        pub id: String,
    }

    #[derive(Debug, Serialize)]
    pub struct ExternalReference {
        #[serde(rename = "type")]
        pub ref_type: String,
        pub url: String,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Dependency {
        #[serde(rename = "ref")]
        pub reference: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub depends_on: Vec<String>,
    }
}

/// Package URL of a node, `pkg:conan/<name>@<version>?<qualifiers>`
///
/// Qualifiers are sorted by key and only present when known.
pub fn package_url(node: &Node) -> Option<String> {
    let name = node.name.as_deref()?;
    let mut purl = format!("pkg:conan/{}", utf8_percent_encode(name, PURL_COMPONENT));
    if let Some(version) = &node.version {
        purl.push('@');
        purl.push_str(&utf8_percent_encode(version, PURL_COMPONENT).to_string());
    }

    let rref = node
        .reference
        .as_deref()
        .and_then(|r| r.split_once('#'))
        .map(|(_, rev)| rev.to_string());
    let repository_url = node.remote.clone().unwrap_or_else(|| CONAN_CENTER.to_string());

    let mut qualifiers: Vec<(&str, String)> = vec![
        ("channel", node.channel.clone()),
        ("prev", node.prev.clone()),
        ("repository_url", Some(repository_url)),
        ("rref", rref),
        ("user", node.user.clone()),
    ]
    .into_iter()
    .filter_map(|(k, v)| v.filter(|v| !v.is_empty()).map(|v| (k, v)))
    .collect();
    qualifiers.sort_by(|a, b| a.0.cmp(b.0));

    let encoded: Vec<String> = qualifiers
        .iter()
        .map(|(k, v)| format!("{}={}", k, utf8_percent_encode(v, PURL_QUALIFIER)))
        .collect();
    if !encoded.is_empty() {
        purl.push('?');
        purl.push_str(&encoded.join("&"));
    }
    Some(purl)
}

fn component(node: &Node) -> cyclonedx::Component {
    let component_type = match node.package_type.as_deref() {
        Some("application") => "application",
        _ => "library",
    };
    cyclonedx::Component {
        component_type: component_type.to_string(),
        bom_ref: node.id.to_string(),
        name: node
            .name
            .clone()
            .unwrap_or_else(|| format!("UNKNOWN.{}", node.id)),
        version: node.version.clone(),
        description: node.description.clone().filter(|d| !d.is_empty()),
        purl: package_url(node),
        licenses: node
            .licenses
            .iter()
            .map(|id| cyclonedx::LicenseChoice {
                license: cyclonedx::License { id: id.clone() },
            })
            .collect(),
        external_references: node
            .homepage
            .iter()
            .filter(|h| !h.is_empty())
            .map(|url| cyclonedx::ExternalReference {
                ref_type: "website".to_string(),
                url: url.clone(),
            })
            .collect(),
    }
}

/// Build the SBOM of every node except the root
///
/// The root becomes the metadata component when it is a named package.
pub fn cyclonedx_from_graph(graph: &Graph) -> cyclonedx::Bom {
    let root_id = graph.root().map(|r| r.id.clone()).unwrap_or_else(NodeId::root);
    let root_component = graph
        .root()
        .filter(|r| r.name.is_some())
        .map(component);

    let mut components = Vec::new();
    let mut dependencies = Vec::new();
    for node in graph.nodes() {
        let depends_on = node.requires.iter().map(|r| r.to_string()).collect();
        if node.id == root_id {
            if root_component.is_some() {
                dependencies.push(cyclonedx::Dependency {
                    reference: node.id.to_string(),
                    depends_on,
                });
            }
            continue;
        }
        components.push(component(node));
        dependencies.push(cyclonedx::Dependency {
            reference: node.id.to_string(),
            depends_on,
        });
    }

    cyclonedx::Bom {
        schema: SCHEMA.to_string(),
        bom_format: "CycloneDX".to_string(),
        spec_version: "1.4".to_string(),
        version: 1,
        metadata: cyclonedx::Metadata {
            timestamp: Utc::now().to_rfc3339(),
            tools: vec![cyclonedx::Tool {
                vendor: "conan-io".to_string(),
                name: "conex".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            }],
            component: root_component,
        },
        components,
        dependencies,
    }
}
