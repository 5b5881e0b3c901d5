// Graph serialization for the visualization front end and graph tools

use crate::error::Result;
use crate::graph::{CitationGraph, PublicationNode};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// File the visualization front end loads. Not affected by the output prefix.
pub const JSON_OUTPUT: &str = "graph.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Gexf,
    GraphMl,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gexf" => Some(OutputFormat::Gexf),
            "graphml" => Some(OutputFormat::GraphMl),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Gexf => "gexf",
            OutputFormat::GraphMl => "graphml",
            OutputFormat::Json => "json",
        }
    }

    pub fn generate(&self, graph: &CitationGraph) -> Result<String> {
        match self {
            OutputFormat::Gexf => generate_gexf(graph),
            OutputFormat::GraphMl => generate_graphml(graph),
            OutputFormat::Json => generate_json(graph),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrType {
    Text,
    Integer,
}

/// Node attributes shared by every format, in output order.
const NODE_ATTRIBUTES: [(&str, AttrType); 7] = [
    ("title", AttrType::Text),
    ("url", AttrType::Text),
    ("authors", AttrType::Text),
    ("year", AttrType::Text),
    ("cited_by", AttrType::Integer),
    ("cited_by_url", AttrType::Text),
    ("community", AttrType::Integer),
];

fn attribute_value(node: &PublicationNode, name: &str) -> Option<String> {
    let attrs = &node.attrs;
    match name {
        "title" => attrs.title.clone(),
        "url" => attrs.url.clone(),
        "authors" => attrs.authors.clone(),
        "year" => attrs.year.clone(),
        "cited_by" => attrs.cited_by.map(|n| n.to_string()),
        "cited_by_url" => attrs.cited_by_url.clone(),
        "community" => attrs.community.map(|n| n.to_string()),
        _ => None,
    }
}

/// Attributes carried by at least one node, in [`NODE_ATTRIBUTES`] order.
fn declared_attributes(graph: &CitationGraph) -> Vec<(&'static str, AttrType)> {
    NODE_ATTRIBUTES
        .iter()
        .copied()
        .filter(|(name, _)| graph.nodes().any(|node| attribute_value(node, name).is_some()))
        .collect()
}

#[derive(Serialize)]
struct JsonGraph<'a> {
    nodes: Vec<JsonNode<'a>>,
    links: Vec<JsonLink<'a>>,
}

#[derive(Serialize)]
struct JsonNode<'a> {
    id: &'a str,
    label: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authors: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cited_by: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cited_by_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    community: Option<usize>,
}

#[derive(Serialize)]
struct JsonLink<'a> {
    source: &'a str,
    target: &'a str,
}

/// `{"nodes": [...], "links": [...]}` document for the visualization front
/// end, indented by four spaces.
pub fn generate_json(graph: &CitationGraph) -> Result<String> {
    let document = JsonGraph {
        nodes: graph
            .nodes()
            .map(|node| JsonNode {
                id: &node.id,
                label: node.label(),
                title: node.attrs.title.as_deref(),
                url: node.attrs.url.as_deref(),
                authors: node.attrs.authors.as_deref(),
                year: node.attrs.year.as_deref(),
                cited_by: node.attrs.cited_by,
                cited_by_url: node.attrs.cited_by_url.as_deref(),
                community: node.attrs.community,
            })
            .collect(),
        links: graph
            .edges()
            .map(|(source, target)| JsonLink { source, target })
            .collect(),
    };

    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    document.serialize(&mut serializer)?;
    Ok(String::from_utf8(buffer)?)
}

type XmlWriter = Writer<Vec<u8>>;

fn xml_writer() -> Result<XmlWriter> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    Ok(writer)
}

fn open_tag(writer: &mut XmlWriter, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
    let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
    writer.write_event(Event::Start(start))?;
    Ok(())
}

fn empty_tag(writer: &mut XmlWriter, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
    let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
    writer.write_event(Event::Empty(start))?;
    Ok(())
}

fn close_tag(writer: &mut XmlWriter, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn text_tag(
    writer: &mut XmlWriter,
    name: &str,
    attributes: &[(&str, &str)],
    text: &str,
) -> Result<()> {
    open_tag(writer, name, attributes)?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    close_tag(writer, name)
}

fn finish(writer: XmlWriter) -> Result<String> {
    Ok(String::from_utf8(writer.into_inner())?)
}

/// GEXF 1.2 document. Node labels are the titles; the remaining
/// attributes are declared once under `<attributes>` and referenced by id.
pub fn generate_gexf(graph: &CitationGraph) -> Result<String> {
    let declared = declared_attributes(graph);
    let modified = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let creator = format!("citemap {}", env!("CARGO_PKG_VERSION"));

    let mut writer = xml_writer()?;
    open_tag(
        &mut writer,
        "gexf",
        &[
            ("xmlns", "http://www.gexf.net/1.2draft"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
            (
                "xsi:schemaLocation",
                "http://www.gexf.net/1.2draft http://www.gexf.net/1.2draft/gexf.xsd",
            ),
            ("version", "1.2"),
        ],
    )?;

    open_tag(&mut writer, "meta", &[("lastmodifieddate", modified.as_str())])?;
    text_tag(&mut writer, "creator", &[], &creator)?;
    close_tag(&mut writer, "meta")?;

    open_tag(
        &mut writer,
        "graph",
        &[("defaultedgetype", "directed"), ("mode", "static")],
    )?;

    if !declared.is_empty() {
        open_tag(&mut writer, "attributes", &[("class", "node"), ("mode", "static")])?;
        for (id, (name, kind)) in declared.iter().enumerate() {
            let kind = match kind {
                AttrType::Text => "string",
                AttrType::Integer => "integer",
            };
            let id = id.to_string();
            empty_tag(
                &mut writer,
                "attribute",
                &[("id", id.as_str()), ("title", *name), ("type", kind)],
            )?;
        }
        close_tag(&mut writer, "attributes")?;
    }

    open_tag(&mut writer, "nodes", &[])?;
    for node in graph.nodes() {
        let values: Vec<(String, String)> = declared
            .iter()
            .enumerate()
            .filter_map(|(id, (name, _))| {
                attribute_value(node, name).map(|value| (id.to_string(), value))
            })
            .collect();

        let node_attributes = [("id", node.id.as_str()), ("label", node.label())];
        if values.is_empty() {
            empty_tag(&mut writer, "node", &node_attributes)?;
            continue;
        }

        open_tag(&mut writer, "node", &node_attributes)?;
        open_tag(&mut writer, "attvalues", &[])?;
        for (id, value) in &values {
            empty_tag(
                &mut writer,
                "attvalue",
                &[("for", id.as_str()), ("value", value.as_str())],
            )?;
        }
        close_tag(&mut writer, "attvalues")?;
        close_tag(&mut writer, "node")?;
    }
    close_tag(&mut writer, "nodes")?;

    open_tag(&mut writer, "edges", &[])?;
    for (id, (source, target)) in graph.edges().enumerate() {
        let id = id.to_string();
        empty_tag(
            &mut writer,
            "edge",
            &[("id", id.as_str()), ("source", source), ("target", target)],
        )?;
    }
    close_tag(&mut writer, "edges")?;

    close_tag(&mut writer, "graph")?;
    close_tag(&mut writer, "gexf")?;
    finish(writer)
}

/// GraphML document. Keys `d0..` are declared for the label and every
/// attribute present on at least one node.
pub fn generate_graphml(graph: &CitationGraph) -> Result<String> {
    let mut keys: Vec<(&str, AttrType)> = vec![("label", AttrType::Text)];
    keys.extend(declared_attributes(graph));

    let mut writer = xml_writer()?;
    open_tag(
        &mut writer,
        "graphml",
        &[
            ("xmlns", "http://graphml.graphdrawing.org/xmlns"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
            (
                "xsi:schemaLocation",
                "http://graphml.graphdrawing.org/xmlns \
                 http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd",
            ),
        ],
    )?;

    for (index, (name, kind)) in keys.iter().enumerate() {
        let kind = match kind {
            AttrType::Text => "string",
            AttrType::Integer => "long",
        };
        let id = format!("d{}", index);
        empty_tag(
            &mut writer,
            "key",
            &[
                ("id", id.as_str()),
                ("for", "node"),
                ("attr.name", *name),
                ("attr.type", kind),
            ],
        )?;
    }

    open_tag(&mut writer, "graph", &[("edgedefault", "directed")])?;
    for node in graph.nodes() {
        open_tag(&mut writer, "node", &[("id", node.id.as_str())])?;
        for (index, (name, _)) in keys.iter().enumerate() {
            let value = if *name == "label" {
                Some(node.label().to_string())
            } else {
                attribute_value(node, name)
            };
            if let Some(value) = value {
                let key = format!("d{}", index);
                text_tag(&mut writer, "data", &[("key", key.as_str())], &value)?;
            }
        }
        close_tag(&mut writer, "node")?;
    }
    for (source, target) in graph.edges() {
        empty_tag(&mut writer, "edge", &[("source", source), ("target", target)])?;
    }
    close_tag(&mut writer, "graph")?;
    close_tag(&mut writer, "graphml")?;
    finish(writer)
}

pub fn save_output(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// `<prefix>.<extension>`, keeping any directories in the prefix.
pub fn output_path(prefix: &str, format: OutputFormat) -> PathBuf {
    PathBuf::from(format!("{}.{}", prefix, format.extension()))
}

/// Paths of the artifacts written for one graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutputs {
    pub gexf: PathBuf,
    pub graphml: PathBuf,
    pub json: PathBuf,
}

/// Writes `<prefix>.gexf`, `<prefix>.graphml` and the JSON document at
/// `json_path`. An empty graph writes nothing and returns `None`.
pub fn write_outputs(
    graph: &CitationGraph,
    prefix: &str,
    json_path: &Path,
) -> Result<Option<WrittenOutputs>> {
    if graph.is_empty() {
        info!("Graph has no publications, skipping output");
        return Ok(None);
    }

    // Render everything first so a failure leaves no partial set behind.
    let gexf = generate_gexf(graph)?;
    let graphml = generate_graphml(graph)?;
    let json = generate_json(graph)?;

    let outputs = WrittenOutputs {
        gexf: output_path(prefix, OutputFormat::Gexf),
        graphml: output_path(prefix, OutputFormat::GraphMl),
        json: json_path.to_path_buf(),
    };

    for (content, path) in [
        (&gexf, &outputs.gexf),
        (&graphml, &outputs.graphml),
        (&json, &outputs.json),
    ] {
        save_output(content, path)?;
        info!("Wrote {} ({} bytes)", path.display(), content.len());
    }

    Ok(Some(outputs))
}
