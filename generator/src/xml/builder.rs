//! Document assembly and serialization.
//!
//! [`DocumentBuilder`] creates the fixed part of the report once (root,
//! macro-resolved attributes, static children, optional ISO 20022 envelope),
//! then receives record elements in input order. [`Document::to_xml`] writes
//! the result with `quick-xml`.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

use super::node::{invalid_xml_char, QName, XmlNode};
use crate::context::RunContext;
use crate::error::{BuildError, BuildResult};
use crate::mapping::macros::{resolve, resolve_lei};
use crate::mapping::{EnvelopeSpec, MappingConfig, StaticChild, StaticContent};

/// Prefix reserved by XML, never declared.
const XML_PREFIX: &str = "xml";

/// A namespace declaration written on the outermost element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    /// `None` for the default namespace.
    pub prefix: Option<String>,
    pub uri: String,
}

impl NamespaceDecl {
    fn attribute_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("xmlns:{prefix}"),
            None => "xmlns".to_string(),
        }
    }
}

// =============================================================================
// Document
// =============================================================================

/// A complete report, ready to serialize.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    declarations: Vec<NamespaceDecl>,
    top: XmlNode,
    /// Path from `top` to the element holding the records.
    records_path: Vec<QName>,
    pretty: bool,
}

impl Document {
    pub fn declarations(&self) -> &[NamespaceDecl] {
        &self.declarations
    }

    /// Outermost element (the envelope when one is configured).
    pub fn top(&self) -> &XmlNode {
        &self.top
    }

    /// Record elements in input order.
    pub fn records(&self) -> &[XmlNode] {
        self.top
            .descendant(&self.records_path)
            .map(|parent| parent.children.as_slice())
            .unwrap_or(&[])
    }

    /// Serialize to a UTF-8 string with an XML declaration.
    pub fn to_xml(&self) -> BuildResult<String> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        String::from_utf8(buffer).map_err(serialize_error)
    }

    pub fn write_to<W: Write>(&self, out: W) -> BuildResult<()> {
        let mut writer = if self.pretty {
            Writer::new_with_indent(out, b' ', 2)
        } else {
            Writer::new(out)
        };
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(serialize_error)?;
        write_node(&mut writer, &self.top, &self.declarations)?;
        writer.get_mut().write_all(b"\n").map_err(serialize_error)
    }
}

fn write_node<W: Write>(
    writer: &mut Writer<W>,
    node: &XmlNode,
    declarations: &[NamespaceDecl],
) -> BuildResult<()> {
    let name = node.name.to_string();
    let mut start = BytesStart::new(name.as_str());
    for decl in declarations {
        let key = decl.attribute_name();
        start.push_attribute((key.as_str(), decl.uri.as_str()));
    }
    for (attr, value) in &node.attributes {
        let key = attr.to_string();
        check_chars(&format!("{name}@{key}"), value)?;
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.text.is_none() && node.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(serialize_error);
    }
    writer.write_event(Event::Start(start)).map_err(serialize_error)?;
    if let Some(text) = &node.text {
        check_chars(&name, text)?;
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(serialize_error)?;
    }
    for child in &node.children {
        write_node(writer, child, &[])?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(name.as_str())))
        .map_err(serialize_error)
}

fn check_chars(name: &str, value: &str) -> BuildResult<()> {
    match invalid_xml_char(value) {
        Some(character) => Err(BuildError::InvalidCharacter {
            name: name.to_string(),
            character,
        }),
        None => Ok(()),
    }
}

fn serialize_error(err: impl std::fmt::Display) -> BuildError {
    BuildError::Serialize(err.to_string())
}

// =============================================================================
// Builder
// =============================================================================

/// Incremental document construction.
#[derive(Debug)]
pub struct DocumentBuilder<'a> {
    config: &'a MappingConfig,
    top: XmlNode,
    records_path: Vec<QName>,
}

impl<'a> DocumentBuilder<'a> {
    /// Build the fixed part of the document. Macros are resolved here.
    pub fn new(config: &'a MappingConfig, ctx: &RunContext) -> BuildResult<Self> {
        let mut root = XmlNode::new(config.root.name.clone());
        for (name, value) in &config.root.attributes {
            root.set_attribute(name.clone(), resolve(value, ctx)?);
        }
        for child in &config.root.children {
            root.children.push(static_node(child, ctx)?);
        }

        let mut records_path = Vec::new();
        if let Some(container) = &config.record_container {
            root.children.push(XmlNode::new(container.clone()));
            records_path.push(container.clone());
        }

        let top = match &config.envelope {
            Some(envelope) => {
                let (top, pyld) = envelope_node(envelope, root, ctx)?;
                let mut path = vec![pyld, config.root.name.clone()];
                path.append(&mut records_path);
                records_path = path;
                top
            }
            None => root,
        };

        let builder = Self {
            config,
            top,
            records_path,
        };
        builder.check_namespaces(&builder.top)?;
        Ok(builder)
    }

    /// Append one record element after the previous ones.
    pub fn push(&mut self, record: XmlNode) -> BuildResult<()> {
        self.check_namespaces(&record)?;
        let parent = self
            .top
            .descendant_mut(&self.records_path)
            .ok_or_else(|| BuildError::Serialize("record container is missing".to_string()))?;
        parent.children.push(record);
        Ok(())
    }

    pub fn finish(self) -> Document {
        let mut declarations = Vec::with_capacity(self.config.namespaces.len() + 1);
        if let Some(uri) = &self.config.root.default_namespace {
            declarations.push(NamespaceDecl {
                prefix: None,
                uri: uri.clone(),
            });
        }
        declarations.extend(self.config.namespaces.iter().map(|ns| NamespaceDecl {
            prefix: Some(ns.prefix.clone()),
            uri: ns.uri.clone(),
        }));
        Document {
            declarations,
            top: self.top,
            records_path: self.records_path,
            pretty: self.config.pretty,
        }
    }

    fn check_namespaces(&self, node: &XmlNode) -> BuildResult<()> {
        for name in node.names() {
            if let Some(prefix) = name.prefix() {
                if prefix != XML_PREFIX && !self.config.declares(prefix) {
                    return Err(BuildError::Namespace {
                        prefix: prefix.to_string(),
                        name: name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Assemble a document from mapped records in one call.
pub fn build(
    config: &MappingConfig,
    ctx: &RunContext,
    records: impl IntoIterator<Item = XmlNode>,
) -> BuildResult<Document> {
    let mut builder = DocumentBuilder::new(config, ctx)?;
    for record in records {
        builder.push(record)?;
    }
    Ok(builder.finish())
}

fn static_node(child: &StaticChild, ctx: &RunContext) -> BuildResult<XmlNode> {
    let mut node = XmlNode::new(child.name.clone());
    match &child.content {
        StaticContent::Text(text) => node.text = Some(resolve(text, ctx)?),
        StaticContent::Elements(children) => {
            for nested in children {
                node.children.push(static_node(nested, ctx)?);
            }
        }
    }
    Ok(node)
}

/// Wrap `report` into `BizData`. Returns the envelope and the name of the
/// payload element holding the report.
fn envelope_node(
    spec: &EnvelopeSpec,
    report: XmlNode,
    ctx: &RunContext,
) -> BuildResult<(XmlNode, QName)> {
    let biz = |local: &str| QName::new(spec.bizdata_prefix.as_str(), local);
    let hdr = |local: &str| QName::new(spec.header_prefix.as_str(), local);

    let from = resolve_lei("envelope.from_lei", &spec.from_lei, ctx)?;
    let to = resolve_lei("envelope.to_lei", &spec.to_lei, ctx)?;
    let party = |local: &str, lei: String| {
        let othr = XmlNode::new(hdr("Othr"))
            .with_child(XmlNode::new(hdr("Id")).with_text(lei))
            .with_child(
                XmlNode::new(hdr("SchmeNm")).with_child(XmlNode::new(hdr("Prtry")).with_text("LEI")),
            );
        XmlNode::new(hdr(local)).with_child(
            XmlNode::new(hdr("OrgId")).with_child(
                XmlNode::new(hdr("Id")).with_child(XmlNode::new(hdr("OrgId")).with_child(othr)),
            ),
        )
    };

    let app_hdr = XmlNode::new(hdr("AppHdr"))
        .with_child(party("Fr", from))
        .with_child(party("To", to))
        .with_child(
            XmlNode::new(hdr("BizMsgIdr"))
                .with_text(format!("{}{}", spec.message_id_prefix, ctx.message_id())),
        )
        .with_child(XmlNode::new(hdr("MsgDefIdr")).with_text(spec.message_definition.as_str()))
        .with_child(XmlNode::new(hdr("CreDt")).with_text(ctx.now_iso()));

    let mut top = XmlNode::new(biz("BizData"));
    for (name, value) in &spec.attributes {
        top.set_attribute(name.clone(), resolve(value, ctx)?);
    }
    let pyld = biz("Pyld");
    top = top
        .with_child(XmlNode::new(biz("Hdr")).with_child(app_hdr))
        .with_child(XmlNode::new(pyld.clone()).with_child(report));
    Ok((top, pyld))
}
