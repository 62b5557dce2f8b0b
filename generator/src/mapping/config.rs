//! Mapping configuration
//!
//! The declarative description of a report: namespaces, root element,
//! record element and the ordered field rules that fill each record.
//!
//! Loading goes through three checks: the text must be JSON, the document
//! must match the embedded mapping schema, and every name, prefix and
//! transform must resolve.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use super::transforms::Transform;
use crate::error::{ConfigError, ConfigResult};
use crate::validation::validate_mapping_document;
use crate::xml::{is_xml_name, QName};

// =============================================================================
// Resolved configuration
// =============================================================================

/// A validated mapping, immutable for the run.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingConfig {
    /// Declared namespaces, in declaration order.
    pub namespaces: Vec<Namespace>,
    pub root: RootSpec,
    /// Element under the root holding the records.
    pub record_container: Option<QName>,
    /// Element wrapping each record.
    pub record_element: QName,
    pub fields: Vec<FieldRule>,
    /// Sequence order of children (local names) per element name.
    pub child_order: HashMap<QName, Vec<String>>,
    pub envelope: Option<EnvelopeSpec>,
    /// Drop leaves whose value is empty.
    pub skip_empty: bool,
    /// Indent the serialized document.
    pub pretty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub prefix: String,
    pub uri: String,
}

/// The report root element.
#[derive(Debug, Clone, PartialEq)]
pub struct RootSpec {
    pub name: QName,
    /// Attribute values may hold macros, resolved at build time.
    pub attributes: Vec<(QName, String)>,
    /// Static content written before the records.
    pub children: Vec<StaticChild>,
    /// Default namespace URI (`xmlns`).
    pub default_namespace: Option<String>,
}

/// A fixed element declared in the mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticChild {
    pub name: QName,
    pub content: StaticContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StaticContent {
    /// Text, may hold a macro.
    Text(String),
    Elements(Vec<StaticChild>),
}

/// One source column → target path rule.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    /// Source column; absent for `const` rules.
    pub from: Option<String>,
    pub target: TargetPath,
    /// Applied in order; empty means identity.
    pub transforms: Vec<Transform>,
    /// Literal for `const`.
    pub value: Option<String>,
    pub check: Option<IdentifierCheck>,
}

impl FieldRule {
    /// Column name, or `to` path for rules without a source, for messages.
    pub fn label(&self) -> &str {
        self.from.as_deref().unwrap_or(self.target.raw())
    }

    pub fn is_const(&self) -> bool {
        self.transforms.contains(&Transform::Const)
    }
}

/// Identifier checks a rule can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierCheck {
    Lei,
}

/// A resolved `to` path: elements under the record element, then an
/// optional attribute on the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPath {
    raw: String,
    pub elements: Vec<QName>,
    pub attribute: Option<QName>,
}

impl TargetPath {
    /// Parse `a:B/a:C@attr`. Unprefixed element segments take the prefix of
    /// their parent, starting from `parent`.
    pub fn parse(raw: &str, parent: &QName) -> Result<Self, String> {
        let segments: Vec<&str> = raw.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(format!("empty segment in path '{raw}'"));
        }
        let mut elements = Vec::new();
        let mut attribute = None;
        let mut prefix = parent.prefix().map(str::to_string);
        for (i, segment) in segments.iter().enumerate() {
            let (element, attr) = match segment.split_once('@') {
                Some(_) if i + 1 != segments.len() => {
                    return Err(format!("attribute segment '{segment}' must be last in '{raw}'"));
                }
                Some((element, attr)) => (element, Some(attr)),
                None => (*segment, None),
            };
            if !element.is_empty() {
                let name = QName::parse(element)
                    .ok_or_else(|| format!("invalid element name '{element}' in '{raw}'"))?
                    .or_prefix(prefix.as_deref());
                prefix = name.prefix().map(str::to_string);
                elements.push(name);
            }
            if let Some(attr) = attr {
                let name = QName::parse(attr)
                    .ok_or_else(|| format!("invalid attribute name '{attr}' in '{raw}'"))?;
                attribute = Some(name);
            }
        }
        Ok(Self {
            raw: raw.to_string(),
            elements,
            attribute,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Every qualified name on the path.
    pub fn names(&self) -> impl Iterator<Item = &QName> {
        self.elements.iter().chain(self.attribute.iter())
    }
}

/// ISO 20022 business application header wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeSpec {
    /// Prefix of the `head.003` (BizData) namespace.
    pub bizdata_prefix: String,
    /// Prefix of the `head.001` (AppHdr) namespace.
    pub header_prefix: String,
    /// Sender LEI, usually an environment macro.
    pub from_lei: String,
    /// Recipient LEI, usually an environment macro.
    pub to_lei: String,
    pub message_definition: String,
    pub message_id_prefix: String,
    /// Attributes of the `BizData` element.
    pub attributes: Vec<(QName, String)>,
}

// =============================================================================
// Raw (deserialized) configuration
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawConfig {
    namespaces: NamespaceTable,
    root: RawRoot,
    #[serde(default)]
    record_container: Option<String>,
    record_element: String,
    fields: Vec<RawRule>,
    #[serde(default)]
    child_order: HashMap<String, Vec<String>>,
    #[serde(default)]
    envelope: Option<RawEnvelope>,
    #[serde(default = "default_true")]
    skip_empty: bool,
    #[serde(default = "default_true")]
    pretty: bool,
}

#[derive(Debug, Deserialize)]
struct RawRoot {
    qname: String,
    #[serde(default)]
    attributes: Map<String, Value>,
    #[serde(default)]
    children: Map<String, Value>,
    #[serde(default, alias = "_xmlns")]
    xmlns: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(default)]
    from: Option<String>,
    to: String,
    #[serde(default)]
    transform: Option<TransformSpec>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    check: Option<IdentifierCheck>,
}

/// One transform name or a chain of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TransformSpec {
    One(String),
    Chain(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default = "default_bizdata_prefix")]
    bizdata_prefix: String,
    #[serde(default = "default_header_prefix")]
    header_prefix: String,
    #[serde(default = "default_from_lei")]
    from_lei: String,
    #[serde(default = "default_to_lei")]
    to_lei: String,
    #[serde(default = "default_message_definition")]
    message_definition: String,
    #[serde(default = "default_message_id_prefix")]
    message_id_prefix: String,
    #[serde(default)]
    attributes: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

fn default_bizdata_prefix() -> String {
    "head003".to_string()
}

fn default_header_prefix() -> String {
    "head001".to_string()
}

fn default_from_lei() -> String {
    "{ENV:FIRM_LEI}".to_string()
}

fn default_to_lei() -> String {
    "{ENV:TO_LEI}".to_string()
}

fn default_message_definition() -> String {
    "auth.016.001.01".to_string()
}

fn default_message_id_prefix() -> String {
    "mf-".to_string()
}

/// Namespace declarations in file order, duplicates kept so they can be
/// reported.
#[derive(Debug, Default)]
struct NamespaceTable(Vec<(String, String)>);

impl<'de> Deserialize<'de> for NamespaceTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = NamespaceTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of prefix → namespace URI")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((prefix, uri)) = map.next_entry::<String, String>()? {
                    entries.push((prefix, uri));
                }
                Ok(NamespaceTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

// =============================================================================
// Loading
// =============================================================================

impl MappingConfig {
    /// Load and validate a mapping file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate a mapping from JSON text.
    pub fn from_json(text: &str) -> ConfigResult<Self> {
        let document: Value = serde_json::from_str(text)?;
        validate_mapping_document(&document).map_err(|errors| ConfigError::Schema { errors })?;
        // Re-read from text: the generic value has already merged duplicate keys.
        let raw: RawConfig = serde_json::from_str(text)?;
        Self::resolve(raw)
    }

    fn resolve(raw: RawConfig) -> ConfigResult<Self> {
        let namespaces = resolve_namespaces(raw.namespaces)?;
        let names = NameResolver {
            namespaces: &namespaces,
        };

        let root_name = names.element("root.qname", &raw.root.qname, None)?;
        let root = RootSpec {
            attributes: names.attributes("root.attributes", &raw.root.attributes)?,
            children: names.static_children("root.children", &raw.root.children, &root_name)?,
            default_namespace: raw.root.xmlns,
            name: root_name,
        };

        let record_container = raw
            .record_container
            .as_deref()
            .map(|v| names.element("record_container", v, root.name.prefix()))
            .transpose()?;
        let parent = record_container.as_ref().unwrap_or(&root.name);
        let record_element = names.element("record_element", &raw.record_element, parent.prefix())?;

        let fields = raw
            .fields
            .into_iter()
            .enumerate()
            .map(|(i, rule)| names.rule(i + 1, rule, &record_element))
            .collect::<ConfigResult<Vec<_>>>()?;

        let child_order = raw
            .child_order
            .into_iter()
            .map(|(key, order)| {
                let name = names.element("child_order", &key, None)?;
                Ok((name, order))
            })
            .collect::<ConfigResult<HashMap<_, _>>>()?;

        let envelope = raw.envelope.map(|env| names.envelope(env)).transpose()?;

        Ok(Self {
            namespaces,
            root,
            record_container,
            record_element,
            fields,
            child_order,
            envelope,
            skip_empty: raw.skip_empty,
            pretty: raw.pretty,
        })
    }

    /// URI bound to a prefix.
    pub fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        self.namespaces
            .iter()
            .find(|ns| ns.prefix == prefix)
            .map(|ns| ns.uri.as_str())
    }

    pub fn declares(&self, prefix: &str) -> bool {
        self.namespace_uri(prefix).is_some()
    }

    /// Source columns referenced by the rules, in rule order, deduplicated.
    pub fn source_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for column in self.fields.iter().filter_map(|r| r.from.as_deref()) {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }

    /// Source columns missing from `headers`.
    ///
    /// Informational: a missing column only fails when a row is mapped.
    pub fn missing_columns(&self, headers: &[String]) -> Vec<&str> {
        self.source_columns()
            .into_iter()
            .filter(|col| !headers.iter().any(|h| h == col))
            .collect()
    }
}

fn resolve_namespaces(table: NamespaceTable) -> ConfigResult<Vec<Namespace>> {
    if table.0.is_empty() {
        return Err(ConfigError::EmptyNamespaces);
    }
    let mut namespaces: Vec<Namespace> = Vec::with_capacity(table.0.len());
    for (prefix, uri) in table.0 {
        if !is_xml_name(&prefix) || prefix.eq_ignore_ascii_case("xmlns") {
            return Err(ConfigError::InvalidPrefix(prefix));
        }
        if namespaces.iter().any(|ns| ns.prefix == prefix) {
            return Err(ConfigError::DuplicatePrefix(prefix));
        }
        namespaces.push(Namespace { prefix, uri });
    }
    Ok(namespaces)
}

/// Resolves names against the declared namespaces.
struct NameResolver<'a> {
    namespaces: &'a [Namespace],
}

impl NameResolver<'_> {
    fn check_prefix(&self, location: &str, name: &QName) -> ConfigResult<()> {
        match name.prefix() {
            Some(prefix) if !self.namespaces.iter().any(|ns| ns.prefix == prefix) => {
                Err(ConfigError::UndeclaredPrefix {
                    location: location.to_string(),
                    prefix: prefix.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn parse(&self, location: &str, value: &str) -> ConfigResult<QName> {
        QName::parse(value).ok_or_else(|| ConfigError::InvalidName {
            location: location.to_string(),
            name: value.to_string(),
        })
    }

    /// An element name; unprefixed names take `inherit`.
    fn element(&self, location: &str, value: &str, inherit: Option<&str>) -> ConfigResult<QName> {
        let name = self.parse(location, value)?.or_prefix(inherit);
        self.check_prefix(location, &name)?;
        Ok(name)
    }

    fn attributes(&self, location: &str, map: &Map<String, Value>) -> ConfigResult<Vec<(QName, String)>> {
        map.iter()
            .map(|(key, value)| {
                let name = self.parse(location, key)?;
                self.check_prefix(location, &name)?;
                Ok((name, scalar_text(location, key, value)?))
            })
            .collect()
    }

    fn static_children(
        &self,
        location: &str,
        map: &Map<String, Value>,
        parent: &QName,
    ) -> ConfigResult<Vec<StaticChild>> {
        map.iter()
            .map(|(key, value)| {
                let name = self.element(location, key, parent.prefix())?;
                let content = match value {
                    Value::Object(nested) => {
                        StaticContent::Elements(self.static_children(location, nested, &name)?)
                    }
                    other => StaticContent::Text(scalar_text(location, key, other)?),
                };
                Ok(StaticChild { name, content })
            })
            .collect()
    }

    fn rule(&self, index: usize, raw: RawRule, record: &QName) -> ConfigResult<FieldRule> {
        let transforms = match raw.transform {
            None => Vec::new(),
            Some(TransformSpec::One(name)) => vec![parse_transform(index, &name)?],
            Some(TransformSpec::Chain(names)) => names
                .iter()
                .map(|name| parse_transform(index, name))
                .collect::<ConfigResult<Vec<_>>>()?,
        };
        let is_const = transforms.contains(&Transform::Const);
        let invalid = |message: &str| ConfigError::InvalidRule {
            rule: index,
            message: message.to_string(),
        };
        if is_const && raw.value.is_none() {
            return Err(invalid("'const' transform requires a 'value'"));
        }
        if !is_const && raw.from.as_deref().map_or(true, str::is_empty) {
            return Err(invalid("'from' is required unless the transform is 'const'"));
        }
        let target = TargetPath::parse(&raw.to, record).map_err(|message| ConfigError::InvalidRule {
            rule: index,
            message,
        })?;
        let location = format!("field rule #{index} ('{}')", raw.to);
        for name in target.names() {
            self.check_prefix(&location, name)?;
        }
        Ok(FieldRule {
            from: raw.from,
            target,
            transforms,
            value: raw.value,
            check: raw.check,
        })
    }

    fn envelope(&self, raw: RawEnvelope) -> ConfigResult<EnvelopeSpec> {
        for (location, prefix) in [
            ("envelope.bizdata_prefix", &raw.bizdata_prefix),
            ("envelope.header_prefix", &raw.header_prefix),
        ] {
            self.check_prefix(location, &QName::new(prefix.as_str(), "_"))?;
        }
        Ok(EnvelopeSpec {
            attributes: self.attributes("envelope.attributes", &raw.attributes)?,
            bizdata_prefix: raw.bizdata_prefix,
            header_prefix: raw.header_prefix,
            from_lei: raw.from_lei,
            to_lei: raw.to_lei,
            message_definition: raw.message_definition,
            message_id_prefix: raw.message_id_prefix,
        })
    }
}

fn parse_transform(rule: usize, name: &str) -> ConfigResult<Transform> {
    name.parse::<Transform>()
        .map_err(|name| ConfigError::UnknownTransform { rule, name })
}

fn scalar_text(location: &str, key: &str, value: &Value) -> ConfigResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ConfigError::InvalidValue {
            location: format!("{location}.{key}"),
            message: "expected a string".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Value {
        json!({
            "namespaces": {
                "rep": "urn:iso:std:iso:20022:tech:xsd:auth.016.001.01",
                "xsi": "http://www.w3.org/2001/XMLSchema-instance"
            },
            "root": {
                "qname": "rep:Document",
                "attributes": {
                    "xsi:schemaLocation": "urn:iso:std:iso:20022:tech:xsd:auth.016.001.01 auth.016.xsd",
                    "version": "{ENV:REPORT_VERSION:1}"
                }
            },
            "record_container": "rep:FinInstrmRptgTxRpt",
            "record_element": "rep:Tx",
            "fields": [
                {"from": "tx_id", "to": "rep:New/rep:TxId", "transform": "trim"},
                {"from": "isin", "to": "New/FinInstrm/Id", "transform": ["trim", "upper"]},
                {"from": "ccy", "to": "rep:New/rep:Pric/rep:Amt@Ccy"},
                {"to": "rep:New/rep:InvstmtPtyInd", "transform": "const", "value": "true"},
                {"from": "buyer", "to": "rep:New/rep:Buyr/rep:LEI", "check": "lei"}
            ]
        })
    }

    fn load(value: &Value) -> ConfigResult<MappingConfig> {
        MappingConfig::from_json(&value.to_string())
    }

    #[test]
    fn test_load_resolves_everything() {
        let config = load(&base()).unwrap();

        assert_eq!(config.namespaces.len(), 2);
        assert_eq!(config.namespaces[0].prefix, "rep");
        assert_eq!(config.root.name, QName::new("rep", "Document"));
        // declared order kept
        assert_eq!(config.root.attributes[0].0, QName::new("xsi", "schemaLocation"));
        assert_eq!(config.root.attributes[1].0, QName::unprefixed("version"));
        assert_eq!(config.record_container, Some(QName::new("rep", "FinInstrmRptgTxRpt")));
        assert_eq!(config.record_element, QName::new("rep", "Tx"));
        assert_eq!(config.fields.len(), 5);
        assert!(config.skip_empty);
        assert!(config.pretty);
        assert!(config.envelope.is_none());
    }

    #[test]
    fn test_unprefixed_segments_inherit_prefix() {
        let config = load(&base()).unwrap();
        let rule = &config.fields[1];
        let locals: Vec<String> = rule.target.elements.iter().map(|n| n.to_string()).collect();
        assert_eq!(locals, vec!["rep:New", "rep:FinInstrm", "rep:Id"]);
        assert_eq!(rule.transforms, vec![Transform::Trim, Transform::Upper]);
    }

    #[test]
    fn test_attribute_segment() {
        let config = load(&base()).unwrap();
        let target = &config.fields[2].target;
        assert_eq!(target.elements.last(), Some(&QName::new("rep", "Amt")));
        assert_eq!(target.attribute, Some(QName::unprefixed("Ccy")));
    }

    #[test]
    fn test_const_and_check_rules() {
        let config = load(&base()).unwrap();
        assert!(config.fields[3].is_const());
        assert_eq!(config.fields[3].value.as_deref(), Some("true"));
        assert_eq!(config.fields[3].label(), "rep:New/rep:InvstmtPtyInd");
        assert_eq!(config.fields[4].check, Some(IdentifierCheck::Lei));
        assert_eq!(config.source_columns(), vec!["tx_id", "isin", "ccy", "buyer"]);
    }

    #[test]
    fn test_missing_columns() {
        let config = load(&base()).unwrap();
        let headers = vec!["tx_id".to_string(), "isin".to_string()];
        assert_eq!(config.missing_columns(&headers), vec!["ccy", "buyer"]);
    }

    #[test]
    fn test_not_json() {
        let err = MappingConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_schema_mismatch() {
        let mut value = base();
        value.as_object_mut().unwrap().remove("fields");
        let err = load(&value).unwrap_err();
        assert!(matches!(err, ConfigError::Schema { ref errors } if !errors.is_empty()));
    }

    #[test]
    fn test_empty_namespaces() {
        let mut value = base();
        value["namespaces"] = json!({});
        assert!(matches!(load(&value).unwrap_err(), ConfigError::EmptyNamespaces));
    }

    #[test]
    fn test_duplicate_prefix() {
        let text = base()
            .to_string()
            .replacen(
                "\"namespaces\":{",
                "\"namespaces\":{\"rep\":\"urn:other\",",
                1,
            );
        let err = MappingConfig::from_json(&text).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePrefix(ref p) if p == "rep"));
    }

    #[test]
    fn test_undeclared_prefixes() {
        let mut value = base();
        value["root"]["qname"] = json!("doc:Document");
        assert!(matches!(
            load(&value).unwrap_err(),
            ConfigError::UndeclaredPrefix { ref prefix, .. } if prefix == "doc"
        ));

        let mut value = base();
        value["record_element"] = json!("hdr:Tx");
        assert!(matches!(
            load(&value).unwrap_err(),
            ConfigError::UndeclaredPrefix { ref prefix, .. } if prefix == "hdr"
        ));

        let mut value = base();
        value["fields"][0]["to"] = json!("rep:New/oth:TxId");
        assert!(matches!(
            load(&value).unwrap_err(),
            ConfigError::UndeclaredPrefix { ref prefix, .. } if prefix == "oth"
        ));
    }

    #[test]
    fn test_unknown_transform_is_an_error() {
        let mut value = base();
        value["fields"][1]["transform"] = json!(["trim", "titlecase"]);
        let err = load(&value).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownTransform { rule: 2, ref name } if name == "titlecase"
        ));
    }

    #[test]
    fn test_const_without_value() {
        let mut value = base();
        value["fields"][3].as_object_mut().unwrap().remove("value");
        assert!(matches!(load(&value).unwrap_err(), ConfigError::InvalidRule { rule: 4, .. }));
    }

    #[test]
    fn test_rule_without_source() {
        let mut value = base();
        value["fields"][0].as_object_mut().unwrap().remove("from");
        assert!(matches!(load(&value).unwrap_err(), ConfigError::InvalidRule { rule: 1, .. }));
    }

    #[test]
    fn test_attribute_segment_must_be_last() {
        let mut value = base();
        value["fields"][2]["to"] = json!("rep:New@Ccy/rep:Amt");
        assert!(matches!(load(&value).unwrap_err(), ConfigError::InvalidRule { rule: 3, .. }));
    }

    #[test]
    fn test_static_children_and_default_namespace() {
        let mut value = base();
        value["root"]["_xmlns"] = json!("urn:default");
        value["root"]["children"] = json!({
            "rep:Hdr": { "Sndr": "{ENV:FIRM_LEI}", "rep:Cnt": 3 }
        });
        let config = load(&value).unwrap();

        assert_eq!(config.root.default_namespace.as_deref(), Some("urn:default"));
        let hdr = &config.root.children[0];
        assert_eq!(hdr.name, QName::new("rep", "Hdr"));
        match &hdr.content {
            StaticContent::Elements(children) => {
                assert_eq!(children[0].name, QName::new("rep", "Sndr"));
                assert_eq!(children[0].content, StaticContent::Text("{ENV:FIRM_LEI}".into()));
                assert_eq!(children[1].content, StaticContent::Text("3".into()));
            }
            other => panic!("expected nested elements, got {other:?}"),
        }
    }

    #[test]
    fn test_envelope_defaults_and_prefix_check() {
        let mut value = base();
        value["namespaces"]["head001"] = json!("urn:iso:std:iso:20022:tech:xsd:head.001.001.01");
        value["namespaces"]["head003"] = json!("urn:iso:std:iso:20022:tech:xsd:head.003.001.01");
        value["envelope"] = json!({});
        let config = load(&value).unwrap();
        let env = config.envelope.unwrap();
        assert_eq!(env.bizdata_prefix, "head003");
        assert_eq!(env.from_lei, "{ENV:FIRM_LEI}");
        assert_eq!(env.message_definition, "auth.016.001.01");

        let mut value = base();
        value["envelope"] = json!({});
        assert!(matches!(
            load(&value).unwrap_err(),
            ConfigError::UndeclaredPrefix { ref prefix, .. } if prefix == "head003"
        ));
    }

    #[test]
    fn test_child_order_keys_resolve() {
        let mut value = base();
        value["child_order"] = json!({ "rep:Tx": ["TradDt", "Qty"] });
        let config = load(&value).unwrap();
        assert_eq!(
            config.child_order.get(&QName::new("rep", "Tx")),
            Some(&vec!["TradDt".to_string(), "Qty".to_string()])
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        fs::write(&path, base().to_string()).unwrap();
        assert!(MappingConfig::load(&path).is_ok());

        let err = MappingConfig::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
