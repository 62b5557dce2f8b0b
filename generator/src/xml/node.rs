//! Intermediate XML tree.
//!
//! Record mapping produces [`XmlNode`] trees; the builder only assembles and
//! serializes them.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("valid name pattern"));

/// Whether `value` is usable as an XML name part (prefix or local name).
pub fn is_xml_name(value: &str) -> bool {
    NAME_PATTERN.is_match(value)
}

/// Whether `c` may appear in an XML 1.0 document.
pub fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

/// First character of `value` that XML 1.0 does not allow.
pub fn invalid_xml_char(value: &str) -> Option<char> {
    value.chars().find(|&c| !is_xml_char(c))
}

// =============================================================================
// Qualified Name
// =============================================================================

/// An element or attribute name, optionally prefixed (`prefix:local`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    prefix: Option<String>,
    local: String,
}

impl QName {
    /// A prefixed name.
    pub fn new(prefix: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            local: local.into(),
        }
    }

    /// A name without prefix.
    pub fn unprefixed(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
        }
    }

    /// Parse `prefix:local` or `local`.
    ///
    /// Returns `None` when either part is not a valid XML name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.split_once(':') {
            Some((prefix, local)) if is_xml_name(prefix) && is_xml_name(local) => {
                Some(Self::new(prefix, local))
            }
            Some(_) => None,
            None if is_xml_name(value) => Some(Self::unprefixed(value)),
            None => None,
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    /// This name, given `prefix` if it has none.
    pub fn or_prefix(self, prefix: Option<&str>) -> Self {
        match (self.prefix, prefix) {
            (None, Some(p)) => Self::new(p, self.local),
            (own, _) => Self {
                prefix: own,
                local: self.local,
            },
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.local),
            None => f.write_str(&self.local),
        }
    }
}

impl FromStr for QName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid qualified name '{s}'"))
    }
}

// =============================================================================
// Node
// =============================================================================

/// Generic element: name, ordered attributes, optional text, ordered children.
///
/// Text and children may coexist; text is written before the children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    pub name: QName,
    pub attributes: Vec<(QName, String)>,
    pub text: Option<String>,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// Set an attribute. An existing attribute keeps its position and takes
    /// the new value.
    pub fn set_attribute(&mut self, name: QName, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn attribute(&self, name: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// First child with the given name.
    pub fn child(&self, name: &QName) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == *name)
    }

    pub fn child_mut(&mut self, name: &QName) -> Option<&mut XmlNode> {
        self.children.iter_mut().find(|c| c.name == *name)
    }

    /// Follow a path of child names from this node.
    pub fn descendant(&self, path: &[QName]) -> Option<&XmlNode> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }

    pub fn descendant_mut(&mut self, path: &[QName]) -> Option<&mut XmlNode> {
        path.iter().try_fold(self, |node, name| node.child_mut(name))
    }

    /// Return the first child named `name`, creating it if needed.
    ///
    /// A new child is placed according to `order` (local names in sequence
    /// order): before the first existing sibling ranked after it. Names not
    /// in `order` are appended.
    pub fn ensure_child(&mut self, name: &QName, order: Option<&[String]>) -> &mut XmlNode {
        let index = match self.children.iter().position(|c| c.name == *name) {
            Some(index) => index,
            None => {
                let index = self.insertion_index(name, order);
                self.children.insert(index, XmlNode::new(name.clone()));
                index
            }
        };
        &mut self.children[index]
    }

    /// Walk `path`, creating missing elements, and return the last one.
    pub fn ensure_path(
        &mut self,
        path: &[QName],
        child_order: &HashMap<QName, Vec<String>>,
    ) -> &mut XmlNode {
        let mut current = self;
        for name in path {
            let order = child_order.get(&current.name).map(Vec::as_slice);
            current = current.ensure_child(name, order);
        }
        current
    }

    fn insertion_index(&self, name: &QName, order: Option<&[String]>) -> usize {
        let end = self.children.len();
        let Some(order) = order else {
            return end;
        };
        let rank = |local: &str| order.iter().position(|n| n == local);
        let Some(own) = rank(name.local()) else {
            return end;
        };
        self.children
            .iter()
            .position(|c| rank(c.name.local()).is_some_and(|r| r > own))
            .unwrap_or(end)
    }

    /// Every qualified name in this subtree, elements and attributes,
    /// depth-first.
    pub fn names(&self) -> Vec<&QName> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a QName>) {
        out.push(&self.name);
        out.extend(self.attributes.iter().map(|(n, _)| n));
        for child in &self.children {
            child.collect_names(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(value: &str) -> QName {
        QName::parse(value).unwrap()
    }

    #[test]
    fn test_qname_parse() {
        assert_eq!(q("rep:Tx"), QName::new("rep", "Tx"));
        assert_eq!(q("Tx"), QName::unprefixed("Tx"));
        assert_eq!(q("rep:Tx").to_string(), "rep:Tx");
        assert!(QName::parse("").is_none());
        assert!(QName::parse("rep:").is_none());
        assert!(QName::parse("a:b:c").is_none());
        assert!(QName::parse("1abc").is_none());
    }

    #[test]
    fn test_xml_chars() {
        assert_eq!(invalid_xml_char("Société\tA\r\n"), None);
        assert_eq!(invalid_xml_char("X\u{1}Y"), Some('\u{1}'));
        assert_eq!(invalid_xml_char("\u{0}"), Some('\u{0}'));
        assert_eq!(invalid_xml_char("\u{FFFE}"), Some('\u{FFFE}'));
        assert!(is_xml_char('\u{1F600}'));
    }

    #[test]
    fn test_or_prefix() {
        assert_eq!(q("Tx").or_prefix(Some("rep")), q("rep:Tx"));
        assert_eq!(q("hdr:Tx").or_prefix(Some("rep")), q("hdr:Tx"));
        assert_eq!(q("Tx").or_prefix(None), q("Tx"));
    }

    #[test]
    fn test_set_attribute_last_write_wins_in_place() {
        let mut node = XmlNode::new(q("Amt"));
        node.set_attribute(q("Ccy"), "EUR");
        node.set_attribute(q("Other"), "x");
        node.set_attribute(q("Ccy"), "USD");

        assert_eq!(node.attribute(&q("Ccy")), Some("USD"));
        assert_eq!(node.attributes[0].0, q("Ccy"));
        assert_eq!(node.attributes.len(), 2);
    }

    #[test]
    fn test_ensure_path_reuses_existing_elements() {
        let mut root = XmlNode::new(q("rep:Tx"));
        let order = HashMap::new();
        root.ensure_path(&[q("rep:New"), q("rep:TxId")], &order).text = Some("1".into());
        root.ensure_path(&[q("rep:New"), q("rep:ExctgPty")], &order).text = Some("2".into());

        assert_eq!(root.children.len(), 1);
        let new = root.child(&q("rep:New")).unwrap();
        assert_eq!(new.children.len(), 2);
        assert_eq!(
            root.descendant(&[q("rep:New"), q("rep:ExctgPty")]).unwrap().text.as_deref(),
            Some("2")
        );
    }

    #[test]
    fn test_ensure_child_respects_order() {
        let mut order = HashMap::new();
        order.insert(
            q("rep:Tx"),
            vec!["TradDt".to_string(), "Qty".to_string(), "TradVn".to_string()],
        );
        let mut tx = XmlNode::new(q("rep:Tx"));
        tx.ensure_path(&[q("rep:TradVn")], &order);
        tx.ensure_path(&[q("rep:Extra")], &order);
        tx.ensure_path(&[q("rep:TradDt")], &order);
        tx.ensure_path(&[q("rep:Qty")], &order);

        let locals: Vec<&str> = tx.children.iter().map(|c| c.name.local()).collect();
        assert_eq!(locals, vec!["TradDt", "Qty", "TradVn", "Extra"]);
    }

    #[test]
    fn test_names_cover_attributes() {
        let node = XmlNode::new(q("a:Root"))
            .with_attribute(q("b:attr"), "v")
            .with_child(XmlNode::new(q("c:Child")));
        let names: Vec<String> = node.names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["a:Root", "b:attr", "c:Child"]);
    }
}
