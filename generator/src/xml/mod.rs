//! XML tree, document builder and serializer.

pub mod builder;
pub mod node;

pub use builder::{build, Document, DocumentBuilder, NamespaceDecl};
pub use node::{invalid_xml_char, is_xml_char, is_xml_name, QName, XmlNode};
