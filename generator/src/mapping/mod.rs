//! Mapping layer: configuration, field transforms, macros and the row mapper.
//!
//! ```text
//! mapping.json ──▶ MappingConfig ──┐
//!                                  ├──▶ FieldMapper ──▶ XmlNode per row
//! Row ─────────────────────────────┘
//! ```

pub mod config;
pub mod macros;
pub mod mapper;
pub mod transforms;

pub use config::{
    EnvelopeSpec, FieldRule, IdentifierCheck, MappingConfig, Namespace, RootSpec, StaticChild,
    StaticContent, TargetPath,
};
pub use macros::{resolve, resolve_lei, Macro};
pub use mapper::FieldMapper;
pub use transforms::{apply_chain, transforms_description, Transform};
