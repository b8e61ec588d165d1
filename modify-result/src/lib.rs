//! Declarative field modifiers for GraphQL.
//!
//! A [`ModifyResultTransform`] binds fields of schema types to chains of modifiers (type
//! coercion, date normalization, masking, regular expression replacement, case conversion and
//! computed values) and applies them in three phases:
//!
//! 1. [`ModifyResultTransform::transform_schema`] publishes the new field types, once.
//! 2. [`ModifyResultTransform::transform_request`] rewrites each outgoing query and records the
//!    aliases the client used.
//! 3. [`ModifyResultTransform::transform_result`] rewrites the values of the targeted fields in
//!    the matching response.
//!
//! ```ignore
//! let mut transform = ModifyResultTransform::builder()
//!     .configuration(Configuration::from_yaml_str(yaml)?)
//!     .build()?;
//! let schema = transform.transform_schema(&source_schema)?;
//! let aliases = transform.transform_request(&mut document);
//! // ... execute `document` ...
//! transform.transform_result(&mut response, &aliases)?;
//! ```

#![warn(
    rustdoc::broken_intra_doc_links,
    unreachable_pub,
    unreachable_patterns,
    unused,
    unused_qualifications,
    dead_code,
    while_true,
    unconditional_panic,
    clippy::all
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod aliases;
pub mod configuration;
mod environment;
mod error;
pub mod mask;
mod modifiers;
mod transform;

pub use aliases::NestedAliases;
pub use aliases::RequestAliases;
pub use configuration::Configuration;
pub use environment::Environment;
pub use error::ModifyResultError;
pub use transform::ModifyResultTransform;

pub(crate) type Object = serde_json_bytes::Map<serde_json_bytes::ByteString, serde_json_bytes::Value>;
