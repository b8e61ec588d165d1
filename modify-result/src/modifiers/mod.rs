//! Field modifiers.
//!
//! A modifier takes part in the three phases of the transform: it may extend the schema once,
//! rewrite the definition of every field it targets, rewrite each occurrence of those fields in
//! outgoing requests and rewrite their values in results. Every hook defaults to the identity.

use std::fmt::Debug;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::ast::Type;
use apollo_compiler::executable::Field;
use apollo_compiler::executable::Selection;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::NamedType;
use apollo_compiler::schema::ScalarType;
use apollo_compiler::validation::Valid;
use serde_json_bytes::Value;

use crate::Object;
use crate::aliases::NestedAliases;
use crate::configuration::ModifierConfig;
use crate::environment::Environment;
use crate::error::ModifyResultError;

mod case;
mod coerce;
mod datetime;
mod expression;
mod mask;
mod replace;
pub(crate) mod scalars;

pub(crate) use case::Case;
pub(crate) use coerce::Coerce;
pub(crate) use datetime::DateTime;
pub(crate) use expression::Expression;
pub(crate) use mask::Mask;
pub(crate) use replace::Replace;

/// Where a field definition is being rewritten.
pub(crate) struct SchemaContext<'a> {
    /// The schema before any modifier ran. Selections are parsed against it.
    pub(crate) source: &'a Valid<Schema>,
    /// The extended schema the new field type must resolve in.
    pub(crate) schema: &'a Schema,
    /// The type declaring the field.
    pub(crate) type_name: &'a NamedType,
}

impl SchemaContext<'_> {
    pub(crate) fn coordinate(&self, field: &FieldDefinition) -> String {
        format!("{}.{}", self.type_name, field.name)
    }
}

/// Where a result value is being rewritten.
pub(crate) struct ResultContext<'a> {
    /// Declared name of the field.
    pub(crate) field: &'a str,
    /// The object holding the field.
    pub(crate) root: &'a Object,
    /// Aliases this modifier recorded while rewriting the request.
    pub(crate) aliases: &'a NestedAliases,
}

/// A rewritten field selection.
///
/// Only `field` goes through the rest of the modifier chain. Supplemental selections are added
/// next to it as they are.
#[derive(Debug)]
pub(crate) struct RequestRewrite {
    pub(crate) field: Node<Field>,
    pub(crate) supplemental: Vec<Selection>,
}

impl From<Node<Field>> for RequestRewrite {
    fn from(field: Node<Field>) -> Self {
        RequestRewrite {
            field,
            supplemental: Vec::new(),
        }
    }
}

pub(crate) trait Modifier: Debug + Send + Sync {
    /// Adds the types this modifier publishes. Must tolerate types that already exist.
    fn extend_schema(&mut self, _schema: &mut Schema) -> Result<(), ModifyResultError> {
        Ok(())
    }

    /// Rewrites the definition of a targeted field.
    fn modify_schema(
        &mut self,
        _context: &SchemaContext<'_>,
        field: FieldDefinition,
    ) -> Result<FieldDefinition, ModifyResultError> {
        Ok(field)
    }

    /// Rewrites one occurrence of a targeted field in a request.
    fn modify_request(&self, field: Node<Field>, _aliases: &mut NestedAliases) -> RequestRewrite {
        field.into()
    }

    /// Rewrites the value of a targeted field.
    fn modify_result(
        &self,
        value: Value,
        _context: &ResultContext<'_>,
    ) -> Result<Value, ModifyResultError> {
        Ok(value)
    }

    /// Run even when the current value is falsy.
    fn always_apply(&self) -> bool {
        false
    }
}

#[derive(Debug)]
pub(crate) struct PassThrough;

impl Modifier for PassThrough {}

/// Builds the modifier described by `config`.
pub(crate) fn build(
    config: &ModifierConfig,
    environment: &Environment,
) -> Result<Box<dyn Modifier>, ModifyResultError> {
    Ok(match config {
        ModifierConfig::PassThrough => Box::new(PassThrough),
        ModifierConfig::Coerce(config) => Box::new(Coerce::new(config, environment)?),
        ModifierConfig::Datetime(config) => Box::new(DateTime::new(config, environment)?),
        ModifierConfig::Mask(config) => Box::new(Mask::new(config)),
        ModifierConfig::Replace(config) => Box::new(Replace::new(config)?),
        ModifierConfig::Case(config) => Box::new(Case::new(config)),
        ModifierConfig::Expression(config) => Box::new(Expression::new(config, environment)?),
    })
}

/// Runs `modifiers` over a value, skipping falsy values for modifiers that do not always apply.
///
/// `context` builds the result context of the modifier at the given position in the chain.
pub(crate) fn apply_chain<'m, 'c>(
    modifiers: impl IntoIterator<Item = &'m dyn Modifier>,
    mut value: Value,
    mut context: impl FnMut(usize) -> ResultContext<'c>,
) -> Result<Value, ModifyResultError> {
    for (index, modifier) in modifiers.into_iter().enumerate() {
        if is_falsy(&value) && !modifier.always_apply() {
            continue;
        }
        value = modifier.modify_result(value, &context(index))?;
    }
    Ok(value)
}

/// `null`, `false`, `0` and `""`.
pub(crate) fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(boolean) => !boolean,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(string) => string.as_str().is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Renders a value as text: strings as they are, everything else as JSON.
pub(crate) fn stringify(value: &Value) -> String {
    match value {
        Value::String(string) => string.as_str().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(boolean) => boolean.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// The named type of a field, unless it is a list.
pub(crate) fn named_type(ty: &Type) -> Option<&NamedType> {
    match ty {
        Type::Named(name) | Type::NonNullNamed(name) => Some(name),
        Type::List(_) | Type::NonNullList(_) => None,
    }
}

/// Replaces a type, keeping the non-null wrapper of the original.
pub(crate) fn retarget(original: &Type, replacement: Type) -> Type {
    if original.is_non_null() {
        replacement.non_null()
    } else {
        replacement.nullable()
    }
}

/// Checks that a field is a (non-list) scalar, or an enum when `allow_enums` is set.
pub(crate) fn expect_leaf_type(
    modifier: &'static str,
    context: &SchemaContext<'_>,
    field: &FieldDefinition,
    allow_enums: bool,
) -> Result<(), ModifyResultError> {
    let is_leaf = named_type(&field.ty).is_some_and(|name| {
        match context.schema.types.get(name) {
            Some(ExtendedType::Scalar(_)) => true,
            Some(ExtendedType::Enum(_)) => allow_enums,
            _ => false,
        }
    });
    if is_leaf {
        Ok(())
    } else {
        Err(ModifyResultError::UnsupportedFieldType {
            modifier,
            coordinate: context.coordinate(field),
            ty: field.ty.to_string(),
            expected: if allow_enums { "scalar and enum" } else { "scalar" },
        })
    }
}

/// Adds a scalar type unless a type with that name exists.
pub(crate) fn add_scalar(schema: &mut Schema, name: &Name) {
    if !schema.types.contains_key(name) {
        tracing::debug!(scalar = %name, "adding scalar to schema");
        schema.types.insert(
            name.clone(),
            ExtendedType::Scalar(Node::new(ScalarType {
                description: None,
                name: name.clone(),
                directives: Default::default(),
            })),
        );
    }
}

pub(crate) fn type_name(name: &str) -> Result<Name, ModifyResultError> {
    Name::new(name).map_err(|_| ModifyResultError::TypeNotFound(name.to_string()))
}
