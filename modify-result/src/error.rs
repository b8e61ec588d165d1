//! Modifier errors.
use displaydoc::Display;
use thiserror::Error;

/// Errors raised while building or running a [`crate::ModifyResultTransform`].
///
/// Everything but [`ModifyResultError::Expression`] is a configuration error: it is raised while the
/// transform or the transformed schema is being built and prevents serving. Value level failures
/// (an unparseable date, a regular expression that does not match) are not errors, the original
/// value is kept instead.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModifyResultError {
    /// {modifier} modifier only supports {expected} types, field '{coordinate}' is of type '{ty}'
    UnsupportedFieldType {
        /// The modifier kind that rejected the field.
        modifier: &'static str,
        /// `Type.field` coordinate of the rejected field.
        coordinate: String,
        /// The field's original type.
        ty: String,
        /// Human readable list of the supported type kinds.
        expected: &'static str,
    },

    /// type '{0}' not found in schema
    TypeNotFound(String),

    /// invalid configuration: {0}
    InvalidConfiguration(String),

    /// field '{0}' is targeted by more than one rule
    DuplicateTarget(String),

    /// invalid regular expression '{pattern}': {reason}
    InvalidRegex {
        /// The configured pattern.
        pattern: String,
        /// Why the pattern was rejected.
        reason: String,
    },

    /// invalid date format '{0}'
    InvalidDateFormat(String),

    /// invalid date adjustment '{0}', expected '<signed integer> <unit>'
    InvalidAdjustment(String),

    /// cannot parse selections '{selections}' on type '{type_name}': {reason}
    InvalidSelections {
        /// The configured selection set.
        selections: String,
        /// The type the selections were parsed against.
        type_name: String,
        /// Parser diagnostics.
        reason: String,
    },

    /// invalid expression '{expression}': {reason}
    InvalidExpression {
        /// The configured expression source.
        expression: String,
        /// Compiler diagnostics.
        reason: String,
    },

    /// the transformed schema is invalid: {0}
    InvalidSchema(String),

    /// expression evaluation failed for field '{field}': {reason}
    Expression {
        /// The declared name of the field being rewritten.
        field: String,
        /// The evaluation error.
        reason: String,
    },
}

impl From<serde_yaml::Error> for ModifyResultError {
    fn from(error: serde_yaml::Error) -> Self {
        ModifyResultError::InvalidConfiguration(error.to_string())
    }
}

impl From<serde_json::Error> for ModifyResultError {
    fn from(error: serde_json::Error) -> Self {
        ModifyResultError::InvalidConfiguration(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_renders_unsupported_field_types() {
        let error = ModifyResultError::UnsupportedFieldType {
            modifier: "mask",
            coordinate: "User.address".to_string(),
            ty: "Address!".to_string(),
            expected: "scalar",
        };
        assert_eq!(
            error.to_string(),
            "mask modifier only supports scalar types, field 'User.address' is of type 'Address!'"
        );
    }

    #[test]
    fn it_converts_yaml_errors_into_configuration_errors() {
        let error: ModifyResultError = serde_yaml::from_str::<Vec<String>>("{")
            .unwrap_err()
            .into();
        assert!(matches!(error, ModifyResultError::InvalidConfiguration(_)));
    }
}
