use apollo_compiler::Name;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::ast::Type;
use serde_json_bytes::Value;

use super::Modifier;
use super::ResultContext;
use super::SchemaContext;
use super::expect_leaf_type;
use super::retarget;
use super::stringify;
use crate::configuration::MaskConfig;
use crate::error::ModifyResultError;
use crate::mask::MaskOptions;
use crate::mask::Pattern;

/// Formats values with a [mask pattern](crate::mask) and publishes them as `String`.
#[derive(Debug)]
pub(crate) struct Mask {
    pattern: Pattern,
    options: MaskOptions,
}

impl Mask {
    pub(crate) fn new(config: &MaskConfig) -> Self {
        Mask {
            pattern: Pattern::parse(&config.mask),
            options: MaskOptions {
                reverse: config.reverse,
                use_defaults: true,
            },
        }
    }
}

impl Modifier for Mask {
    fn modify_schema(
        &mut self,
        context: &SchemaContext<'_>,
        mut field: FieldDefinition,
    ) -> Result<FieldDefinition, ModifyResultError> {
        expect_leaf_type("mask", context, &field, false)?;
        field.ty = retarget(&field.ty, Type::Named(Name::new_static_unchecked("String")));
        Ok(field)
    }

    fn modify_result(
        &self,
        value: Value,
        _context: &ResultContext<'_>,
    ) -> Result<Value, ModifyResultError> {
        let masked = self.pattern.process(&stringify(&value), self.options);
        Ok(Value::String(masked.result.into()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json_bytes::json;

    use super::super::test_support::*;
    use super::*;

    fn mask(pattern: &str, reverse: bool) -> Mask {
        Mask::new(&MaskConfig {
            mask: pattern.to_string(),
            reverse,
        })
    }

    #[rstest]
    #[case::phone("(000) 000-0000", false, json!("5551234567"), json!("(555) 123-4567"))]
    #[case::numbers_are_stringified("000-000", false, json!(1234567), json!("123-456"))]
    #[case::short_input_uses_defaults("000-000", false, json!("12"), json!("120-000"))]
    #[case::card_number("****-****-****-0000", true, json!("4111111111111111"), json!("****-****-****-1111"))]
    #[case::amount("#,##0.00", true, json!("123456"), json!("1,234.56"))]
    fn it_masks_values(
        #[case] pattern: &str,
        #[case] reverse: bool,
        #[case] value: Value,
        #[case] expected: Value,
    ) {
        assert_eq!(result(&mask(pattern, reverse), value).unwrap(), expected);
    }

    #[test]
    fn it_publishes_strings() {
        let mut modifier = mask("000", false);
        assert_eq!(
            modify_user_field(&mut modifier, "phone").unwrap().ty.to_string(),
            "String!"
        );
        assert_eq!(
            modify_user_field(&mut modifier, "id").unwrap().ty.to_string(),
            "String!"
        );
    }

    #[rstest]
    #[case::object("address")]
    #[case::list("tags")]
    #[case::enumeration("role")]
    fn it_rejects_non_scalar_fields(#[case] field: &str) {
        let mut modifier = mask("000", false);
        let error = modify_user_field(&mut modifier, field).unwrap_err();
        assert!(matches!(
            error,
            ModifyResultError::UnsupportedFieldType {
                modifier: "mask",
                expected: "scalar",
                ..
            }
        ));
    }
}
