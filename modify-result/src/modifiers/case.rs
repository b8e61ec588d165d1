use apollo_compiler::Name;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::ast::Type;
use heck::ToKebabCase;
use heck::ToLowerCamelCase;
use heck::ToShoutySnakeCase;
use heck::ToSnakeCase;
use heck::ToTitleCase;
use heck::ToTrainCase;
use heck::ToUpperCamelCase;
use serde_json_bytes::Value;

use super::Modifier;
use super::ResultContext;
use super::SchemaContext;
use super::expect_leaf_type;
use super::retarget;
use super::stringify;
use crate::configuration::CaseConfig;
use crate::configuration::CaseKind;
use crate::error::ModifyResultError;

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercase words, as heck splits them.
fn words(text: &str) -> Vec<String> {
    text.to_snake_case()
        .split('_')
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn convert(kind: CaseKind, text: &str) -> String {
    // Named conventions start from lowercase text.
    let lower = text.to_lowercase();
    match kind {
        CaseKind::Upper => text.to_uppercase(),
        CaseKind::Lower => lower,
        CaseKind::Camel => lower.to_lower_camel_case(),
        CaseKind::Pascal => lower.to_upper_camel_case(),
        CaseKind::Snake => lower.to_snake_case(),
        CaseKind::Kebab => lower.to_kebab_case(),
        CaseKind::Constant => lower.to_shouty_snake_case(),
        CaseKind::Train => lower.to_train_case(),
        CaseKind::Capital => lower.to_title_case(),
        CaseKind::Dot => words(&lower).join("."),
        CaseKind::Path => words(&lower).join("/"),
        CaseKind::No => words(&lower).join(" "),
        CaseKind::Sentence => {
            let mut words = words(&lower);
            if let Some(first) = words.first_mut() {
                *first = capitalize(first);
            }
            words.join(" ")
        }
        CaseKind::PascalSnake => words(&lower)
            .iter()
            .map(|word| capitalize(word))
            .collect::<Vec<_>>()
            .join("_"),
    }
}

/// Changes the case of values and publishes them as `String`.
#[derive(Debug)]
pub(crate) struct Case {
    kind: CaseKind,
    prefix: String,
    suffix: String,
}

impl Case {
    pub(crate) fn new(config: &CaseConfig) -> Self {
        Case {
            kind: config.case,
            prefix: config.prefix.clone().unwrap_or_default(),
            suffix: config.suffix.clone().unwrap_or_default(),
        }
    }
}

impl Modifier for Case {
    fn modify_schema(
        &mut self,
        context: &SchemaContext<'_>,
        mut field: FieldDefinition,
    ) -> Result<FieldDefinition, ModifyResultError> {
        expect_leaf_type("case", context, &field, true)?;
        field.ty = retarget(&field.ty, Type::Named(Name::new_static_unchecked("String")));
        Ok(field)
    }

    fn modify_result(
        &self,
        value: Value,
        _context: &ResultContext<'_>,
    ) -> Result<Value, ModifyResultError> {
        let wrapped = format!("{}{}{}", self.prefix, stringify(&value), self.suffix);
        Ok(Value::String(convert(self.kind, &wrapped).into()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json_bytes::json;

    use super::super::test_support::*;
    use super::*;

    fn case_modifier(kind: CaseKind, prefix: Option<&str>, suffix: Option<&str>) -> Case {
        Case::new(&CaseConfig {
            case: kind,
            prefix: prefix.map(str::to_string),
            suffix: suffix.map(str::to_string),
        })
    }

    #[rstest]
    #[case(CaseKind::Upper, "hello_world", "HELLO_WORLD")]
    #[case(CaseKind::Lower, "Hello World", "hello world")]
    #[case(CaseKind::Camel, "hello_world", "helloWorld")]
    #[case(CaseKind::Pascal, "hello_world", "HelloWorld")]
    #[case(CaseKind::Snake, "hello world", "hello_world")]
    #[case(CaseKind::Kebab, "hello_world", "hello-world")]
    #[case(CaseKind::Constant, "hello world", "HELLO_WORLD")]
    #[case(CaseKind::Train, "hello_world", "Hello-World")]
    #[case(CaseKind::Capital, "hello_world", "Hello World")]
    #[case(CaseKind::Dot, "hello world", "hello.world")]
    #[case(CaseKind::Path, "hello-world", "hello/world")]
    #[case(CaseKind::No, "hello_world", "hello world")]
    #[case(CaseKind::Sentence, "hello_world", "Hello world")]
    #[case(CaseKind::PascalSnake, "hello world", "Hello_World")]
    // Named conventions lowercase first, so camel humps are lost.
    #[case(CaseKind::Snake, "helloWorld", "helloworld")]
    fn it_converts_case(#[case] kind: CaseKind, #[case] value: &str, #[case] expected: &str) {
        assert_eq!(
            result(&case_modifier(kind, None, None), json!(value)).unwrap(),
            json!(expected)
        );
    }

    #[test]
    fn it_wraps_before_converting() {
        let modifier = case_modifier(CaseKind::Upper, Some("ID-"), None);
        assert_eq!(
            result(&modifier, json!("hello_world")).unwrap(),
            json!("ID-HELLO_WORLD")
        );
        let modifier = case_modifier(CaseKind::Snake, Some("user "), Some(" id"));
        assert_eq!(result(&modifier, json!(42)).unwrap(), json!("user_42_id"));
    }

    #[test]
    fn it_publishes_strings() {
        let mut modifier = case_modifier(CaseKind::Upper, None, None);
        assert_eq!(
            modify_user_field(&mut modifier, "role").unwrap().ty.to_string(),
            "String"
        );
        assert_eq!(
            modify_user_field(&mut modifier, "id").unwrap().ty.to_string(),
            "String!"
        );
    }

    #[test]
    fn it_rejects_object_fields() {
        let mut modifier = case_modifier(CaseKind::Upper, None, None);
        let error = modify_user_field(&mut modifier, "address").unwrap_err();
        assert_eq!(
            error.to_string(),
            "case modifier only supports scalar and enum types, field 'User.address' is of type 'Address'"
        );
    }
}
