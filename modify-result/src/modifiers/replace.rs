use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::ast::Type;
use apollo_compiler::schema::ExtendedType;
use regex::Captures;
use regex::Regex;
use serde_json_bytes::Value;

use super::Modifier;
use super::ResultContext;
use super::SchemaContext;
use super::expect_leaf_type;
use super::retarget;
use super::stringify;
use super::type_name;
use crate::configuration::ReplaceConfig;
use crate::error::ModifyResultError;

/// A piece of the result template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    /// `$n`, kept as written when group `n` did not capture anything.
    Group { index: usize, written: String },
}

fn parse_template(template: &str) -> Vec<Part> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();
    while let Some(character) = chars.next() {
        if character != '$' || !chars.peek().is_some_and(char::is_ascii_digit) {
            literal.push(character);
            continue;
        }
        let mut digits = String::new();
        while let Some(digit) = chars.next_if(char::is_ascii_digit) {
            digits.push(digit);
        }
        let written = format!("${digits}");
        match digits.parse() {
            Ok(index) => {
                if !literal.is_empty() {
                    parts.push(Part::Literal(std::mem::take(&mut literal)));
                }
                parts.push(Part::Group { index, written });
            }
            Err(_) => literal.push_str(&written),
        }
    }
    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }
    parts
}

/// Rewrites values matching a regular expression with a `$n` template.
#[derive(Debug)]
pub(crate) struct Replace {
    pattern: Regex,
    template: Vec<Part>,
    as_type: Name,
}

impl Replace {
    pub(crate) fn new(config: &ReplaceConfig) -> Result<Self, ModifyResultError> {
        let pattern = Regex::new(&config.pattern).map_err(|error| ModifyResultError::InvalidRegex {
            pattern: config.pattern.clone(),
            reason: error.to_string(),
        })?;
        let as_type = match &config.as_type {
            Some(name) => type_name(name)?,
            None => Name::new_static_unchecked("String"),
        };
        Ok(Replace {
            pattern,
            template: parse_template(&config.result),
            as_type,
        })
    }

    fn render(&self, captures: &Captures<'_>) -> String {
        self.template
            .iter()
            .map(|part| match part {
                Part::Literal(literal) => literal.as_str(),
                Part::Group { index, written } => captures
                    .get(*index)
                    .map(|group| group.as_str())
                    .filter(|group| !group.is_empty())
                    .unwrap_or(written.as_str()),
            })
            .collect()
    }
}

impl Modifier for Replace {
    fn extend_schema(&mut self, schema: &mut Schema) -> Result<(), ModifyResultError> {
        match schema.types.get(&self.as_type) {
            Some(ExtendedType::Scalar(_) | ExtendedType::Enum(_)) => Ok(()),
            Some(_) => Err(ModifyResultError::InvalidConfiguration(format!(
                "replace result type '{}' must be a scalar or an enum",
                self.as_type
            ))),
            None => Err(ModifyResultError::TypeNotFound(self.as_type.to_string())),
        }
    }

    fn modify_schema(
        &mut self,
        context: &SchemaContext<'_>,
        mut field: FieldDefinition,
    ) -> Result<FieldDefinition, ModifyResultError> {
        expect_leaf_type("replace", context, &field, true)?;
        field.ty = retarget(&field.ty, Type::Named(self.as_type.clone()));
        Ok(field)
    }

    fn modify_result(
        &self,
        value: Value,
        _context: &ResultContext<'_>,
    ) -> Result<Value, ModifyResultError> {
        let text = stringify(&value);
        let replaced = match self.pattern.captures(&text) {
            Some(captures) => self.render(&captures),
            None => text,
        };
        Ok(Value::String(replaced.into()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json_bytes::json;

    use super::super::test_support::*;
    use super::*;

    fn replace(pattern: &str, result: &str, as_type: Option<&str>) -> Replace {
        Replace::new(&ReplaceConfig {
            pattern: pattern.to_string(),
            result: result.to_string(),
            as_type: as_type.map(str::to_string),
        })
        .unwrap()
    }

    #[rstest]
    #[case::groups(r"^(\d{3})-(\d{4})$", "$1.$2", json!("555-1234"), json!("555.1234"))]
    #[case::no_match(r"^(\d{3})-(\d{4})$", "$1.$2", json!("5551234"), json!("5551234"))]
    #[case::numbers_are_stringified(r"^(\d)(\d+)$", "$2$1", json!(1234), json!("2341"))]
    #[case::whole_match(r"\d+", "[$0]", json!("abc 42 def"), json!("[42]"))]
    #[case::unknown_group(r"^(a)$", "$1$2", json!("a"), json!("a$2"))]
    #[case::empty_group(r"^(a)(b?)$", "$2-$1", json!("a"), json!("$2-a"))]
    #[case::dollar_without_digits(r"^(a)$", "$$1 $", json!("a"), json!("$a $"))]
    fn it_replaces_values(
        #[case] pattern: &str,
        #[case] result: &str,
        #[case] value: Value,
        #[case] expected: Value,
    ) {
        let modifier = replace(pattern, result, None);
        assert_eq!(super::super::test_support::result(&modifier, value).unwrap(), expected);
    }

    #[test]
    fn it_rejects_invalid_patterns() {
        let error = Replace::new(&ReplaceConfig {
            pattern: "(".to_string(),
            result: String::new(),
            as_type: None,
        })
        .unwrap_err();
        assert!(matches!(error, ModifyResultError::InvalidRegex { .. }));
    }

    #[test]
    fn it_publishes_the_result_type() {
        let mut modifier = replace("a", "b", None);
        assert_eq!(
            modify_user_field(&mut modifier, "phone").unwrap().ty.to_string(),
            "String!"
        );
        let mut modifier = replace("a", "b", Some("Role"));
        assert_eq!(
            modify_user_field(&mut modifier, "name").unwrap().ty.to_string(),
            "Role"
        );
        let mut modifier = replace("a", "b", None);
        assert_eq!(
            modify_user_field(&mut modifier, "role").unwrap().ty.to_string(),
            "String"
        );
    }

    #[rstest]
    #[case::unknown(Some("Nope"))]
    #[case::object(Some("Address"))]
    fn it_rejects_invalid_result_types(#[case] as_type: Option<&str>) {
        let mut modifier = replace("a", "b", as_type);
        let error = modify_user_field(&mut modifier, "name").unwrap_err();
        assert!(matches!(
            error,
            ModifyResultError::TypeNotFound(_) | ModifyResultError::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn it_rejects_object_fields() {
        let mut modifier = replace("a", "b", None);
        let error = modify_user_field(&mut modifier, "address").unwrap_err();
        assert!(matches!(
            error,
            ModifyResultError::UnsupportedFieldType {
                modifier: "replace",
                ..
            }
        ));
    }
}
