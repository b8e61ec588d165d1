//! The transform: runs every configured modifier chain over schemas, requests and results.

use std::collections::HashMap;
use std::collections::HashSet;

use apollo_compiler::ExecutableDocument;
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::ast::Type;
use apollo_compiler::executable::Field;
use apollo_compiler::executable::Selection;
use apollo_compiler::executable::SelectionSet;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::Valid;
use serde_json_bytes::ByteString;
use serde_json_bytes::Value;

use crate::Object;
use crate::aliases::ModifierId;
use crate::aliases::NestedAliases;
use crate::aliases::RequestAliases;
use crate::configuration::Configuration;
use crate::environment::Environment;
use crate::error::ModifyResultError;
use crate::modifiers::Modifier;
use crate::modifiers::ResultContext;
use crate::modifiers::SchemaContext;
use crate::modifiers::apply_chain;
use crate::modifiers::build;
use crate::modifiers::type_name;

const TYPENAME: &str = "__typename";

/// Fields of one type bound to a modifier chain.
#[derive(Debug)]
struct TargetRule {
    type_name: Name,
    fields: Vec<Name>,
    modifiers: Vec<Box<dyn Modifier>>,
}

impl TargetRule {
    /// Whether some modifier of the chain produces values for absent fields.
    fn always_applies(&self) -> bool {
        self.modifiers.iter().any(|modifier| modifier.always_apply())
    }
}

/// Applies configured modifiers to a GraphQL schema, the requests made against the transformed
/// schema and the results they produce.
///
/// The three phases must run in order for a given request: [`Self::transform_request`] returns
/// the aliases [`Self::transform_result`] needs to find the values it rewrites.
#[derive(Debug)]
pub struct ModifyResultTransform {
    rules: Vec<TargetRule>,
    /// Rule index by type and field name.
    targets: HashMap<Name, HashMap<Name, usize>>,
    /// Types whose selection sets must carry `__typename`.
    discriminated: HashSet<Name>,
    typename_definition: Node<FieldDefinition>,
    no_aliases: NestedAliases,
}

#[buildstructor::buildstructor]
impl ModifyResultTransform {
    /// Builds every modifier of `configuration`.
    ///
    /// Regular expressions, date formats, adjustments and expressions are checked here.
    pub fn new(
        configuration: Configuration,
        environment: Environment,
    ) -> Result<Self, ModifyResultError> {
        let mut rules = Vec::with_capacity(configuration.rules.len());
        let mut targets: HashMap<Name, HashMap<Name, usize>> = HashMap::new();
        for (index, rule) in configuration.rules.iter().enumerate() {
            let rule_type = type_name(&rule.type_name)?;
            let mut fields = Vec::with_capacity(rule.fields.len());
            for field in &rule.fields {
                let field = Name::new(field).map_err(|_| {
                    ModifyResultError::InvalidConfiguration(format!(
                        "'{field}' is not a valid field name"
                    ))
                })?;
                let previous = targets
                    .entry(rule_type.clone())
                    .or_default()
                    .insert(field.clone(), index);
                if previous.is_some() {
                    return Err(ModifyResultError::DuplicateTarget(format!(
                        "{rule_type}.{field}"
                    )));
                }
                fields.push(field);
            }
            let modifiers = rule
                .modifiers
                .iter()
                .map(|modifier| build(modifier, &environment))
                .collect::<Result<Vec<_>, _>>()?;
            tracing::debug!(
                type_name = %rule_type,
                fields = ?rule.fields,
                modifiers = ?rule.modifiers.iter().map(|modifier| modifier.kind()).collect::<Vec<_>>(),
                "configured target rule"
            );
            rules.push(TargetRule {
                type_name: rule_type,
                fields,
                modifiers,
            });
        }

        Ok(ModifyResultTransform {
            discriminated: targets.keys().cloned().collect(),
            targets,
            rules,
            typename_definition: Node::new(FieldDefinition {
                description: None,
                name: Name::new_static_unchecked(TYPENAME),
                arguments: Vec::new(),
                ty: Type::NonNullNamed(Name::new_static_unchecked("String")),
                directives: Default::default(),
            }),
            no_aliases: NestedAliases::default(),
        })
    }

    /// Builder entry point. The environment defaults to a snapshot of the process environment.
    #[builder(entry = "builder", exit = "build", visibility = "pub")]
    fn configured(
        configuration: Configuration,
        environment: Option<Environment>,
    ) -> Result<Self, ModifyResultError> {
        Self::new(
            configuration,
            environment.unwrap_or_else(Environment::capture),
        )
    }

    /// Rewrites the definitions of every targeted field.
    ///
    /// Every modifier first extends the schema with the types it publishes, in configuration
    /// order. Targeted fields then go through their modifier chain. Fields missing from the schema
    /// are skipped with a warning. The result is validated again.
    pub fn transform_schema(
        &mut self,
        source: &Valid<Schema>,
    ) -> Result<Valid<Schema>, ModifyResultError> {
        let mut schema = source.clone().into_inner();
        for modifier in self.rules.iter_mut().flat_map(|rule| rule.modifiers.iter_mut()) {
            modifier.extend_schema(&mut schema)?;
        }

        let mut definitions = Vec::new();
        for rule in &mut self.rules {
            let type_name = &rule.type_name;
            let modifiers = &mut rule.modifiers;
            if !matches!(
                schema.types.get(type_name),
                Some(ExtendedType::Object(_) | ExtendedType::Interface(_))
            ) {
                return Err(ModifyResultError::TypeNotFound(type_name.to_string()));
            }
            let context = SchemaContext {
                source,
                schema: &schema,
                type_name,
            };
            for field in &rule.fields {
                let Ok(definition) = schema.type_field(type_name, field) else {
                    tracing::warn!(type_name = %type_name, field = %field, "targeted field not found in schema");
                    continue;
                };
                let mut definition = FieldDefinition::clone(definition);
                for modifier in modifiers.iter_mut() {
                    definition = modifier.modify_schema(&context, definition)?;
                }
                definitions.push((type_name.clone(), definition));
            }
        }

        for (type_name, definition) in definitions {
            let fields = match schema.types.get_mut(&type_name) {
                Some(ExtendedType::Object(object)) => &mut object.make_mut().fields,
                Some(ExtendedType::Interface(interface)) => &mut interface.make_mut().fields,
                _ => continue,
            };
            if let Some(field) = fields.get_mut(&definition.name) {
                *field.make_mut() = definition;
            }
        }

        self.discover_abstract_types(source);

        schema
            .validate()
            .map_err(|errors| ModifyResultError::InvalidSchema(errors.errors.to_string()))
    }

    /// Interfaces and unions a targeted type belongs to also need `__typename` in requests.
    fn discover_abstract_types(&mut self, schema: &Schema) {
        for type_name in self.targets.keys() {
            for (name, ty) in &schema.types {
                let contains_target = match ty {
                    ExtendedType::Union(union) => union.members.contains(type_name),
                    ExtendedType::Interface(_) => schema
                        .get_object(type_name)
                        .is_some_and(|object| object.implements_interfaces.contains(name)),
                    _ => false,
                };
                if contains_target {
                    self.discriminated.insert(name.clone());
                }
            }
        }
    }

    /// Rewrites every occurrence of a targeted field in the operations and fragments of
    /// `document`, and returns the aliases the result phase needs.
    pub fn transform_request(&self, document: &mut ExecutableDocument) -> RequestAliases {
        let mut aliases = RequestAliases::default();
        let operations = document
            .operations
            .anonymous
            .iter_mut()
            .chain(document.operations.named.values_mut());
        for operation in operations {
            self.rewrite_selection_set(&mut operation.make_mut().selection_set, &mut aliases);
        }
        for fragment in document.fragments.values_mut() {
            self.rewrite_selection_set(&mut fragment.make_mut().selection_set, &mut aliases);
        }
        aliases
    }

    fn rewrite_selection_set(&self, selection_set: &mut SelectionSet, aliases: &mut RequestAliases) {
        let targets = self.targets.get(&selection_set.ty);
        let mut selections = Vec::with_capacity(selection_set.selections.len());
        for selection in selection_set.selections.drain(..) {
            match selection {
                Selection::Field(field) => {
                    let rule = targets.and_then(|targets| targets.get(&field.name));
                    let (mut field, supplemental) = match rule {
                        Some(&rule) => {
                            aliases.record(&selection_set.ty, &field);
                            self.rewrite_field(rule, field, aliases)
                        }
                        None => (field, Vec::new()),
                    };
                    if !field.selection_set.selections.is_empty() {
                        self.rewrite_selection_set(&mut field.make_mut().selection_set, aliases);
                    }
                    selections.push(Selection::Field(field));
                    selections.extend(supplemental);
                }
                Selection::InlineFragment(mut fragment) => {
                    self.rewrite_selection_set(&mut fragment.make_mut().selection_set, aliases);
                    selections.push(Selection::InlineFragment(fragment));
                }
                spread @ Selection::FragmentSpread(_) => selections.push(spread),
            }
        }
        selection_set.selections = selections;

        if self.discriminated.contains(&selection_set.ty) && !has_typename(selection_set) {
            selection_set.selections.push(Selection::Field(Node::new(Field::new(
                Name::new_static_unchecked(TYPENAME),
                self.typename_definition.clone(),
            ))));
        }
    }

    /// Runs a field through the request hook of its modifier chain.
    fn rewrite_field(
        &self,
        rule: usize,
        mut field: Node<Field>,
        aliases: &mut RequestAliases,
    ) -> (Node<Field>, Vec<Selection>) {
        let mut supplemental = Vec::new();
        for (index, modifier) in self.rules[rule].modifiers.iter().enumerate() {
            let nested = aliases.nested_mut(ModifierId {
                rule,
                modifier: index,
            });
            let rewrite = modifier.modify_request(field, nested);
            field = rewrite.field;
            supplemental.extend(rewrite.supplemental);
        }
        (field, supplemental)
    }

    /// Rewrites the values of targeted fields in a response, objects before their children.
    ///
    /// Objects are matched to rules through their `__typename`; objects without one are only
    /// traversed. Targeted fields absent from an object stay absent, unless the request selected
    /// them and their chain holds a modifier that always applies: the chain then runs from `null`.
    pub fn transform_result(
        &self,
        value: &mut Value,
        aliases: &RequestAliases,
    ) -> Result<(), ModifyResultError> {
        match value {
            Value::Object(object) => {
                self.rewrite_object(object, aliases)?;
                for (_, child) in object.iter_mut() {
                    self.transform_result(child, aliases)?;
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.transform_result(item, aliases)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn rewrite_object(
        &self,
        object: &mut Object,
        aliases: &RequestAliases,
    ) -> Result<(), ModifyResultError> {
        let Some(type_name) = object.get(TYPENAME).and_then(Value::as_str) else {
            return Ok(());
        };
        let Some(targets) = self.targets.get(type_name) else {
            return Ok(());
        };
        let type_name = type_name.to_string();
        let mut rules: Vec<usize> = targets.values().copied().collect();
        rules.sort_unstable();
        rules.dedup();

        for rule in rules {
            for field in &self.rules[rule].fields {
                let key = aliases.response_key(&type_name, field);
                let value = match object.get(key) {
                    Some(value) => value.clone(),
                    // Selected fields the response left out can still be computed.
                    None if self.rules[rule].always_applies()
                        && aliases.selected(&type_name, field) =>
                    {
                        Value::Null
                    }
                    None => continue,
                };
                let value = self.apply_rule(rule, field, value, object, aliases)?;
                tracing::trace!(type_name = %type_name, field = %field, key, "rewrote field value");
                object.insert(ByteString::from(key), value);
            }
        }
        Ok(())
    }

    fn apply_rule(
        &self,
        rule: usize,
        field: &str,
        value: Value,
        root: &Object,
        aliases: &RequestAliases,
    ) -> Result<Value, ModifyResultError> {
        apply_chain(
            self.rules[rule]
                .modifiers
                .iter()
                .map(|modifier| modifier.as_ref()),
            value,
            |index| ResultContext {
                field,
                root,
                aliases: aliases
                    .nested(ModifierId {
                        rule,
                        modifier: index,
                    })
                    .unwrap_or(&self.no_aliases),
            },
        )
    }
}

fn has_typename(selection_set: &SelectionSet) -> bool {
    selection_set.selections.iter().any(|selection| {
        matches!(selection, Selection::Field(field) if field.name == TYPENAME && field.alias.is_none())
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json_bytes::json;
    use test_log::test;

    use super::*;
    use crate::modifiers::test_support::SCHEMA;

    fn transform(yaml: &str) -> ModifyResultTransform {
        ModifyResultTransform::builder()
            .configuration(Configuration::from_yaml_str(yaml).unwrap())
            .environment(Environment::default())
            .build()
            .unwrap()
    }

    fn source() -> Valid<Schema> {
        Schema::parse_and_validate(SCHEMA, "schema.graphql").unwrap()
    }

    fn request(
        transform: &ModifyResultTransform,
        schema: &Valid<Schema>,
        query: &str,
    ) -> (String, RequestAliases) {
        let mut document =
            ExecutableDocument::parse_and_validate(schema, query, "query.graphql")
                .unwrap()
                .into_inner();
        let aliases = transform.transform_request(&mut document);
        (document.serialize().no_indent().to_string(), aliases)
    }

    fn normalized(schema: &Valid<Schema>, query: &str) -> String {
        ExecutableDocument::parse_and_validate(schema, query, "expected.graphql")
            .unwrap()
            .serialize()
            .no_indent()
            .to_string()
    }

    const UPPER_NAME: &str = r#"
rules:
  - type_name: User
    fields: [name]
    modifiers:
      - kind: case
        case: upper
"#;

    #[test]
    fn it_rejects_duplicate_targets() {
        let configuration = Configuration::from_yaml_str(
            r#"
rules:
  - type_name: User
    fields: [name]
  - type_name: User
    fields: [id, name]
"#,
        )
        .unwrap();
        let error = ModifyResultTransform::new(configuration, Environment::default()).unwrap_err();
        assert_eq!(error, ModifyResultError::DuplicateTarget("User.name".to_string()));
    }

    #[test]
    fn it_rejects_unknown_rule_types() {
        let mut transform = transform(
            r#"
rules:
  - type_name: Account
    fields: [name]
"#,
        );
        assert_eq!(
            transform.transform_schema(&source()).unwrap_err(),
            ModifyResultError::TypeNotFound("Account".to_string())
        );
    }

    #[test]
    fn it_skips_missing_fields() {
        let mut transform = transform(
            r#"
rules:
  - type_name: User
    fields: [nickname, name]
    modifiers:
      - kind: case
        case: upper
"#,
        );
        let schema = transform.transform_schema(&source()).unwrap();
        assert!(schema.type_field("User", "name").is_ok());
    }

    #[test]
    fn it_folds_schema_changes_through_the_chain() {
        let mut transform = transform(
            r#"
rules:
  - type_name: User
    fields: [createdAt]
    modifiers:
      - kind: datetime
        to: utc
      - kind: replace
        match: "^(\\d{4})"
        result: "$1"
        as: DateTime
"#,
        );
        let schema = transform.transform_schema(&source()).unwrap();
        assert_eq!(
            schema.type_field("User", "createdAt").unwrap().ty.to_string(),
            "DateTime"
        );
    }

    #[test]
    fn it_aborts_on_unsupported_field_types() {
        let mut transform = transform(
            r#"
rules:
  - type_name: User
    fields: [address]
    modifiers:
      - kind: mask
        mask: "000"
"#,
        );
        assert!(matches!(
            transform.transform_schema(&source()).unwrap_err(),
            ModifyResultError::UnsupportedFieldType { modifier: "mask", .. }
        ));
    }

    #[test]
    fn it_adds_typename_to_targeted_selection_sets() {
        let mut transform = transform(UPPER_NAME);
        let schema = transform.transform_schema(&source()).unwrap();
        let (query, _) = request(&transform, &schema, "{ user { name } users { __typename id } }");
        assert_eq!(
            query,
            normalized(&schema, "{ user { name __typename } users { __typename id } }")
        );
    }

    #[test]
    fn it_records_aliases_first_seen() {
        let mut transform = transform(UPPER_NAME);
        let schema = transform.transform_schema(&source()).unwrap();
        let (_, aliases) = request(
            &transform,
            &schema,
            "{ user { display: name } users { label: name } }",
        );
        assert_eq!(aliases.response_key("User", "name"), "display");
    }

    #[test]
    fn it_rewrites_fragments() {
        let mut transform = transform(UPPER_NAME);
        let schema = transform.transform_schema(&source()).unwrap();
        let (query, aliases) = request(
            &transform,
            &schema,
            "query { user { ...parts } } fragment parts on User { title: name }",
        );
        assert_eq!(
            query,
            normalized(
                &schema,
                "query { user { ...parts __typename } } fragment parts on User { title: name __typename }"
            )
        );
        assert_eq!(aliases.response_key("User", "name"), "title");
    }

    #[test]
    fn it_rewrites_aliased_values_of_every_object() {
        let mut transform = transform(UPPER_NAME);
        let schema = transform.transform_schema(&source()).unwrap();
        let (_, aliases) = request(&transform, &schema, "{ users { display: name } }");

        let mut response = json!({
            "users": [
                { "__typename": "User", "display": "ada", "name": "untouched" },
                { "__typename": "User", "display": "grace" },
                { "__typename": "User", "display": null },
                { "display": "no typename" },
            ]
        });
        transform.transform_result(&mut response, &aliases).unwrap();
        assert_eq!(
            response,
            json!({
                "users": [
                    { "__typename": "User", "display": "ADA", "name": "untouched" },
                    { "__typename": "User", "display": "GRACE" },
                    { "__typename": "User", "display": null },
                    { "display": "no typename" },
                ]
            })
        );
    }

    #[test]
    fn it_computes_selected_fields_missing_from_results() {
        let mut transform = transform(
            r#"
rules:
  - type_name: User
    fields: [name]
    modifiers:
      - kind: case
        case: upper
      - kind: expression
        expression: 'root.firstName + "!"'
"#,
        );
        let schema = transform.transform_schema(&source()).unwrap();
        let (_, aliases) = request(&transform, &schema, "{ user { greeting: name firstName } }");

        let mut response = json!({ "user": { "__typename": "User", "firstName": "Ada" } });
        transform.transform_result(&mut response, &aliases).unwrap();
        assert_eq!(
            response,
            json!({ "user": { "__typename": "User", "firstName": "Ada", "greeting": "Ada!" } })
        );
    }

    #[test]
    fn it_leaves_unselected_or_plain_fields_absent() {
        let computed = transform(
            r#"
rules:
  - type_name: User
    fields: [name]
    modifiers:
      - kind: expression
        expression: '"computed"'
"#,
        );
        let mut response = json!({ "__typename": "User", "id": "1" });
        computed
            .transform_result(&mut response, &RequestAliases::default())
            .unwrap();
        assert_eq!(response, json!({ "__typename": "User", "id": "1" }));

        let mut response = json!({ "__typename": "User", "name": null });
        computed
            .transform_result(&mut response, &RequestAliases::default())
            .unwrap();
        assert_eq!(response, json!({ "__typename": "User", "name": "computed" }));

        let mut upper = transform(UPPER_NAME);
        let schema = upper.transform_schema(&source()).unwrap();
        let (_, aliases) = request(&upper, &schema, "{ user { name } }");
        let mut response = json!({ "user": { "__typename": "User" } });
        upper.transform_result(&mut response, &aliases).unwrap();
        assert_eq!(response, json!({ "user": { "__typename": "User" } }));
    }
}
