use std::collections::HashMap;

use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::ast::Type;
use apollo_compiler::executable::Field;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::NamedType;
use serde_json_bytes::Value;

use super::Modifier;
use super::RequestRewrite;
use super::ResultContext;
use super::SchemaContext;
use super::add_scalar;
use super::apply_chain;
use super::build;
use super::retarget;
use super::scalars;
use super::type_name;
use crate::aliases::NestedAliases;
use crate::aliases::deep_clean;
use crate::aliases::rename_keys;
use crate::configuration::CoerceConfig;
use crate::configuration::ModifierConfig;
use crate::environment::Environment;
use crate::error::ModifyResultError;

/// Publishes a field as another type.
///
/// Coercing to an object type lets clients select into a value the source serves as a whole
/// (usually a JSON scalar): the selection is dropped from the request and the keys of the value
/// are renamed to the aliases the client used.
#[derive(Debug)]
pub(crate) struct Coerce {
    target: NamedType,
    list: bool,
    target_is_object: bool,
    sub_modifiers: Vec<Vec<Box<dyn Modifier>>>,
    /// Dotted path to an index in `sub_modifiers`.
    paths: HashMap<String, usize>,
}

impl Coerce {
    pub(crate) fn new(
        config: &CoerceConfig,
        environment: &Environment,
    ) -> Result<Self, ModifyResultError> {
        let (name, list) = match config
            .to
            .strip_prefix('[')
            .and_then(|inner| inner.strip_suffix(']'))
        {
            Some(inner) => (inner, true),
            None => (config.to.as_str(), false),
        };

        let mut sub_modifiers = Vec::with_capacity(config.sub.len());
        let mut paths = HashMap::new();
        for sub in &config.sub {
            let modifiers = sub
                .modifiers
                .iter()
                .map(|modifier| match modifier {
                    ModifierConfig::Coerce(_) => Err(ModifyResultError::InvalidConfiguration(
                        format!("coerce modifiers cannot be nested below coerce to '{}'", config.to),
                    )),
                    other => build(other, environment),
                })
                .collect::<Result<Vec<_>, _>>()?;
            for path in sub.path.iter() {
                // later entries win
                paths.insert(path.to_string(), sub_modifiers.len());
            }
            sub_modifiers.push(modifiers);
        }

        Ok(Coerce {
            target: type_name(name.trim())?,
            list,
            target_is_object: false,
            sub_modifiers,
            paths,
        })
    }

    fn apply_sub_modifiers(
        &self,
        path: &str,
        value: Value,
        context: &ResultContext<'_>,
    ) -> Result<Value, ModifyResultError> {
        let Some(&index) = self.paths.get(path) else {
            return Ok(value);
        };
        let aliases = NestedAliases::default();
        apply_chain(
            self.sub_modifiers[index]
                .iter()
                .map(|modifier| modifier.as_ref()),
            value,
            |_| ResultContext {
                field: path,
                root: context.root,
                aliases: &aliases,
            },
        )
    }
}

impl Modifier for Coerce {
    fn extend_schema(&mut self, schema: &mut Schema) -> Result<(), ModifyResultError> {
        match schema.types.get(&self.target) {
            Some(ty) => self.target_is_object = matches!(ty, ExtendedType::Object(_)),
            None if scalars::is_known_scalar(&self.target) => add_scalar(schema, &self.target),
            None => return Err(ModifyResultError::TypeNotFound(self.target.to_string())),
        }
        Ok(())
    }

    fn modify_schema(
        &mut self,
        context: &SchemaContext<'_>,
        mut field: FieldDefinition,
    ) -> Result<FieldDefinition, ModifyResultError> {
        let mut ty = Type::Named(self.target.clone());
        if self.list {
            ty = ty.list();
        }
        field.ty = retarget(&field.ty, ty);
        tracing::debug!(field = %context.coordinate(&field), ty = %field.ty, "coercing field");
        Ok(field)
    }

    fn modify_request(&self, mut field: Node<Field>, aliases: &mut NestedAliases) -> RequestRewrite {
        if self.target_is_object && !field.selection_set.selections.is_empty() {
            aliases.record_selection_set(&field.name, &field.selection_set);
            field.make_mut().selection_set.selections.clear();
        }
        field.into()
    }

    fn modify_result(
        &self,
        value: Value,
        context: &ResultContext<'_>,
    ) -> Result<Value, ModifyResultError> {
        let is_container = matches!(value, Value::Object(_) | Value::Array(_));
        let lookup =
            |parent: &str, child: &str| context.aliases.get(parent, child).map(str::to_string);
        let renamed = rename_keys(value, context.field, "", &lookup, &mut |path: &str, leaf: Value| {
            self.apply_sub_modifiers(path, leaf, context)
        })?;
        Ok(if is_container {
            deep_clean(renamed)
        } else {
            renamed
        })
    }
}
