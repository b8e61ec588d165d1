use std::fmt;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::ast::Type;
use apollo_compiler::executable::Field;
use apollo_compiler::executable::FieldSet;
use apollo_compiler::executable::Selection;
use rhai::AST;
use rhai::Dynamic;
use rhai::Engine;
use rhai::EvalAltResult;
use rhai::Scope;
use rhai::serde::from_dynamic;
use rhai::serde::to_dynamic;
use serde_json_bytes::Value;

use super::Modifier;
use super::RequestRewrite;
use super::ResultContext;
use super::SchemaContext;
use super::retarget;
use super::type_name;
use crate::aliases::NestedAliases;
use crate::configuration::ExpressionConfig;
use crate::environment::Environment;
use crate::error::ModifyResultError;

const MAX_OPERATIONS: u64 = 100_000;
const MAX_EXPR_DEPTH: usize = 64;
const MAX_FUNCTION_EXPR_DEPTH: usize = 32;
const MAX_STRING_SIZE: usize = 1 << 20;
const MAX_COLLECTION_SIZE: usize = 10_000;

fn new_rhai_engine() -> Engine {
    let mut engine = Engine::new();
    engine
        .set_max_operations(MAX_OPERATIONS)
        .set_max_expr_depths(MAX_EXPR_DEPTH, MAX_FUNCTION_EXPR_DEPTH)
        .set_max_string_size(MAX_STRING_SIZE)
        .set_max_array_size(MAX_COLLECTION_SIZE)
        .set_max_map_size(MAX_COLLECTION_SIZE)
        .set_max_modules(0)
        .on_print(|message| {
            tracing::info!(%message, "expression output");
        })
        .on_debug(|message, source, position| {
            tracing::debug!(%message, source = source.unwrap_or_default(), %position, "expression output");
        });
    engine
}

/// Computes a value with a Rhai expression.
///
/// The expression sees `value` (the current value of the field), `root` (the object holding the
/// field) and `env` (the environment snapshot). It runs for falsy values too, so it can build a
/// value from sibling fields alone. Siblings it needs may be requested with `selections`.
pub(crate) struct Expression {
    source: String,
    engine: Engine,
    ast: AST,
    env: Dynamic,
    selections: Option<String>,
    as_type: Option<Name>,
    supplemental: Vec<Selection>,
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("source", &self.source)
            .field("selections", &self.selections)
            .field("as_type", &self.as_type)
            .finish()
    }
}

impl Expression {
    pub(crate) fn new(
        config: &ExpressionConfig,
        environment: &Environment,
    ) -> Result<Self, ModifyResultError> {
        let engine = new_rhai_engine();
        let ast = engine
            .compile_expression(&config.expression)
            .map_err(|error| ModifyResultError::InvalidExpression {
                expression: config.expression.clone(),
                reason: error.to_string(),
            })?;
        let env = to_dynamic(environment.variables()).map_err(|error| {
            ModifyResultError::InvalidConfiguration(format!(
                "cannot expose the environment to expressions: {error}"
            ))
        })?;
        let as_type = config.as_type.as_deref().map(type_name).transpose()?;

        Ok(Expression {
            source: config.expression.clone(),
            engine,
            ast,
            env,
            selections: config.selections.clone(),
            as_type,
            supplemental: Vec::new(),
        })
    }

    fn parse_selections(
        context: &SchemaContext<'_>,
        selections: &str,
    ) -> Result<Vec<Selection>, ModifyResultError> {
        // Field sets are parsed without their outer braces.
        let trimmed = selections.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|inner| inner.strip_suffix('}'))
            .unwrap_or(trimmed);
        let field_set = FieldSet::parse_and_validate(
            context.source,
            context.type_name.clone(),
            inner,
            "selections.graphql",
        )
        .map_err(|errors| ModifyResultError::InvalidSelections {
            selections: selections.to_string(),
            type_name: context.type_name.to_string(),
            reason: errors.errors.to_string(),
        })?;
        Ok(field_set.selection_set.selections.clone())
    }

    fn evaluate(
        &self,
        value: Value,
        context: &ResultContext<'_>,
    ) -> Result<Value, Box<EvalAltResult>> {
        let mut scope = Scope::new();
        scope.push("value", to_dynamic(value)?);
        scope.push("root", to_dynamic(context.root)?);
        scope.push("env", self.env.clone());
        let result: Dynamic = self.engine.eval_ast_with_scope(&mut scope, &self.ast)?;
        from_dynamic(&result)
    }
}

impl Modifier for Expression {
    fn extend_schema(&mut self, schema: &mut Schema) -> Result<(), ModifyResultError> {
        match &self.as_type {
            Some(name) if !schema.types.contains_key(name) => {
                Err(ModifyResultError::TypeNotFound(name.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn modify_schema(
        &mut self,
        context: &SchemaContext<'_>,
        mut field: FieldDefinition,
    ) -> Result<FieldDefinition, ModifyResultError> {
        if let Some(selections) = &self.selections {
            self.supplemental = Self::parse_selections(context, selections)?;
        }
        if let Some(name) = &self.as_type {
            field.ty = retarget(&field.ty, Type::Named(name.clone()));
            tracing::debug!(field = %context.coordinate(&field), ty = %field.ty, "publishing computed field");
        }
        Ok(field)
    }

    fn modify_request(&self, field: Node<Field>, _aliases: &mut NestedAliases) -> RequestRewrite {
        RequestRewrite {
            field,
            supplemental: self.supplemental.clone(),
        }
    }

    fn modify_result(
        &self,
        value: Value,
        context: &ResultContext<'_>,
    ) -> Result<Value, ModifyResultError> {
        self.evaluate(value, context)
            .map_err(|error| ModifyResultError::Expression {
                field: context.field.to_string(),
                reason: error.to_string(),
            })
    }

    fn always_apply(&self) -> bool {
        true
    }
}
