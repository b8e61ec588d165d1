//! Declarative configuration of the transform.
//!
//! ```yaml
//! rules:
//!   - type_name: User
//!     fields: [createdAt]
//!     modifiers:
//!       - kind: datetime
//!         to: utc
//! ```
use schemars::JsonSchema;
use schemars::r#gen::SchemaSettings;
use schemars::schema::RootSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ModifyResultError;

/// The transform configuration: a list of target rules.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    /// Rules binding fields of a type to a modifier chain.
    #[serde(default)]
    pub rules: Vec<TargetRuleConfig>,
}

impl Configuration {
    /// Parses a YAML configuration document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ModifyResultError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parses a configuration from a JSON value.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ModifyResultError> {
        Ok(serde_json::from_value(value)?)
    }

    /// JSON schema of the configuration, for editor support and validation tooling.
    pub fn json_schema() -> RootSchema {
        let settings = SchemaSettings::draft07().with(|s| {
            s.inline_subschemas = false;
        });
        settings
            .into_generator()
            .into_root_schema_for::<Configuration>()
    }
}

/// Binds fields of one type to an ordered modifier chain.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TargetRuleConfig {
    /// Name of the object or interface type declaring the fields.
    pub type_name: String,
    /// Declared names of the targeted fields.
    pub fields: Vec<String>,
    /// Modifiers applied in order.
    #[serde(default)]
    pub modifiers: Vec<ModifierConfig>,
}

/// A modifier, selected by its `kind`.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModifierConfig {
    /// Leaves the field untouched.
    PassThrough,
    /// Advertises the field as another type.
    Coerce(CoerceConfig),
    /// Normalizes dates and times.
    Datetime(DateTimeConfig),
    /// Formats the value with a mask pattern.
    Mask(MaskConfig),
    /// Rewrites the value with a regular expression.
    Replace(ReplaceConfig),
    /// Changes the case of the value.
    Case(CaseConfig),
    /// Computes the value with an expression.
    Expression(ExpressionConfig),
}

impl ModifierConfig {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ModifierConfig::PassThrough => "pass_through",
            ModifierConfig::Coerce(_) => "coerce",
            ModifierConfig::Datetime(_) => "datetime",
            ModifierConfig::Mask(_) => "mask",
            ModifierConfig::Replace(_) => "replace",
            ModifierConfig::Case(_) => "case",
            ModifierConfig::Expression(_) => "expression",
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CoerceConfig {
    /// Target type name. `[Name]` advertises a list.
    pub to: String,
    /// Modifiers applied to leaf values of the coerced value.
    #[serde(default)]
    pub sub: Vec<SubModifierConfig>,
}

/// Modifiers applied to the leaves found at one or more paths inside a coerced value.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SubModifierConfig {
    /// Dotted paths (`address.street`) relative to the coerced value, using declared field names.
    pub path: SubPaths,
    pub modifiers: Vec<ModifierConfig>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(untagged)]
pub enum SubPaths {
    Single(String),
    Many(Vec<String>),
}

impl SubPaths {
    pub(crate) fn iter(&self) -> impl Iterator<Item = &str> {
        let paths: &[String] = match self {
            SubPaths::Single(path) => std::slice::from_ref(path),
            SubPaths::Many(paths) => paths,
        };
        paths.iter().map(String::as_str)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DateTimeConfig {
    /// `utc`, `timestamp` or a strftime format string.
    pub to: String,
    /// strftime format used to parse non numeric input.
    #[serde(default)]
    pub from: Option<String>,
    /// Shift applied before formatting, such as `-1 days`. May reference `${env.NAME}`.
    #[serde(default)]
    pub modify: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MaskConfig {
    /// Mask pattern, see [`crate::mask`].
    pub mask: String,
    /// Anchor the pattern to the end of the value.
    #[serde(default)]
    pub reverse: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReplaceConfig {
    /// Regular expression matched against the stringified value.
    #[serde(rename = "match")]
    pub pattern: String,
    /// Result template. `$1`..`$n` are replaced by capture groups.
    pub result: String,
    /// Scalar or enum type advertised for the field. Defaults to `String`.
    #[serde(default, rename = "as")]
    pub as_type: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CaseConfig {
    pub case: CaseKind,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CaseKind {
    Upper,
    Lower,
    Camel,
    Capital,
    Constant,
    Dot,
    Kebab,
    No,
    Pascal,
    PascalSnake,
    Path,
    Sentence,
    Snake,
    Train,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExpressionConfig {
    /// Rhai expression. `value`, `root` and `env` are in scope.
    pub expression: String,
    /// Sibling selections the expression reads from `root`, such as `{ firstName lastName }`.
    #[serde(default)]
    pub selections: Option<String>,
    /// Type advertised for the field.
    #[serde(default, rename = "as")]
    pub as_type: Option<String>,
}
