use std::collections::HashMap;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::ast::Type;
use apollo_compiler::executable::Field;
use apollo_compiler::executable::FieldSet;
use apollo_compiler::executable::SelectionSet;
use apollo_compiler::schema::ExtendedType;
use chrono::DateTime as ChronoDateTime;
use chrono::Months;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::TimeDelta;
use chrono::Utc;
use chrono::format::Item;
use chrono::format::StrftimeItems;
use serde_json_bytes::Value;

use super::Modifier;
use super::RequestRewrite;
use super::ResultContext;
use super::SchemaContext;
use super::add_scalar;
use super::named_type;
use super::retarget;
use crate::aliases::NestedAliases;
use crate::configuration::DateTimeConfig;
use crate::environment::Environment;
use crate::error::ModifyResultError;

const UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Formats tried, in order, for naive date times when no input format is configured.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Fields of the object types recognized as split timestamps.
const SECONDS: &str = "seconds";
const NANOS: &str = "nanos";

#[derive(Debug, Clone, PartialEq, Eq)]
enum OutputFormat {
    /// ISO-8601 in UTC, published as `DateTime`.
    Utc,
    /// Unix seconds, published as `Timestamp`.
    Timestamp,
    /// strftime format, published as `String`.
    Custom(String),
}

impl OutputFormat {
    fn scalar(&self) -> Name {
        match self {
            OutputFormat::Utc => Name::new_static_unchecked("DateTime"),
            OutputFormat::Timestamp => Name::new_static_unchecked("Timestamp"),
            OutputFormat::Custom(_) => Name::new_static_unchecked("String"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Quarters,
    Years,
}

impl Unit {
    fn parse(unit: &str) -> Option<Self> {
        // `M` and `m` differ, so the short forms are matched before lowercasing.
        match unit {
            "ms" => return Some(Unit::Milliseconds),
            "s" => return Some(Unit::Seconds),
            "m" => return Some(Unit::Minutes),
            "h" => return Some(Unit::Hours),
            "d" => return Some(Unit::Days),
            "w" => return Some(Unit::Weeks),
            "M" => return Some(Unit::Months),
            "Q" => return Some(Unit::Quarters),
            "y" => return Some(Unit::Years),
            _ => {}
        }
        let unit = unit.to_lowercase();
        let unit = unit.strip_suffix('s').unwrap_or(&unit);
        Some(match unit {
            "millisecond" => Unit::Milliseconds,
            "second" => Unit::Seconds,
            "minute" => Unit::Minutes,
            "hour" => Unit::Hours,
            "day" => Unit::Days,
            "week" => Unit::Weeks,
            "month" => Unit::Months,
            "quarter" => Unit::Quarters,
            "year" => Unit::Years,
            _ => return None,
        })
    }
}

/// A calendar shift such as `-1 days`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Adjustment {
    amount: i64,
    unit: Unit,
}

impl Adjustment {
    fn parse(adjustment: &str) -> Option<Self> {
        let mut parts = adjustment.split_whitespace();
        let amount = parts.next()?.parse().ok()?;
        let unit = Unit::parse(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Adjustment { amount, unit })
    }

    fn apply(&self, instant: ChronoDateTime<Utc>) -> Option<ChronoDateTime<Utc>> {
        let delta = match self.unit {
            Unit::Milliseconds => TimeDelta::try_milliseconds(self.amount),
            Unit::Seconds => TimeDelta::try_seconds(self.amount),
            Unit::Minutes => TimeDelta::try_minutes(self.amount),
            Unit::Hours => TimeDelta::try_hours(self.amount),
            Unit::Days => TimeDelta::try_days(self.amount),
            Unit::Weeks => TimeDelta::try_weeks(self.amount),
            Unit::Months => return shift_months(instant, self.amount),
            Unit::Quarters => return shift_months(instant, self.amount.checked_mul(3)?),
            Unit::Years => return shift_months(instant, self.amount.checked_mul(12)?),
        };
        instant.checked_add_signed(delta?)
    }
}

fn shift_months(instant: ChronoDateTime<Utc>, months: i64) -> Option<ChronoDateTime<Utc>> {
    let count = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months < 0 {
        instant.checked_sub_months(count)
    } else {
        instant.checked_add_months(count)
    }
}

fn check_format(format: &str) -> Result<(), ModifyResultError> {
    if StrftimeItems::new(format).any(|item| item == Item::Error) {
        Err(ModifyResultError::InvalidDateFormat(format.to_string()))
    } else {
        Ok(())
    }
}

/// `-12`, `1700000000`, `1.5`.
fn is_numeric(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, "0"));
    let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    all_digits(integer) && all_digits(fraction)
}

fn from_unix_seconds(seconds: f64) -> Option<ChronoDateTime<Utc>> {
    ChronoDateTime::from_timestamp_millis((seconds * 1000.0) as i64)
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        Value::String(text) => text.as_str().parse().ok(),
        _ => None,
    }
}

/// Normalizes dates and times.
///
/// Values are read as split `{ seconds nanos }` timestamps, unix seconds, or text in the
/// configured input format. Values that cannot be read are returned unchanged.
#[derive(Debug)]
pub(crate) struct DateTime {
    to: OutputFormat,
    from: Option<String>,
    adjustment: Option<Adjustment>,
    /// Selections fetching the split timestamp, by field name.
    split_fields: HashMap<Name, SelectionSet>,
}

impl DateTime {
    pub(crate) fn new(
        config: &DateTimeConfig,
        environment: &Environment,
    ) -> Result<Self, ModifyResultError> {
        let to = match config.to.as_str() {
            "utc" => OutputFormat::Utc,
            "timestamp" => OutputFormat::Timestamp,
            format => {
                check_format(format)?;
                OutputFormat::Custom(format.to_string())
            }
        };
        if let Some(from) = &config.from {
            check_format(from)?;
        }
        let adjustment = config
            .modify
            .as_deref()
            .map(|modify| {
                let expanded = environment.expand(modify);
                Adjustment::parse(&expanded)
                    .ok_or(ModifyResultError::InvalidAdjustment(expanded))
            })
            .transpose()?;

        Ok(DateTime {
            to,
            from: config.from.clone(),
            adjustment,
            split_fields: HashMap::new(),
        })
    }

    fn read(&self, value: &Value, field: &str) -> Option<ChronoDateTime<Utc>> {
        match value {
            Value::Object(object) if self.split_fields.contains_key(field) => {
                let seconds = object.get(SECONDS).and_then(as_integer)?;
                let nanos = object.get(NANOS).and_then(as_integer).unwrap_or(0);
                let millis = seconds.checked_mul(1000)?.checked_add(nanos / 1_000_000)?;
                ChronoDateTime::from_timestamp_millis(millis)
            }
            Value::Number(number) => from_unix_seconds(number.as_f64()?),
            Value::String(text) if is_numeric(text.as_str()) => {
                from_unix_seconds(text.as_str().parse().ok()?)
            }
            Value::String(text) => self.parse(text.as_str()),
            _ => None,
        }
    }

    fn parse(&self, text: &str) -> Option<ChronoDateTime<Utc>> {
        match &self.from {
            Some(format) => ChronoDateTime::parse_from_str(text, format)
                .map(|instant| instant.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(text, format)
                        .ok()
                        .map(|naive| naive.and_utc())
                })
                .or_else(|| {
                    NaiveDate::parse_from_str(text, format)
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                        .map(|naive| naive.and_utc())
                }),
            None => ChronoDateTime::parse_from_rfc3339(text)
                .or_else(|_| ChronoDateTime::parse_from_rfc2822(text))
                .map(|instant| instant.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NAIVE_FORMATS.iter().find_map(|format| {
                        NaiveDateTime::parse_from_str(text, format)
                            .ok()
                            .map(|naive| naive.and_utc())
                    })
                })
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                        .map(|naive| naive.and_utc())
                }),
        }
    }

    fn format(&self, instant: ChronoDateTime<Utc>) -> Value {
        match &self.to {
            OutputFormat::Utc => Value::String(instant.format(UTC_FORMAT).to_string().into()),
            OutputFormat::Timestamp => Value::from(instant.timestamp()),
            OutputFormat::Custom(format) => Value::String(instant.format(format).to_string().into()),
        }
    }
}

impl Modifier for DateTime {
    fn extend_schema(&mut self, schema: &mut Schema) -> Result<(), ModifyResultError> {
        add_scalar(schema, &self.to.scalar());
        Ok(())
    }

    fn modify_schema(
        &mut self,
        context: &SchemaContext<'_>,
        mut field: FieldDefinition,
    ) -> Result<FieldDefinition, ModifyResultError> {
        let unsupported = || ModifyResultError::UnsupportedFieldType {
            modifier: "datetime",
            coordinate: context.coordinate(&field),
            ty: field.ty.to_string(),
            expected: "scalar and split timestamp",
        };
        let name = named_type(&field.ty).ok_or_else(unsupported)?;
        match context.schema.types.get(name) {
            Some(ExtendedType::Scalar(_)) => {}
            Some(ExtendedType::Object(object))
                if object.fields.contains_key(SECONDS) && object.fields.contains_key(NANOS) =>
            {
                let selections = format!("{SECONDS} {NANOS}");
                let field_set = FieldSet::parse_and_validate(
                    context.source,
                    name.clone(),
                    selections.as_str(),
                    "datetime.graphql",
                )
                .map_err(|errors| ModifyResultError::InvalidSelections {
                    selections,
                    type_name: name.to_string(),
                    reason: errors.errors.to_string(),
                })?;
                self.split_fields
                    .insert(field.name.clone(), field_set.selection_set.clone());
            }
            _ => return Err(unsupported()),
        }

        let ty = retarget(&field.ty, Type::Named(self.to.scalar()));
        tracing::debug!(field = %context.coordinate(&field), ty = %ty, "publishing date time field");
        field.ty = ty;
        Ok(field)
    }

    fn modify_request(&self, mut field: Node<Field>, _aliases: &mut NestedAliases) -> RequestRewrite {
        if let Some(selection_set) = self.split_fields.get(&field.name) {
            field.make_mut().selection_set = selection_set.clone();
        }
        field.into()
    }

    fn modify_result(
        &self,
        value: Value,
        context: &ResultContext<'_>,
    ) -> Result<Value, ModifyResultError> {
        let instant = self.read(&value, context.field).and_then(|instant| match &self.adjustment {
            Some(adjustment) => adjustment.apply(instant),
            None => Some(instant),
        });
        match instant {
            Some(instant) => Ok(self.format(instant)),
            None => {
                tracing::debug!(field = context.field, "cannot read date time, keeping value");
                Ok(value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json_bytes::json;

    use super::super::test_support::*;
    use super::*;
    use crate::Object;

    fn datetime(to: &str, from: Option<&str>, modify: Option<&str>) -> DateTime {
        DateTime::new(
            &DateTimeConfig {
                to: to.to_string(),
                from: from.map(str::to_string),
                modify: modify.map(str::to_string),
            },
            &Environment::default(),
        )
        .unwrap()
    }

    #[rstest]
    #[case::numeric_string_to_timestamp("timestamp", None, json!("1700000000"), json!(1700000000))]
    #[case::number_to_utc("utc", None, json!(1700000000), json!("2023-11-14T22:13:20Z"))]
    #[case::shifted_back_a_day("utc", Some("-1 days"), json!("1700000000"), json!("2023-11-13T22:13:20Z"))]
    #[case::shifted_by_months("utc", Some("1 M"), json!("2024-01-31T10:00:00Z"), json!("2024-02-29T10:00:00Z"))]
    #[case::shifted_by_quarters("utc", Some("-1 quarter"), json!("2024-05-15"), json!("2024-02-15T00:00:00Z"))]
    #[case::shifted_by_milliseconds("timestamp", Some("1500 ms"), json!(1700000000), json!(1700000001))]
    #[case::offsets_are_normalized("utc", None, json!("2023-11-14T23:13:20+01:00"), json!("2023-11-14T22:13:20Z"))]
    #[case::custom_output("%d/%m/%Y", None, json!("2023-11-14T22:13:20Z"), json!("14/11/2023"))]
    #[case::naive_input("utc", None, json!("2023-11-14 08:30:00"), json!("2023-11-14T08:30:00Z"))]
    #[case::unreadable_text("utc", None, json!("not a date"), json!("not a date"))]
    #[case::unreadable_value("utc", None, json!(true), json!(true))]
    fn it_normalizes_values(
        #[case] to: &str,
        #[case] modify: Option<&str>,
        #[case] value: Value,
        #[case] expected: Value,
    ) {
        let modifier = datetime(to, None, modify);
        assert_eq!(result(&modifier, value).unwrap(), expected);
    }

    #[test]
    fn it_reads_the_configured_input_format() {
        let modifier = datetime("utc", Some("%d/%m/%Y %H:%M"), None);
        assert_eq!(
            result(&modifier, json!("14/11/2023 08:30")).unwrap(),
            json!("2023-11-14T08:30:00Z")
        );
        let modifier = datetime("timestamp", Some("%d/%m/%Y"), None);
        assert_eq!(
            result(&modifier, json!("14/11/2023")).unwrap(),
            json!(1699920000)
        );
    }

    #[test]
    fn it_interpolates_the_adjustment() {
        let environment: Environment = [("SHIFT", "2")].into_iter().collect();
        let modifier = DateTime::new(
            &DateTimeConfig {
                to: "utc".to_string(),
                from: None,
                modify: Some("${env.SHIFT} hours".to_string()),
            },
            &environment,
        )
        .unwrap();
        assert_eq!(
            result(&modifier, json!(1700000000)).unwrap(),
            json!("2023-11-15T00:13:20Z")
        );
    }

    #[rstest]
    #[case::unknown_unit("utc", None, Some("1 fortnight"))]
    #[case::missing_amount("utc", None, Some("days"))]
    #[case::unknown_variable("utc", None, Some("${env.MISSING} days"))]
    #[case::bad_output_format("%Q", None, None)]
    #[case::bad_input_format("utc", Some("%Y-%"), None)]
    fn it_rejects_invalid_configuration(
        #[case] to: &str,
        #[case] from: Option<&str>,
        #[case] modify: Option<&str>,
    ) {
        let error = DateTime::new(
            &DateTimeConfig {
                to: to.to_string(),
                from: from.map(str::to_string),
                modify: modify.map(str::to_string),
            },
            &Environment::default(),
        )
        .unwrap_err();
        assert!(matches!(
            error,
            ModifyResultError::InvalidAdjustment(_) | ModifyResultError::InvalidDateFormat(_)
        ));
    }

    #[test]
    fn it_publishes_scalars_for_each_output() {
        let mut modifier = datetime("utc", None, None);
        assert_eq!(
            modify_user_field(&mut modifier, "createdAt").unwrap().ty.to_string(),
            "DateTime"
        );
        let mut modifier = datetime("timestamp", None, None);
        assert_eq!(
            modify_user_field(&mut modifier, "phone").unwrap().ty.to_string(),
            "Timestamp!"
        );
        let mut modifier = datetime("%Y", None, None);
        assert_eq!(
            modify_user_field(&mut modifier, "createdAt").unwrap().ty.to_string(),
            "String"
        );
    }

    #[rstest]
    #[case::object("address")]
    #[case::list("tags")]
    fn it_rejects_other_field_types(#[case] field: &str) {
        let mut modifier = datetime("utc", None, None);
        let error = modify_user_field(&mut modifier, field).unwrap_err();
        assert!(matches!(
            error,
            ModifyResultError::UnsupportedFieldType {
                modifier: "datetime",
                ..
            }
        ));
    }

    #[test]
    fn it_reads_split_timestamps() {
        let mut modifier = datetime("utc", None, None);
        let field = modify_user_field(&mut modifier, "updatedAt").unwrap();
        assert_eq!(field.ty.to_string(), "DateTime!");

        let rewrite = modifier.modify_request(
            user_field("{ user { updatedAt { seconds } } }"),
            &mut NestedAliases::default(),
        );
        assert_eq!(
            rewrite.field.serialize().no_indent().to_string(),
            "updatedAt { seconds nanos }"
        );

        let root = Object::new();
        let aliases = NestedAliases::default();
        let context = ResultContext {
            field: "updatedAt",
            root: &root,
            aliases: &aliases,
        };
        assert_eq!(
            modifier
                .modify_result(json!({ "seconds": "1700000000", "nanos": 999000000 }), &context)
                .unwrap(),
            json!("2023-11-14T22:13:20Z")
        );
        assert_eq!(
            modifier
                .modify_result(json!({ "nanos": 1 }), &context)
                .unwrap(),
            json!({ "nanos": 1 })
        );
    }

    #[test]
    fn it_ignores_objects_of_other_fields() {
        let modifier = datetime("utc", None, None);
        assert_eq!(
            result(&modifier, json!({ "seconds": 1 })).unwrap(),
            json!({ "seconds": 1 })
        );
    }
}
