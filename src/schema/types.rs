use std::collections::HashMap;

use log::{error, warn};

use crate::core::{DataType, Value};
use crate::ident::sanitize;

use super::SimpleType;

/// The two backend variants the engine distinguishes: auto-increment
/// primary-key syntax and date/time literal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    /// Any backend without native microsecond precision; datetime literals
    /// are truncated at the last `.`.
    Sqlite,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::Sqlite
    }
}

/// Schema-declared field type, resolved once at schema-compile time.
///
/// Closed variant set instead of a type-name-keyed string table: unhandled
/// cases become compile-time-checkable matches, and the multiselect
/// vocabulary is captured at resolution instead of being re-looked-up per
/// value.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaType {
    String,
    Integer,
    Int,
    Decimal,
    Double,
    Float,
    DateTime,
    Date,
    Time,
    GYear,
    GMonth,
    GDay,
    GYearMonth,
    GMonthDay,
    Boolean,
    Base64Binary,
    HexBinary,
    AnyUri,
    MultiSelect(Vec<String>),
}

impl SchemaType {
    /// Resolves a raw schema type string. A missing type is logged and
    /// defaulted to a string; a `list.<enum>` type whose vocabulary cannot
    /// be found resolves to `None` and the caller skips the field.
    pub fn resolve(
        raw: Option<&str>,
        element_name: &str,
        types: &HashMap<String, SimpleType>,
    ) -> Option<Self> {
        let raw = match raw {
            Some(r) => r,
            None => {
                error!(
                    "no data type found in element '{}', defaulting to string",
                    element_name
                );
                return Some(Self::String);
            }
        };
        let lowered = raw.to_lowercase();
        if lowered.starts_with("list.") {
            return match types.get(&lowered).or_else(|| types.get(raw)) {
                Some(simple_type) => Some(Self::MultiSelect(simple_type.multiselect_values.clone())),
                None => {
                    error!(
                        "multiselect type '{}' on element '{}' has no registered vocabulary, skipping field",
                        raw, element_name
                    );
                    None
                }
            };
        }
        Some(match lowered.as_str() {
            "string" => Self::String,
            "integer" => Self::Integer,
            "int" => Self::Int,
            "decimal" => Self::Decimal,
            "double" => Self::Double,
            "float" => Self::Float,
            "datetime" => Self::DateTime,
            "date" => Self::Date,
            "time" => Self::Time,
            "gyear" => Self::GYear,
            "gmonth" => Self::GMonth,
            "gday" => Self::GDay,
            "gyearmonth" => Self::GYearMonth,
            "gmonthday" => Self::GMonthDay,
            "boolean" => Self::Boolean,
            "base64binary" => Self::Base64Binary,
            "hexbinary" => Self::HexBinary,
            "anyuri" => Self::AnyUri,
            // unrecognized types map to a bounded string column
            _ => Self::String,
        })
    }

    /// SQL column type for emitted DDL. Mirrors the MySQL mapping the
    /// reporting layer expects; only the primary-key and datetime literal
    /// behaviors differ per dialect, not the column type names.
    pub fn column_type(&self, _dialect: Dialect) -> &'static str {
        match self {
            Self::String => "VARCHAR(255)",
            Self::Integer | Self::Int => "INT(11)",
            Self::Decimal => "DECIMAL(5,2)",
            Self::Double | Self::Float => "DOUBLE",
            Self::DateTime => "DATETIME",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::GYear | Self::GMonth | Self::GDay | Self::GYearMonth | Self::GMonthDay => "INT(11)",
            Self::Boolean => "TINYINT(1)",
            Self::Base64Binary | Self::HexBinary => "DOUBLE",
            Self::AnyUri => "VARCHAR(200)",
            Self::MultiSelect(_) => "TINYINT(1)",
        }
    }

    /// Backend column type for the in-memory engine. Chosen by what
    /// `format_value` actually produces, which is narrower than the DDL
    /// column type (e.g. gmonthday columns receive trimmed text).
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Integer | Self::Int | Self::GYear => DataType::Integer,
            Self::Decimal | Self::Double | Self::Float => DataType::Float,
            Self::Boolean | Self::MultiSelect(_) => DataType::Boolean,
            _ => DataType::Text,
        }
    }

    /// Coerces raw instance text into a storable value.
    ///
    /// Blank input yields no value (the caller must skip the column rather
    /// than insert an empty string). Numeric parse failures substitute zero;
    /// a malformed field never aborts an otherwise-valid submission.
    pub fn format_value(&self, raw: &str, dialect: Dialect) -> Option<Value> {
        let text = raw.trim();
        if text.is_empty() {
            error!("poorly formatted xml input: blank value for {:?} field", self);
            return None;
        }
        match self {
            Self::Integer | Self::Int | Self::GYear => Some(match text.parse::<i64>() {
                Ok(v) => Value::Integer(v),
                Err(_) => {
                    error!(
                        "error validating type {:?} with value '{}', object is not an integer",
                        self, text
                    );
                    Value::Integer(0)
                }
            }),
            Self::Decimal | Self::Double | Self::Float => Some(match text.parse::<f64>() {
                Ok(v) => Value::Float(v),
                Err(_) => {
                    error!(
                        "error validating type {:?} with value '{}', object is not a number",
                        self, text
                    );
                    Value::Float(0.0)
                }
            }),
            Self::DateTime | Self::Date | Self::Time => {
                let mut formatted = text.replace('T', " ");
                if dialect != Dialect::MySql {
                    // no native microsecond precision; truncate at the last '.'
                    if let Some(index) = formatted.rfind('.') {
                        formatted.truncate(index);
                    }
                }
                Some(Value::Text(formatted.trim().to_string()))
            }
            Self::Boolean => Some(match text.to_lowercase().as_str() {
                "1" | "true" => Value::Boolean(true),
                "0" | "false" => Value::Boolean(false),
                other => {
                    error!("error validating boolean value '{}', defaulting to false", other);
                    Value::Boolean(false)
                }
            }),
            Self::MultiSelect(_) => {
                // multiselects are expanded by `multiselect_values`, never
                // stored as a single column
                Some(Value::Text(text.to_string()))
            }
            _ => Some(Value::Text(text.to_string())),
        }
    }

    /// Expands a multi-select's raw text into per-vocabulary-member boolean
    /// columns. Tokens outside the declared vocabulary are dropped with a
    /// warning; unmentioned members contribute no column at all.
    pub fn multiselect_values(&self, label: &str, raw: &str) -> Vec<(String, Value)> {
        let vocabulary = match self {
            Self::MultiSelect(vocabulary) => vocabulary,
            _ => return Vec::new(),
        };
        let mut columns = Vec::new();
        for token in raw.split_whitespace() {
            let token = sanitize(token);
            if vocabulary.iter().any(|v| *v == token) {
                columns.push((format!("{}_{}", label, token), Value::Integer(1)));
            } else {
                warn!(
                    "multiselect value '{}' not in vocabulary for field '{}', dropping",
                    token, label
                );
            }
        }
        columns
    }

    pub fn is_multiselect(&self) -> bool {
        matches!(self, Self::MultiSelect(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_types() -> HashMap<String, SimpleType> {
        HashMap::new()
    }

    #[test]
    fn test_resolve_known_types() {
        assert_eq!(
            SchemaType::resolve(Some("integer"), "age", &no_types()),
            Some(SchemaType::Integer)
        );
        assert_eq!(
            SchemaType::resolve(Some("DateTime"), "when", &no_types()),
            Some(SchemaType::DateTime)
        );
        // unrecognized type falls back to a bounded string column
        assert_eq!(
            SchemaType::resolve(Some("xs:wibble"), "x", &no_types()),
            Some(SchemaType::String)
        );
        // missing type defaults to string rather than failing compilation
        assert_eq!(
            SchemaType::resolve(None, "x", &no_types()),
            Some(SchemaType::String)
        );
    }

    #[test]
    fn test_resolve_multiselect() {
        let mut types = HashMap::new();
        types.insert("list.colors".to_string(), SimpleType::new(["red", "blue"]));
        let resolved = SchemaType::resolve(Some("list.colors"), "color", &types).unwrap();
        assert_eq!(
            resolved,
            SchemaType::MultiSelect(vec!["red".to_string(), "blue".to_string()])
        );
        // unresolvable vocabulary skips the field instead of aborting
        assert_eq!(SchemaType::resolve(Some("list.missing"), "x", &types), None);
    }

    #[test]
    fn test_numeric_parse_failure_substitutes_zero() {
        let v = SchemaType::Integer.format_value("not-a-number", Dialect::MySql);
        assert_eq!(v, Some(Value::Integer(0)));
        let v = SchemaType::Double.format_value("abc", Dialect::MySql);
        assert_eq!(v, Some(Value::Float(0.0)));
    }

    #[test]
    fn test_blank_value_yields_nothing() {
        assert_eq!(SchemaType::String.format_value("   ", Dialect::MySql), None);
    }

    #[test]
    fn test_datetime_formatting() {
        let v = SchemaType::DateTime.format_value("2009-01-02T10:11:12.345", Dialect::MySql);
        assert_eq!(v, Some(Value::Text("2009-01-02 10:11:12.345".into())));
        let v = SchemaType::DateTime.format_value("2009-01-02T10:11:12.345", Dialect::Sqlite);
        assert_eq!(v, Some(Value::Text("2009-01-02 10:11:12".into())));
    }

    #[test]
    fn test_multiselect_expansion() {
        let st = SchemaType::MultiSelect(vec!["a".into(), "b".into(), "c".into()]);
        let columns = st.multiselect_values("field", "a c");
        assert_eq!(
            columns,
            vec![
                ("field_a".to_string(), Value::Integer(1)),
                ("field_c".to_string(), Value::Integer(1)),
            ]
        );
        // out-of-vocabulary tokens are dropped, not errors
        let columns = st.multiselect_values("field", "a zebra");
        assert_eq!(columns.len(), 1);
    }
}
