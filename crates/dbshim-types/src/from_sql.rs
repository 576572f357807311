//! Typed extraction from field values.

use bytes::Bytes;

use crate::error::TypeError;
use crate::value::SqlValue;

/// Types that can be read out of a [`SqlValue`].
///
/// NULL is only accepted by `Option<T>`; every other implementation
/// returns [`TypeError::UnexpectedNull`], which is why readers check
/// `is_null` before typed access.
pub trait FromSql: Sized {
    /// Convert a field value into `Self`.
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError>;
}

fn reject<T>(value: &SqlValue, expected: &'static str) -> Result<T, TypeError> {
    if value.is_null() {
        Err(TypeError::UnexpectedNull)
    } else {
        Err(TypeError::TypeMismatch {
            expected,
            actual: value.type_name(),
        })
    }
}

impl FromSql for bool {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Bool(v) => Ok(*v),
            other => reject(other, "bool"),
        }
    }
}

impl FromSql for u8 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::TinyInt(v) => Ok(*v),
            other => reject(other, "u8"),
        }
    }
}

impl FromSql for i16 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match *value {
            SqlValue::TinyInt(v) => Ok(i16::from(v)),
            SqlValue::SmallInt(v) => Ok(v),
            ref other => reject(other, "i16"),
        }
    }
}

impl FromSql for i32 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match *value {
            SqlValue::TinyInt(v) => Ok(i32::from(v)),
            SqlValue::SmallInt(v) => Ok(i32::from(v)),
            SqlValue::Int(v) => Ok(v),
            ref other => reject(other, "i32"),
        }
    }
}

impl FromSql for i64 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        value.as_i64().map_or_else(|| reject(value, "i64"), Ok)
    }
}

impl FromSql for f32 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Float(v) => Ok(*v),
            other => reject(other, "f32"),
        }
    }
}

impl FromSql for f64 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        value.as_f64().map_or_else(|| reject(value, "f64"), Ok)
    }
}

impl FromSql for String {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::String(v) => Ok(v.clone()),
            other => reject(other, "String"),
        }
    }
}

impl FromSql for Vec<u8> {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Binary(v) => Ok(v.to_vec()),
            other => reject(other, "Vec<u8>"),
        }
    }
}

impl FromSql for Bytes {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Binary(v) => Ok(v.clone()),
            other => reject(other, "Bytes"),
        }
    }
}

impl FromSql for SqlValue {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        Ok(value.clone())
    }
}

impl<T: FromSql> FromSql for Option<T> {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_sql(value).map(Some)
        }
    }
}

#[cfg(feature = "decimal")]
impl FromSql for rust_decimal::Decimal {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Decimal(v) => Ok(*v),
            SqlValue::String(s) => s.parse().map_err(|e| TypeError::InvalidText {
                target_type: "Decimal",
                reason: format!("{e}"),
            }),
            other => other
                .as_i64()
                .map_or_else(|| reject(other, "Decimal"), |v| Ok(v.into())),
        }
    }
}

#[cfg(feature = "uuid")]
impl FromSql for uuid::Uuid {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Uuid(v) => Ok(*v),
            SqlValue::String(s) => s.parse().map_err(|e| TypeError::InvalidText {
                target_type: "Uuid",
                reason: format!("{e}"),
            }),
            other => reject(other, "Uuid"),
        }
    }
}

#[cfg(feature = "chrono")]
impl FromSql for chrono::NaiveDate {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Date(v) => Ok(*v),
            SqlValue::DateTime(v) => Ok(v.date()),
            other => reject(other, "NaiveDate"),
        }
    }
}

#[cfg(feature = "chrono")]
impl FromSql for chrono::NaiveTime {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Time(v) => Ok(*v),
            SqlValue::DateTime(v) => Ok(v.time()),
            other => reject(other, "NaiveTime"),
        }
    }
}

#[cfg(feature = "chrono")]
impl FromSql for chrono::NaiveDateTime {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::DateTime(v) => Ok(*v),
            other => reject(other, "NaiveDateTime"),
        }
    }
}

#[cfg(feature = "json")]
impl FromSql for serde_json::Value {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Json(v) => Ok(v.clone()),
            SqlValue::String(s) => serde_json::from_str(s).map_err(|e| TypeError::InvalidText {
                target_type: "JSON",
                reason: format!("{e}"),
            }),
            other => reject(other, "JSON"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_string_from_string() {
        let value = SqlValue::from("Adam");
        assert_eq!(String::from_sql(&value).unwrap(), "Adam");
    }

    #[test]
    fn test_null_rejected_without_option() {
        assert_eq!(
            String::from_sql(&SqlValue::Null),
            Err(TypeError::UnexpectedNull)
        );
        assert!(i32::from_sql(&SqlValue::Null).unwrap_err().is_null());
    }

    #[test]
    fn test_option_accepts_null() {
        assert_eq!(Option::<String>::from_sql(&SqlValue::Null).unwrap(), None);
        assert_eq!(
            Option::<i32>::from_sql(&SqlValue::Int(3)).unwrap(),
            Some(3)
        );
    }

    #[test]
    fn test_mismatch_names_both_types() {
        let err = String::from_sql(&SqlValue::Int(1)).unwrap_err();
        assert_eq!(
            err,
            TypeError::TypeMismatch {
                expected: "String",
                actual: "INT",
            }
        );
        assert_eq!(err.to_string(), "type mismatch: expected String, got INT");
    }

    #[test]
    fn test_narrowing_is_rejected() {
        assert!(i32::from_sql(&SqlValue::BigInt(1)).is_err());
        assert!(f32::from_sql(&SqlValue::Double(1.0)).is_err());
        assert!(u8::from_sql(&SqlValue::SmallInt(1)).is_err());
    }

    #[test]
    fn test_binary() {
        let value = SqlValue::from(vec![1u8, 2, 3]);
        assert_eq!(Vec::<u8>::from_sql(&value).unwrap(), vec![1, 2, 3]);
        assert_eq!(Bytes::from_sql(&value).unwrap().len(), 3);
    }

    #[cfg(feature = "decimal")]
    #[test]
    fn test_decimal_from_text_and_int() {
        use rust_decimal::Decimal;

        let parsed = Decimal::from_sql(&SqlValue::from("12.50")).unwrap();
        assert_eq!(parsed, Decimal::new(1250, 2));
        assert_eq!(Decimal::from_sql(&SqlValue::Int(4)).unwrap(), Decimal::from(4));
        assert!(matches!(
            Decimal::from_sql(&SqlValue::from("abc")),
            Err(TypeError::InvalidText { .. })
        ));
    }
}
