//! Field values.

use std::fmt;

use bytes::Bytes;

/// A single field value as delivered by a driver.
///
/// `Null` is a value like any other; typed extraction decides whether it is
/// acceptable (see [`crate::FromSql`]).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SqlValue {
    /// NULL.
    #[default]
    Null,
    /// BIT.
    Bool(bool),
    /// TINYINT.
    TinyInt(u8),
    /// SMALLINT.
    SmallInt(i16),
    /// INT.
    Int(i32),
    /// BIGINT.
    BigInt(i64),
    /// REAL.
    Float(f32),
    /// FLOAT.
    Double(f64),
    /// Any character type.
    String(String),
    /// Any binary type.
    Binary(Bytes),
    /// DECIMAL / NUMERIC / MONEY.
    #[cfg(feature = "decimal")]
    Decimal(rust_decimal::Decimal),
    /// UNIQUEIDENTIFIER.
    #[cfg(feature = "uuid")]
    Uuid(uuid::Uuid),
    /// DATE.
    #[cfg(feature = "chrono")]
    Date(chrono::NaiveDate),
    /// TIME.
    #[cfg(feature = "chrono")]
    Time(chrono::NaiveTime),
    /// DATETIME / DATETIME2.
    #[cfg(feature = "chrono")]
    DateTime(chrono::NaiveDateTime),
    /// JSON document.
    #[cfg(feature = "json")]
    Json(serde_json::Value),
}

impl SqlValue {
    /// Whether this is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// SQL type name of the stored value, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "BIT",
            Self::TinyInt(_) => "TINYINT",
            Self::SmallInt(_) => "SMALLINT",
            Self::Int(_) => "INT",
            Self::BigInt(_) => "BIGINT",
            Self::Float(_) => "REAL",
            Self::Double(_) => "FLOAT",
            Self::String(_) => "NVARCHAR",
            Self::Binary(_) => "VARBINARY",
            #[cfg(feature = "decimal")]
            Self::Decimal(_) => "DECIMAL",
            #[cfg(feature = "uuid")]
            Self::Uuid(_) => "UNIQUEIDENTIFIER",
            #[cfg(feature = "chrono")]
            Self::Date(_) => "DATE",
            #[cfg(feature = "chrono")]
            Self::Time(_) => "TIME",
            #[cfg(feature = "chrono")]
            Self::DateTime(_) => "DATETIME2",
            #[cfg(feature = "json")]
            Self::Json(_) => "JSON",
        }
    }

    /// Borrow the text of a character value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Any integer value, widened to `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::TinyInt(v) => Some(i64::from(v)),
            Self::SmallInt(v) => Some(i64::from(v)),
            Self::Int(v) => Some(i64::from(v)),
            Self::BigInt(v) => Some(v),
            _ => None,
        }
    }

    /// Any floating point value, widened to `f64`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float(v) => Some(f64::from(v)),
            Self::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(v) => write!(f, "{}", u8::from(*v)),
            Self::TinyInt(v) => write!(f, "{v}"),
            Self::SmallInt(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::BigInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Binary(v) => {
                f.write_str("0x")?;
                for byte in v.iter() {
                    write!(f, "{byte:02X}")?;
                }
                Ok(())
            }
            #[cfg(feature = "decimal")]
            Self::Decimal(v) => write!(f, "{v}"),
            #[cfg(feature = "uuid")]
            Self::Uuid(v) => write!(f, "{v}"),
            #[cfg(feature = "chrono")]
            Self::Date(v) => write!(f, "{v}"),
            #[cfg(feature = "chrono")]
            Self::Time(v) => write!(f, "{v}"),
            #[cfg(feature = "chrono")]
            Self::DateTime(v) => write!(f, "{v}"),
            #[cfg(feature = "json")]
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

// Scalar results are compared against literals in tests and call sites.
impl PartialEq<str> for SqlValue {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for SqlValue {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<SqlValue> for &str {
    fn eq(&self, other: &SqlValue) -> bool {
        other.as_str() == Some(*self)
    }
}

impl PartialEq<i64> for SqlValue {
    fn eq(&self, other: &i64) -> bool {
        self.as_i64() == Some(*other)
    }
}

impl PartialEq<i32> for SqlValue {
    fn eq(&self, other: &i32) -> bool {
        self.as_i64() == Some(i64::from(*other))
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    u8 => TinyInt,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    f32 => Float,
    f64 => Double,
    String => String,
    Bytes => Binary,
}

#[cfg(feature = "decimal")]
impl_from! { rust_decimal::Decimal => Decimal }

#[cfg(feature = "uuid")]
impl_from! { uuid::Uuid => Uuid }

#[cfg(feature = "chrono")]
impl_from! {
    chrono::NaiveDate => Date,
    chrono::NaiveTime => Time,
    chrono::NaiveDateTime => DateTime,
}

#[cfg(feature = "json")]
impl_from! { serde_json::Value => Json }

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(v))
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compares_with_str_literal() {
        let value = SqlValue::from("Adam");
        assert_eq!(value, "Adam");
        assert_eq!("Adam", value);
        assert_ne!(value, "Eve");
        assert_ne!(SqlValue::Null, "Adam");
    }

    #[test]
    fn test_integer_comparison_widens() {
        assert_eq!(SqlValue::TinyInt(7), 7i64);
        assert_eq!(SqlValue::BigInt(-1), -1i32);
        assert_ne!(SqlValue::String("1".into()), 1i32);
    }

    #[test]
    fn test_option_into_value() {
        assert!(SqlValue::from(None::<i32>).is_null());
        assert_eq!(SqlValue::from(Some(5i32)), SqlValue::Int(5));
    }

    #[test]
    fn test_display() {
        assert_eq!(SqlValue::Null.to_string(), "NULL");
        assert_eq!(SqlValue::Bool(true).to_string(), "1");
        assert_eq!(SqlValue::from(vec![0xDE, 0xAD]).to_string(), "0xDEAD");
        assert_eq!(SqlValue::from("Adam").to_string(), "Adam");
    }

    #[test]
    fn test_type_name() {
        assert_eq!(SqlValue::Null.type_name(), "NULL");
        assert_eq!(SqlValue::Int(1).type_name(), "INT");
        assert_eq!(SqlValue::from("x").type_name(), "NVARCHAR");
    }
}
