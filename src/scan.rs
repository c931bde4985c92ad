//! Conversions from result rows into caller types.
//!
//! `FromValue` converts a single column, `FromRow` a whole row. Tuples of `FromValue` types
//! implement `FromRow` positionally; structs implement it by reading columns by name.

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::error::OctobeError;
use crate::results::Row;
use crate::types::RowValues;

/// Conversion of one column value into a Rust type.
pub trait FromValue: Sized {
    /// `None` when the value cannot be represented as `Self`.
    fn from_value(value: &RowValues) -> Option<Self>;

    fn expected() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Conversion of a whole row into a Rust type.
///
/// ```rust
/// use octobe::prelude::*;
///
/// struct Product {
///     id: i64,
///     name: String,
/// }
///
/// impl FromRow for Product {
///     fn from_row(row: &Row) -> Result<Self, OctobeError> {
///         Ok(Product {
///             id: row.get("id")?,
///             name: row.get("name")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    /// # Errors
    /// Returns `OctobeError::ScanError` when a column is missing or has an incompatible type.
    fn from_row(row: &Row) -> Result<Self, OctobeError>;
}

impl FromValue for RowValues {
    fn from_value(value: &RowValues) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &RowValues) -> Option<Self> {
        match value {
            RowValues::Int(i) => Some(*i),
            RowValues::Bool(b) => Some(i64::from(*b)),
            RowValues::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

macro_rules! impl_from_value_narrow_int {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &RowValues) -> Option<Self> {
                    i64::from_value(value).and_then(|i| <$ty>::try_from(i).ok())
                }
            }
        )*
    };
}

impl_from_value_narrow_int!(i32, i16, i8, u64, u32, u16, u8, usize);

impl FromValue for f64 {
    fn from_value(value: &RowValues) -> Option<Self> {
        match value {
            RowValues::Text(s) => s.trim().parse().ok(),
            other => other.as_float(),
        }
    }
}

impl FromValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: &RowValues) -> Option<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: &RowValues) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for String {
    fn from_value(value: &RowValues) -> Option<Self> {
        match value {
            RowValues::Text(s) => Some(s.clone()),
            RowValues::Int(i) => Some(i.to_string()),
            RowValues::Float(f) => Some(f.to_string()),
            RowValues::Bool(b) => Some(b.to_string()),
            RowValues::Timestamp(dt) => Some(dt.to_string()),
            RowValues::JSON(json) => Some(json.to_string()),
            RowValues::Blob(bytes) => String::from_utf8(bytes.clone()).ok(),
            RowValues::Null => None,
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &RowValues) -> Option<Self> {
        match value {
            RowValues::Blob(bytes) => Some(bytes.clone()),
            RowValues::Text(s) => Some(s.as_bytes().to_vec()),
            _ => None,
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &RowValues) -> Option<Self> {
        value.as_timestamp()
    }
}

impl FromValue for JsonValue {
    fn from_value(value: &RowValues) -> Option<Self> {
        match value {
            RowValues::JSON(json) => Some(json.clone()),
            RowValues::Text(s) => serde_json::from_str(s).ok(),
            RowValues::Null => Some(JsonValue::Null),
            _ => None,
        }
    }
}

impl<T> FromValue for Option<T>
where
    T: FromValue,
{
    fn from_value(value: &RowValues) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }

    fn expected() -> &'static str {
        T::expected()
    }
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self, OctobeError> {
        Ok(row.clone())
    }
}

macro_rules! impl_from_row_tuple {
    ($len:expr => $($ty:ident : $idx:tt),+) => {
        impl<$($ty),+> FromRow for ($($ty,)+)
        where
            $($ty: FromValue),+
        {
            fn from_row(row: &Row) -> Result<Self, OctobeError> {
                if row.len() != $len {
                    return Err(OctobeError::ScanError {
                        column: String::from("*"),
                        message: format!(
                            "expected {} destination arguments, row has {} columns",
                            $len,
                            row.len()
                        ),
                    });
                }
                Ok(($(row.get_index::<$ty>($idx)?,)+))
            }
        }
    };
}

impl_from_row_tuple!(1 => A: 0);
impl_from_row_tuple!(2 => A: 0, B: 1);
impl_from_row_tuple!(3 => A: 0, B: 1, C: 2);
impl_from_row_tuple!(4 => A: 0, B: 1, C: 2, D: 3);
impl_from_row_tuple!(5 => A: 0, B: 1, C: 2, D: 3, E: 4);
impl_from_row_tuple!(6 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
impl_from_row_tuple!(7 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
impl_from_row_tuple!(8 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::results::ColumnIndex;

    fn row(values: Vec<RowValues>) -> Row {
        let names: Vec<String> = (0..values.len()).map(|i| format!("c{i}")).collect();
        Row::new(Arc::new(ColumnIndex::new(names)), values)
    }

    #[test]
    fn tuple_scans_positionally() -> Result<(), OctobeError> {
        let r = row(vec![RowValues::Int(1), RowValues::Text("mirror".into())]);
        let (id, name): (i64, String) = r.scan()?;
        assert_eq!(id, 1);
        assert_eq!(name, "mirror");
        Ok(())
    }

    #[test]
    fn column_count_mismatch_is_scan_error() {
        let r = row(vec![RowValues::Int(1), RowValues::Int(2)]);
        let err = r.scan::<(i64,)>().err();
        assert!(err.is_some_and(|e| e.is(ErrorKind::Scan)));
    }

    #[test]
    fn type_mismatch_is_scan_error() {
        let r = row(vec![RowValues::Text("not a number".into())]);
        let err = r.scan::<(i64,)>().err();
        assert!(err.is_some_and(|e| e.is(ErrorKind::Scan)));
    }

    #[test]
    fn null_needs_option() {
        let r = row(vec![RowValues::Null]);
        assert!(r.scan::<(String,)>().is_err());
        let (maybe,): (Option<String>,) = r.scan().unwrap_or((Some("x".into()),));
        assert_eq!(maybe, None);
    }

    #[test]
    fn narrow_ints_reject_overflow() {
        assert_eq!(u8::from_value(&RowValues::Int(255)), Some(255));
        assert_eq!(u8::from_value(&RowValues::Int(256)), None);
        assert_eq!(i32::from_value(&RowValues::Text(" 42 ".into())), Some(42));
    }
}
