use std::error::Error;

use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes;

use crate::error::OctobeError;
use crate::types::RowValues;

/// Borrowed positional arguments in the form tokio-postgres expects.
pub struct Params<'a> {
    references: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> Params<'a> {
    #[must_use]
    pub fn convert(args: &'a [RowValues]) -> Params<'a> {
        let mut references = Vec::with_capacity(args.len());
        for arg in args {
            references.push(arg as &(dyn ToSql + Sync));
        }
        Params { references }
    }

    #[must_use]
    pub fn as_refs(&self) -> &[&(dyn ToSql + Sync)] {
        &self.references
    }
}

impl ToSql for RowValues {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            // integers are encoded at the width of the target column
            RowValues::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)
                    .map_err(|_| out_of_range(*i, ty))?
                    .to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)
                    .map_err(|_| out_of_range(*i, ty))?
                    .to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            #[allow(clippy::cast_possible_truncation)]
            RowValues::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            RowValues::Text(s) => s.to_sql(ty, out),
            RowValues::Bool(b) => b.to_sql(ty, out),
            RowValues::Timestamp(dt) => match *ty {
                Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
                Type::DATE => dt.date().to_sql(ty, out),
                _ => dt.to_sql(ty, out),
            },
            RowValues::Null => Ok(IsNull::Yes),
            RowValues::JSON(json) => json.to_sql(ty, out),
            RowValues::Blob(bytes) => bytes.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}

fn out_of_range(value: i64, ty: &Type) -> OctobeError {
    OctobeError::ParameterError(format!("{value} does not fit column type {ty}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ints_follow_column_width() {
        let mut buf = bytes::BytesMut::new();
        assert!(RowValues::Int(7).to_sql_checked(&Type::INT4, &mut buf).is_ok());
        assert_eq!(buf.len(), 4);

        buf.clear();
        assert!(RowValues::Int(7).to_sql_checked(&Type::INT8, &mut buf).is_ok());
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn narrowing_overflow_is_an_error() {
        let mut buf = bytes::BytesMut::new();
        let err = RowValues::Int(i64::from(i32::MAX) + 1)
            .to_sql_checked(&Type::INT4, &mut buf)
            .err();
        let param = err.as_deref().and_then(|e| e.downcast_ref::<OctobeError>());
        assert!(matches!(param, Some(OctobeError::ParameterError(msg)) if msg.contains("2147483648")));
    }

    #[test]
    fn rejects_unknown_types() {
        assert!(!<RowValues as ToSql>::accepts(&Type::POINT));
        assert_eq!(Params::convert(&crate::args![1, "a"]).as_refs().len(), 2);
    }
}
