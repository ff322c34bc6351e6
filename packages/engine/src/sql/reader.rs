use crate::errors;
use crate::metadata::SqlType;
use crate::{StrataError, Value};

/// Reads one result column and coerces it to the column's mapped type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueReader {
    sql_type: SqlType,
}

impl ValueReader {
    pub const fn for_type(sql_type: SqlType) -> Self {
        Self { sql_type }
    }

    pub const fn sql_type(self) -> SqlType {
        self.sql_type
    }

    pub fn read(self, row: &[Value], position: usize) -> Result<Value, StrataError> {
        let raw = row.get(position).ok_or_else(|| {
            errors::result_read_error(&format!(
                "row has {} columns, expected a value at position {position}",
                row.len()
            ))
        })?;
        self.coerce(raw).ok_or_else(|| {
            errors::result_read_error(&format!(
                "value {raw:?} at position {position} cannot be read as {:?}",
                self.sql_type
            ))
        })
    }

    fn coerce(self, raw: &Value) -> Option<Value> {
        if raw.is_null() {
            return Some(Value::Null);
        }
        match (self.sql_type, raw) {
            (SqlType::Integer, Value::Integer(value)) => Some(Value::Integer(*value)),
            (SqlType::Integer, Value::Real(value)) => {
                whole_real_to_i64(*value).map(Value::Integer)
            }
            (SqlType::Integer, Value::Text(text)) => text.trim().parse().ok().map(Value::Integer),
            (SqlType::Real, Value::Real(value)) => Some(Value::Real(*value)),
            (SqlType::Real, Value::Integer(value)) => Some(Value::Real(*value as f64)),
            (SqlType::Real, Value::Text(text)) => text.trim().parse().ok().map(Value::Real),
            (SqlType::Text | SqlType::Timestamp, Value::Text(text)) => {
                Some(Value::Text(text.clone()))
            }
            (SqlType::Text, Value::Integer(value)) => Some(Value::Text(value.to_string())),
            (SqlType::Text, Value::Real(value)) => Some(Value::Text(value.to_string())),
            (SqlType::Timestamp, Value::Integer(value)) => Some(Value::Integer(*value)),
            (SqlType::Blob, Value::Blob(bytes)) => Some(Value::Blob(bytes.clone())),
            (SqlType::Blob, Value::Text(text)) => Some(Value::Blob(text.as_bytes().to_vec())),
            (SqlType::Boolean, Value::Integer(value)) => Some(Value::Integer(i64::from(*value != 0))),
            (SqlType::Boolean, Value::Text(text)) => match text.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Some(Value::Integer(1)),
                "false" | "f" | "0" => Some(Value::Integer(0)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// `None` for fractional or out-of-range values, which `as` would saturate.
fn whole_real_to_i64(value: f64) -> Option<i64> {
    // 2^63 is exactly representable; i64::MAX is not.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if value.fract() != 0.0 || !(-LIMIT..LIMIT).contains(&value) {
        return None;
    }
    Some(value as i64)
}

#[cfg(test)]
mod tests {
    use super::ValueReader;
    use crate::metadata::SqlType;
    use crate::Value;

    #[test]
    fn integer_reader_accepts_whole_reals_and_numeric_text() {
        let reader = ValueReader::for_type(SqlType::Integer);
        let row = vec![Value::Real(3.0), Value::Text("42".to_string()), Value::Null];
        assert_eq!(reader.read(&row, 0).unwrap(), Value::Integer(3));
        assert_eq!(reader.read(&row, 1).unwrap(), Value::Integer(42));
        assert_eq!(reader.read(&row, 2).unwrap(), Value::Null);
    }

    #[test]
    fn integer_reader_rejects_reals_outside_the_i64_range() {
        let reader = ValueReader::for_type(SqlType::Integer);
        let row = vec![
            Value::Real(1e30),
            Value::Real(-1e30),
            Value::Real(f64::NAN),
            Value::Real(2.5),
        ];
        for position in 0..row.len() {
            let error = reader
                .read(&row, position)
                .expect_err("value has no exact integer form");
            assert_eq!(error.code, "STRATA_ERROR_RESULT_READ");
        }
        assert_eq!(
            reader.read(&[Value::Real(-9.223_372_036_854_776e18)], 0).unwrap(),
            Value::Integer(i64::MIN)
        );
    }

    #[test]
    fn boolean_reader_normalizes_to_zero_or_one() {
        let reader = ValueReader::for_type(SqlType::Boolean);
        let row = vec![Value::Integer(7), Value::Text("false".to_string())];
        assert_eq!(reader.read(&row, 0).unwrap(), Value::Integer(1));
        assert_eq!(reader.read(&row, 1).unwrap(), Value::Integer(0));
    }

    #[test]
    fn reading_past_the_row_fails() {
        let reader = ValueReader::for_type(SqlType::Text);
        let error = reader.read(&[], 0).expect_err("empty row has no column 0");
        assert_eq!(error.code, "STRATA_ERROR_RESULT_READ");
    }
}
