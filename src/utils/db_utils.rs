use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::MySqlPool;

use crate::errors::AppError;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    Decimal(Decimal),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn to_sql_value(key: &str, value: &Value) -> Result<SqlValue, AppError> {
    let converted = match value {
        Value::String(s) => {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                SqlValue::Date(d)
            } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                SqlValue::DateTime(dt)
            } else {
                SqlValue::String(s.clone())
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else if let Ok(d) = Decimal::from_str(&n.to_string()) {
                // keeps cents exact for DECIMAL columns
                SqlValue::Decimal(d)
            } else if let Some(f) = n.as_f64() {
                SqlValue::F64(f)
            } else {
                return Err(AppError::bad_request(format!("{key}: unsupported number")));
            }
        }
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        _ => {
            return Err(AppError::bad_request(format!(
                "{key}: unsupported JSON value type"
            )));
        }
    };
    Ok(converted)
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
///
/// Only keys listed in `allowed` may appear in the payload; column names are
/// never taken from user input otherwise.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, AppError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(AppError::bad_request("No fields provided for update"));
    }

    if let Some(bad) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(AppError::bad_request(format!("Field '{bad}' cannot be updated")));
    }

    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table, set_clause, id_column
    );

    let mut values = Vec::with_capacity(obj.len() + 1);
    for (key, value) in obj {
        values.push(to_sql_value(key, value)?);
    }

    // WHERE id = ?
    values.push(SqlValue::I64(id_value as i64));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(
    pool: &MySqlPool,
    update: SqlUpdate,
) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::Decimal(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    const ALLOWED: &[&str] = &["full_name", "base_rate", "date_of_birth", "active"];

    #[test]
    fn builds_set_clause_and_binds_id_last() {
        let payload = json!({ "base_rate": 95.5 });
        let update = build_update_sql("workers", &payload, ALLOWED, "id", 9).unwrap();

        assert_eq!(update.sql, "UPDATE workers SET base_rate = ? WHERE id = ?");
        assert_eq!(
            update.values,
            vec![SqlValue::Decimal(dec!(95.5)), SqlValue::I64(9)]
        );
    }

    #[test]
    fn every_field_gets_a_placeholder() {
        let payload = json!({ "full_name": "Ravi", "active": false });
        let update = build_update_sql("workers", &payload, ALLOWED, "id", 9).unwrap();

        assert!(update.sql.contains("full_name = ?"));
        assert!(update.sql.contains("active = ?"));
        assert_eq!(update.values.len(), 3);
        assert!(update.values.contains(&SqlValue::Bool(false)));
        assert!(update.values.contains(&SqlValue::String("Ravi".into())));
    }

    #[test]
    fn dates_are_recognised() {
        let payload = json!({ "date_of_birth": "1990-05-14" });
        let update = build_update_sql("workers", &payload, ALLOWED, "id", 1).unwrap();
        assert_eq!(
            update.values[0],
            SqlValue::Date(NaiveDate::from_ymd_opt(1990, 5, 14).unwrap())
        );
    }

    #[test]
    fn rejects_columns_outside_the_whitelist() {
        let payload = json!({ "id": 3 });
        assert!(build_update_sql("workers", &payload, ALLOWED, "id", 1).is_err());

        let payload = json!({ "full_name = 'x', annual_leave_balance": 99 });
        assert!(build_update_sql("workers", &payload, ALLOWED, "id", 1).is_err());
    }

    #[test]
    fn rejects_empty_and_non_object_payloads() {
        assert!(build_update_sql("workers", &json!({}), ALLOWED, "id", 1).is_err());
        assert!(build_update_sql("workers", &json!([1, 2]), ALLOWED, "id", 1).is_err());
        assert!(build_update_sql("workers", &json!({ "full_name": ["a"] }), ALLOWED, "id", 1).is_err());
    }
}
