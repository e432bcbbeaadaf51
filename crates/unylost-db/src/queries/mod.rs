mod categories;
mod claims;
mod found_items;
mod images;
mod lost_items;
mod stats;
mod users;

use anyhow::Result;
use rusqlite::types::Value;

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Accumulates `AND` clauses and their positional parameters for the
/// filterable listings.
#[derive(Default)]
struct Conditions {
    sql: String,
    params: Vec<Value>,
}

impl Conditions {
    fn push(&mut self, clause: &str, value: impl Into<Value>) {
        self.sql.push_str(" AND ");
        self.sql.push_str(clause);
        self.params.push(value.into());
    }

    fn push_opt<T: Into<Value>>(&mut self, clause: &str, value: Option<T>) {
        if let Some(v) = value {
            self.push(clause, v);
        }
    }
}

/// Column assignments for a partial `UPDATE ... SET`.
#[derive(Default)]
struct Assignments {
    columns: Vec<&'static str>,
    params: Vec<Value>,
}

impl Assignments {
    fn set_opt<T: Into<Value>>(&mut self, column: &'static str, value: Option<T>) {
        if let Some(v) = value {
            self.columns.push(column);
            self.params.push(v.into());
        }
    }

    fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Renders `UPDATE table SET a = ?1, ..., updated_at = datetime('now') WHERE id = ?N`
    /// and appends the id parameter.
    fn into_update(mut self, table: &str, id: i64, touch_updated_at: bool) -> (String, Vec<Value>) {
        let mut sets: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = ?{}", col, i + 1))
            .collect();
        if touch_updated_at {
            sets.push("updated_at = datetime('now')".to_string());
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            sets.join(", "),
            self.columns.len() + 1
        );
        self.params.push(Value::Integer(id));
        (sql, self.params)
    }
}

/// Number of pages needed for `total` rows, at least zero.
pub fn total_pages(total: i64, limit: u32) -> i64 {
    if limit == 0 {
        return 0;
    }
    (total + limit as i64 - 1) / limit as i64
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn test_assignments_render_update() {
        let mut a = Assignments::default();
        a.set_opt("name", Some("Bags".to_string()));
        a.set_opt::<i64>("priority", None);
        a.set_opt("icon", Some("bag".to_string()));
        let (sql, params) = a.into_update("categories", 9, true);
        assert_eq!(
            sql,
            "UPDATE categories SET name = ?1, icon = ?2, updated_at = datetime('now') WHERE id = ?3"
        );
        assert_eq!(params.len(), 3);
        assert_eq!(params[2], Value::Integer(9));
    }
}
