use anyhow::Result;
use rusqlite::Row;

use super::{Assignments, OptionalExt};
use crate::Database;
use crate::models::{CategoryChanges, CategoryRow};

impl Database {
    // -- Categories --

    /// All categories, lowest priority value first.
    pub fn list_categories(&self) -> Result<Vec<CategoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, icon, priority FROM categories
                 ORDER BY priority ASC, id ASC",
            )?;
            let rows = stmt
                .query_map([], map_category)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_category(&self, id: i64) -> Result<Option<CategoryRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, description, icon, priority FROM categories WHERE id = ?1",
                [id],
                map_category,
            )
            .optional()
        })
    }

    pub fn category_exists(&self, id: i64) -> Result<bool> {
        Ok(self.get_category(id)?.is_some())
    }

    pub fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
        icon: Option<&str>,
        priority: i64,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO categories (name, description, icon, priority) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![name, description, icon, priority],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Returns false when the category does not exist.
    pub fn update_category(&self, id: i64, changes: CategoryChanges) -> Result<bool> {
        let mut set = Assignments::default();
        set.set_opt("name", changes.name);
        set.set_opt("description", changes.description);
        set.set_opt("icon", changes.icon);
        set.set_opt("priority", changes.priority);
        if set.is_empty() {
            return self.category_exists(id);
        }

        let (sql, params) = set.into_update("categories", id, true);
        self.with_conn(|conn| {
            let n = conn.execute(&sql, rusqlite::params_from_iter(params))?;
            Ok(n > 0)
        })
    }

    pub fn delete_category(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM categories WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    /// (found items, lost items) referencing the category.
    pub fn category_item_counts(&self, id: i64) -> Result<(i64, i64)> {
        self.with_conn(|conn| {
            let counts = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM found_items WHERE category_id = ?1),
                    (SELECT COUNT(*) FROM lost_items WHERE category_id = ?1)",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?;
            Ok(counts)
        })
    }
}

fn map_category(row: &Row<'_>) -> rusqlite::Result<CategoryRow> {
    Ok(CategoryRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        icon: row.get(3)?,
        priority: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use unylost_types::models::Role;

    use super::*;
    use crate::queries::test_support::{db, found_item, lost_item, user};

    #[test]
    fn test_categories_ordered_by_priority() {
        let db = db();
        db.create_category("Other", None, None, 99).unwrap();
        db.create_category("Electronics", Some("Phones, laptops"), Some("phone"), 1).unwrap();
        db.create_category("Documents", None, None, 5).unwrap();

        let names: Vec<String> = db.list_categories().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Electronics", "Documents", "Other"]);
    }

    #[test]
    fn test_partial_update_keeps_other_columns() {
        let db = db();
        let id = db.create_category("Bags", Some("Backpacks"), Some("bag"), 1).unwrap();
        let updated = db
            .update_category(id, CategoryChanges { priority: Some(7), ..Default::default() })
            .unwrap();
        assert!(updated);

        let row = db.get_category(id).unwrap().unwrap();
        assert_eq!(row.priority, 7);
        assert_eq!(row.description.as_deref(), Some("Backpacks"));
        assert_eq!(row.icon.as_deref(), Some("bag"));

        assert!(!db.update_category(999, CategoryChanges { priority: Some(1), ..Default::default() }).unwrap());
        assert!(db.update_category(id, CategoryChanges::default()).unwrap());
    }

    #[test]
    fn test_item_counts_and_delete() {
        let db = db();
        let owner = user(&db, "o@uny.ac.id", Role::User);
        let id = db.create_category("Keys", None, None, 0).unwrap();
        found_item(&db, owner, id, "Key ring");
        lost_item(&db, owner, id, "Car key");
        lost_item(&db, owner, id, "Locker key");
        assert_eq!(db.category_item_counts(id).unwrap(), (1, 2));

        let empty = db.create_category("Empty", None, None, 0).unwrap();
        assert!(db.delete_category(empty).unwrap());
        assert!(db.get_category(empty).unwrap().is_none());
        assert!(!db.delete_category(empty).unwrap());
    }
}
