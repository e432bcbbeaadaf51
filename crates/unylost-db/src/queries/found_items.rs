use anyhow::Result;
use rusqlite::Row;

use unylost_types::models::FoundStatus;

use super::{Assignments, Conditions, OptionalExt};
use crate::Database;
use crate::models::{FoundItemChanges, FoundItemRow, ListFilters, NewFoundItem};

const FOUND_SELECT: &str = "SELECT f.id, f.user_id, f.category_id, f.item_name, f.description, f.location,
        f.found_date, f.status, f.image_url, f.firestore_id, f.created_at, f.updated_at,
        c.name, u.full_name
     FROM found_items f
     JOIN categories c ON f.category_id = c.id
     JOIN users u ON f.user_id = u.id
     WHERE 1=1";

fn found_conditions(filters: &ListFilters) -> Conditions {
    let mut cond = Conditions::default();
    cond.push_opt("f.status = ?", filters.status.clone());
    cond.push_opt("f.category_id = ?", filters.category_id);
    cond.push_opt("f.found_date >= ?", filters.from_date.clone());
    cond.push_opt("f.found_date <= ?", filters.to_date.clone());
    cond.push_opt("f.user_id = ?", filters.user_id);
    cond
}

fn search_conditions(keywords: &str) -> Conditions {
    let pattern = format!("%{}%", keywords);
    let mut cond = Conditions::default();
    cond.sql.push_str(" AND (f.item_name LIKE ? OR f.description LIKE ?)");
    cond.params.push(pattern.clone().into());
    cond.params.push(pattern.into());
    cond
}

impl Database {
    // -- Found items --

    pub fn create_found_item(&self, item: &NewFoundItem<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO found_items (user_id, category_id, item_name, description, location, found_date, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending')",
                rusqlite::params![
                    item.user_id,
                    item.category_id,
                    item.item_name,
                    item.description,
                    item.location,
                    item.found_date,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_found_item(&self, id: i64) -> Result<Option<FoundItemRow>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{} AND f.id = ?1", FOUND_SELECT), [id], map_found_item)
                .optional()
        })
    }

    pub fn get_found_item_by_firestore_id(&self, firestore_id: &str) -> Result<Option<FoundItemRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{} AND f.firestore_id = ?1", FOUND_SELECT),
                [firestore_id],
                map_found_item,
            )
            .optional()
        })
    }

    /// Newest first.
    pub fn list_found_items(&self, filters: &ListFilters, limit: u32, offset: u32) -> Result<Vec<FoundItemRow>> {
        self.select_found_items(found_conditions(filters), limit, offset)
    }

    pub fn count_found_items(&self, filters: &ListFilters) -> Result<i64> {
        self.count_found_where(found_conditions(filters))
    }

    /// Substring match on name and description.
    pub fn search_found_items(&self, keywords: &str, limit: u32, offset: u32) -> Result<Vec<FoundItemRow>> {
        self.select_found_items(search_conditions(keywords), limit, offset)
    }

    fn select_found_items(&self, mut cond: Conditions, limit: u32, offset: u32) -> Result<Vec<FoundItemRow>> {
        cond.params.push(i64::from(limit).into());
        cond.params.push(i64::from(offset).into());
        let sql = format!(
            "{}{} ORDER BY f.created_at DESC, f.id DESC LIMIT ? OFFSET ?",
            FOUND_SELECT, cond.sql
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(cond.params), map_found_item)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn count_found_where(&self, cond: Conditions) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM found_items f
             JOIN categories c ON f.category_id = c.id
             JOIN users u ON f.user_id = u.id
             WHERE 1=1{}",
            cond.sql
        );
        self.with_conn(|conn| {
            let n = conn.query_row(&sql, rusqlite::params_from_iter(cond.params), |r| r.get(0))?;
            Ok(n)
        })
    }

    /// Returns false when the item does not exist.
    pub fn update_found_item(&self, id: i64, changes: FoundItemChanges) -> Result<bool> {
        let mut set = Assignments::default();
        set.set_opt("item_name", changes.item_name);
        set.set_opt("category_id", changes.category_id);
        set.set_opt("description", changes.description);
        set.set_opt("location", changes.location);
        set.set_opt("found_date", changes.found_date);
        if set.is_empty() {
            return Ok(self.get_found_item(id)?.is_some());
        }

        let (sql, params) = set.into_update("found_items", id, true);
        self.with_conn(|conn| {
            let n = conn.execute(&sql, rusqlite::params_from_iter(params))?;
            Ok(n > 0)
        })
    }

    pub fn set_found_item_firestore_id(&self, id: i64, firestore_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE found_items SET firestore_id = ?1, updated_at = datetime('now') WHERE id = ?2",
                rusqlite::params![firestore_id, id],
            )?;
            Ok(())
        })
    }

    pub fn update_found_item_status(&self, id: i64, status: FoundStatus) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE found_items SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                rusqlite::params![status.as_str(), id],
            )?;
            Ok(n > 0)
        })
    }

    /// Images and claims go with the item through `ON DELETE CASCADE`.
    pub fn delete_found_item(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM found_items WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }
}

fn map_found_item(row: &Row<'_>) -> rusqlite::Result<FoundItemRow> {
    Ok(FoundItemRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        item_name: row.get(3)?,
        description: row.get(4)?,
        location: row.get(5)?,
        found_date: row.get(6)?,
        status: row.get(7)?,
        image_url: row.get(8)?,
        firestore_id: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        category_name: row.get(12)?,
        reporter_name: row.get(13)?,
    })
}

#[cfg(test)]
mod tests {
    use unylost_types::models::Role;

    use super::*;
    use crate::queries::test_support::{category, db, found_item, user};

    #[test]
    fn test_create_and_get_with_joins() {
        let db = db();
        let owner = user(&db, "f@uny.ac.id", Role::User);
        let cat = category(&db, "Wallets");
        let id = found_item(&db, owner, cat, "Brown wallet");

        let row = db.get_found_item(id).unwrap().unwrap();
        assert_eq!(row.status(), FoundStatus::Pending);
        assert_eq!(row.category_name, "Wallets");
        assert_eq!(row.reporter_name, "Test User");
        assert!(row.firestore_id.is_none());

        let item = row.into_item(vec![]);
        assert_eq!(item.found_date.to_string(), "2024-05-01");
        assert!(db.get_found_item(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_filters_and_counts() {
        let db = db();
        let owner = user(&db, "a@uny.ac.id", Role::User);
        let other = user(&db, "b@uny.ac.id", Role::User);
        let wallets = category(&db, "Wallets");
        let phones = category(&db, "Phones");
        let a = found_item(&db, owner, wallets, "Wallet");
        found_item(&db, owner, phones, "Phone");
        found_item(&db, other, phones, "Charger");
        db.update_found_item_status(a, FoundStatus::Approved).unwrap();

        let by_cat = ListFilters { category_id: Some(phones), ..Default::default() };
        assert_eq!(db.count_found_items(&by_cat).unwrap(), 2);
        assert_eq!(db.list_found_items(&by_cat, 10, 0).unwrap().len(), 2);

        let by_user = ListFilters { user_id: Some(owner), ..Default::default() };
        assert_eq!(db.count_found_items(&by_user).unwrap(), 2);

        let approved = ListFilters { status: Some("approved".into()), ..Default::default() };
        let rows = db.list_found_items(&approved, 10, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, a);

        let range = ListFilters {
            from_date: Some("2024-05-02".into()),
            ..Default::default()
        };
        assert_eq!(db.count_found_items(&range).unwrap(), 0);

        assert_eq!(db.list_found_items(&ListFilters::default(), 2, 2).unwrap().len(), 1);
    }

    #[test]
    fn test_search_matches_name_and_description() {
        let db = db();
        let owner = user(&db, "s@uny.ac.id", Role::User);
        let cat = category(&db, "Misc");
        found_item(&db, owner, cat, "Umbrella");
        found_item(&db, owner, cat, "Notebook");
        assert_eq!(db.search_found_items("umbr", 10, 0).unwrap().len(), 1);
        assert_eq!(db.search_found_items("leather", 10, 0).unwrap().len(), 2);
        assert!(db.search_found_items("laptop", 10, 0).unwrap().is_empty());
    }

    #[test]
    fn test_update_firestore_and_delete() {
        let db = db();
        let owner = user(&db, "u@uny.ac.id", Role::User);
        let cat = category(&db, "Misc");
        let id = found_item(&db, owner, cat, "Scarf");

        let changes = FoundItemChanges { location: Some("Rektorat".into()), ..Default::default() };
        assert!(db.update_found_item(id, changes).unwrap());
        db.set_found_item_firestore_id(id, "fs-1").unwrap();

        let row = db.get_found_item_by_firestore_id("fs-1").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.location, "Rektorat");
        assert_eq!(row.item_name, "Scarf");

        let cleared = FoundItemChanges { description: Some(None), ..Default::default() };
        assert!(db.update_found_item(id, cleared).unwrap());
        assert!(db.get_found_item(id).unwrap().unwrap().description.is_none());

        assert!(db.delete_found_item(id).unwrap());
        assert!(!db.delete_found_item(id).unwrap());
        assert!(!db.update_found_item_status(id, FoundStatus::Claimed).unwrap());
    }
}
