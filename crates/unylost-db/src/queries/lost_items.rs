use anyhow::Result;
use rusqlite::Row;

use unylost_types::models::LostStatus;

use super::{Assignments, Conditions, OptionalExt};
use crate::Database;
use crate::models::{ListFilters, LostItemChanges, LostItemRow, NewLostItem};

const LOST_SELECT: &str = "SELECT l.id, l.user_id, l.category_id, l.item_name, l.description,
        l.last_seen_location, l.lost_date, l.reward, l.status, l.image_url, l.firestore_id,
        l.needs_sync, l.last_sync_attempt, l.sync_error, l.created_at, l.updated_at,
        c.name, u.full_name
     FROM lost_items l
     JOIN categories c ON l.category_id = c.id
     JOIN users u ON l.user_id = u.id
     WHERE 1=1";

fn lost_conditions(filters: &ListFilters) -> Conditions {
    let mut cond = Conditions::default();
    cond.push_opt("l.status = ?", filters.status.clone());
    cond.push_opt("l.category_id = ?", filters.category_id);
    cond.push_opt("l.lost_date >= ?", filters.from_date.clone());
    cond.push_opt("l.lost_date <= ?", filters.to_date.clone());
    cond.push_opt("l.user_id = ?", filters.user_id);
    cond
}

fn search_conditions(keywords: &str) -> Conditions {
    let pattern = format!("%{}%", keywords);
    let mut cond = Conditions::default();
    cond.sql.push_str(" AND (l.item_name LIKE ? OR l.description LIKE ?)");
    cond.params.push(pattern.clone().into());
    cond.params.push(pattern.into());
    cond
}

impl Database {
    // -- Lost items --

    pub fn create_lost_item(&self, item: &NewLostItem<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO lost_items (user_id, category_id, item_name, description, last_seen_location,
                    lost_date, reward, image_url, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active')",
                rusqlite::params![
                    item.user_id,
                    item.category_id,
                    item.item_name,
                    item.description,
                    item.last_seen_location,
                    item.lost_date,
                    item.reward,
                    item.image_url,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_lost_item(&self, id: i64) -> Result<Option<LostItemRow>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{} AND l.id = ?1", LOST_SELECT), [id], map_lost_item)
                .optional()
        })
    }

    /// Newest first.
    pub fn list_lost_items(&self, filters: &ListFilters, limit: u32, offset: u32) -> Result<Vec<LostItemRow>> {
        self.select_lost_items(lost_conditions(filters), "", limit, offset)
    }

    pub fn count_lost_items(&self, filters: &ListFilters) -> Result<i64> {
        self.count_lost_where(lost_conditions(filters))
    }

    pub fn search_lost_items(&self, keywords: &str, limit: u32, offset: u32) -> Result<Vec<LostItemRow>> {
        self.select_lost_items(search_conditions(keywords), "", limit, offset)
    }

    /// Items not yet registered with the AI Layer, or whose last
    /// registration failed. Newest first.
    pub fn lost_items_needing_sync(&self, limit: u32) -> Result<Vec<LostItemRow>> {
        self.select_lost_items(
            Conditions::default(),
            " AND (l.needs_sync = 1 OR l.firestore_id IS NULL)",
            limit,
            0,
        )
    }

    fn select_lost_items(
        &self,
        mut cond: Conditions,
        extra: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<LostItemRow>> {
        cond.params.push(i64::from(limit).into());
        cond.params.push(i64::from(offset).into());
        let sql = format!(
            "{}{}{} ORDER BY l.created_at DESC, l.id DESC LIMIT ? OFFSET ?",
            LOST_SELECT, cond.sql, extra
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(cond.params), map_lost_item)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn count_lost_where(&self, cond: Conditions) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM lost_items l
             JOIN categories c ON l.category_id = c.id
             JOIN users u ON l.user_id = u.id
             WHERE 1=1{}",
            cond.sql
        );
        self.with_conn(|conn| {
            let n = conn.query_row(&sql, rusqlite::params_from_iter(cond.params), |r| r.get(0))?;
            Ok(n)
        })
    }

    /// Returns false when the item does not exist.
    pub fn update_lost_item(&self, id: i64, changes: LostItemChanges) -> Result<bool> {
        let mut set = Assignments::default();
        set.set_opt("item_name", changes.item_name);
        set.set_opt("category_id", changes.category_id);
        set.set_opt("description", changes.description);
        set.set_opt("last_seen_location", changes.last_seen_location);
        set.set_opt("lost_date", changes.lost_date);
        set.set_opt("image_url", changes.image_url);
        set.set_opt("reward", changes.reward);
        set.set_opt("status", changes.status.map(|s| s.as_str().to_string()));
        if set.is_empty() {
            return Ok(self.get_lost_item(id)?.is_some());
        }

        let (sql, params) = set.into_update("lost_items", id, true);
        self.with_conn(|conn| {
            let n = conn.execute(&sql, rusqlite::params_from_iter(params))?;
            Ok(n > 0)
        })
    }

    pub fn update_lost_item_status(&self, id: i64, status: LostStatus) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE lost_items SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                rusqlite::params![status.as_str(), id],
            )?;
            Ok(n > 0)
        })
    }

    /// Records a successful AI Layer registration made while the item was
    /// being created. `image_url` replaces the local one when given.
    pub fn set_lost_item_remote(&self, id: i64, firestore_id: &str, image_url: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE lost_items SET firestore_id = ?1, image_url = COALESCE(?2, image_url),
                    needs_sync = 0, sync_error = NULL, updated_at = datetime('now')
                 WHERE id = ?3",
                rusqlite::params![firestore_id, image_url, id],
            )?;
            Ok(())
        })
    }

    pub fn mark_synced(&self, id: i64, firestore_id: &str, image_url: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE lost_items SET needs_sync = 0, firestore_id = ?1, image_url = COALESCE(?2, image_url),
                    last_sync_attempt = datetime('now'), sync_error = NULL
                 WHERE id = ?3",
                rusqlite::params![firestore_id, image_url, id],
            )?;
            Ok(())
        })
    }

    pub fn mark_sync_failed(&self, id: i64, error: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE lost_items SET needs_sync = 1, last_sync_attempt = datetime('now'), sync_error = ?1
                 WHERE id = ?2",
                rusqlite::params![error, id],
            )?;
            Ok(())
        })
    }

    pub fn delete_lost_item(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM lost_items WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }
}

fn map_lost_item(row: &Row<'_>) -> rusqlite::Result<LostItemRow> {
    Ok(LostItemRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        item_name: row.get(3)?,
        description: row.get(4)?,
        last_seen_location: row.get(5)?,
        lost_date: row.get(6)?,
        reward: row.get(7)?,
        status: row.get(8)?,
        image_url: row.get(9)?,
        firestore_id: row.get(10)?,
        needs_sync: row.get(11)?,
        last_sync_attempt: row.get(12)?,
        sync_error: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
        category_name: row.get(16)?,
        owner_name: row.get(17)?,
    })
}
