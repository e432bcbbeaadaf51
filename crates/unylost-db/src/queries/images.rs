use std::collections::HashMap;

use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::ImageRow;

const IMAGE_COLUMNS: &str = "id, found_item_id, image_url, is_primary, created_at";

impl Database {
    // -- Found item images --

    /// Inserts an image. A primary image is also mirrored into
    /// `found_items.image_url`.
    pub fn add_image(&self, found_item_id: i64, image_url: &str, is_primary: bool) -> Result<ImageRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if is_primary {
                tx.execute(
                    "UPDATE found_item_images SET is_primary = 0 WHERE found_item_id = ?1",
                    [found_item_id],
                )?;
                mirror_primary(&tx, found_item_id, Some(image_url))?;
            }
            tx.execute(
                "INSERT INTO found_item_images (found_item_id, image_url, is_primary) VALUES (?1, ?2, ?3)",
                rusqlite::params![found_item_id, image_url, is_primary],
            )?;
            let id = tx.last_insert_rowid();
            let row = tx.query_row(
                &format!("SELECT {} FROM found_item_images WHERE id = ?1", IMAGE_COLUMNS),
                [id],
                map_image,
            )?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_image(&self, id: i64) -> Result<Option<ImageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM found_item_images WHERE id = ?1", IMAGE_COLUMNS),
                [id],
                map_image,
            )
            .optional()
        })
    }

    /// Primary first, then upload order.
    pub fn get_images_for_item(&self, found_item_id: i64) -> Result<Vec<ImageRow>> {
        self.with_conn(|conn| images_for_item(conn, found_item_id))
    }

    /// Images for a page of items in one round trip, keyed by item id.
    pub fn get_images_for_items(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<ImageRow>>> {
        let mut by_item: HashMap<i64, Vec<ImageRow>> = HashMap::new();
        if ids.is_empty() {
            return Ok(by_item);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM found_item_images WHERE found_item_id IN ({})
             ORDER BY is_primary DESC, created_at ASC, id ASC",
            IMAGE_COLUMNS, placeholders
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), map_image)?;
            for row in rows {
                let row = row?;
                by_item.entry(row.found_item_id).or_default().push(row);
            }
            Ok(by_item)
        })
    }

    pub fn has_primary_image(&self, found_item_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM found_item_images WHERE found_item_id = ?1 AND is_primary = 1",
                [found_item_id],
                |r| r.get(0),
            )?;
            Ok(n > 0)
        })
    }

    /// Makes `image_id` the only primary image of its item.
    pub fn set_primary_image(&self, found_item_id: i64, image_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let promoted = promote(&tx, found_item_id, image_id)?;
            tx.commit()?;
            Ok(promoted)
        })
    }

    /// Deletes an image. When it was the primary one, the next image in
    /// display order is promoted; the promoted row is returned.
    pub fn delete_image(&self, image: &ImageRow) -> Result<Option<ImageRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM found_item_images WHERE id = ?1", [image.id])?;

            let mut promoted = None;
            if image.is_primary {
                let next = images_for_item(&tx, image.found_item_id)?.into_iter().next();
                match next {
                    Some(next) => {
                        promote(&tx, image.found_item_id, next.id)?;
                        promoted = Some(ImageRow { is_primary: true, ..next });
                    }
                    None => mirror_primary(&tx, image.found_item_id, None)?,
                }
            }
            tx.commit()?;
            Ok(promoted)
        })
    }
}

fn images_for_item(conn: &Connection, found_item_id: i64) -> Result<Vec<ImageRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM found_item_images WHERE found_item_id = ?1
         ORDER BY is_primary DESC, created_at ASC, id ASC",
        IMAGE_COLUMNS
    ))?;
    let rows = stmt
        .query_map([found_item_id], map_image)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn promote(conn: &Connection, found_item_id: i64, image_id: i64) -> Result<bool> {
    let url: Option<String> = conn
        .query_row(
            "SELECT image_url FROM found_item_images WHERE id = ?1 AND found_item_id = ?2",
            [image_id, found_item_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(url) = url else {
        return Ok(false);
    };

    conn.execute(
        "UPDATE found_item_images SET is_primary = (id = ?1) WHERE found_item_id = ?2",
        [image_id, found_item_id],
    )?;
    mirror_primary(conn, found_item_id, Some(&url))?;
    Ok(true)
}

fn mirror_primary(conn: &Connection, found_item_id: i64, url: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE found_items SET image_url = ?1, updated_at = datetime('now') WHERE id = ?2",
        rusqlite::params![url, found_item_id],
    )?;
    Ok(())
}

fn map_image(row: &Row<'_>) -> rusqlite::Result<ImageRow> {
    Ok(ImageRow {
        id: row.get(0)?,
        found_item_id: row.get(1)?,
        image_url: row.get(2)?,
        is_primary: row.get(3)?,
        created_at: row.get(4)?,
    })
}
