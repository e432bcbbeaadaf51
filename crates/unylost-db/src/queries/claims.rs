use anyhow::Result;
use rusqlite::Row;

use unylost_types::models::ClaimStatus;

use super::{Conditions, OptionalExt};
use crate::Database;
use crate::models::{ApprovalOutcome, ClaimRow, ListFilters, NewClaim};

/// Note written on the competing claims that lose when one is approved.
pub const CLAIMED_BY_OTHER_NOTE: &str = "Item telah diklaim oleh orang lain";

const CLAIM_SELECT: &str = "SELECT c.id, c.user_id, c.item_id, c.description, c.lost_location, c.lost_date,
        c.additional_proof, c.status, c.admin_notes, c.created_at, c.updated_at,
        u.full_name, u.email, f.item_name, f.image_url, f.category_id, cat.name, f.location, f.found_date
     FROM item_claims c
     JOIN users u ON c.user_id = u.id
     JOIN found_items f ON c.item_id = f.id
     JOIN categories cat ON f.category_id = cat.id
     WHERE 1=1";

fn claim_conditions(filters: &ListFilters) -> Conditions {
    let mut cond = Conditions::default();
    cond.push_opt("c.status = ?", filters.status.clone());
    cond.push_opt("f.category_id = ?", filters.category_id);
    cond.push_opt("date(c.created_at) >= ?", filters.from_date.clone());
    cond.push_opt("date(c.created_at) <= ?", filters.to_date.clone());
    cond.push_opt("c.user_id = ?", filters.user_id);
    cond.push_opt("c.item_id = ?", filters.item_id);
    cond
}

impl Database {
    // -- Claims --

    /// Inserts a pending claim. Returns `None` when the user already has a
    /// claim on the item.
    pub fn create_claim(&self, claim: &NewClaim<'_>) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "INSERT INTO item_claims (user_id, item_id, description, lost_location, lost_date, additional_proof, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending')
                 ON CONFLICT (user_id, item_id) DO NOTHING",
                rusqlite::params![
                    claim.user_id,
                    claim.item_id,
                    claim.description,
                    claim.lost_location,
                    claim.lost_date,
                    claim.additional_proof,
                ],
            )?;
            Ok((n > 0).then(|| conn.last_insert_rowid()))
        })
    }

    pub fn get_claim(&self, id: i64) -> Result<Option<ClaimRow>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{} AND c.id = ?1", CLAIM_SELECT), [id], map_claim)
                .optional()
        })
    }

    /// Newest first. `user_id` and `item_id` narrow to one claimant or one item.
    pub fn list_claims(&self, filters: &ListFilters, limit: u32, offset: u32) -> Result<Vec<ClaimRow>> {
        let mut cond = claim_conditions(filters);
        cond.params.push(i64::from(limit).into());
        cond.params.push(i64::from(offset).into());
        let sql = format!(
            "{}{} ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?",
            CLAIM_SELECT, cond.sql
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(cond.params), map_claim)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_claims(&self, filters: &ListFilters) -> Result<i64> {
        let cond = claim_conditions(filters);
        let sql = format!(
            "SELECT COUNT(*) FROM item_claims c
             JOIN found_items f ON c.item_id = f.id
             WHERE 1=1{}",
            cond.sql
        );
        self.with_conn(|conn| {
            let n = conn.query_row(&sql, rusqlite::params_from_iter(cond.params), |r| r.get(0))?;
            Ok(n)
        })
    }

    /// Plain status change. Approvals go through [`Database::approve_claim`].
    pub fn update_claim_status(&self, id: i64, status: ClaimStatus, admin_notes: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE item_claims SET status = ?1, admin_notes = ?2, updated_at = datetime('now') WHERE id = ?3",
                rusqlite::params![status.as_str(), admin_notes, id],
            )?;
            Ok(n > 0)
        })
    }

    /// Approves a claim in a single transaction: the claimed found item moves
    /// to `claimed` and every other pending claim on it is rejected.
    /// Returns `None` when the claim does not exist.
    pub fn approve_claim(&self, id: i64, admin_notes: Option<&str>) -> Result<Option<ApprovalOutcome>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let item_id: Option<i64> = tx
                .query_row("SELECT item_id FROM item_claims WHERE id = ?1", [id], |r| r.get(0))
                .optional()?;
            let Some(item_id) = item_id else {
                return Ok(None);
            };

            tx.execute(
                "UPDATE item_claims SET status = 'approved', admin_notes = ?1, updated_at = datetime('now')
                 WHERE id = ?2",
                rusqlite::params![admin_notes, id],
            )?;
            tx.execute(
                "UPDATE found_items SET status = 'claimed', updated_at = datetime('now') WHERE id = ?1",
                [item_id],
            )?;

            let rejected_claim_ids = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM item_claims WHERE item_id = ?1 AND id != ?2 AND status = 'pending'",
                )?;
                let ids = stmt
                    .query_map([item_id, id], |r| r.get(0))?
                    .collect::<std::result::Result<Vec<i64>, _>>()?;
                ids
            };
            tx.execute(
                "UPDATE item_claims SET status = 'rejected', admin_notes = ?1, updated_at = datetime('now')
                 WHERE item_id = ?2 AND id != ?3 AND status = 'pending'",
                rusqlite::params![CLAIMED_BY_OTHER_NOTE, item_id, id],
            )?;

            tx.commit()?;
            Ok(Some(ApprovalOutcome { item_id, rejected_claim_ids }))
        })
    }
}

fn map_claim(row: &Row<'_>) -> rusqlite::Result<ClaimRow> {
    Ok(ClaimRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        item_id: row.get(2)?,
        description: row.get(3)?,
        lost_location: row.get(4)?,
        lost_date: row.get(5)?,
        additional_proof: row.get(6)?,
        status: row.get(7)?,
        admin_notes: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        claimer_name: row.get(11)?,
        claimer_email: row.get(12)?,
        item_name: row.get(13)?,
        image_url: row.get(14)?,
        category_id: row.get(15)?,
        category_name: row.get(16)?,
        found_location: row.get(17)?,
        found_date: row.get(18)?,
    })
}

#[cfg(test)]
mod tests {
    use unylost_types::models::{FoundStatus, Role};

    use super::*;
    use crate::queries::test_support::{category, db, found_item, user};

    fn claim(db: &Database, user_id: i64, item_id: i64) -> i64 {
        db.create_claim(&NewClaim {
            user_id,
            item_id,
            description: "It has my student card inside",
            lost_location: Some("Library"),
            lost_date: Some("2024-04-30"),
            additional_proof: None,
        })
        .unwrap()
        .unwrap()
    }

    #[test]
    fn test_claim_joins_item_and_claimant() {
        let db = db();
        let reporter = user(&db, "rep@uny.ac.id", Role::User);
        let claimant = user(&db, "cl@uny.ac.id", Role::User);
        let cat = category(&db, "Wallets");
        let item = found_item(&db, reporter, cat, "Wallet");
        let id = claim(&db, claimant, item);

        let row = db.get_claim(id).unwrap().unwrap();
        assert_eq!(row.status(), ClaimStatus::Pending);
        assert_eq!(row.claimer_email, "cl@uny.ac.id");
        assert_eq!(row.item_name, "Wallet");
        assert_eq!(row.category_name, "Wallets");
        assert_eq!(row.found_location, "Library");

    }

    #[test]
    fn test_second_claim_on_same_item_is_refused() {
        let db = db();
        let reporter = user(&db, "rep@uny.ac.id", Role::User);
        let claimant = user(&db, "cl@uny.ac.id", Role::User);
        let cat = category(&db, "Wallets");
        let item = found_item(&db, reporter, cat, "Wallet");
        let other = found_item(&db, reporter, cat, "Purse");
        let first = claim(&db, claimant, item);

        let again = NewClaim {
            user_id: claimant,
            item_id: item,
            description: "Really mine",
            lost_location: None,
            lost_date: None,
            additional_proof: None,
        };
        assert!(db.create_claim(&again).unwrap().is_none());
        assert_eq!(db.get_claim(first).unwrap().unwrap().description, "It has my student card inside");

        let for_item = ListFilters { item_id: Some(item), ..Default::default() };
        assert_eq!(db.count_claims(&for_item).unwrap(), 1);

        claim(&db, claimant, other);
        claim(&db, reporter, item);
        assert_eq!(db.count_claims(&for_item).unwrap(), 2);
    }

    #[test]
    fn test_approval_cascade() {
        let db = db();
        let reporter = user(&db, "rep@uny.ac.id", Role::User);
        let a = user(&db, "a@uny.ac.id", Role::User);
        let b = user(&db, "b@uny.ac.id", Role::User);
        let c = user(&db, "c@uny.ac.id", Role::User);
        let cat = category(&db, "Phones");
        let item = found_item(&db, reporter, cat, "Phone");
        let other_item = found_item(&db, reporter, cat, "Charger");

        let winner = claim(&db, a, item);
        let loser = claim(&db, b, item);
        let already_rejected = claim(&db, c, item);
        let unrelated = claim(&db, b, other_item);
        db.update_claim_status(already_rejected, ClaimStatus::Rejected, Some("no proof"))
            .unwrap();

        let outcome = db.approve_claim(winner, Some("ID verified")).unwrap().unwrap();
        assert_eq!(outcome.item_id, item);
        assert_eq!(outcome.rejected_claim_ids, vec![loser]);

        let winner = db.get_claim(winner).unwrap().unwrap();
        assert_eq!(winner.status(), ClaimStatus::Approved);
        assert_eq!(winner.admin_notes.as_deref(), Some("ID verified"));

        let loser = db.get_claim(loser).unwrap().unwrap();
        assert_eq!(loser.status(), ClaimStatus::Rejected);
        assert_eq!(loser.admin_notes.as_deref(), Some(CLAIMED_BY_OTHER_NOTE));

        let untouched = db.get_claim(already_rejected).unwrap().unwrap();
        assert_eq!(untouched.admin_notes.as_deref(), Some("no proof"));
        assert_eq!(db.get_claim(unrelated).unwrap().unwrap().status(), ClaimStatus::Pending);

        assert_eq!(db.get_found_item(item).unwrap().unwrap().status(), FoundStatus::Claimed);
        assert!(db.approve_claim(9999, None).unwrap().is_none());
    }

    #[test]
    fn test_listing_filters() {
        let db = db();
        let reporter = user(&db, "rep@uny.ac.id", Role::User);
        let a = user(&db, "a@uny.ac.id", Role::User);
        let wallets = category(&db, "Wallets");
        let keys = category(&db, "Keys");
        let w = found_item(&db, reporter, wallets, "Wallet");
        let k = found_item(&db, reporter, keys, "Key");
        claim(&db, a, w);
        claim(&db, a, k);
        claim(&db, reporter, k);

        let mine = ListFilters { user_id: Some(a), ..Default::default() };
        assert_eq!(db.count_claims(&mine).unwrap(), 2);
        assert_eq!(db.list_claims(&mine, 10, 0).unwrap().len(), 2);

        let for_item = ListFilters { item_id: Some(k), ..Default::default() };
        assert_eq!(db.count_claims(&for_item).unwrap(), 2);

        let by_cat = ListFilters { category_id: Some(wallets), ..Default::default() };
        assert_eq!(db.count_claims(&by_cat).unwrap(), 1);

        let future = ListFilters { from_date: Some("2999-01-01".into()), ..Default::default() };
        assert_eq!(db.count_claims(&future).unwrap(), 0);
    }

    #[test]
    fn test_claims_cascade_with_item() {
        let db = db();
        let reporter = user(&db, "rep@uny.ac.id", Role::User);
        let cat = category(&db, "Misc");
        let item = found_item(&db, reporter, cat, "Hat");
        let id = claim(&db, reporter, item);
        db.delete_found_item(item).unwrap();
        assert!(db.get_claim(id).unwrap().is_none());
    }
}
