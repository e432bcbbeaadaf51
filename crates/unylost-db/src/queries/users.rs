use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use unylost_types::models::Role;

use super::OptionalExt;
use crate::models::{NewUser, UserRow};
use crate::{Database, format_timestamp};

const USER_COLUMNS: &str = "id, full_name, email, password, phone_number, address, role, is_verified,
     verification_token, last_login, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (full_name, email, password, phone_number, address, role, is_verified, verification_token)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    user.full_name,
                    user.email,
                    user.password_hash,
                    user.phone_number,
                    user.address,
                    user.role.as_str(),
                    user.is_verified,
                    user.verification_token,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn get_user_by_verification_token(&self, token: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "verification_token = ?1", token))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM users ORDER BY id ASC", USER_COLUMNS))?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn has_admin(&self) -> Result<bool> {
        self.with_conn(|conn| {
            let n: i64 =
                conn.query_row("SELECT COUNT(*) FROM users WHERE role = 'admin'", [], |r| r.get(0))?;
            Ok(n > 0)
        })
    }

    /// Marks the user verified and clears the pending code.
    pub fn mark_user_verified(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET is_verified = 1, verification_token = NULL, updated_at = datetime('now')
                 WHERE id = ?1",
                [id],
            )?;
            Ok(())
        })
    }

    pub fn touch_last_login(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE users SET last_login = datetime('now') WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Stores the digest of a password-reset token and its expiry.
    pub fn set_reset_token(&self, id: i64, token_hash: &str, expires: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET reset_password_token = ?1, reset_password_expires = ?2 WHERE id = ?3",
                rusqlite::params![token_hash, format_timestamp(expires), id],
            )?;
            Ok(())
        })
    }

    /// Finds the user owning an unexpired reset token digest.
    pub fn get_user_by_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users WHERE reset_password_token = ?1 AND reset_password_expires > ?2",
                USER_COLUMNS
            ))?;
            stmt.query_row(rusqlite::params![token_hash, format_timestamp(now)], map_user)
                .optional()
        })
    }

    /// Replaces the password hash and invalidates any outstanding reset token.
    pub fn reset_password(&self, id: i64, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password = ?1, reset_password_token = NULL, reset_password_expires = NULL,
                 updated_at = datetime('now') WHERE id = ?2",
                rusqlite::params![password_hash, id],
            )?;
            Ok(())
        })
    }

    pub fn update_user_role(&self, id: i64, role: Role) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET role = ?1, updated_at = datetime('now') WHERE id = ?2",
                rusqlite::params![role.as_str(), id],
            )?;
            Ok(n > 0)
        })
    }

    /// (found items reported, lost items reported, claims submitted)
    pub fn user_activity_counts(&self, id: i64) -> Result<(i64, i64, i64)> {
        self.with_conn(|conn| {
            let counts = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM found_items WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM lost_items WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM item_claims WHERE user_id = ?1)",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )?;
            Ok(counts)
        })
    }
}

fn query_user<P: rusqlite::ToSql>(conn: &Connection, predicate: &str, value: P) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, predicate))?;
    stmt.query_row([value], map_user).optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        phone_number: row.get(4)?,
        address: row.get(5)?,
        role: row.get(6)?,
        is_verified: row.get(7)?,
        verification_token: row.get(8)?,
        last_login: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::queries::test_support::{category, db, found_item, user};

    #[test]
    fn test_create_and_lookup_user() {
        let db = db();
        let id = user(&db, "a@uny.ac.id", Role::User);

        let row = db.get_user_by_email("a@uny.ac.id").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.role(), Role::User);
        assert!(!row.is_verified);

        assert!(db.get_user_by_email("missing@uny.ac.id").unwrap().is_none());
        assert_eq!(db.get_user_by_verification_token("123456").unwrap().unwrap().id, id);
    }

    #[test]
    fn test_duplicate_email_is_rejected() {
        let db = db();
        user(&db, "dup@uny.ac.id", Role::User);
        let again = db.create_user(&NewUser {
            full_name: "Other",
            email: "dup@uny.ac.id",
            password_hash: "x",
            phone_number: None,
            address: None,
            role: Role::User,
            is_verified: false,
            verification_token: None,
        });
        assert!(again.is_err());
    }

    #[test]
    fn test_verification_clears_token() {
        let db = db();
        let id = user(&db, "v@uny.ac.id", Role::User);
        db.mark_user_verified(id).unwrap();
        let row = db.get_user_by_id(id).unwrap().unwrap();
        assert!(row.is_verified);
        assert!(row.verification_token.is_none());
    }

    #[test]
    fn test_reset_token_expiry() {
        let db = db();
        let id = user(&db, "r@uny.ac.id", Role::User);
        let now = Utc::now();
        db.set_reset_token(id, "digest", now + Duration::hours(1)).unwrap();

        assert!(db.get_user_by_reset_token("digest", now).unwrap().is_some());
        assert!(db.get_user_by_reset_token("digest", now + Duration::hours(2)).unwrap().is_none());
        assert!(db.get_user_by_reset_token("other", now).unwrap().is_none());

        db.reset_password(id, "new-hash").unwrap();
        assert!(db.get_user_by_reset_token("digest", now).unwrap().is_none());
        assert_eq!(db.get_user_by_id(id).unwrap().unwrap().password, "new-hash");
    }

    #[test]
    fn test_role_update_and_admin_presence() {
        let db = db();
        let id = user(&db, "p@uny.ac.id", Role::User);
        assert!(!db.has_admin().unwrap());
        assert!(db.update_user_role(id, Role::Admin).unwrap());
        assert!(db.has_admin().unwrap());
        assert!(!db.update_user_role(999, Role::Admin).unwrap());
    }

    #[test]
    fn test_activity_counts() {
        let db = db();
        let id = user(&db, "c@uny.ac.id", Role::User);
        let cat = category(&db, "Wallets");
        found_item(&db, id, cat, "Wallet");
        found_item(&db, id, cat, "Purse");
        assert_eq!(db.user_activity_counts(id).unwrap(), (2, 0, 0));
    }
}
