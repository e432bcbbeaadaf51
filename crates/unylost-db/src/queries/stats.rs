use anyhow::Result;

use unylost_types::api::{
    ClaimStats, DashboardStats, FoundItemStats, LostItemStats, RecentItem, TopCategory,
    UserStatistics, UserTotals,
};

use crate::{Database, parse_timestamp};

impl Database {
    // -- Statistics --

    /// Site-wide figures for the admin dashboard.
    pub fn admin_dashboard(&self) -> Result<DashboardStats> {
        self.with_conn(|conn| {
            let users = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(role = 'admin'), 0) FROM users",
                [],
                |r| {
                    let total: i64 = r.get(0)?;
                    let admin_count: i64 = r.get(1)?;
                    Ok(UserTotals { total, admin_count, user_count: total - admin_count })
                },
            )?;

            let found_items = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'pending'), 0),
                        COALESCE(SUM(status = 'approved'), 0),
                        COALESCE(SUM(status = 'claimed'), 0)
                 FROM found_items",
                [],
                |r| {
                    Ok(FoundItemStats {
                        total: r.get(0)?,
                        pending_count: r.get(1)?,
                        approved_count: r.get(2)?,
                        claimed_count: r.get(3)?,
                    })
                },
            )?;

            let lost_items = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'active'), 0),
                        COALESCE(SUM(status = 'found'), 0)
                 FROM lost_items",
                [],
                |r| {
                    Ok(LostItemStats {
                        total: r.get(0)?,
                        active_count: r.get(1)?,
                        found_count: r.get(2)?,
                    })
                },
            )?;

            let claims = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'pending'), 0),
                        COALESCE(SUM(status = 'approved'), 0),
                        COALESCE(SUM(status = 'rejected'), 0)
                 FROM item_claims",
                [],
                |r| {
                    Ok(ClaimStats {
                        total: r.get(0)?,
                        pending_count: r.get(1)?,
                        approved_count: r.get(2)?,
                        rejected_count: r.get(3)?,
                    })
                },
            )?;

            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, COUNT(f.id) AS item_count
                 FROM categories c
                 LEFT JOIN found_items f ON c.id = f.category_id
                 GROUP BY c.id
                 ORDER BY item_count DESC, c.id ASC
                 LIMIT 5",
            )?;
            let top_categories = stmt
                .query_map([], |r| {
                    Ok(TopCategory { id: r.get(0)?, name: r.get(1)?, item_count: r.get(2)? })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare(
                "SELECT id, item_name, status, created_at, kind FROM (
                    SELECT id, item_name, status, created_at, 'found' AS kind FROM found_items
                    UNION ALL
                    SELECT id, item_name, status, created_at, 'lost' AS kind FROM lost_items
                 )
                 ORDER BY created_at DESC, id DESC
                 LIMIT 5",
            )?;
            let recent_items = stmt
                .query_map([], |r| {
                    let created_at: String = r.get(3)?;
                    Ok(RecentItem {
                        id: r.get(0)?,
                        item_name: r.get(1)?,
                        status: r.get(2)?,
                        created_at: parse_timestamp(&created_at),
                        kind: r.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(DashboardStats { users, found_items, lost_items, claims, top_categories, recent_items })
        })
    }

    /// Personal counters shown on the mobile home screen. A match is an
    /// approved claim where the user is either the claimant or the reporter.
    pub fn user_statistics(&self, user_id: i64) -> Result<UserStatistics> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM found_items WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM lost_items WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM item_claims ic
                        JOIN found_items fi ON ic.item_id = fi.id
                        WHERE (ic.user_id = ?1 OR fi.user_id = ?1) AND ic.status = 'approved'),
                    (SELECT COUNT(*) FROM item_claims WHERE user_id = ?1 AND status = 'pending')",
                [user_id],
                |r| {
                    Ok(UserStatistics {
                        found_items: r.get(0)?,
                        lost_items: r.get(1)?,
                        matched_items: r.get(2)?,
                        pending_claims: r.get(3)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }
}
