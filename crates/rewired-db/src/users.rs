use rusqlite::{params, OptionalExtension, Row};

use rewired_types::api::UpdateProfileRequest;
use rewired_types::models::{PublicUser, SellerProfile};

use crate::models::{enum_col, NewUser, UserRow};
use crate::{Database, Result, StoreError};

const USER_COLS: &str = "id, username, email, password, full_name, phone, address, city, state, \
                         zip_code, role, is_active, email_verified, created_at, updated_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        full_name: row.get(4)?,
        phone: row.get(5)?,
        address: row.get(6)?,
        city: row.get(7)?,
        state: row.get(8)?,
        zip_code: row.get(9)?,
        role: enum_col(row, 10)?,
        is_active: row.get(11)?,
        email_verified: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

impl Database {
    /// Inserts a new user. Conflict if the email or username is taken.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<UserRow> {
        self.with_conn(|conn| {
            let taken: Option<i64> = conn
                .query_row(
                    "SELECT id FROM users WHERE email = ?1 OR username = ?2",
                    params![user.email, user.username],
                    |row| row.get(0),
                )
                .optional()?;

            if taken.is_some() {
                return Err(StoreError::conflict(
                    "User with this email or username already exists",
                ));
            }

            conn.execute(
                "INSERT INTO users (username, email, password, full_name, phone, address, city, state, zip_code)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user.username,
                    user.email,
                    user.password_hash,
                    user.full_name,
                    user.phone,
                    user.address,
                    user.city,
                    user.state,
                    user.zip_code,
                ],
            )?;

            let id = conn.last_insert_rowid();
            let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLS);
            Ok(conn.query_row(&sql, [id], map_user)?)
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLS);
            Ok(conn.query_row(&sql, [id], map_user).optional()?)
        })
    }

    /// Login lookup: only active accounts match.
    pub fn get_active_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users WHERE email = ?1 AND is_active = 1",
                USER_COLS
            );
            Ok(conn.query_row(&sql, [email], map_user).optional()?)
        })
    }

    /// Stamps updated_at, used as a last-login marker.
    pub fn touch_user(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET updated_at = datetime('now') WHERE id = ?1",
                [id],
            )?;
            Ok(())
        })
    }

    /// Dynamic SET over the profile fields present in the request.
    pub fn update_profile(&self, id: i64, req: &UpdateProfileRequest) -> Result<UserRow> {
        self.with_conn(|conn| {
            let mut sets: Vec<&str> = Vec::new();
            let mut values: Vec<rusqlite::types::Value> = Vec::new();

            if let Some(v) = &req.full_name {
                sets.push("full_name = ?");
                values.push(v.clone().into());
            }
            if let Some(v) = &req.phone {
                sets.push("phone = ?");
                values.push(v.clone().into());
            }
            if let Some(v) = &req.address {
                sets.push("address = ?");
                values.push(v.clone().into());
            }
            if let Some(v) = &req.city {
                sets.push("city = ?");
                values.push(v.clone().into());
            }
            if let Some(v) = &req.state {
                sets.push("state = ?");
                values.push(v.clone().into());
            }
            if let Some(v) = &req.zip_code {
                sets.push("zip_code = ?");
                values.push(v.clone().into());
            }

            if sets.is_empty() {
                return Err(StoreError::invalid("No fields to update"));
            }

            sets.push("updated_at = datetime('now')");
            values.push(id.into());

            let sql = format!("UPDATE users SET {} WHERE id = ?", sets.join(", "));
            let changed = conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
            if changed == 0 {
                return Err(StoreError::not_found("User not found"));
            }

            let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLS);
            Ok(conn.query_row(&sql, [id], map_user)?)
        })
    }

    pub fn password_hash(&self, id: i64) -> Result<String> {
        self.with_conn(|conn| {
            conn.query_row("SELECT password FROM users WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or_else(|| StoreError::not_found("User not found"))
        })
    }

    pub fn set_password(&self, id: i64, hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![hash, id],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("User not found"));
            }
            Ok(())
        })
    }

    /// Admin deactivation; accounts are never hard-deleted.
    pub fn set_user_active(&self, id: i64, active: bool) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET is_active = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![active, id],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("User not found"));
            }
            Ok(())
        })
    }

    pub fn list_users(&self, page: u32, limit: u32) -> Result<(Vec<PublicUser>, i64)> {
        self.with_conn(|conn| {
            let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
            let sql = format!(
                "SELECT {} FROM users ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
                USER_COLS
            );
            let mut stmt = conn.prepare(&sql)?;
            let users = stmt
                .query_map(params![limit, offset], map_user)?
                .collect::<rusqlite::Result<Vec<_>>>()?
                .into_iter()
                .map(UserRow::into_public)
                .collect();

            let total: i64 =
                conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            Ok((users, total))
        })
    }

    /// Public seller profile with aggregate listing/sale counts.
    pub fn public_profile(&self, id: i64) -> Result<SellerProfile> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT u.id, u.username, u.created_at,
                        (SELECT COUNT(*) FROM products
                          WHERE seller_id = u.id AND status = 'available'),
                        (SELECT COUNT(*) FROM transactions
                          WHERE seller_id = u.id AND status = 'completed')
                 FROM users u
                 WHERE u.id = ?1 AND u.is_active = 1",
                [id],
                |row| {
                    Ok(SellerProfile {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        created_at: row.get(2)?,
                        total_products: row.get(3)?,
                        total_sales: row.get(4)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("User not found"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::register;

    #[test]
    fn duplicate_email_or_username_conflicts() {
        let db = Database::open_in_memory().unwrap();
        register(&db, "alice", "alice@example.com");

        let err = db
            .create_user(&NewUser {
                username: "alice2",
                email: "alice@example.com",
                password_hash: "hash",
                full_name: "Alice Again",
                phone: None,
                address: None,
                city: None,
                state: None,
                zip_code: None,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let err = db
            .create_user(&NewUser {
                username: "alice",
                email: "other@example.com",
                password_hash: "hash",
                full_name: "Alice Again",
                phone: None,
                address: None,
                city: None,
                state: None,
                zip_code: None,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn inactive_user_cannot_login_lookup() {
        let db = Database::open_in_memory().unwrap();
        let id = register(&db, "bob", "bob@example.com");

        assert!(db
            .get_active_user_by_email("bob@example.com")
            .unwrap()
            .is_some());

        db.set_user_active(id, false).unwrap();
        assert!(db
            .get_active_user_by_email("bob@example.com")
            .unwrap()
            .is_none());
    }

    #[test]
    fn profile_update_is_partial() {
        let db = Database::open_in_memory().unwrap();
        let id = register(&db, "carol", "carol@example.com");

        let row = db
            .update_profile(
                id,
                &UpdateProfileRequest {
                    full_name: None,
                    phone: Some("555-0100".into()),
                    address: None,
                    city: Some("Lisbon".into()),
                    state: None,
                    zip_code: None,
                },
            )
            .unwrap();
        assert_eq!(row.phone.as_deref(), Some("555-0100"));
        assert_eq!(row.city.as_deref(), Some("Lisbon"));
        assert_eq!(row.full_name, "carol test");

        let err = db
            .update_profile(id, &UpdateProfileRequest {
                full_name: None,
                phone: None,
                address: None,
                city: None,
                state: None,
                zip_code: None,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[test]
    fn public_profile_hides_inactive() {
        let db = Database::open_in_memory().unwrap();
        let id = register(&db, "dave", "dave@example.com");

        let profile = db.public_profile(id).unwrap();
        assert_eq!(profile.username, "dave");
        assert_eq!(profile.total_products, 0);

        db.set_user_active(id, false).unwrap();
        assert!(matches!(
            db.public_profile(id).unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
