//! User storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{format_datetime, parse_datetime, parse_role, parse_uuid, to_u64, OptionalExt};
use crate::error::{Error, Result};
use crate::models::{User, UserRole};

pub struct UserStore<'a> {
    conn: &'a Connection,
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: parse_role(&row.get::<_, String>(3)?)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?)?,
    })
}

impl<'a> UserStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new user
    #[instrument(skip(self, user), fields(user_id = %user.id, role = %user.role))]
    pub fn create(&self, user: &User) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO users (id, name, email, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.to_string(),
                    user.name,
                    user.email,
                    user.role.as_str(),
                    format_datetime(&user.created_at),
                ],
            )
            .map_err(|e| {
                if super::parse::is_unique_violation(&e) {
                    Error::Conflict(format!("Email {} is already registered", user.email))
                } else {
                    Error::Database(e)
                }
            })?;
        Ok(())
    }

    /// Find user by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, name, email, role, created_at FROM users WHERE id = ?1",
                params![id.to_string()],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Find user by email
    #[instrument(skip(self))]
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, name, email, role, created_at FROM users WHERE email = ?1",
                params![email],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Count accounts holding `role`
    pub fn count_by_role(&self, role: UserRole) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1",
            params![role.as_str()],
            |row| row.get(0),
        )?;
        Ok(to_u64(count)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn test_create_and_find() {
        let db = Database::open_in_memory().unwrap();
        let user = User::new("Ada".into(), "ada@example.com".into(), UserRole::User);
        db.users().create(&user).unwrap();

        let found = db.users().find_by_id(user.id).unwrap().unwrap();
        assert_eq!(found.email, "ada@example.com");
        assert_eq!(found.role, UserRole::User);

        let by_email = db.users().find_by_email("ada@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(db.users().find_by_id(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        let a = User::new("A".into(), "same@example.com".into(), UserRole::User);
        let b = User::new("B".into(), "same@example.com".into(), UserRole::Admin);
        db.users().create(&a).unwrap();
        assert!(matches!(db.users().create(&b), Err(Error::Conflict(_))));
    }

    #[test]
    fn test_count_by_role() {
        let db = Database::open_in_memory().unwrap();
        for (i, role) in [UserRole::User, UserRole::User, UserRole::Admin].iter().enumerate() {
            let user = User::new(format!("u{}", i), format!("u{}@x.io", i), *role);
            db.users().create(&user).unwrap();
        }
        assert_eq!(db.users().count_by_role(UserRole::User).unwrap(), 2);
        assert_eq!(db.users().count_by_role(UserRole::Admin).unwrap(), 1);
    }
}
