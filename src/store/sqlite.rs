use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::schema::SCHEMA;
use super::{CredentialStore, ResourceCatalog, SessionStore, Store};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
}

/// Reads a timestamp column. A value that does not parse is a conversion
/// error, never a substitute time.
fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// Fixed width so that text comparison in SQL orders like time.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl ToSql for PermissionLevel {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PermissionLevel {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        PermissionLevel::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown permission level '{s}'").into()))
    }
}

const USER_COLUMNS: &str = "id, username, password_hash, is_admin, is_root, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        is_admin: row.get(3)?,
        is_root: row.get(4)?,
        created_at: datetime_column(row, 5)?,
        updated_at: datetime_column(row, 6)?,
    })
}

fn permission_from_row(row: &Row<'_>) -> rusqlite::Result<ResourcePermission> {
    Ok(ResourcePermission {
        resource_id: row.get(0)?,
        user_id: row.get(1)?,
        level: row.get(2)?,
        created_at: datetime_column(row, 3)?,
        updated_at: datetime_column(row, 4)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        token_digest: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        created_at: datetime_column(row, 3)?,
        expires_at: datetime_column(row, 4)?,
    })
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<Resource> {
    Ok(Resource {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: datetime_column(row, 2)?,
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }
}

impl CredentialStore for SqliteStore {
    // User operations

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn insert_user(&self, user: &NewUser) -> Result<User> {
        let now = format_datetime(&Utc::now());
        let result = self.conn().query_row(
            &format!(
                "INSERT INTO users (username, password_hash, is_admin, is_root, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 RETURNING {USER_COLUMNS}"
            ),
            params![
                user.username,
                user.password_hash,
                user.is_admin,
                user.is_root,
                now
            ],
            user_from_row,
        );

        match result {
            Ok(user) => Ok(user),
            Err(e) if is_constraint_violation(&e) => Err(Error::Conflict(format!(
                "user '{}' already exists",
                user.username
            ))),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn list_users(&self, after_id: i64, limit: i32) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id > ?1 ORDER BY id LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![after_id, limit], user_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_user_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![password_hash, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn update_user_admin(&self, id: i64, is_admin: bool) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET is_admin = ?1, updated_at = ?2 WHERE id = ?3",
            params![is_admin, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_user(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn has_root_admin(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE is_root = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Permission operations

    fn find_permission(
        &self,
        resource_id: &str,
        user_id: i64,
    ) -> Result<Option<ResourcePermission>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT resource_id, user_id, level, created_at, updated_at
             FROM resource_permissions WHERE resource_id = ?1 AND user_id = ?2",
            params![resource_id, user_id],
            permission_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn upsert_permission(
        &self,
        resource_id: &str,
        user_id: i64,
        level: PermissionLevel,
    ) -> Result<ResourcePermission> {
        let now = format_datetime(&Utc::now());
        let result = self.conn().query_row(
            "INSERT INTO resource_permissions (resource_id, user_id, level, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT (resource_id, user_id) DO UPDATE SET
                level = excluded.level,
                updated_at = excluded.updated_at
             RETURNING resource_id, user_id, level, created_at, updated_at",
            params![resource_id, user_id, level, now],
            permission_from_row,
        );

        match result {
            Ok(permission) => Ok(permission),
            // The only constraint left after ON CONFLICT is the user foreign key.
            Err(e) if is_constraint_violation(&e) => Err(Error::NotFound),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn delete_permission(&self, resource_id: &str, user_id: i64) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM resource_permissions WHERE resource_id = ?1 AND user_id = ?2",
            params![resource_id, user_id],
        )?;
        Ok(rows > 0)
    }

    fn list_permissions_for_resource(&self, resource_id: &str) -> Result<Vec<PermissionListing>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT p.user_id, u.username, p.level
             FROM resource_permissions p
             JOIN users u ON u.id = p.user_id
             WHERE p.resource_id = ?1
             ORDER BY u.username",
        )?;

        let rows = stmt.query_map(params![resource_id], |row| {
            Ok(PermissionListing {
                user_id: row.get(0)?,
                username: row.get(1)?,
                level: row.get(2)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_permissions_for_user(&self, user_id: i64) -> Result<Vec<ResourcePermission>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT resource_id, user_id, level, created_at, updated_at
             FROM resource_permissions WHERE user_id = ?1 ORDER BY resource_id",
        )?;

        let rows = stmt.query_map(params![user_id], permission_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}

impl SessionStore for SqliteStore {
    fn insert_session(&self, session: &Session) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO sessions (token_digest, user_id, username, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.token_digest,
                session.user_id,
                session.username,
                format_datetime(&session.created_at),
                format_datetime(&session.expires_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => {
                Err(Error::Conflict("session token collision".to_string()))
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn find_session(&self, token_digest: &str) -> Result<Option<Session>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT token_digest, user_id, username, created_at, expires_at
             FROM sessions WHERE token_digest = ?1",
            params![token_digest],
            session_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_session(&self, token_digest: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM sessions WHERE token_digest = ?1",
            params![token_digest],
        )?;
        Ok(rows > 0)
    }

    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let rows = self.conn().execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![format_datetime(&now)],
        )?;
        Ok(rows)
    }
}

impl ResourceCatalog for SqliteStore {
    fn create_resource(&self, resource: &Resource) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO resources (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![
                resource.id,
                resource.name,
                format_datetime(&resource.created_at)
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::Conflict(format!(
                "resource '{}' already exists",
                resource.name
            ))),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_resource(&self, id: &str) -> Result<Option<Resource>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, created_at FROM resources WHERE id = ?1",
            params![id],
            resource_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_resources(&self) -> Result<Vec<Resource>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, name, created_at FROM resources ORDER BY created_at, id")?;

        let rows = stmt.query_map([], resource_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn rename_resource(&self, id: &str, name: &str) -> Result<()> {
        let result = self.conn().execute(
            "UPDATE resources SET name = ?1 WHERE id = ?2",
            params![name, id],
        );

        match result {
            Ok(0) => Err(Error::NotFound),
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => {
                Err(Error::Conflict(format!("resource '{name}' already exists")))
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn delete_resource(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM resource_permissions WHERE resource_id = ?1",
            params![id],
        )?;
        let rows = tx.execute("DELETE FROM resources WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(rows > 0)
    }
}
