//! Read/write access to user credentials in the relational store

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use super::error::AuthError;
use super::roles::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User as seen by the auth layer
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    /// PHC-format password hash
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub employee_id: Option<String>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            employee_id: self.employee_id.clone(),
        }
    }
}

/// Public view returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub employee_id: Option<String>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Case-insensitive lookup, excluding deleted users
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, AuthError>;

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<(), AuthError>;
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    email: Option<String>,
    name: String,
    password: String,
    access_label: i16,
    activation_status: Option<i16>,
    deletion_status: Option<i16>,
    employee_id: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId(row.id),
            email: row.email.unwrap_or_default(),
            name: row.name,
            password_hash: row.password,
            role: Role::from_access_label(row.access_label),
            is_active: row.activation_status == Some(1) && row.deletion_status.unwrap_or(0) == 0,
            employee_id: row.employee_id,
        }
    }
}

const USER_COLUMNS: &str = r#"
    id::BIGINT AS id,
    email,
    name,
    password,
    access_label,
    activation_status,
    deletion_status,
    employee_id
"#;

/// Postgres-backed repository over the `users` table
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE LOWER(email) = LOWER($1) AND COALESCE(deletion_status, 0) = 0"
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, AuthError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE id = $1 AND COALESCE(deletion_status, 0) = 0"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET password = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.0)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
