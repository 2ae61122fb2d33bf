use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::users::repo_types::{NewUser, User};

/// Returned by `insert` and `update` when another user already holds the
/// email (compared case-insensitively).
#[derive(Debug, thiserror::Error)]
#[error("email already registered: {0}")]
pub struct EmailTaken(pub String);

fn unique_email(err: sqlx::Error, email: &str, action: &'static str) -> anyhow::Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => EmailTaken(email.to_string()).into(),
        _ => anyhow::Error::new(err).context(action),
    }
}

/// Storage port for users.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;
    /// Case-insensitive email lookup.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn list(&self) -> anyhow::Result<Vec<User>>;
    /// Fails with [`EmailTaken`] if the email is already registered.
    async fn insert(&self, user: NewUser) -> anyhow::Result<User>;
    async fn update(&self, user: &User) -> anyhow::Result<()>;
    /// Returns `false` when no user had that id.
    async fn delete(&self, id: i64) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email
            FROM users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email
            FROM users
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(users)
    }

    async fn insert(&self, user: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email)
            VALUES ($1, $2)
            RETURNING id, name, email
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .fetch_one(&self.db)
        .await
        .map_err(|e| unique_email(e, &user.email, "insert user"))?;
        Ok(user)
    }

    async fn update(&self, user: &User) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET name = $2, email = $3
             WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .execute(&self.db)
        .await
        .map_err(|e| unique_email(e, &user.email, "update user"))?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }
}
