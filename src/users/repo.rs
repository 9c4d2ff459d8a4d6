use axum::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use crate::users::repo_types::{NewUser, User, UserSummary};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence of user records, backend agnostic.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    /// Marks the holder of `token` verified and clears the token in one step.
    /// Returns the user id, or `None` when no row holds the token.
    async fn consume_activation_token(&self, token: &str) -> Result<Option<i64>, StoreError>;
    /// Verified users only.
    async fn find_active_by_id(&self, id: i64) -> Result<Option<UserSummary>, StoreError>;
    /// One page of verified users ordered by id, plus the total verified count.
    async fn find_active_page(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<UserSummary>, i64), StoreError>;
    /// Persists the username and verification state.
    async fn update(&self, user: &User) -> Result<(), StoreError>;
    async fn begin(&self) -> Result<Box<dyn UserTransaction>, StoreError>;
}

/// Writes made through a transaction stay invisible until `commit`.
#[async_trait]
pub trait UserTransaction: Send {
    async fn insert(&mut self, user: NewUser) -> Result<User, StoreError>;
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
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
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password, email_verified, activation_token
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password, email_verified, activation_token
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn consume_activation_token(&self, token: &str) -> Result<Option<i64>, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
               SET email_verified = TRUE, activation_token = NULL, updated_at = now()
             WHERE activation_token = $1
            RETURNING id
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(id)
    }

    async fn find_active_by_id(&self, id: i64) -> Result<Option<UserSummary>, StoreError> {
        let user = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT id, username, email
            FROM users
            WHERE id = $1 AND email_verified = TRUE
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_active_page(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<UserSummary>, i64), StoreError> {
        let rows = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT id, username, email
            FROM users
            WHERE email_verified = TRUE
            ORDER BY id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM users WHERE email_verified = TRUE"#)
                .fetch_one(&self.db)
                .await?;

        Ok((rows, count))
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
               SET username = $2, email_verified = $3, activation_token = $4, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(user.email_verified)
        .bind(user.activation_token.as_deref())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn UserTransaction>, StoreError> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgUserTransaction { tx }))
    }
}

pub struct PgUserTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UserTransaction for PgUserTransaction {
    async fn insert(&mut self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password, email_verified, activation_token)
            VALUES ($1, $2, $3, FALSE, $4)
            RETURNING id, username, email, password, email_verified, activation_token
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.activation_token)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_insert_error)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgUserTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let PgUserTransaction { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}

fn map_insert_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Database(e)
}
