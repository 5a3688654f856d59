use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPool;
use std::collections::HashMap;
use std::sync::Mutex;

use super::error::ServiceError;
use crate::models::{NewUser, UniqueFields, UniqueFieldsTaken, User};

/// User records, password hashes and the single refresh token per user.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>, ServiceError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;
    async fn get_password_hash_by_email(&self, email: &str) -> Result<Option<String>, ServiceError>;
    async fn create_user(&self, user: NewUser) -> Result<User, ServiceError>;
    async fn get_refresh_token(&self, user_id: i64) -> Result<Option<String>, ServiceError>;
    /// Unconditional write; `None` clears the session.
    async fn set_refresh_token(&self, user_id: i64, token: Option<&str>) -> Result<(), ServiceError>;
    async fn is_refresh_token_set(&self, user_id: i64) -> Result<bool, ServiceError>;
    async fn check_unique_fields(&self, fields: &UniqueFields) -> Result<UniqueFieldsTaken, ServiceError>;
    async fn touch_last_login(&self, user_id: i64) -> Result<(), ServiceError>;
}

const USER_COLUMNS: &str = r#"
    id, uuid, email, phone_number, username, first_name, last_name,
    is_email_verified, is_phone_verified, last_login, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_password_hash_by_email(&self, email: &str) -> Result<Option<String>, ServiceError> {
        let hash = sqlx::query_scalar::<_, String>("SELECT password FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hash)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, ServiceError> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (
                uuid, email, phone_number, username, password,
                is_email_verified, is_phone_verified, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user.uuid)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.is_email_verified)
        .bind(user.is_phone_verified)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(user_id = created.id, "User created");
        Ok(created)
    }

    async fn get_refresh_token(&self, user_id: i64) -> Result<Option<String>, ServiceError> {
        let token = sqlx::query_scalar::<_, Option<String>>("SELECT refresh_token FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(token.flatten().filter(|t| !t.is_empty()))
    }

    async fn set_refresh_token(&self, user_id: i64, token: Option<&str>) -> Result<(), ServiceError> {
        let result = sqlx::query("UPDATE users SET refresh_token = $1, updated_at = NOW() WHERE id = $2")
            .bind(token)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::UserNotFound);
        }
        Ok(())
    }

    async fn is_refresh_token_set(&self, user_id: i64) -> Result<bool, ServiceError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE id = $1 AND refresh_token IS NOT NULL AND refresh_token <> ''
            )
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn check_unique_fields(&self, fields: &UniqueFields) -> Result<UniqueFieldsTaken, ServiceError> {
        let taken = sqlx::query_as::<_, UniqueFieldsTaken>(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM users WHERE LOWER(email) = LOWER($1)) AS email_taken,
                EXISTS (SELECT 1 FROM users WHERE phone_number = $2) AS phone_taken,
                EXISTS (SELECT 1 FROM users WHERE username = $3) AS username_taken
            "#,
        )
        .bind(&fields.email)
        .bind(&fields.phone_number)
        .bind(&fields.username)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn touch_last_login(&self, user_id: i64) -> Result<(), ServiceError> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct MockUserRow {
    user: User,
    password_hash: String,
    refresh_token: Option<String>,
}

/// In-memory credential store for tests.
#[derive(Default)]
pub struct MockCredentialStore {
    rows: Mutex<HashMap<i64, MockUserRow>>,
}

impl MockCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user row directly, bypassing sign-up.
    pub fn insert(&self, user: User, password_hash: &str) -> Result<(), ServiceError> {
        self.lock()?.insert(
            user.id,
            MockUserRow {
                user,
                password_hash: password_hash.to_string(),
                refresh_token: None,
            },
        );
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<i64, MockUserRow>>, ServiceError> {
        self.rows
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Mock credential store mutex poisoned: {}", e)))
    }

    fn find_by_email<'a>(rows: &'a HashMap<i64, MockUserRow>, email: &str) -> Option<&'a MockUserRow> {
        rows.values().find(|r| r.user.email.eq_ignore_ascii_case(email))
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>, ServiceError> {
        Ok(self.lock()?.get(&user_id).map(|r| r.user.clone()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let rows = self.lock()?;
        Ok(Self::find_by_email(&rows, email).map(|r| r.user.clone()))
    }

    async fn get_password_hash_by_email(&self, email: &str) -> Result<Option<String>, ServiceError> {
        let rows = self.lock()?;
        Ok(Self::find_by_email(&rows, email).map(|r| r.password_hash.clone()))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, ServiceError> {
        let mut rows = self.lock()?;
        let id = rows.keys().max().copied().unwrap_or(0) + 1;
        let password_hash = user.password_hash.clone();
        let created = user.into_user(id);
        rows.insert(
            id,
            MockUserRow {
                user: created.clone(),
                password_hash,
                refresh_token: None,
            },
        );
        Ok(created)
    }

    async fn get_refresh_token(&self, user_id: i64) -> Result<Option<String>, ServiceError> {
        Ok(self
            .lock()?
            .get(&user_id)
            .and_then(|r| r.refresh_token.clone())
            .filter(|t| !t.is_empty()))
    }

    async fn set_refresh_token(&self, user_id: i64, token: Option<&str>) -> Result<(), ServiceError> {
        let mut rows = self.lock()?;
        let row = rows.get_mut(&user_id).ok_or(ServiceError::UserNotFound)?;
        row.refresh_token = token.map(str::to_string);
        Ok(())
    }

    async fn is_refresh_token_set(&self, user_id: i64) -> Result<bool, ServiceError> {
        Ok(self.get_refresh_token(user_id).await?.is_some())
    }

    async fn check_unique_fields(&self, fields: &UniqueFields) -> Result<UniqueFieldsTaken, ServiceError> {
        let rows = self.lock()?;
        Ok(UniqueFieldsTaken {
            email_taken: rows.values().any(|r| r.user.email.eq_ignore_ascii_case(&fields.email)),
            phone_taken: rows.values().any(|r| r.user.phone_number == fields.phone_number),
            username_taken: rows.values().any(|r| r.user.username == fields.username),
        })
    }

    async fn touch_last_login(&self, user_id: i64) -> Result<(), ServiceError> {
        if let Some(row) = self.lock()?.get_mut(&user_id) {
            row.user.last_login = Some(Utc::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, phone: &str, username: &str) -> NewUser {
        NewUser::new(
            email.to_string(),
            phone.to_string(),
            username.to_string(),
            "$argon2id$stub".to_string(),
        )
    }

    #[tokio::test]
    async fn mock_create_and_lookup() {
        let store = MockCredentialStore::new();
        let user = store
            .create_user(new_user("a@x.com", "+6281234567890", "alice"))
            .await
            .unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(store.get_user_by_id(1).await.unwrap().unwrap().email, "a@x.com");
        assert!(store.get_user_by_email("A@X.COM").await.unwrap().is_some());
        assert_eq!(
            store.get_password_hash_by_email("a@x.com").await.unwrap().as_deref(),
            Some("$argon2id$stub")
        );
    }

    #[tokio::test]
    async fn mock_unique_fields() {
        let store = MockCredentialStore::new();
        store
            .create_user(new_user("a@x.com", "+6281234567890", "alice"))
            .await
            .unwrap();

        let taken = store
            .check_unique_fields(&UniqueFields {
                email: "b@x.com".to_string(),
                phone_number: "+6281234567890".to_string(),
                username: "alice".to_string(),
            })
            .await
            .unwrap();

        assert!(!taken.email_taken);
        assert!(taken.phone_taken);
        assert!(taken.username_taken);
    }

    #[tokio::test]
    async fn mock_refresh_token_column() {
        let store = MockCredentialStore::new();
        let user = store
            .create_user(new_user("a@x.com", "+6281234567890", "alice"))
            .await
            .unwrap();

        assert!(!store.is_refresh_token_set(user.id).await.unwrap());
        store.set_refresh_token(user.id, Some("r1")).await.unwrap();
        assert!(store.is_refresh_token_set(user.id).await.unwrap());
        store.set_refresh_token(user.id, Some("")).await.unwrap();
        assert!(!store.is_refresh_token_set(user.id).await.unwrap());
        store.set_refresh_token(user.id, None).await.unwrap();
        assert_eq!(store.get_refresh_token(user.id).await.unwrap(), None);

        assert!(matches!(
            store.set_refresh_token(99, Some("r")).await,
            Err(ServiceError::UserNotFound)
        ));
    }
}
