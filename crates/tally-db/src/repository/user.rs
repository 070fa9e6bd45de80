//! # User Repository
//!
//! Staff accounts and password verification.
//!
//! Passwords are stored as Argon2 PHC strings; the plain text never reaches
//! the database or the logs.

use std::sync::OnceLock;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::validation::{validate_email, validate_password, validate_user_name};
use tally_core::{NewUser, User};

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Registers a user.
    ///
    /// The email is trimmed and lowercased before it is stored.
    ///
    /// ## Returns
    /// * `Ok(User)` - The stored user (hash included, never serialized)
    /// * `Err(DbError::Validation)` - Bad name, email or password
    /// * `Err(DbError::UniqueViolation)` - Email already registered
    pub async fn create(&self, input: &NewUser) -> DbResult<User> {
        validate_user_name(&input.name)?;
        validate_email(&input.email)?;
        validate_password(&input.password)?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            email: normalize_email(&input.email),
            password_hash: hash_password_blocking(input.password.clone()).await?,
            role: input.role,
            created_at: Utc::now(),
        };

        debug!(user_id = %user.id, role = %user.role, "Creating user");

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("email", &user.email),
            other => other,
        })?;

        Ok(user)
    }

    /// Gets a user by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, created_at
            FROM users
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Gets a user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, created_at
            FROM users
            WHERE email = ?1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Checks an email/password pair.
    ///
    /// ## Returns
    /// * `Ok(Some(User))` - Credentials match
    /// * `Ok(None)` - Unknown email or wrong password (indistinguishable)
    ///
    /// An unknown email is still checked against a placeholder hash, so both
    /// misses pay one Argon2 verification.
    pub async fn authenticate(&self, email: &str, password: &str) -> DbResult<Option<User>> {
        let user = self.get_by_email(email).await?;
        let stored_hash = user.as_ref().map(|u| u.password_hash.clone());

        let matches = verify_password_blocking(password.to_string(), stored_hash).await?;

        match user {
            Some(user) if matches => Ok(Some(user)),
            Some(user) => {
                debug!(user_id = %user.id, "Login with wrong password");
                Ok(None)
            }
            None => {
                debug!("Login for unknown email");
                Ok(None)
            }
        }
    }

    /// Counts registered users.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Runs [`hash_password`] on the blocking pool.
async fn hash_password_blocking(password: String) -> DbResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| DbError::Internal(format!("Password hashing task failed: {}", e)))?
}

/// Runs [`verify_password`] on the blocking pool.
///
/// `None` verifies against [`placeholder_hash`] and always yields `false`.
async fn verify_password_blocking(password: String, hash: Option<String>) -> DbResult<bool> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => verify_password(&password, &hash),
        None => {
            verify_password(&password, placeholder_hash());
            false
        }
    })
    .await
    .map_err(|e| DbError::Internal(format!("Password verification task failed: {}", e)))
}

/// Argon2 hash with the default parameters, used when no account matches.
fn placeholder_hash() -> &'static str {
    static PLACEHOLDER: OnceLock<String> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| hash_password("tally-placeholder-password").unwrap_or_default())
}

/// Hashes a password with Argon2 and a random salt.
pub fn hash_password(password: &str) -> DbResult<String> {
    use argon2::{
        password_hash::{rand_core::OsRng, SaltString},
        Argon2, PasswordHasher,
    };

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

// =============================================================================
// Unit Tests
// =============================================================================
