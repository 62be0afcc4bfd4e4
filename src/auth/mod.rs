//! Authentication Module
//!
//! Handles user signup, login, and session management. User and session
//! records live in a SQLite database; validated sessions are cached in
//! memory. The rest of the server only ever consumes the resolved user id.

use std::path::Path;

use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// User record stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub profile_pic: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public user info (no sensitive data).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub profile_pic: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            profile_pic: user.profile_pic,
            created_at: user.created_at,
        }
    }
}

/// Session token for authenticated requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Auth manager handles all authentication.
pub struct AuthManager {
    pool: SqlitePool,
    /// In-memory session cache
    sessions: RwLock<HashMap<String, Session>>,
}

impl AuthManager {
    /// Create new auth manager backed by the given database file.
    pub async fn new(db_path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let manager = Self {
            pool,
            sessions: RwLock::new(HashMap::new()),
        };
        manager.init_db().await?;

        info!("[Auth] Initialized at {:?}", db_path);

        Ok(manager)
    }

    async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                full_name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                profile_pic TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Register a new user.
    pub async fn signup(&self, email: String, full_name: String, password: String) -> Result<User> {
        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;

        if existing.is_some() {
            anyhow::bail!("Email already exists");
        }

        let password_hash = hash(&password, DEFAULT_COST).context("Failed to hash password")?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email,
            full_name,
            password_hash,
            profile_pic: String::new(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO users (id, email, full_name, password_hash, profile_pic, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(&user.profile_pic)
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        info!("[Auth] User registered: {} ({})", user.full_name, user.email);

        Ok(user)
    }

    /// Login user and create session.
    pub async fn login(&self, email: String, password: String) -> Result<(UserInfo, Session)> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, full_name, password_hash, profile_pic, created_at FROM users WHERE email = ?",
        )
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?;

        let (user_id, email, full_name, password_hash, profile_pic, created_at) =
            row.ok_or_else(|| anyhow::anyhow!("Invalid email or password"))?;

        let valid = verify(&password, &password_hash).context("Failed to verify password")?;
        if !valid {
            warn!("[Auth] Failed login attempt for {}", email);
            anyhow::bail!("Invalid email or password");
        }

        let session = self.create_session(&user_id).await?;

        let user = UserInfo {
            id: user_id,
            email,
            full_name,
            profile_pic,
            created_at: parse_timestamp(&created_at),
        };

        info!("[Auth] User logged in: {}", user.full_name);

        Ok((user, session))
    }

    async fn create_session(&self, user_id: &str) -> Result<Session> {
        let session = Session {
            token: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::days(30),
        };

        sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.token)
        .bind(&session.user_id)
        .bind(session.created_at.to_rfc3339())
        .bind(session.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session.clone());

        Ok(session)
    }

    /// Validate session token, returning the authenticated user.
    pub async fn validate_session(&self, token: &str) -> Result<UserInfo> {
        let cached_user_id = {
            let sessions = self.sessions.read().await;
            sessions
                .get(token)
                .filter(|s| s.expires_at > Utc::now())
                .map(|s| s.user_id.clone())
        };

        if let Some(user_id) = cached_user_id {
            return self.get_user(&user_id).await;
        }

        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT s.user_id, s.expires_at FROM sessions s WHERE s.token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((user_id, expires_at)) = row {
            let expires = parse_timestamp(&expires_at);
            if expires > Utc::now() {
                return self.get_user(&user_id).await;
            }
        }

        anyhow::bail!("Invalid or expired session")
    }

    /// Logout user (invalidate session).
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.sessions.write().await.remove(token);

        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;

        info!("[Auth] Session invalidated");

        Ok(())
    }

    /// Get user by ID.
    pub async fn get_user(&self, user_id: &str) -> Result<UserInfo> {
        let row: Option<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, email, full_name, profile_pic, created_at FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let (id, email, full_name, profile_pic, created_at) =
            row.ok_or_else(|| anyhow::anyhow!("User not found"))?;

        Ok(UserInfo {
            id,
            email,
            full_name,
            profile_pic,
            created_at: parse_timestamp(&created_at),
        })
    }

    /// List every user except the caller (contact sidebar).
    pub async fn list_users_except(&self, user_id: &str) -> Result<Vec<UserInfo>> {
        let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, email, full_name, profile_pic, created_at FROM users WHERE id != ?",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, email, full_name, profile_pic, created_at)| UserInfo {
                id,
                email,
                full_name,
                profile_pic,
                created_at: parse_timestamp(&created_at),
            })
            .collect())
    }

    /// Update a user's profile picture URL.
    pub async fn update_profile_pic(&self, user_id: &str, url: &str) -> Result<UserInfo> {
        sqlx::query("UPDATE users SET profile_pic = ?, updated_at = ? WHERE id = ?")
            .bind(url)
            .bind(Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        self.get_user(user_id).await
    }
}

type UserRow = (String, String, String, String, String, String);

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|_| Utc::now())
}
