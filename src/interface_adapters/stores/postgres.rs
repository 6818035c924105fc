use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::sync::Arc;

use crate::domain::entities::{IssuedDevice, TrackedGuest};
use crate::domain::errors::GuestError;
use crate::domain::identifiers::{ACCESS_TOKEN_ALPHABET, ACCESS_TOKEN_LEN, qualify};
use crate::domain::ports::{Clock, GuestTracker, HostDirectory, RandomSource};

const HOST_DEVICE_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const HOST_DEVICE_ID_LEN: usize = 10;

fn storage_error(err: sqlx::Error) -> GuestError {
    GuestError::TransientBackend(format!("database error: {err}"))
}

// Escape LIKE wildcards so the prefix and server name match literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// `@<prefix>%:<server_name>` with the literal parts escaped.
fn guest_like_pattern(localpart_prefix: &str, server_name: &str) -> String {
    format!(
        "@{}%:{}",
        escape_like(localpart_prefix),
        escape_like(server_name)
    )
}

// PostgreSQL-backed host directory for running the service standalone.
#[derive(Clone)]
pub struct PostgresHostDirectory {
    db: PgPool,
    server_name: String,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
}

impl PostgresHostDirectory {
    pub fn new(
        db: PgPool,
        server_name: impl Into<String>,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            db,
            server_name: server_name.into(),
            clock,
            random,
        }
    }
}

#[async_trait]
impl HostDirectory for PostgresHostDirectory {
    async fn user_exists(&self, user_id: &str) -> Result<bool, GuestError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE name = $1)")
            .bind(user_id)
            .fetch_one(&self.db)
            .await
            .map_err(storage_error)
    }

    async fn register_user(
        &self,
        localpart: &str,
        display_name: Option<&str>,
        admin: bool,
    ) -> Result<String, GuestError> {
        let user_id = qualify(localpart, &self.server_name);
        let mut tx = self.db.begin().await.map_err(storage_error)?;

        sqlx::query("INSERT INTO users (name, admin, deactivated, creation_ts) VALUES ($1, $2, FALSE, $3)")
            .bind(&user_id)
            .bind(admin)
            .bind(self.clock.now_epoch_seconds() as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, display_name)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET display_name = EXCLUDED.display_name
            "#,
        )
        .bind(&user_id)
        .bind(display_name)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        Ok(user_id)
    }

    async fn register_device(&self, user_id: &str) -> Result<IssuedDevice, GuestError> {
        let device = IssuedDevice {
            device_id: self
                .random
                .public_string(HOST_DEVICE_ID_ALPHABET, HOST_DEVICE_ID_LEN),
            access_token: format!(
                "gst_{}",
                self.random
                    .secure_string(ACCESS_TOKEN_ALPHABET, ACCESS_TOKEN_LEN)
            ),
        };

        sqlx::query("INSERT INTO access_tokens (user_id, device_id, token) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(&device.device_id)
            .bind(&device.access_token)
            .execute(&self.db)
            .await
            .map_err(storage_error)?;

        Ok(device)
    }

    async fn set_display_name(&self, user_id: &str, display_name: &str) -> Result<(), GuestError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, display_name)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET display_name = EXCLUDED.display_name
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .execute(&self.db)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn find_access_token(&self, user_id: &str) -> Result<Option<String>, GuestError> {
        sqlx::query_scalar::<_, String>(
            "SELECT token FROM access_tokens WHERE user_id = $1 ORDER BY id LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(storage_error)
    }

    async fn expired_guest_users(
        &self,
        localpart_prefix: &str,
        exclude_user_id: &str,
        cutoff: u64,
    ) -> Result<Vec<String>, GuestError> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT name
            FROM users
            WHERE name != $1
            AND name LIKE $2 ESCAPE '\'
            AND deactivated = FALSE
            AND creation_ts < $3
            ORDER BY name
            "#,
        )
        .bind(exclude_user_id)
        .bind(guest_like_pattern(localpart_prefix, &self.server_name))
        .bind(cutoff as i64)
        .fetch_all(&self.db)
        .await
        .map_err(storage_error)
    }

    async fn deactivate_user(&self, user_id: &str) -> Result<bool, GuestError> {
        let mut tx = self.db.begin().await.map_err(storage_error)?;

        let updated = sqlx::query("UPDATE users SET deactivated = TRUE WHERE name = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?
            .rows_affected();

        // Deactivated accounts keep no live sessions.
        sqlx::query("DELETE FROM access_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        Ok(updated > 0)
    }

    async fn is_admin_token(&self, token: &str) -> Result<bool, GuestError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM access_tokens t
                JOIN users u ON u.name = t.user_id
                WHERE t.token = $1 AND u.admin AND NOT u.deactivated
            )
            "#,
        )
        .bind(token)
        .fetch_one(&self.db)
        .await
        .map_err(storage_error)
    }
}

// PostgreSQL-backed tracking table for remote guests.
#[derive(Clone)]
pub struct PostgresGuestTracker {
    db: PgPool,
}

impl PostgresGuestTracker {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GuestTracker for PostgresGuestTracker {
    async fn insert(&self, guest: &TrackedGuest) -> Result<(), GuestError> {
        sqlx::query(
            "INSERT INTO guest_remote_users (remote_user_id, user_id, created_at_sec) VALUES ($1, $2, $3)",
        )
        .bind(&guest.remote_user_id)
        .bind(&guest.user_id)
        .bind(guest.created_at_sec as i64)
        .execute(&self.db)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn expired_before(&self, cutoff: u64) -> Result<Vec<TrackedGuest>, GuestError> {
        let rows = sqlx::query(
            r#"
            SELECT remote_user_id, user_id, created_at_sec
            FROM guest_remote_users
            WHERE created_at_sec < $1
            ORDER BY created_at_sec
            "#,
        )
        .bind(cutoff as i64)
        .fetch_all(&self.db)
        .await
        .map_err(storage_error)?;

        rows.into_iter()
            .map(|row| {
                let created_at_sec: i64 = row.try_get("created_at_sec")?;
                Ok(TrackedGuest {
                    remote_user_id: row.try_get("remote_user_id")?,
                    user_id: row.try_get("user_id")?,
                    created_at_sec: created_at_sec.max(0) as u64,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(storage_error)
    }

    async fn contains_user(&self, user_id: &str) -> Result<bool, GuestError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM guest_remote_users WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .map_err(storage_error)
    }

    async fn remove(&self, remote_user_id: &str) -> Result<bool, GuestError> {
        let removed = sqlx::query("DELETE FROM guest_remote_users WHERE remote_user_id = $1")
            .bind(remote_user_id)
            .execute(&self.db)
            .await
            .map_err(storage_error)?
            .rows_affected();

        Ok(removed > 0)
    }
}
