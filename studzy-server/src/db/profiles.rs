//! Profile and session token queries

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use studzy_common::db::{Profile, Role};
use studzy_common::Result;
use uuid::Uuid;

pub async fn count_profiles(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn create_profile(
    pool: &SqlitePool,
    email: &str,
    full_name: &str,
    password_hash: &str,
    role: Role,
) -> Result<Profile> {
    let now = Utc::now();
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO profiles (id, email, full_name, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(email)
    .bind(full_name)
    .bind(password_hash)
    .bind(role.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_profile(pool, &id).await
}

pub async fn get_profile(pool: &SqlitePool, id: &str) -> Result<Profile> {
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(profile)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(profile)
}

pub async fn set_role(pool: &SqlitePool, id: &str, role: Role) -> Result<bool> {
    let result = sqlx::query("UPDATE profiles SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_token(
    pool: &SqlitePool,
    token_hash: &str,
    user_id: &str,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO auth_tokens (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(token_hash)
    .bind(user_id)
    .bind(Utc::now())
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Profile owning an unexpired token
pub async fn find_by_token(pool: &SqlitePool, token_hash: &str) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>(
        r#"
        SELECT p.* FROM profiles p
        JOIN auth_tokens t ON t.user_id = p.id
        WHERE t.token_hash = ? AND t.expires_at > ?
        "#,
    )
    .bind(token_hash)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;
    Ok(profile)
}

pub async fn delete_token(pool: &SqlitePool, token_hash: &str) -> Result<()> {
    sqlx::query("DELETE FROM auth_tokens WHERE token_hash = ?")
        .bind(token_hash)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove expired tokens; returns the number removed
pub async fn purge_expired_tokens(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= ?")
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
