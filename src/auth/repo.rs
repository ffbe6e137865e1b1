use crate::auth::repo_types::{NewUser, User, UserUpdate};
use sqlx::PgPool;
use time::OffsetDateTime;

const USER_COLUMNS: &str = "id, name, email, username, password, phone, city, bod, role_id, \
     token, refresh_token, reset_token, reset_token_expiry, created_at, updated_at";

impl User {
    /// Find a user by email or username (case-sensitive).
    pub async fn find_by_identifier(db: &PgPool, identifier: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR username = $1 LIMIT 1"
        ))
        .bind(identifier)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: i32) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 LIMIT 1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Matches only while the token is still live; expired or unknown
    /// tokens both come back as None.
    pub async fn find_by_reset_token(db: &PgPool, token: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE reset_token = $1 AND reset_token_expiry > now() LIMIT 1"
        ))
        .bind(token)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(db: &PgPool, new_user: &NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, username, password, phone, city, bod, role_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(new_user.name)
        .bind(new_user.email)
        .bind(new_user.username)
        .bind(new_user.password)
        .bind(new_user.phone)
        .bind(new_user.city)
        .bind(new_user.bod)
        .bind(new_user.role_id)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Overwrite the stored session pair. This is what invalidates the
    /// previous refresh token on every login/refresh.
    pub async fn update_tokens(
        db: &PgPool,
        id: i32,
        token: &str,
        refresh_token: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET token = $1, refresh_token = $2, updated_at = now() WHERE id = $3",
        )
        .bind(token)
        .bind(refresh_token)
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn update_reset_token(
        db: &PgPool,
        id: i32,
        token: &str,
        expiry: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET reset_token = $1, reset_token_expiry = $2, updated_at = now() \
             WHERE id = $3",
        )
        .bind(token)
        .bind(expiry)
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Stores the new hash and clears the reset material in one statement,
    /// which is what makes a reset token single-use.
    pub async fn update_password(db: &PgPool, id: i32, password: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET password = $1, reset_token = NULL, reset_token_expiry = NULL, \
             updated_at = now() WHERE id = $2",
        )
        .bind(password)
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Partial profile update. Only `password` is merged via COALESCE;
    /// every other column takes the supplied value or NULL.
    pub async fn update_profile(
        db: &PgPool,
        id: i32,
        update: &UserUpdate,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = $1, email = $2, username = $3, phone = $4, city = $5, \
             bod = $6, role_id = $7, password = COALESCE($8, password), updated_at = now() \
             WHERE id = $9 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(update.name.as_deref())
        .bind(update.email.as_deref())
        .bind(update.username.as_deref())
        .bind(update.phone.as_deref())
        .bind(update.city.as_deref())
        .bind(update.bod)
        .bind(update.role_id)
        .bind(update.password.as_deref())
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }
}
