use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};

/// User record in the database. The password hash and reset material are
/// never serialized into a response.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub name: Option<String>,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub bod: Option<Date>,
    pub role_id: Option<i32>,
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expiry: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Insert payload for registration. `password` is already hashed.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub phone: Option<&'a str>,
    pub city: Option<&'a str>,
    pub bod: Option<Date>,
    pub role_id: Option<i32>,
}

/// Partial profile update. Every field except `password` overwrites the
/// stored value with the supplied one, or NULL when absent; `password`
/// keeps its prior value when absent.
#[derive(Debug, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub bod: Option<Date>,
    pub role_id: Option<i32>,
}
