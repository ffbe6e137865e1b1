use axum::{
    extract::{FromRef, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use lazy_static::lazy_static;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthData, CheckEmailData, CheckEmailQuery, ForgotPasswordRequest, LoginRequest,
            ProtectedData, RefreshRequest, RegisterRequest, ResetPasswordRequest, TokenPair,
            UpdateUserRequest,
        },
        extractors::{AuthUser, JsonBody},
        jwt::{TokenService, VerifyError},
        password::{hash_password, verify_password},
        repo_types::{NewUser, User, UserUpdate},
    },
    error::ApiError,
    response::{self, ApiResponse},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/check-email", get(check_email))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/refresh-token", post(refresh_token))
        .route("/protected", get(protected))
        .route("/me", put(update_me))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Absent and empty are the same thing for required request fields.
fn require<'a>(value: &'a Option<String>, message: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(message.into()))
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// The pre-insert existence check is not transactional with the insert; the
/// schema UNIQUE constraint is the backstop and maps to the same outcome.
/// Yields the violated constraint's name so the message can say which
/// column collided.
fn unique_violation(e: &anyhow::Error) -> Option<&str> {
    e.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .filter(|db| db.code().map(|code| code == "23505").unwrap_or(false))
        .and_then(|db| db.constraint())
}

fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthData>>), ApiError> {
    let (identifier, password) = match (present(&payload.identifier), present(&payload.password)) {
        (Some(i), Some(p)) => (i, p),
        _ => return Err(ApiError::BadRequest("Email/password belum dimasukan".into())),
    };

    // Unknown identifier and wrong password are indistinguishable.
    let mut user = User::find_by_identifier(&state.db, identifier)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    if !verify_password(password, &user.password)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let tokens = TokenService::from_ref(&state);
    let token = tokens.sign_access(&user)?;
    let refresh = tokens.sign_refresh(&user)?;
    User::update_tokens(&state.db, user.id, &token, &refresh).await?;
    user.token = Some(token.clone());
    user.refresh_token = Some(refresh.clone());

    info!(user_id = user.id, "user logged in");
    Ok(response::ok(
        AuthData {
            user,
            token,
            refresh_token: refresh,
        },
        "Login berhasil",
    ))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthData>>), ApiError> {
    let name = require(&payload.name, "Nama belum dimasukan")?;
    let email = require(&payload.email, "Email belum dimasukan")?;
    let username = require(&payload.username, "Username belum dimasukan")?;
    let password = require(&payload.password, "Password belum dimasukan")?;

    if !is_valid_email(email) {
        return Err(ApiError::BadRequest("Format email tidak valid".into()));
    }

    if User::find_by_email(&state.db, email).await?.is_some() {
        warn!(email, "email already registered");
        return Err(ApiError::Conflict("Email telah terdaftar".into()));
    }

    let hash = hash_password(password)?;
    let new_user = NewUser {
        name,
        email,
        username,
        password: &hash,
        phone: present(&payload.phone),
        city: present(&payload.city),
        bod: payload.bod,
        role_id: payload.role_id,
    };
    let mut user = match User::create(&state.db, &new_user).await {
        Ok(u) => u,
        Err(e) => match unique_violation(&e) {
            Some("users_username_key") => {
                warn!(username, "username already taken");
                return Err(ApiError::Conflict("Username telah terdaftar".into()));
            }
            Some(_) => {
                warn!(email, "registration lost the uniqueness race");
                return Err(ApiError::Conflict("Email telah terdaftar".into()));
            }
            None => return Err(e.into()),
        },
    };

    let tokens = TokenService::from_ref(&state);
    let token = tokens.sign_access(&user)?;
    let refresh = tokens.sign_refresh(&user)?;
    User::update_tokens(&state.db, user.id, &token, &refresh).await?;
    user.token = Some(token.clone());
    user.refresh_token = Some(refresh.clone());

    info!(user_id = user.id, "user registered");
    Ok(response::created(
        AuthData {
            user,
            token,
            refresh_token: refresh,
        },
        "User berhasil didaftarkan",
    ))
}

#[instrument(skip(state, query))]
pub async fn check_email(
    State(state): State<AppState>,
    Query(query): Query<CheckEmailQuery>,
) -> Result<(StatusCode, Json<ApiResponse<CheckEmailData>>), ApiError> {
    let email = require(&query.email, "Email belum dimasukan")?;
    let registered = User::find_by_email(&state.db, email).await?.is_some();
    let message = if registered {
        "Email telah terdaftar"
    } else {
        "Email belum terdaftar"
    };
    Ok(response::ok(
        CheckEmailData {
            is_registered: registered,
        },
        message,
    ))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ForgotPasswordRequest>,
) -> Result<(StatusCode, Json<ApiResponse<()>>), ApiError> {
    let email = require(&payload.email, "Email belum dimasukan")?;
    let user = User::find_by_email(&state.db, email)
        .await?
        .ok_or_else(|| ApiError::NotFound("Email tidak terdaftar".into()))?;

    // Overwrites any prior reset token for this user.
    let token = generate_reset_token();
    let expiry = OffsetDateTime::now_utc() + Duration::minutes(state.config.reset_ttl_minutes);
    User::update_reset_token(&state.db, user.id, &token, expiry).await?;

    let link = format!(
        "{}/reset-password?token={}",
        state.config.reset_link_base, token
    );
    state.mailer.send_reset_email(&user.email, &link).await?;

    info!(user_id = user.id, "reset email sent");
    Ok(response::ok_empty("Email reset password telah dikirim"))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<(StatusCode, Json<ApiResponse<()>>), ApiError> {
    let new_password = require(&payload.new_password, "Password baru belum dimasukan")?;

    let token = payload.token.as_deref().unwrap_or_default();
    let user = User::find_by_reset_token(&state.db, token)
        .await?
        .ok_or(ApiError::InvalidResetToken)?;

    let hash = hash_password(new_password)?;
    User::update_password(&state.db, user.id, &hash).await?;

    info!(user_id = user.id, "password reset");
    Ok(response::ok_empty("Password berhasil diubah"))
}

#[instrument(skip(state, payload))]
pub async fn refresh_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TokenPair>>), ApiError> {
    let supplied = present(&payload.refresh_token)
        .ok_or_else(|| ApiError::Unauthorized("No refresh token provided".into()))?;

    let tokens = TokenService::from_ref(&state);
    let claims = tokens.verify_refresh(supplied).map_err(|e| match e {
        VerifyError::Expired => ApiError::Forbidden("Refresh token expired".into()),
        VerifyError::Invalid => ApiError::Unauthorized("Invalid refresh token".into()),
    })?;

    // A token superseded by a later login/refresh no longer matches the
    // stored value and is rejected even though its signature still checks.
    let user = User::find_by_id(&state.db, claims.id)
        .await?
        .filter(|u| u.refresh_token.as_deref() == Some(supplied))
        .ok_or_else(|| ApiError::Forbidden("Invalid refresh token".into()))?;

    let token = tokens.sign_access(&user)?;
    let refresh = tokens.sign_refresh(&user)?;
    User::update_tokens(&state.db, user.id, &token, &refresh).await?;

    info!(user_id = user.id, "token refreshed");
    Ok(response::ok(
        TokenPair {
            token,
            refresh_token: refresh,
        },
        "Token refreshed",
    ))
}

pub async fn protected(
    AuthUser(user_id): AuthUser,
) -> (StatusCode, Json<ApiResponse<ProtectedData>>) {
    response::ok(
        ProtectedData { user_id },
        "Access granted to protected route",
    )
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), ApiError> {
    let password = match present(&payload.password) {
        Some(p) => Some(hash_password(p)?),
        None => None,
    };
    let update = UserUpdate {
        name: payload.name,
        email: payload.email,
        username: payload.username,
        password,
        phone: payload.phone,
        city: payload.city,
        bod: payload.bod,
        role_id: payload.role_id,
    };

    let user = match User::update_profile(&state.db, user_id, &update).await {
        Ok(Some(u)) => u,
        Ok(None) => return Err(ApiError::NotFound("User tidak ditemukan".into())),
        Err(e) if unique_violation(&e).is_some() => {
            return Err(ApiError::Conflict("Email/username telah terdaftar".into()))
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = user.id, "profile updated");
    Ok(response::ok(user, "User berhasil diperbarui"))
}


#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::auth::dto::AuthData;
    use sqlx::PgPool;

    fn register_payload(email: &str, username: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some("A".into()),
            email: Some(email.into()),
            username: Some(username.into()),
            password: Some("rahasia".into()),
            phone: None,
            city: None,
            bod: None,
            role_id: None,
        }
    }

    async fn register_ok(state: &AppState, email: &str, username: &str) -> AuthData {
        let (status, Json(body)) = register(
            State(state.clone()),
            JsonBody(register_payload(email, username)),
        )
        .await
        .expect("register should succeed");
        assert_eq!(status, StatusCode::CREATED);
        body.data.expect("register data")
    }

    #[sqlx::test]
    async fn second_registration_with_same_email_is_a_conflict(db: PgPool) {
        let state = AppState::fake_with_db(db.clone());
        register_ok(&state, "a@x.com", "a1").await;

        match register(
            State(state.clone()),
            JsonBody(register_payload("a@x.com", "a2")),
        )
        .await
        {
            Err(ApiError::Conflict(msg)) => assert_eq!(msg, "Email telah terdaftar"),
            other => panic!("expected Conflict, got {:?}", other.err()),
        }

        let rows: i64 = sqlx::query_scalar("SELECT count(*) FROM users WHERE email = $1")
            .bind("a@x.com")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[sqlx::test]
    async fn duplicate_username_hits_the_constraint_backstop(db: PgPool) {
        let state = AppState::fake_with_db(db);
        register_ok(&state, "a@x.com", "a1").await;

        // different email passes the pre-check; the UNIQUE constraint on
        // username catches it at insert
        match register(
            State(state.clone()),
            JsonBody(register_payload("b@x.com", "a1")),
        )
        .await
        {
            Err(ApiError::Conflict(msg)) => assert_eq!(msg, "Username telah terdaftar"),
            other => panic!("expected Conflict, got {:?}", other.err()),
        }
    }

    #[sqlx::test]
    async fn login_checks_the_stored_credential(db: PgPool) {
        let state = AppState::fake_with_db(db);
        register_ok(&state, "a@x.com", "a1").await;

        let payload = LoginRequest {
            identifier: Some("a1".into()),
            password: Some("rahasia".into()),
        };
        let (status, Json(body)) = login(State(state.clone()), JsonBody(payload))
            .await
            .expect("login with username identifier");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.data.unwrap().user.email, "a@x.com");

        for (identifier, password) in [("a1", "salah"), ("ghost", "rahasia")] {
            let payload = LoginRequest {
                identifier: Some(identifier.into()),
                password: Some(password.into()),
            };
            match login(State(state.clone()), JsonBody(payload)).await {
                Err(ApiError::InvalidCredentials) => {}
                other => panic!("expected InvalidCredentials, got {:?}", other.err()),
            }
        }
    }

    #[sqlx::test]
    async fn reset_token_is_single_use(db: PgPool) {
        let state = AppState::fake_with_db(db.clone());
        register_ok(&state, "a@x.com", "a1").await;

        forgot_password(
            State(state.clone()),
            JsonBody(ForgotPasswordRequest {
                email: Some("a@x.com".into()),
            }),
        )
        .await
        .expect("forgot password");

        let token: Option<String> =
            sqlx::query_scalar("SELECT reset_token FROM users WHERE email = $1")
                .bind("a@x.com")
                .fetch_one(&db)
                .await
                .unwrap();
        let token = token.expect("reset token persisted");

        let request = || ResetPasswordRequest {
            token: Some(token.clone()),
            new_password: Some("baru".into()),
        };
        reset_password(State(state.clone()), JsonBody(request()))
            .await
            .expect("first reset");

        match reset_password(State(state.clone()), JsonBody(request())).await {
            Err(ApiError::InvalidResetToken) => {}
            other => panic!("expected InvalidResetToken, got {:?}", other.err()),
        }

        // the new password is live, the old one is not
        let login_with = |password: &str| LoginRequest {
            identifier: Some("a@x.com".into()),
            password: Some(password.into()),
        };
        login(State(state.clone()), JsonBody(login_with("baru")))
            .await
            .expect("login with new password");
        match login(State(state), JsonBody(login_with("rahasia"))).await {
            Err(ApiError::InvalidCredentials) => {}
            other => panic!("expected InvalidCredentials, got {:?}", other.err()),
        }
    }

    #[sqlx::test]
    async fn unknown_email_cannot_request_a_reset(db: PgPool) {
        let state = AppState::fake_with_db(db);
        let payload = ForgotPasswordRequest {
            email: Some("ghost@x.com".into()),
        };
        match forgot_password(State(state), JsonBody(payload)).await {
            Err(ApiError::NotFound(msg)) => assert_eq!(msg, "Email tidak terdaftar"),
            other => panic!("expected NotFound, got {:?}", other.err()),
        }
    }

    #[sqlx::test]
    async fn refresh_rotation_invalidates_the_previous_token(db: PgPool) {
        let state = AppState::fake_with_db(db);
        let auth = register_ok(&state, "a@x.com", "a1").await;
        let old = auth.refresh_token;

        // a pair minted in the same second would be byte-identical to the
        // old one (the claims only change with iat), defeating the replay
        // half of this test
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let (status, Json(body)) = refresh_token(
            State(state.clone()),
            JsonBody(RefreshRequest {
                refresh_token: Some(old.clone()),
            }),
        )
        .await
        .expect("first refresh");
        assert_eq!(status, StatusCode::OK);
        let pair = body.data.expect("token pair");
        assert_ne!(pair.refresh_token, old);

        // the superseded token still verifies cryptographically but no
        // longer matches the stored value
        match refresh_token(
            State(state.clone()),
            JsonBody(RefreshRequest {
                refresh_token: Some(old),
            }),
        )
        .await
        {
            Err(ApiError::Forbidden(msg)) => assert_eq!(msg, "Invalid refresh token"),
            other => panic!("expected Forbidden, got {:?}", other.err()),
        }

        refresh_token(
            State(state),
            JsonBody(RefreshRequest {
                refresh_token: Some(pair.refresh_token),
            }),
        )
        .await
        .expect("newly issued token refreshes");
    }
}
