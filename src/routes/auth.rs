use axum::{
    Router,
    extract::{Json, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
    routing::{get, post},
};
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;

use crate::app::AppState;
use crate::config::AppConfig;
use crate::error::{ApiError, api_error, database_error, internal_error};
use crate::models::{CreateUser, LoginForm, TokenResponse, User, UserResponse, UserRole};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(get_me))
}

const USER_COLUMNS: &str = r#"
    SELECT id, username, email, hashed_password, display_name, role, created_at, updated_at
    FROM users
"#;

pub async fn fetch_user_by_username(
    pool: &MySqlPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("{} WHERE username = ?", USER_COLUMNS))
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_user_by_id(pool: &MySqlPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("{} WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_all_users(pool: &MySqlPool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("{} ORDER BY created_at DESC, id DESC", USER_COLUMNS))
        .fetch_all(pool)
        .await
}

async fn register(
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> Result<impl IntoResponse, ApiError> {
    let username = input.username.trim();
    let email = input.email.trim();
    if username.is_empty() || email.is_empty() || input.password.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Username, email and password are required",
        ));
    }

    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM users WHERE username = ? OR email = ?")
            .bind(username)
            .bind(email)
            .fetch_optional(&state.pool)
            .await
            .map_err(database_error)?;

    if existing.is_some() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Username or email already registered",
        ));
    }

    let hashed = hash(&input.password, DEFAULT_COST).map_err(internal_error)?;
    let display_name = input
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(username)
        .to_string();

    let result = sqlx::query(
        r#"INSERT INTO users (username, email, hashed_password, display_name, role, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(username)
    .bind(email)
    .bind(&hashed)
    .bind(&display_name)
    .bind(UserRole::Author.as_str())
    .bind(Utc::now())
    .execute(&state.pool)
    .await
    .map_err(database_error)?;

    let user = fetch_user_by_id(&state.pool, result.last_insert_id() as i64)
        .await
        .map_err(database_error)?
        .ok_or_else(|| internal_error("registered user vanished"))?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

async fn login(
    State(state): State<AppState>,
    axum::Form(input): axum::Form<LoginForm>,
) -> Result<impl IntoResponse, ApiError> {
    let user = fetch_user_by_username(&state.pool, input.username.trim())
        .await
        .map_err(database_error)?
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Incorrect username or password"))?;

    let valid = verify(&input.password, &user.hashed_password).map_err(internal_error)?;
    if !valid {
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Incorrect username or password",
        ));
    }

    let token = generate_jwt(&state.config, &user.username)?;
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

async fn get_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = extract_current_user(&state, &headers).await?;
    Ok(Json(UserResponse::from(user)))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Missing authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Invalid authorization header"))
}

fn decode_claims(config: &AppConfig, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret_key.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

pub async fn extract_current_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = bearer_token(headers)?;
    let claims = decode_claims(&state.config, token)
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Invalid token"))?;

    fetch_user_by_username(&state.pool, &claims.sub)
        .await
        .map_err(database_error)?
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "User not found"))
}

/// Anonymous callers and bad tokens both yield `None`.
pub async fn extract_optional_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<User>, ApiError> {
    let Ok(token) = bearer_token(headers) else {
        return Ok(None);
    };
    let Some(claims) = decode_claims(&state.config, token) else {
        return Ok(None);
    };

    fetch_user_by_username(&state.pool, &claims.sub)
        .await
        .map_err(database_error)
}

pub async fn extract_editor_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let user = extract_current_user(state, headers).await?;
    if !user.is_editor() {
        return Err(api_error(StatusCode::FORBIDDEN, "Editor access required"));
    }
    Ok(user)
}

pub async fn extract_admin_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let user = extract_current_user(state, headers).await?;
    if !user.is_admin() {
        return Err(api_error(StatusCode::FORBIDDEN, "Admin access required"));
    }
    Ok(user)
}

pub fn generate_jwt(config: &AppConfig, username: &str) -> Result<String, ApiError> {
    let expiration = Utc::now()
        .checked_add_signed(chrono::Duration::hours(config.token_ttl_hours))
        .expect("valid timestamp")
        .timestamp() as usize;

    let claims = Claims {
        sub: username.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret_key.as_bytes()),
    )
    .map_err(internal_error)
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};

    use super::*;
    use crate::app::testing::{body_json, send};
    use crate::config::test_config;

    #[test]
    fn issued_tokens_decode_with_the_same_secret() {
        let config = test_config();
        let token = generate_jwt(&config, "editor1").unwrap();
        let claims = decode_claims(&config, &token).unwrap();
        assert_eq!(claims.sub, "editor1");

        let mut other = test_config();
        other.secret_key = "another-secret".to_string();
        assert!(decode_claims(&other, &token).is_none());
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());
        headers.insert(AUTHORIZATION, "Token abc".parse().unwrap());
        assert_eq!(bearer_token(&headers).unwrap_err().0, StatusCode::UNAUTHORIZED);
        headers.insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers).unwrap(), "abc");
    }

    #[tokio::test]
    async fn me_without_header_is_unauthorized() {
        let response = send(Request::get("/api/auth/me").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Missing authorization header");
    }

    #[tokio::test]
    async fn me_with_forged_token_is_unauthorized() {
        let response = send(
            Request::get("/api/auth/me")
                .header(AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Invalid token");
    }

    #[tokio::test]
    async fn register_requires_all_fields() {
        let response = send(
            Request::post("/api/auth/register")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"username":"  ","email":"a@b.org","password":"x"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
