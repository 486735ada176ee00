use axum::{
    Router,
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, put},
};
use chrono::Utc;
use serde_json::json;

use crate::app::AppState;
use crate::error::{ApiError, api_error, database_error};
use crate::models::{UpdateRole, UserResponse, UserRole};
use crate::routes::auth::{extract_admin_user, fetch_all_users, fetch_user_by_id};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(admin_list_users))
        .route("/users/{user_id}/role", put(admin_update_role))
}

// ============================
// GET /admin/users
// ============================
async fn admin_list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    extract_admin_user(&state, &headers).await?;

    let users: Vec<UserResponse> = fetch_all_users(&state.pool)
        .await
        .map_err(database_error)?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok(Json(json!({ "users": users })))
}

// ============================
// PUT /admin/users/:id/role
// ============================
async fn admin_update_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Json(input): Json<UpdateRole>,
) -> Result<impl IntoResponse, ApiError> {
    let admin = extract_admin_user(&state, &headers).await?;

    if admin.id == user_id && input.role != UserRole::Admin {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Cannot remove your own admin role",
        ));
    }

    fetch_user_by_id(&state.pool, user_id)
        .await
        .map_err(database_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "User not found"))?;

    sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(input.role.as_str())
        .bind(Utc::now())
        .bind(user_id)
        .execute(&state.pool)
        .await
        .map_err(database_error)?;

    let updated_user = fetch_user_by_id(&state.pool, user_id)
        .await
        .map_err(database_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "User not found"))?;

    tracing::info!(
        admin_id = admin.id,
        user_id,
        role = input.role.as_str(),
        "User role updated"
    );
    Ok(Json(UserResponse::from(updated_user)))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};

    use super::*;
    use crate::app::testing::send;

    #[test]
    fn role_body_uses_lowercase_codes() {
        let input: UpdateRole = serde_json::from_value(json!({"role": "editor"})).unwrap();
        assert_eq!(input.role, UserRole::Editor);
        assert!(serde_json::from_value::<UpdateRole>(json!({"role": "owner"})).is_err());
    }

    #[tokio::test]
    async fn admin_routes_require_a_token() {
        let response = send(Request::get("/api/admin/users").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            Request::put("/api/admin/users/1/role")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"role":"editor"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
