use super::PageQuery;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::response::ApiResponse;
use crate::state::AppState;
use accounts::{PublicUser, UserDetailsUpdate, UserProfile, UserStatus};
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{delete, get, post, put};
use indexmap::IndexMap;
use ledger::{ConnectionRecord, DetailedConnection, UserId};
use serde::Deserialize;

// Connection status lookups are answered with one batched read
const MAX_STATUS_LOOKUP: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/me/details", put(update_my_details))
        .route("/me/images/{image_id}", delete(delete_my_image))
        .route("/me/images/{image_id}/default", put(make_my_profile_image))
        .route("/me/connections", get(my_connections))
        .route("/me/connection-statuses", post(my_connection_statuses))
        .route("/{id}", get(public_user))
        .route("/{id}/connection", get(connection_with))
}

async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let user = state.users.get(&user.user_id)?;
    Ok(ApiResponse::ok(UserProfile::from(&user)))
}

/// Users may only change their status themselves.
#[derive(Deserialize)]
struct MyDetailsUpdate {
    status: Option<UserStatus>,
}

async fn update_my_details(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(update): ApiJson<MyDetailsUpdate>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let update = UserDetailsUpdate {
        status: update.status,
        is_email_verified: None,
    };
    let user = state.users.update_details(&user.user_id, update)?;
    Ok(ApiResponse::ok(UserProfile::from(&user)).with_message("Details updated successfully"))
}

async fn delete_my_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path(image_id): Path<String>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let user = state.users.delete_image(&user.user_id, &image_id)?;
    Ok(ApiResponse::ok(UserProfile::from(&user)).with_message("Image deleted successfully"))
}

async fn make_my_profile_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path(image_id): Path<String>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let user = state.users.make_profile_image(&user.user_id, &image_id)?;
    Ok(ApiResponse::ok(UserProfile::from(&user)).with_message("Profile image updated"))
}

async fn my_connections(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<ApiResponse<Vec<ConnectionRecord>>, ApiError> {
    let page = state
        .ledger
        .list_connections(&user.user_id, query.to_request()?)
        .await?;
    Ok(ApiResponse::page(page))
}

#[derive(Deserialize)]
struct StatusLookup {
    user_ids: Vec<UserId>,
}

async fn my_connection_statuses(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(lookup): ApiJson<StatusLookup>,
) -> Result<ApiResponse<IndexMap<UserId, bool>>, ApiError> {
    if lookup.user_ids.len() > MAX_STATUS_LOOKUP {
        return Err(ApiError::Validation(format!(
            "at most {MAX_STATUS_LOOKUP} user ids can be looked up at once"
        )));
    }
    let statuses = state
        .ledger
        .get_connection_statuses(&user.user_id, &lookup.user_ids)
        .await?;
    Ok(ApiResponse::ok(statuses))
}

async fn public_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<PublicUser>, ApiError> {
    let user = state.users.get_public(&id)?;
    Ok(ApiResponse::ok(PublicUser::from(&user)))
}

async fn connection_with(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<DetailedConnection>, ApiError> {
    let connection = state
        .ledger
        .get_detailed_connection(&user.user_id, &id, &state.participation)
        .await?
        .ok_or_else(|| ApiError::NotFound("Connection".into()))?;
    Ok(ApiResponse::ok(connection))
}

#[cfg(test)]
mod tests {
    use crate::routes::testutils::{TestApp, bearer};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_requires_auth() {
        let app = TestApp::new();

        let (status, body) = app.get("/v1/users/me", &[]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body,
            json!({
                "success": false,
                "message": "Missing authorization header",
                "code": 401,
                "error_code": "UNAUTHORIZED",
            })
        );

        let (status, _) = app
            .get("/v1/users/me", &[("authorization", "Basic abc".into())])
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app.get("/v1/users/me", &[bearer("nope")]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_connections_through_activities() {
        let app = TestApp::new();
        let sam = app.login_user("sam@example.com").await;
        let kim = app.login_user("kim@example.com").await;
        let lou = app.login_user("lou@example.com").await;

        let (status, body) = app
            .post(
                "/v1/activities",
                &[bearer(&sam.access_token)],
                json!({"kind": "dinner", "title": "Friday dinner"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let dinner = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = app
            .post(
                &format!("/v1/activities/{dinner}/join"),
                &[bearer(&kim.access_token)],
                json!({}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .post(
                "/v1/users/me/connection-statuses",
                &[bearer(&sam.access_token)],
                json!({"user_ids": [lou.user_id, kim.user_id, sam.user_id]}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][&kim.user_id], true);
        assert_eq!(body["data"][&lou.user_id], false);
        assert_eq!(body["data"][&sam.user_id], false);

        let (status, body) = app
            .get("/v1/users/me/connections?page=1&limit=5", &[bearer(&kim.access_token)])
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["dinner_refs"], json!([dinner]));
        assert_eq!(body["pagination"]["total_records"], 1);

        let (status, body) = app
            .get(
                &format!("/v1/users/{}/connection", sam.user_id),
                &[bearer(&kim.access_token)],
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["dinners"][0]["title"], "Friday dinner");
        assert_eq!(body["data"]["events"], json!([]));

        let (status, body) = app
            .get(
                &format!("/v1/users/{}/connection", lou.user_id),
                &[bearer(&kim.access_token)],
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "RESOURCE_NOT_FOUND");

        // Leaving drops the only shared activity
        let (status, _) = app
            .post(
                &format!("/v1/activities/{dinner}/leave"),
                &[bearer(&kim.access_token)],
                json!({}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = app
            .get("/v1/users/me/connections", &[bearer(&kim.access_token)])
            .await;
        assert_eq!(body["data"], json!([]));
        assert_eq!(body["pagination"]["total_records"], 0);
    }

    #[tokio::test]
    async fn test_invalid_pagination() {
        let app = TestApp::new();
        let sam = app.login_user("sam@example.com").await;

        let (status, body) = app
            .get("/v1/users/me/connections?page=0", &[bearer(&sam.access_token)])
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "VALIDATION_ERROR");

        let (status, _) = app
            .get("/v1/users/me/connections?limit=abc", &[bearer(&sam.access_token)])
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_details_and_public_profile() {
        let app = TestApp::new();
        let sam = app.login_user("sam@example.com").await;
        let kim = app.login_user("kim@example.com").await;

        let (status, body) = app
            .put(
                "/v1/users/me/details",
                &[bearer(&sam.access_token)],
                json!({"status": "inactive", "is_email_verified": true}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "inactive");
        assert_eq!(body["data"]["is_email_verified"], false);

        let (status, body) = app
            .get(&format!("/v1/users/{}", sam.user_id), &[bearer(&kim.access_token)])
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].get("email").is_none());

        let (status, body) = app
            .get("/v1/users/unknown", &[bearer(&kim.access_token)])
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "USER_NOT_FOUND");
    }
}
