use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use shared::pagination::{Page, PageInfo};
use std::borrow::Cow;

#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    message: Cow<'static, str>,
    code: u16,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<PageInfo>,
}

/// Successful response wrapped in the standard envelope.
pub struct ApiResponse<T> {
    status: StatusCode,
    message: Cow<'static, str>,
    data: T,
    pagination: Option<PageInfo>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            status: StatusCode::OK,
            message: Cow::Borrowed("Success"),
            data,
            pagination: None,
        }
    }

    pub fn created(data: T) -> Self {
        ApiResponse {
            status: StatusCode::CREATED,
            ..Self::ok(data)
        }
    }

    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = Cow::Borrowed(message);
        self
    }
}

impl ApiResponse<()> {
    /// A response without data.
    pub fn message(message: &'static str) -> Self {
        ApiResponse::ok(()).with_message(message)
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn page(page: Page<T>) -> Self {
        ApiResponse {
            pagination: Some(page.pagination),
            ..ApiResponse::ok(page.data)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Json(Envelope {
            success: true,
            message: self.message,
            code: self.status.as_u16(),
            data: self.data,
            pagination: self.pagination,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::pagination::PageRequest;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_envelope() {
        let response = ApiResponse::message("Logged out successfully").into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({
                "success": true,
                "message": "Logged out successfully",
                "code": 200,
                "data": null,
            })
        );
    }

    #[tokio::test]
    async fn test_page_envelope() {
        let page = Page::from_sorted(vec![1, 2, 3], PageRequest::new(Some(2), Some(2)).unwrap());
        let response = ApiResponse::page(page).into_response();
        let body = body_json(response).await;
        assert_eq!(body["data"], serde_json::json!([3]));
        assert_eq!(
            body["pagination"],
            serde_json::json!({
                "current_page": 2,
                "records_per_page": 2,
                "total_records": 3,
                "total_pages": 2,
            })
        );
    }
}
