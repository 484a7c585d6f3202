//! Integration tests per health, stato online e upload

mod common;

#[cfg(test)]
mod status_tests {
    use super::common::{create_test_jwt, create_test_server, setup};
    use axum_test::http::{HeaderName, StatusCode};
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::json;

    fn bearer(token: &str) -> (HeaderName, String) {
        (
            HeaderName::from_static("authorization"),
            format!("Bearer {}", token),
        )
    }

    #[tokio::test]
    async fn test_health_check_is_public() {
        let (state, _backend) = setup();
        let server = create_test_server(state);

        let response = server.get("/").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }

    // ============================================================
    // GET /chat/online-status/{user_id}
    // ============================================================

    #[tokio::test]
    async fn test_online_status_reflects_presence_registry() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let bob = backend.add_user("bob");
        let server = create_test_server(state.clone());
        let token = create_test_jwt(&alice);
        let (name, value) = bearer(&token);

        let response = server
            .get(&format!("/chat/online-status/{}", bob.user_id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["is_online"], false);

        state.presence.set_online(bob.user_id, "conn-1").await.unwrap();

        let response = server
            .get(&format!("/chat/online-status/{}", bob.user_id))
            .add_header(name, value)
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["user_id"], bob.user_id);
        assert_eq!(body["is_online"], true);
    }

    // ============================================================
    // POST /chat/online-status/bulk
    // ============================================================

    #[tokio::test]
    async fn test_bulk_online_status_reports_each_requested_id() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let bob = backend.add_user("bob");
        let server = create_test_server(state.clone());
        let token = create_test_jwt(&alice);
        let (name, value) = bearer(&token);

        state.presence.set_online(bob.user_id, "conn-1").await.unwrap();

        let response = server
            .post("/chat/online-status/bulk")
            .add_header(name, value)
            .json(&json!({ "user_ids": [bob.user_id, 999] }))
            .await;
        response.assert_status_ok();
        let statuses: Vec<serde_json::Value> = response.json();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0]["is_online"], true);
        assert_eq!(statuses[1]["is_online"], false);
    }

    // ============================================================
    // POST /chat/upload
    // ============================================================

    #[tokio::test]
    async fn test_upload_sends_attachment_message() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let bob = backend.add_user("bob");
        let server = create_test_server(state);
        let token = create_test_jwt(&alice);
        let (name, value) = bearer(&token);

        let form = MultipartForm::new()
            .add_text("receiver_id", bob.user_id.to_string())
            .add_part(
                "file",
                Part::bytes(vec![0x89, 0x50, 0x4e, 0x47])
                    .file_name("pixel.png")
                    .mime_type("image/png"),
            );

        let response = server
            .post("/chat/upload")
            .add_header(name, value)
            .multipart(form)
            .await;
        response.assert_status(StatusCode::CREATED);
        let message: serde_json::Value = response.json();
        assert_eq!(message["message_type"], "image");
        assert_eq!(message["receiver_id"], bob.user_id);
        assert_eq!(message["metadata"]["original_name"], "pixel.png");
        assert!(message["metadata"]["key"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_upload_without_file_is_rejected() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let bob = backend.add_user("bob");
        let server = create_test_server(state);
        let token = create_test_jwt(&alice);
        let (name, value) = bearer(&token);

        let form = MultipartForm::new().add_text("receiver_id", bob.user_id.to_string());
        let response = server
            .post("/chat/upload")
            .add_header(name, value)
            .multipart(form)
            .await;
        response.assert_status_bad_request();
    }
}
