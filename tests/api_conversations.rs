//! Integration tests per gli endpoints delle conversazioni

mod common;

#[cfg(test)]
mod conversation_tests {
    use super::common::{create_test_jwt, create_test_server, setup};
    use axum_test::http::HeaderName;
    use serde_json::json;

    // ============================================================
    // Autenticazione
    // ============================================================

    #[tokio::test]
    async fn test_get_conversations_without_token() {
        let (state, _backend) = setup();
        let server = create_test_server(state);

        let response = server.get("/chat/conversations").await;
        response.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn test_get_conversations_with_invalid_token() {
        let (state, _backend) = setup();
        let server = create_test_server(state);

        let response = server
            .get("/chat/conversations")
            .add_header(
                HeaderName::from_static("authorization"),
                "Bearer invalid_token_here",
            )
            .await;
        response.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn test_token_of_deactivated_user_is_rejected() {
        let (state, backend) = setup();
        let ghost = backend.add_user_with("ghost", false, false);
        let server = create_test_server(state);
        let token = create_test_jwt(&ghost);

        let response = server
            .get("/chat/conversations")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", token),
            )
            .await;
        response.assert_status_unauthorized();
    }

    // ============================================================
    // GET /chat/conversations
    // ============================================================

    #[tokio::test]
    async fn test_list_conversations_empty_then_populated() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let bob = backend.add_user("bob");
        let server = create_test_server(state.clone());
        let alice_token = create_test_jwt(&alice);
        let bob_token = create_test_jwt(&bob);

        let response = server
            .get("/chat/conversations")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", alice_token),
            )
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["conversations"].as_array().unwrap().len(), 0);
        assert_eq!(body["total_unread"], 0);
        assert_eq!(body["has_more"], false);

        let response = server
            .post("/chat/messages")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", alice_token),
            )
            .json(&json!({ "receiver_id": bob.user_id, "content": "ciao" }))
            .await;
        response.assert_status(axum_test::http::StatusCode::CREATED);

        // Il lato di Bob vede la conversazione con un non-letto.
        let response = server
            .get("/chat/conversations")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", bob_token),
            )
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        let conversations = body["conversations"].as_array().unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0]["unread_count"], 1);
        assert_eq!(conversations[0]["last_message"], "ciao");
        assert_eq!(conversations[0]["peer"]["username"], "alice");
        assert_eq!(body["total_unread"], 1);
    }

    // ============================================================
    // POST /chat/conversations/user/{user_id}
    // ============================================================

    #[tokio::test]
    async fn test_get_or_create_conversation_is_idempotent() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let bob = backend.add_user("bob");
        let server = create_test_server(state);
        let token = create_test_jwt(&alice);

        let first = server
            .post(&format!("/chat/conversations/user/{}", bob.user_id))
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", token),
            )
            .await;
        first.assert_status_ok();
        let first_body: serde_json::Value = first.json();

        let second = server
            .post(&format!("/chat/conversations/user/{}", bob.user_id))
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", token),
            )
            .await;
        second.assert_status_ok();
        let second_body: serde_json::Value = second.json();

        assert_eq!(first_body["conversation_id"], second_body["conversation_id"]);
        assert_eq!(first_body["peer"]["username"], "bob");
    }

    #[tokio::test]
    async fn test_get_or_create_with_unknown_user() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let server = create_test_server(state);
        let token = create_test_jwt(&alice);

        let response = server
            .post("/chat/conversations/user/999")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", token),
            )
            .await;
        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn test_get_or_create_with_self() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let server = create_test_server(state);
        let token = create_test_jwt(&alice);

        let response = server
            .post(&format!("/chat/conversations/user/{}", alice.user_id))
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", token),
            )
            .await;
        response.assert_status_bad_request();
    }

    // ============================================================
    // GET /chat/conversations/{conversation_id}
    // ============================================================

    #[tokio::test]
    async fn test_get_single_conversation_access_control() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let bob = backend.add_user("bob");
        let carol = backend.add_user("carol");
        let server = create_test_server(state.clone());

        let conversation = state
            .messaging
            .get_or_create_conversation(alice.user_id, bob.user_id)
            .await
            .unwrap();

        let response = server
            .get(&format!("/chat/conversations/{}", conversation.conversation_id))
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", create_test_jwt(&alice)),
            )
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["peer"]["user_id"], bob.user_id);

        // Un estraneo riceve 403, non la risorsa.
        let response = server
            .get(&format!("/chat/conversations/{}", conversation.conversation_id))
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", create_test_jwt(&carol)),
            )
            .await;
        response.assert_status_forbidden();

        let response = server
            .get("/chat/conversations/999")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", create_test_jwt(&alice)),
            )
            .await;
        response.assert_status_not_found();
    }
}
