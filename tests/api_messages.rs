//! Integration tests per gli endpoints dei messaggi

mod common;

#[cfg(test)]
mod message_tests {
    use super::common::{create_test_jwt, create_test_server, setup};
    use axum_test::http::{HeaderName, StatusCode};
    use serde_json::json;

    fn bearer(token: &str) -> (HeaderName, String) {
        (
            HeaderName::from_static("authorization"),
            format!("Bearer {}", token),
        )
    }

    // ============================================================
    // POST /chat/messages
    // ============================================================

    #[tokio::test]
    async fn test_send_message_creates_message_and_conversation() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let bob = backend.add_user("bob");
        let server = create_test_server(state);
        let token = create_test_jwt(&alice);
        let (name, value) = bearer(&token);

        let response = server
            .post("/chat/messages")
            .add_header(name, value)
            .json(&json!({ "receiver_id": bob.user_id, "content": "primo" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let message: serde_json::Value = response.json();
        assert_eq!(message["sender_id"], alice.user_id);
        assert_eq!(message["receiver_id"], bob.user_id);
        assert_eq!(message["status"], "sent");
        assert_eq!(message["message_type"], "text");
        assert!(message["conversation_id"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_send_message_with_empty_content() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let bob = backend.add_user("bob");
        let server = create_test_server(state);
        let token = create_test_jwt(&alice);
        let (name, value) = bearer(&token);

        let response = server
            .post("/chat/messages")
            .add_header(name, value)
            .json(&json!({ "receiver_id": bob.user_id, "content": "   " }))
            .await;
        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_send_message_to_unknown_receiver() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let server = create_test_server(state);
        let token = create_test_jwt(&alice);
        let (name, value) = bearer(&token);

        let response = server
            .post("/chat/messages")
            .add_header(name, value)
            .json(&json!({ "receiver_id": 999, "content": "ciao" }))
            .await;
        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn test_send_message_into_foreign_conversation() {
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

        let token = create_test_jwt(&carol);
        let (name, value) = bearer(&token);
        let response = server
            .post("/chat/messages")
            .add_header(name, value)
            .json(&json!({
                "conversation_id": conversation.conversation_id,
                "receiver_id": bob.user_id,
                "content": "intrusione"
            }))
            .await;
        response.assert_status_forbidden();
    }

    // ============================================================
    // GET /chat/conversations/{id}/messages
    // ============================================================

    #[tokio::test]
    async fn test_list_messages_chronological_with_pagination() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let bob = backend.add_user("bob");
        let server = create_test_server(state.clone());

        let mut conversation_id = 0;
        for i in 0..7 {
            let sent = state
                .messaging
                .send_message(
                    alice.user_id,
                    wirechat::dtos::SendMessageRequest {
                        conversation_id: None,
                        receiver_id: bob.user_id,
                        content: Some(format!("m{}", i)),
                        message_type: None,
                        metadata: None,
                        temp_id: None,
                    },
                )
                .await
                .unwrap();
            conversation_id = sent.conversation.conversation_id;
        }

        let token = create_test_jwt(&bob);
        let (name, value) = bearer(&token);
        let response = server
            .get(&format!(
                "/chat/conversations/{}/messages?page=1&limit=5",
                conversation_id
            ))
            .add_header(name, value)
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 5);
        assert_eq!(body["has_more"], true);
        // Pagina 1 = i 5 più recenti, in ordine cronologico.
        assert_eq!(messages[0]["content"], "m2");
        assert_eq!(messages[4]["content"], "m6");
    }

    // ============================================================
    // PATCH /chat/conversations/{id}/read
    // ============================================================

    #[tokio::test]
    async fn test_mark_read_reports_count_then_zero() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let bob = backend.add_user("bob");
        let server = create_test_server(state.clone());

        let mut conversation_id = 0;
        for _ in 0..2 {
            let sent = state
                .messaging
                .send_message(
                    alice.user_id,
                    wirechat::dtos::SendMessageRequest {
                        conversation_id: None,
                        receiver_id: bob.user_id,
                        content: Some("ciao".to_string()),
                        message_type: None,
                        metadata: None,
                        temp_id: None,
                    },
                )
                .await
                .unwrap();
            conversation_id = sent.conversation.conversation_id;
        }

        let token = create_test_jwt(&bob);
        let (name, value) = bearer(&token);
        let response = server
            .patch(&format!("/chat/conversations/{}/read", conversation_id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["count"], 2);
        assert_eq!(body["conversation_id"], conversation_id);

        let response = server
            .patch(&format!("/chat/conversations/{}/read", conversation_id))
            .add_header(name, value)
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["count"], 0);
    }

    // ============================================================
    // DELETE /chat/messages/{id}
    // ============================================================

    #[tokio::test]
    async fn test_delete_message_ownership() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let bob = backend.add_user("bob");
        let server = create_test_server(state.clone());

        let sent = state
            .messaging
            .send_message(
                alice.user_id,
                wirechat::dtos::SendMessageRequest {
                    conversation_id: None,
                    receiver_id: bob.user_id,
                    content: Some("da cancellare".to_string()),
                    message_type: None,
                    metadata: None,
                    temp_id: None,
                },
            )
            .await
            .unwrap();

        let bob_token = create_test_jwt(&bob);
        let (name, value) = bearer(&bob_token);
        let response = server
            .delete(&format!("/chat/messages/{}", sent.message.message_id))
            .add_header(name, value)
            .await;
        response.assert_status_forbidden();

        let alice_token = create_test_jwt(&alice);
        let (name, value) = bearer(&alice_token);
        let response = server
            .delete(&format!("/chat/messages/{}", sent.message.message_id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        let response = server
            .delete(&format!("/chat/messages/{}", sent.message.message_id))
            .add_header(name, value)
            .await;
        response.assert_status_not_found();
    }

    // ============================================================
    // GET /chat/unread-count
    // ============================================================

    #[tokio::test]
    async fn test_unread_count_aggregates_across_conversations() {
        let (state, backend) = setup();
        let alice = backend.add_user("alice");
        let bob = backend.add_user("bob");
        let carol = backend.add_user("carol");
        let server = create_test_server(state.clone());

        for sender in [&alice, &carol] {
            state
                .messaging
                .send_message(
                    sender.user_id,
                    wirechat::dtos::SendMessageRequest {
                        conversation_id: None,
                        receiver_id: bob.user_id,
                        content: Some("ping".to_string()),
                        message_type: None,
                        metadata: None,
                        temp_id: None,
                    },
                )
                .await
                .unwrap();
        }

        let token = create_test_jwt(&bob);
        let (name, value) = bearer(&token);
        let response = server
            .get("/chat/unread-count")
            .add_header(name, value)
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["total_unread"], 2);
    }
}
