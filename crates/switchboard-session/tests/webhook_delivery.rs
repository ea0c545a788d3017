// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound events reaching the webhook endpoint.

mod common;

use std::time::Duration;

use common::{Harness, eventually, settle, sid};
use switchboard_core::SessionStatus;
use switchboard_core::types::{InboundEvent, InboundPayload};
use switchboard_session::webhook::{MessageKind, build_payload};
use switchboard_test_utils::{MockHandle, inbound_text};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn image_event(id: &str) -> InboundEvent {
    InboundEvent {
        id: id.into(),
        remote_jid: "5215500000000@s.whatsapp.net".into(),
        from_me: false,
        push_name: None,
        payload: Some(InboundPayload::Image {
            caption: Some("receipt".into()),
            mimetype: Some("image/jpeg".into()),
        }),
    }
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}

async fn wait_for_requests(server: &MockServer, n: usize) -> bool {
    for _ in 0..200 {
        if request_count(server).await >= n {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread")]
async fn text_message_is_posted_with_canonical_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(serde_json::json!({
            "sessionId": "shop1",
            "message": {
                "id": "MSG1",
                "from": "5215500000000@s.whatsapp.net",
                "senderName": "Tester",
                "type": "text",
                "text": "hola",
                "media": null
            }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let h = Harness::new();
    let url = format!("{}/hook", server.uri());
    h.registry.start(sid("shop1"), Some(url)).await.unwrap();
    h.handle()
        .await
        .emit_message(inbound_text("MSG1", "5215500000000@s.whatsapp.net", "hola"));

    assert!(wait_for_requests(&server, 1).await);
    let body: serde_json::Value =
        serde_json::from_slice(&server.received_requests().await.unwrap()[0].body).unwrap();
    assert!(body["timestamp"].is_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn self_authored_and_empty_events_are_not_posted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let h = Harness::new();
    h.registry
        .start(sid("filter"), Some(server.uri()))
        .await
        .unwrap();
    let handle = h.handle().await;

    let mut own = inbound_text("OWN", "1@s.whatsapp.net", "echo");
    own.from_me = true;
    handle.emit_message(own);
    let mut empty = inbound_text("EMPTY", "1@s.whatsapp.net", "");
    empty.payload = None;
    handle.emit_message(empty);
    handle.emit_message(inbound_text("REAL", "1@s.whatsapp.net", "real"));

    assert!(wait_for_requests(&server, 1).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn no_webhook_url_means_no_delivery() {
    let server = MockServer::start().await;
    let h = Harness::new();
    h.registry.start(sid("silent"), None).await.unwrap();
    h.handle()
        .await
        .emit_message(inbound_text("M", "1@s.whatsapp.net", "hi"));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn media_is_inlined_as_base64() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "message": {
                "type": "image",
                "text": "receipt",
                "media": "AQID",
                "mimetype": "image/jpeg"
            }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let h = Harness::new();
    h.registry
        .start(sid("pics"), Some(server.uri()))
        .await
        .unwrap();
    let handle = h.handle().await;
    handle.set_media(Some(vec![1, 2, 3])).await;
    handle.emit_message(image_event("IMG1"));

    assert!(wait_for_requests(&server, 1).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_endpoint_does_not_disturb_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let h = Harness::new();
    let session = h
        .registry
        .start(sid("sturdy"), Some(server.uri()))
        .await
        .unwrap();
    let handle = h.handle().await;
    handle.emit_open();
    handle.emit_message(inbound_text("1", "1@s.whatsapp.net", "a"));
    handle.emit_message(inbound_text("2", "1@s.whatsapp.net", "b"));

    assert!(wait_for_requests(&server, 2).await);
    settle().await;
    assert!(eventually(|| session.status() == SessionStatus::Open).await);
}

#[tokio::test]
async fn media_fetch_failure_yields_null_media() {
    let handle = MockHandle::new();
    let payload = build_payload(&sid("s"), &image_event("X"), &handle)
        .await
        .expect("image events are forwarded");
    assert_eq!(payload.message.kind, MessageKind::Image);
    assert_eq!(payload.message.text, "receipt");
    assert!(payload.message.media.is_none());
}

#[tokio::test]
async fn document_payload_carries_file_name() {
    let handle = MockHandle::new();
    handle.set_media(Some(b"%PDF".to_vec())).await;
    let event = InboundEvent {
        id: "D".into(),
        remote_jid: "1@s.whatsapp.net".into(),
        from_me: false,
        push_name: Some("Ana".into()),
        payload: Some(InboundPayload::Document {
            file_name: Some("invoice.pdf".into()),
            mimetype: Some("application/pdf".into()),
            caption: None,
        }),
    };
    let payload = build_payload(&sid("s"), &event, &handle).await.unwrap();
    assert_eq!(payload.session_id, "s");
    assert_eq!(payload.message.kind, MessageKind::Document);
    assert_eq!(payload.message.text, "");
    assert_eq!(payload.message.file_name.as_deref(), Some("invoice.pdf"));
    assert_eq!(payload.message.media.as_deref(), Some("JVBERg=="));
    assert_eq!(payload.message.sender_name.as_deref(), Some("Ana"));
}

#[tokio::test]
async fn unsupported_payload_is_still_forwarded() {
    let handle = MockHandle::new();
    let mut event = inbound_text("U", "1@s.whatsapp.net", "");
    event.payload = Some(InboundPayload::Unsupported);
    let payload = build_payload(&sid("s"), &event, &handle).await.unwrap();
    assert_eq!(payload.message.kind, MessageKind::Unsupported);
    assert!(payload.message.media.is_none());
}
