mod common;

use common::client_for;
use objgen::{DebugRoomRegistration, ObjectProps, ObjgenError};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registration() -> DebugRoomRegistration {
    DebugRoomRegistration {
        props: ObjectProps {
            object_name: "jet".to_string(),
            object_description: "a jet".to_string(),
        },
        url: "https://example.com/objects/obj_123/versions/1/content".to_string(),
    }
}

#[tokio::test]
async fn test_register_debug_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/_debug_add_prog_obj_rooms"))
        .and(body_json(json!({
            "props": { "object_name": "jet", "object_description": "a jet" },
            "url": "https://example.com/objects/obj_123/versions/1/content"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    client.register_debug(&registration()).await.unwrap();
}

#[tokio::test]
async fn test_register_debug_failure_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/_debug_add_prog_obj_rooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "rooms are full"
        })))
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    let err = client.register_debug(&registration()).await.unwrap_err();

    assert!(matches!(
        err,
        ObjgenError::Request { status: 200, ref message } if message == "rooms are full"
    ));
}

#[tokio::test]
async fn test_register_debug_error_status_without_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/_debug_add_prog_obj_rooms"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    let err = client.register_debug(&registration()).await.unwrap_err();

    match err {
        ObjgenError::Request { status, message } => {
            assert_eq!(status, 403);
            assert!(message.starts_with("debug add failed"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
