mod helpers;

use chime_infra::NotifyTarget;
use helpers::setup::spawn_app;
use serde_json::{json, Value};
use std::time::Duration;

#[actix_web::main]
#[test]
async fn test_status_ok() {
    let (_, address) = spawn_app().await;
    let res = reqwest::get(format!("{}/api/v1/", address))
        .await
        .expect("Expected a status response");
    assert!(res.status().is_success());
}

#[actix_web::main]
#[test]
async fn test_create_reminder_over_http() {
    let (app, address) = spawn_app().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/v1/command", address))
        .json(&json!({
            "room_id": "!room:example.org",
            "sender": "@alice:example.org",
            "body": "remindme tomorrow 09:00; Submit the report"
        }))
        .send()
        .await
        .expect("Expected a command response");
    assert!(res.status().is_success());

    let reply: Value = res.json().await.expect("Expected a json reply");
    assert_eq!(reply["outcome"], "created");
    assert_eq!(reply["text"], "Submit the report");
    assert_eq!(reply["kind"], "one_shot");
    assert_eq!(app.ctx.registry.reminder_count(), 1);

    // the same text again is a conflict
    let res = client
        .post(format!("{}/api/v1/command", address))
        .json(&json!({
            "room_id": "!room:example.org",
            "sender": "@bob:example.org",
            "body": "remindme tomorrow 10:00; submit the REPORT"
        }))
        .send()
        .await
        .expect("Expected a command response");
    assert_eq!(res.status().as_u16(), 409);
}

#[actix_web::main]
#[test]
async fn test_malformed_commands_are_client_errors() {
    let (_, address) = spawn_app().await;
    let client = reqwest::Client::new();

    for (body, expected_status) in &[
        ("frobnicate tomorrow 09:00; x", 400),
        ("remindme there is no delimiter", 400),
        ("remindme yesteryear 09:00; x", 400),
        ("cancel no such reminder", 404),
    ] {
        let res = client
            .post(format!("{}/api/v1/command", address))
            .json(&json!({
                "room_id": "!room:example.org",
                "sender": "@alice:example.org",
                "body": body
            }))
            .send()
            .await
            .expect("Expected a command response");
        assert_eq!(res.status().as_u16(), *expected_status, "body: {}", body);
    }
}

#[actix_web::main]
#[test]
async fn test_one_shot_reminder_fires_and_notifies() {
    let (app, address) = spawn_app().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/v1/command", address))
        .json(&json!({
            "room_id": "!room:example.org",
            "sender": "@alice:example.org",
            "body": "r 2s; ping"
        }))
        .send()
        .await
        .expect("Expected a command response");
    assert!(res.status().is_success());
    assert_eq!(app.ctx.registry.reminder_count(), 1);

    actix_web::rt::time::sleep(Duration::from_secs(4)).await;

    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].room_id, "!room:example.org");
    assert_eq!(sent[0].message, "Reminder: ping");
    assert_eq!(
        sent[0].target,
        NotifyTarget::User("@alice:example.org".to_string())
    );
    // the fired one-shot is gone again
    assert_eq!(app.ctx.registry.reminder_count(), 0);
}
