use std::time::Duration;

use mockito::Matcher;
use serde_json::json;
use tempfile::TempDir;

use notify_module::notify::{EntityKind, MailDispatcher, NotificationContext};
use notify_module::{process_mentions, TaskStore};
use send_mail_module::MailClient;

fn store_with_users(temp: &TempDir) -> (TaskStore, i64, i64) {
    let store = TaskStore::new(temp.path().join("taskflow.db")).expect("open store");
    let alice = store
        .create_user("alice", "alice@example.com", "Alice Cohen")
        .expect("alice");
    let bob = store
        .create_user("bob", "bob@example.com", "Bob Levi")
        .expect("bob");
    (store, alice, bob)
}

fn dispatcher_for(server: &mockito::ServerGuard) -> MailDispatcher {
    let client = MailClient::new(
        format!("{}/send_mail.php", server.url()),
        Duration::from_secs(5),
    )
    .expect("mail client");
    MailDispatcher::new(client)
}

fn task_context(actor_id: Option<i64>) -> NotificationContext {
    NotificationContext {
        entity: EntityKind::Task,
        title: "Fix login page".to_string(),
        project_name: Some("Website".to_string()),
        actor_name: "Carol Mizrahi".to_string(),
        actor_id,
        content: None,
    }
}

#[test]
fn mention_round_trip_sends_one_escaped_email() {
    let mut server = mockito::Server::new();
    let temp = TempDir::new().expect("tempdir");
    let (store, alice, _bob) = store_with_users(&temp);

    let mock = server
        .mock("POST", "/send_mail.php")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "to": "alice@example.com",
            "replyTo": "alice@example.com",
            "subject": "You were mentioned in a comment on: Fix <login> page",
        })))
        .match_body(Matcher::Regex("Carol &amp; co".to_string()))
        .match_body(Matcher::Regex("please review".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success":true}"#)
        .expect(1)
        .create();

    let content = format!(
        r#"<span class="mention" data-user-id="{alice}">@alice</span> please review"#
    );
    let context = NotificationContext {
        entity: EntityKind::Comment,
        title: "Fix <login> page".to_string(),
        project_name: Some("Website".to_string()),
        actor_name: "Carol & co".to_string(),
        actor_id: None,
        content: Some(content.clone()),
    };

    let dispatcher = dispatcher_for(&server);
    let outcome = process_mentions(&store, &dispatcher, &content, &context, false)
        .expect("pipeline");
    assert_eq!(outcome.resolved, 1);
    assert_eq!(outcome.sent, 1);
    mock.assert();
}

#[test]
fn content_without_mentions_makes_no_dispatch_calls() {
    let mut server = mockito::Server::new();
    let temp = TempDir::new().expect("tempdir");
    let (store, _alice, _bob) = store_with_users(&temp);

    let mock = server
        .mock("POST", "/send_mail.php")
        .expect(0)
        .create();

    let dispatcher = dispatcher_for(&server);
    let outcome = process_mentions(
        &store,
        &dispatcher,
        "<p>just an ordinary update</p>",
        &task_context(None),
        false,
    )
    .expect("pipeline");
    assert_eq!(outcome.resolved, 0);
    assert_eq!(outcome.sent, 0);
    mock.assert();
}

#[test]
fn duplicate_markers_for_one_user_send_exactly_once() {
    let mut server = mockito::Server::new();
    let temp = TempDir::new().expect("tempdir");
    let (store, alice, _bob) = store_with_users(&temp);

    let mock = server
        .mock("POST", "/send_mail.php")
        .with_status(200)
        .with_body(r#"{"success":true}"#)
        .expect(1)
        .create();

    let content = format!(
        r#"<span data-user-id="{alice}">@alice</span> and again <span data-user-id="{alice}">@alice</span>"#
    );
    let dispatcher = dispatcher_for(&server);
    let outcome = process_mentions(&store, &dispatcher, &content, &task_context(None), false)
        .expect("pipeline");
    assert_eq!(outcome.resolved, 1);
    assert_eq!(outcome.sent, 1);
    mock.assert();
}

#[test]
fn unresolvable_candidates_are_silently_dropped() {
    let mut server = mockito::Server::new();
    let temp = TempDir::new().expect("tempdir");
    let (store, alice, _bob) = store_with_users(&temp);

    let mock = server
        .mock("POST", "/send_mail.php")
        .with_status(200)
        .with_body(r#"{"success":true}"#)
        .expect(1)
        .create();

    let content = format!(
        r#"<span data-user-id="{alice}">@alice</span> <span data-user-id="9999">@ghost</span>"#
    );
    let dispatcher = dispatcher_for(&server);
    let outcome = process_mentions(&store, &dispatcher, &content, &task_context(None), false)
        .expect("pipeline");
    assert_eq!(outcome.resolved, 1);
    assert_eq!(outcome.sent, 1);
    mock.assert();
}

#[test]
fn dispatch_failure_does_not_abort_sibling_sends() {
    let mut server = mockito::Server::new();
    let temp = TempDir::new().expect("tempdir");
    let (store, alice, bob) = store_with_users(&temp);

    // Every send fails; both users must still be attempted.
    let mock = server
        .mock("POST", "/send_mail.php")
        .with_status(200)
        .with_body(r#"{"success":false,"message":"smtp down"}"#)
        .expect(2)
        .create();

    let content = format!(
        r#"<span data-user-id="{alice}">@alice</span> <span data-user-id="{bob}">@bob</span>"#
    );
    let dispatcher = dispatcher_for(&server);
    let outcome = process_mentions(&store, &dispatcher, &content, &task_context(None), false)
        .expect("pipeline");
    assert_eq!(outcome.resolved, 2);
    assert_eq!(outcome.sent, 0);
    mock.assert();
}

#[test]
fn username_fallback_resolves_by_handle() {
    let mut server = mockito::Server::new();
    let temp = TempDir::new().expect("tempdir");
    let (store, _alice, _bob) = store_with_users(&temp);

    let mock = server
        .mock("POST", "/send_mail.php")
        .match_body(Matcher::PartialJson(json!({"to": "bob@example.com"})))
        .with_status(200)
        .with_body(r#"{"success":true}"#)
        .expect(1)
        .create();

    let dispatcher = dispatcher_for(&server);
    let outcome = process_mentions(
        &store,
        &dispatcher,
        "ping @bob and @nosuchuser",
        &task_context(None),
        false,
    )
    .expect("pipeline");
    assert_eq!(outcome.resolved, 1);
    assert_eq!(outcome.sent, 1);
    mock.assert();
}

#[test]
fn self_mentions_can_be_suppressed() {
    let mut server = mockito::Server::new();
    let temp = TempDir::new().expect("tempdir");
    let (store, alice, _bob) = store_with_users(&temp);

    let mock = server
        .mock("POST", "/send_mail.php")
        .with_status(200)
        .with_body(r#"{"success":true}"#)
        .expect(1)
        .create();

    let content = format!(r#"<span data-user-id="{alice}">@alice</span> note to self"#);
    let dispatcher = dispatcher_for(&server);

    // Default policy mirrors the UI: the actor is notified of their own
    // mention.
    let outcome = process_mentions(
        &store,
        &dispatcher,
        &content,
        &task_context(Some(alice)),
        false,
    )
    .expect("pipeline");
    assert_eq!(outcome.sent, 1);

    // With suppression on, the same content sends nothing.
    let outcome = process_mentions(
        &store,
        &dispatcher,
        &content,
        &task_context(Some(alice)),
        true,
    )
    .expect("pipeline");
    assert_eq!(outcome.resolved, 0);
    assert_eq!(outcome.sent, 0);
    mock.assert();
}
