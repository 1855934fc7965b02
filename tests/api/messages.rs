use crate::helpers::TestApp;
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn text_message_is_stored_and_listed() {
    // given
    let app = TestApp::spawn().await;
    app.logged_in_user().await;
    let correspondent_id = Uuid::new_v4();

    // when
    let response = app
        .post_message(&json!({
            "correspondentId": correspondent_id,
            "sender": "user",
            "text": "Hi there!"
        }))
        .await;

    // then
    assert_eq!(response.status(), 201);
    let thread: Value = app.get_thread(correspondent_id).await.json().await.unwrap();
    let thread = thread.as_array().unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0]["text"], "Hi there!");
    assert_eq!(thread[0]["sender"], "user");
    assert_eq!(thread[0]["kind"], "text");
}

#[tokio::test]
async fn thread_is_listed_in_chronological_order() {
    // given
    let app = TestApp::spawn().await;
    app.logged_in_user().await;
    let correspondent_id = Uuid::new_v4();

    for text in ["first", "second", "third"] {
        app.post_message(&json!({
            "correspondentId": correspondent_id,
            "sender": "user",
            "text": text
        }))
        .await;
    }

    // when
    let thread: Value = app.get_thread(correspondent_id).await.json().await.unwrap();

    // then
    let texts: Vec<_> = thread
        .as_array()
        .unwrap()
        .iter()
        .map(|message| message["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texts, ["first", "second", "third"]);
}

#[tokio::test]
async fn invalid_messages_are_rejected_with_400() {
    // given
    let app = TestApp::spawn().await;
    app.logged_in_user().await;
    let correspondent_id = Uuid::new_v4();
    let test_cases = [
        (
            json!({ "sender": "user", "text": "hello" }),
            "missing correspondent",
        ),
        (
            json!({ "correspondentId": correspondent_id, "text": "hello" }),
            "missing sender",
        ),
        (
            json!({ "correspondentId": correspondent_id, "sender": "user" }),
            "missing text and image",
        ),
        (
            json!({
                "correspondentId": correspondent_id,
                "sender": "user",
                "text": "hello",
                "imageUrl": "https://cdn.example.com/a.jpg"
            }),
            "both text and image",
        ),
        (
            json!({ "correspondentId": correspondent_id, "sender": "user", "text": "   " }),
            "whitespace-only text",
        ),
        (
            json!({ "correspondentId": correspondent_id, "sender": "user", "text": "a".repeat(4001) }),
            "too long text",
        ),
    ];

    for (body, description) in test_cases {
        // when
        let response = app.post_message(&body).await;

        // then
        assert_eq!(
            response.status(),
            400,
            "The API did not fail with 400 Bad Request when the payload had {description}."
        );
    }
}

#[tokio::test]
async fn free_user_cannot_send_images() {
    // given
    let app = TestApp::spawn().await;
    app.logged_in_user().await;
    let correspondent_id = Uuid::new_v4();

    // when
    let response = app
        .post_message(&json!({
            "correspondentId": correspondent_id,
            "sender": "user",
            "imageUrl": "https://cdn.example.com/a.jpg"
        }))
        .await;

    // then
    assert_eq!(response.status(), 402);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["requiredCapability"], "canSendImages");
    assert_eq!(body["entitlements"]["capabilities"]["canSendImages"], false);

    let thread: Value = app.get_thread(correspondent_id).await.json().await.unwrap();
    assert!(thread.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn active_plus_user_can_send_images() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;
    app.set_subscription(user.user_id, "plus", "active").await;

    // when
    let response = app
        .post_message(&json!({
            "correspondentId": Uuid::new_v4(),
            "sender": "user",
            "imageUrl": "https://cdn.example.com/a.jpg"
        }))
        .await;

    // then
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn received_images_beyond_the_allowance_are_blurred() {
    // given
    let app = TestApp::spawn().await;
    app.logged_in_user().await;
    let correspondent_id = Uuid::new_v4();

    for n in 0..3 {
        let response = app
            .post_message(&json!({
                "correspondentId": correspondent_id,
                "sender": "correspondent",
                "imageUrl": format!("https://cdn.example.com/{n}.jpg")
            }))
            .await;
        assert_eq!(response.status(), 201);
    }

    // when
    let thread: Value = app.get_thread(correspondent_id).await.json().await.unwrap();

    // then
    let thread = thread.as_array().unwrap();
    assert_eq!(thread[0]["blurred"], false);
    assert_eq!(thread[0]["imageUrl"], "https://cdn.example.com/0.jpg");
    assert_eq!(thread[1]["blurred"], false);
    assert_eq!(thread[2]["blurred"], true);
    assert!(thread[2].get("imageUrl").is_none());
}

#[tokio::test]
async fn paying_users_see_every_received_image() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;
    app.set_subscription(user.user_id, "pro", "active").await;
    let correspondent_id = Uuid::new_v4();

    for n in 0..3 {
        app.post_message(&json!({
            "correspondentId": correspondent_id,
            "sender": "correspondent",
            "imageUrl": format!("https://cdn.example.com/{n}.jpg")
        }))
        .await;
    }

    // when
    let thread: Value = app.get_thread(correspondent_id).await.json().await.unwrap();

    // then
    assert!(thread
        .as_array()
        .unwrap()
        .iter()
        .all(|message| message["blurred"] == false));
}

#[tokio::test]
async fn gifts_require_a_paid_subscription() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;
    let body = json!({ "correspondentId": Uuid::new_v4(), "gift": "rose" });

    // when
    let response = app.post_gift(&body).await;

    // then
    assert_eq!(response.status(), 402);
    let payload: Value = response.json().await.unwrap();
    assert_eq!(payload["requiredCapability"], "canSendGifts");

    app.set_subscription(user.user_id, "plus", "active").await;
    assert_eq!(app.post_gift(&body).await.status(), 201);
}

#[tokio::test]
async fn sharing_contacts_requires_pro() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;
    let body = json!({ "correspondentId": Uuid::new_v4(), "contact": "+1 555 0100" });
    app.set_subscription(user.user_id, "plus", "active").await;

    // when
    let response = app.post_contact(&body).await;

    // then
    assert_eq!(response.status(), 402);

    app.set_subscription(user.user_id, "pro", "active").await;
    let response = app.post_contact(&body).await;
    assert_eq!(response.status(), 201);
    let message: Value = response.json().await.unwrap();
    assert_eq!(message["contact"], "+1 555 0100");
}

#[tokio::test]
async fn canceled_subscription_loses_its_capabilities_immediately() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;
    let body = json!({ "correspondentId": Uuid::new_v4(), "gift": "rose" });
    app.set_subscription(user.user_id, "pro", "active").await;
    assert_eq!(app.post_gift(&body).await.status(), 201);

    // when
    app.set_subscription(user.user_id, "pro", "canceled").await;

    // then
    assert_eq!(app.post_gift(&body).await.status(), 402);
}

#[tokio::test]
async fn messaging_requires_a_session() {
    // given
    let app = TestApp::spawn().await;

    // when
    let response = app
        .post_message(&json!({
            "correspondentId": Uuid::new_v4(),
            "sender": "user",
            "text": "hello"
        }))
        .await;

    // then
    assert_eq!(response.status(), 401);
}
