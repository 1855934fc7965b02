use crate::helpers::{
    entitlements_of, event_payload, sign_with, subscription_object, TestApp, PLUS_PRICE,
    PRO_PRICE,
};
use serde_json::{json, Value};
use time::OffsetDateTime;
use wiremock::{
    matchers::{method, path},
    Mock, ResponseTemplate,
};

#[tokio::test]
async fn missing_signature_is_rejected_with_400() {
    // given
    let app = TestApp::spawn().await;
    let payload = event_payload(
        "invoice.payment_failed",
        json!({ "id": "in_1", "customer": "cus_1" }),
        OffsetDateTime::now_utc(),
    );

    // when
    let response = app.post_webhook(&payload, None).await;

    // then
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn wrong_signature_is_rejected_and_nothing_is_processed() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;
    app.link_customer(user.user_id, "cus_1").await;
    app.set_subscription(user.user_id, "pro", "active").await;

    let payload = event_payload(
        "invoice.payment_failed",
        json!({ "id": "in_1", "customer": "cus_1" }),
        OffsetDateTime::now_utc(),
    );
    let signature = sign_with(
        "whsec_someone_else",
        &payload,
        OffsetDateTime::now_utc().unix_timestamp(),
    );

    // when
    let response = app.post_webhook(&payload, Some(&signature)).await;

    // then
    assert_eq!(response.status(), 400);
    let (_, status, _) = app.stored_subscription(user.user_id).await;
    assert_eq!(status, "active");
}

#[tokio::test]
async fn stale_signature_timestamp_is_rejected() {
    // given
    let app = TestApp::spawn().await;
    let payload = event_payload(
        "invoice.payment_failed",
        json!({ "id": "in_1", "customer": "cus_1" }),
        OffsetDateTime::now_utc(),
    );
    let signature = app.sign(&payload, OffsetDateTime::now_utc().unix_timestamp() - 600);

    // when
    let response = app.post_webhook(&payload, Some(&signature)).await;

    // then
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn subscription_update_with_user_metadata_grants_the_tier() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;

    // when
    let response = app
        .post_signed_event(
            "customer.subscription.updated",
            subscription_object("cus_1", "active", PRO_PRICE, Some(user.user_id)),
            OffsetDateTime::now_utc(),
        )
        .await;

    // then
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "received": true }));

    let entitlements = entitlements_of(&app).await;
    assert_eq!(entitlements["tier"], "pro");
    assert_eq!(entitlements["active"], true);
    assert_eq!(
        entitlements["capabilities"],
        json!({
            "canSendGifts": true,
            "canSendImages": true,
            "maxReceivedImagesUnblurred": "unlimited",
            "canShareContacts": true
        })
    );
}

#[tokio::test]
async fn subscription_update_is_matched_through_the_stored_customer() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;
    app.link_customer(user.user_id, "cus_known").await;

    // when
    let response = app
        .post_signed_event(
            "customer.subscription.created",
            subscription_object("cus_known", "trialing", PLUS_PRICE, None),
            OffsetDateTime::now_utc(),
        )
        .await;

    // then
    assert_eq!(response.status(), 200);
    let (tier, status, customer_id) = app.stored_subscription(user.user_id).await;
    assert_eq!(tier, "plus");
    assert_eq!(status, "trialing");
    assert_eq!(customer_id.as_deref(), Some("cus_known"));
}

#[tokio::test]
async fn subscription_update_is_matched_through_customer_metadata() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;

    Mock::given(method("GET"))
        .and(path("/v1/customers/cus_remote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cus_remote",
            "metadata": { "user_id": user.user_id.to_string() }
        })))
        .expect(1)
        .mount(&app.payment_server)
        .await;

    // when
    let response = app
        .post_signed_event(
            "customer.subscription.updated",
            subscription_object("cus_remote", "active", PLUS_PRICE, None),
            OffsetDateTime::now_utc(),
        )
        .await;

    // then
    assert_eq!(response.status(), 200);
    let (tier, status, _) = app.stored_subscription(user.user_id).await;
    assert_eq!(tier, "plus");
    assert_eq!(status, "active");
}

#[tokio::test]
async fn event_for_an_unresolvable_user_is_acknowledged_and_dropped() {
    // given
    let app = TestApp::spawn().await;

    Mock::given(method("GET"))
        .and(path("/v1/customers/cus_nobody"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_nobody" })))
        .expect(1)
        .mount(&app.payment_server)
        .await;

    // when
    let response = app
        .post_signed_event(
            "customer.subscription.updated",
            subscription_object("cus_nobody", "active", PRO_PRICE, None),
            OffsetDateTime::now_utc(),
        )
        .await;

    // then
    assert_eq!(response.status(), 200);
    let rows: i64 = sqlx::query_scalar("SELECT count(*) FROM subscriptions WHERE stripe_customer_id = $1")
        .bind("cus_nobody")
        .fetch_one(&app.db_pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn subscription_deletion_revokes_paid_capabilities() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;
    let created = OffsetDateTime::now_utc() - time::Duration::minutes(1);

    app.post_signed_event(
        "customer.subscription.created",
        subscription_object("cus_1", "active", PRO_PRICE, Some(user.user_id)),
        created,
    )
    .await;

    // when
    let response = app
        .post_signed_event(
            "customer.subscription.deleted",
            subscription_object("cus_1", "canceled", PRO_PRICE, Some(user.user_id)),
            OffsetDateTime::now_utc(),
        )
        .await;

    // then
    assert_eq!(response.status(), 200);
    let entitlements = entitlements_of(&app).await;
    assert_eq!(entitlements["status"], "canceled");
    assert_eq!(entitlements["active"], false);
    assert_eq!(entitlements["capabilities"]["canSendGifts"], false);
}

#[tokio::test]
async fn out_of_order_event_does_not_undo_a_newer_one() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;
    let now = OffsetDateTime::now_utc();

    app.post_signed_event(
        "customer.subscription.deleted",
        subscription_object("cus_1", "canceled", PRO_PRICE, Some(user.user_id)),
        now,
    )
    .await;

    // when
    let response = app
        .post_signed_event(
            "customer.subscription.updated",
            subscription_object("cus_1", "active", PRO_PRICE, Some(user.user_id)),
            now - time::Duration::minutes(10),
        )
        .await;

    // then
    assert_eq!(response.status(), 200);
    let (_, status, _) = app.stored_subscription(user.user_id).await;
    assert_eq!(status, "canceled");
}

#[tokio::test]
async fn duplicated_event_is_applied_idempotently() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;
    let payload = event_payload(
        "customer.subscription.updated",
        subscription_object("cus_1", "active", PLUS_PRICE, Some(user.user_id)),
        OffsetDateTime::now_utc(),
    );
    let signature = app.sign(&payload, OffsetDateTime::now_utc().unix_timestamp());

    // when
    let first = app.post_webhook(&payload, Some(&signature)).await;
    let after_first = app.stored_subscription(user.user_id).await;
    let second = app.post_webhook(&payload, Some(&signature)).await;

    // then
    assert_eq!(first.status(), 200);
    assert_eq!(second.status(), 200);
    assert_eq!(app.stored_subscription(user.user_id).await, after_first);
}

#[tokio::test]
async fn failed_invoice_marks_the_customer_past_due_whatever_the_previous_status() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;
    app.link_customer(user.user_id, "cus_late").await;

    for previous_status in ["active", "trialing", "canceled", "inactive"] {
        app.set_subscription(user.user_id, "pro", previous_status)
            .await;

        // when
        let response = app
            .post_signed_event(
                "invoice.payment_failed",
                json!({ "id": "in_1", "customer": "cus_late" }),
                OffsetDateTime::now_utc(),
            )
            .await;

        // then
        assert_eq!(response.status(), 200);
        let (_, status, _) = app.stored_subscription(user.user_id).await;
        assert_eq!(status, "past_due", "previous status was {previous_status}");
    }
}

#[tokio::test]
async fn checkout_completion_stores_the_fetched_subscription() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;

    Mock::given(method("GET"))
        .and(path("/v1/subscriptions/sub_123"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(subscription_object("cus_checkout", "active", PRO_PRICE, None)),
        )
        .expect(1)
        .mount(&app.payment_server)
        .await;

    // when
    let response = app
        .post_signed_event(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "customer": "cus_checkout",
                "subscription": "sub_123",
                "metadata": { "user_id": user.user_id.to_string() }
            }),
            OffsetDateTime::now_utc(),
        )
        .await;

    // then
    assert_eq!(response.status(), 200);
    let (tier, status, customer_id) = app.stored_subscription(user.user_id).await;
    assert_eq!(tier, "pro");
    assert_eq!(status, "active");
    assert_eq!(customer_id.as_deref(), Some("cus_checkout"));
}

#[tokio::test]
async fn processor_failure_during_checkout_is_acknowledged() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;

    Mock::given(method("GET"))
        .and(path("/v1/subscriptions/sub_123"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.payment_server)
        .await;

    // when
    let response = app
        .post_signed_event(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "customer": "cus_checkout",
                "subscription": "sub_123",
                "metadata": { "user_id": user.user_id.to_string() }
            }),
            OffsetDateTime::now_utc(),
        )
        .await;

    // then
    assert_eq!(response.status(), 200);
    let (tier, status, _) = app.stored_subscription(user.user_id).await;
    assert_eq!(tier, "free");
    assert_eq!(status, "inactive");
}

#[tokio::test]
async fn unhandled_event_types_are_acknowledged() {
    // given
    let app = TestApp::spawn().await;

    // when
    let response = app
        .post_signed_event(
            "customer.created",
            json!({ "id": "cus_1" }),
            OffsetDateTime::now_utc(),
        )
        .await;

    // then
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn checkout_falls_back_to_the_subscription_metadata_for_the_user() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;

    Mock::given(method("GET"))
        .and(path("/v1/subscriptions/sub_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(subscription_object(
            "cus_checkout",
            "active",
            PLUS_PRICE,
            Some(user.user_id),
        )))
        .expect(1)
        .mount(&app.payment_server)
        .await;

    // when
    let response = app
        .post_signed_event(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "customer": "cus_checkout",
                "subscription": "sub_123",
                "metadata": {}
            }),
            OffsetDateTime::now_utc(),
        )
        .await;

    // then
    assert_eq!(response.status(), 200);
    let (tier, status, customer_id) = app.stored_subscription(user.user_id).await;
    assert_eq!(tier, "plus");
    assert_eq!(status, "active");
    assert_eq!(customer_id.as_deref(), Some("cus_checkout"));
}

#[tokio::test]
async fn update_in_the_same_second_as_the_checkout_is_applied() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;
    let created = OffsetDateTime::now_utc();

    Mock::given(method("GET"))
        .and(path("/v1/subscriptions/sub_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(subscription_object(
            "cus_checkout",
            "incomplete",
            PRO_PRICE,
            Some(user.user_id),
        )))
        .expect(1)
        .mount(&app.payment_server)
        .await;

    app.post_signed_event(
        "checkout.session.completed",
        json!({
            "id": "cs_1",
            "customer": "cus_checkout",
            "subscription": "sub_123",
            "metadata": { "user_id": user.user_id.to_string() }
        }),
        created,
    )
    .await;
    let (_, status, _) = app.stored_subscription(user.user_id).await;
    assert_eq!(status, "inactive");

    // when
    let response = app
        .post_signed_event(
            "customer.subscription.updated",
            subscription_object("cus_checkout", "active", PRO_PRICE, Some(user.user_id)),
            created,
        )
        .await;

    // then
    assert_eq!(response.status(), 200);
    let (_, status, _) = app.stored_subscription(user.user_id).await;
    assert_eq!(status, "active");
}

#[tokio::test]
async fn signed_but_malformed_event_is_rejected_as_malformed() {
    // given
    let app = TestApp::spawn().await;
    let payload = event_payload(
        "customer.subscription.updated",
        json!({ "id": "sub_123" }),
        OffsetDateTime::now_utc(),
    );
    let signature = app.sign(&payload, OffsetDateTime::now_utc().unix_timestamp());

    // when
    let response = app.post_webhook(&payload, Some(&signature)).await;

    // then
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Malformed event payload" }));
}
