use crate::helpers::{TestApp, PRO_PRICE};
use serde_json::{json, Value};
use wiremock::{
    matchers::{any, body_string_contains, method, path},
    Mock, ResponseTemplate,
};

fn subscribe_body(email: &str) -> Value {
    json!({
        "priceId": PRO_PRICE,
        "paymentMethodId": "pm_card_visa",
        "email": email
    })
}

async fn mount_subscription_flow(app: &TestApp, customer_id: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/payment_methods/pm_card_visa/attach"))
        .and(body_string_contains(format!("customer={customer_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "pm_card_visa" })))
        .expect(1)
        .mount(&app.payment_server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/customers/{customer_id}")))
        .and(body_string_contains("default_payment_method%5D=pm_card_visa"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": customer_id })))
        .expect(1)
        .mount(&app.payment_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/subscriptions"))
        .and(body_string_contains(format!("customer={customer_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sub_new",
            "customer": customer_id,
            "status": "incomplete",
            "items": { "data": [{ "price": { "id": PRO_PRICE } }] },
            "latest_invoice": {
                "id": "in_1",
                "payment_intent": { "id": "pi_1", "client_secret": "pi_1_secret_xyz" }
            }
        })))
        .expect(1)
        .mount(&app.payment_server)
        .await;
}

#[tokio::test]
async fn subscribing_creates_a_customer_and_returns_the_client_secret() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;

    Mock::given(method("POST"))
        .and(path("/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_new" })))
        .expect(1)
        .mount(&app.payment_server)
        .await;
    mount_subscription_flow(&app, "cus_new").await;

    // when
    let response = app.post_subscribe(&subscribe_body(&user.email)).await;

    // then
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "clientSecret": "pi_1_secret_xyz",
            "subscriptionId": "sub_new",
            "status": "incomplete"
        })
    );

    let (tier, status, customer_id) = app.stored_subscription(user.user_id).await;
    assert_eq!(tier, "pro");
    assert_eq!(status, "inactive");
    assert_eq!(customer_id.as_deref(), Some("cus_new"));
}

#[tokio::test]
async fn subscribing_reuses_the_stored_customer() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;
    app.link_customer(user.user_id, "cus_existing").await;

    Mock::given(method("POST"))
        .and(path("/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_other" })))
        .expect(0)
        .mount(&app.payment_server)
        .await;
    mount_subscription_flow(&app, "cus_existing").await;

    // when
    let response = app.post_subscribe(&subscribe_body(&user.email)).await;

    // then
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn missing_fields_are_reported_by_name() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;
    let test_cases = [
        (
            json!({ "paymentMethodId": "pm_1", "email": user.email }),
            "priceId",
        ),
        (
            json!({ "priceId": PRO_PRICE, "email": user.email }),
            "paymentMethodId",
        ),
        (
            json!({ "priceId": PRO_PRICE, "paymentMethodId": "pm_1" }),
            "email",
        ),
    ];

    for (body, field) in test_cases {
        // when
        let response = app.post_subscribe(&body).await;

        // then
        assert_eq!(response.status(), 400, "missing {field} was accepted");
        let body: Value = response.json().await.unwrap();
        assert!(
            body["error"].as_str().unwrap().contains(field),
            "error does not name {field}"
        );
    }
}

#[tokio::test]
async fn unknown_price_is_rejected_without_calling_the_processor() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.payment_server)
        .await;

    // when
    let response = app
        .post_subscribe(&json!({
            "priceId": "price_gold_forever",
            "paymentMethodId": "pm_1",
            "email": user.email
        }))
        .await;

    // then
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn payment_method_id_that_is_not_an_object_id_is_rejected() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.payment_server)
        .await;

    // when
    let response = app
        .post_subscribe(&json!({
            "priceId": PRO_PRICE,
            "paymentMethodId": "../../customers/cus_x?",
            "email": user.email
        }))
        .await;

    // then
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Invalid payment method id"));
}

#[tokio::test]
async fn processor_failure_returns_502() {
    // given
    let app = TestApp::spawn().await;
    let user = app.logged_in_user().await;
    app.link_customer(user.user_id, "cus_existing").await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": { "type": "card_error", "code": "card_declined", "message": "Declined" }
        })))
        .mount(&app.payment_server)
        .await;

    // when
    let response = app.post_subscribe(&subscribe_body(&user.email)).await;

    // then
    assert_eq!(response.status(), 502);
    let (tier, status, _) = app.stored_subscription(user.user_id).await;
    assert_eq!(tier, "free");
    assert_eq!(status, "inactive");
}

#[tokio::test]
async fn subscribing_requires_a_session() {
    // given
    let app = TestApp::spawn().await;

    // when
    let response = app.post_subscribe(&subscribe_body("ursula@example.com")).await;

    // then
    assert_eq!(response.status(), 401);
}
