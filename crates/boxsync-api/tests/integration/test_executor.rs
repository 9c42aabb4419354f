//! Request executor tests: token retry, status classification and body parsing

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use boxsync_api::client::{ApiRequest, ApiResponse};
use boxsync_core::domain::RemoteError;
use boxsync_core::ports::ICredentialStore;

use crate::common::*;

#[tokio::test]
async fn test_401_refreshes_once_and_retries() {
    let env = setup_box_mock().await;

    Mock::given(method("GET"))
        .and(path("/folders/0"))
        .and(header("authorization", format!("Bearer {INITIAL_ACCESS}").as_str()))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&env.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/folders/0"))
        .and(header("authorization", format!("Bearer {FRESH_ACCESS}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(folder_json("0", "All Files")))
        .expect(1)
        .mount(&env.server)
        .await;

    mount_refresh_endpoint(&env.server, 1).await;

    let response = env
        .client
        .execute(&ApiRequest::get(env.client.api_url("/folders/0")))
        .await
        .unwrap()
        .into_json()
        .unwrap();
    assert_eq!(response["name"], "All Files");

    // Session and store both hold the new pair
    assert_eq!(env.session.access_token().await.unwrap(), FRESH_ACCESS);
    let stored = env.store.load(ACCOUNT).unwrap().unwrap();
    assert_eq!(stored.access_token, FRESH_ACCESS);
    assert_eq!(stored.refresh_token, FRESH_REFRESH);
}

#[tokio::test]
async fn test_second_401_is_unauthorized() {
    let env = setup_box_mock().await;

    Mock::given(method("GET"))
        .and(path("/folders/0"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "type": "error",
            "status": 401,
            "message": "Unauthorized"
        })))
        .expect(2)
        .mount(&env.server)
        .await;

    mount_refresh_endpoint(&env.server, 1).await;

    let err = env
        .client
        .execute(&ApiRequest::get(env.client.api_url("/folders/0")))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Unauthorized(_)), "got {err:?}");
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let env = setup_box_mock().await;

    Mock::given(method("GET"))
        .and(header("authorization", format!("Bearer {INITIAL_ACCESS}").as_str()))
        .respond_with(ResponseTemplate::new(401))
        .mount(&env.server)
        .await;

    Mock::given(method("GET"))
        .and(header("authorization", format!("Bearer {FRESH_ACCESS}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(folder_json("1", "x")))
        .mount(&env.server)
        .await;

    mount_refresh_endpoint(&env.server, 1).await;

    let a = ApiRequest::get(env.client.api_url("/folders/1"));
    let b = ApiRequest::get(env.client.api_url("/folders/2"));
    let c = ApiRequest::get(env.client.api_url("/folders/3"));
    let (ra, rb, rc) = tokio::join!(
        env.client.execute(&a),
        env.client.execute(&b),
        env.client.execute(&c)
    );

    assert!(ra.is_ok());
    assert!(rb.is_ok());
    assert!(rc.is_ok());
}

#[tokio::test]
async fn test_status_classification() {
    let env = setup_box_mock().await;

    let routes: [(u16, &str); 5] = [
        (404, "/files/404"),
        (409, "/files/409"),
        (405, "/files/405"),
        (400, "/files/400"),
        (503, "/files/503"),
    ];
    for (status, route) in routes {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
                "type": "error",
                "status": status,
                "message": format!("status {status}")
            })))
            .mount(&env.server)
            .await;
    }

    let get = |route: &str| ApiRequest::get(env.client.api_url(route));

    let err = env.client.execute(&get("/files/404")).await.unwrap_err();
    assert!(matches!(err, RemoteError::NotFound(ref m) if m == "status 404"));

    let err = env.client.execute(&get("/files/409")).await.unwrap_err();
    assert!(err.is_conflict());

    let err = env.client.execute(&get("/files/405")).await.unwrap_err();
    assert!(matches!(err, RemoteError::MethodNotAllowed(_)));

    let err = env.client.execute(&get("/files/400")).await.unwrap_err();
    assert!(matches!(err, RemoteError::BadRequest(_)));

    let err = env.client.execute(&get("/files/503")).await.unwrap_err();
    assert!(matches!(err, RemoteError::Http { status: 503, .. }));
}

#[tokio::test]
async fn test_embedded_error_descriptor() {
    let env = setup_box_mock().await;

    Mock::given(method("GET"))
        .and(path("/folders/0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": "invalid_request",
            "error_description": "Invalid folder"
        })))
        .mount(&env.server)
        .await;

    let err = env
        .client
        .execute(&ApiRequest::get(env.client.api_url("/folders/0")))
        .await
        .unwrap_err();

    match err {
        RemoteError::Status { code, message } => {
            assert_eq!(code.as_deref(), Some("invalid_request"));
            assert_eq!(message, "Invalid folder");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_body_is_status_error() {
    let env = setup_box_mock().await;

    Mock::given(method("GET"))
        .and(path("/folders/0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&env.server)
        .await;

    let err = env
        .client
        .execute(&ApiRequest::get(env.client.api_url("/folders/0")))
        .await
        .unwrap_err();

    match err {
        RemoteError::Status { code: None, message } => {
            assert_eq!(message, "non-json response: <html>maintenance</html>");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_no_content() {
    let env = setup_box_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/files/7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&env.server)
        .await;

    let response = env
        .client
        .execute(&ApiRequest::delete(env.client.api_url("/files/7")))
        .await
        .unwrap();
    assert_eq!(response, ApiResponse::NoContent);
}

#[tokio::test]
async fn test_current_user() {
    let env = setup_box_mock().await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "type": "user",
            "id": "17738362",
            "name": "Test User",
            "login": "test@example.com",
            "space_amount": 10737418240_u64,
            "space_used": 1073741824_u64
        })))
        .mount(&env.server)
        .await;

    let user = env.client.current_user().await.unwrap();
    assert_eq!(user.name, "Test User");
    assert_eq!(user.login, "test@example.com");
    assert_eq!(user.space_amount, 10737418240);
    assert_eq!(user.space_used, 1073741824);
}

#[tokio::test]
async fn test_unauthenticated_session_sends_nothing() {
    let env = setup_with_store(boxsync_api::store::MemoryCredentialStore::new()).await;

    let err = env
        .client
        .execute(&ApiRequest::get(env.client.api_url("/folders/0")))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Configuration(_)));
    assert!(env.server.received_requests().await.unwrap().is_empty());
}
