use super::*;
use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    response::Response,
};
use serde_json::{json, Value};
use shared::domain::{ExplorationId, UserId};
use tower::ServiceExt;

struct TestApp {
    app: Router,
    state: Arc<AppState>,
}

async fn test_app() -> TestApp {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let reader = ReaderContext::new(storage);
    demos::load_missing_demos(&reader).await.expect("demos");
    let state = Arc::new(AppState {
        reader,
        auth: AuthConfig {
            secret: "s".into(),
            ttl_seconds: 60,
        },
        admin_emails: vec!["admin@example.com".into()],
    });
    TestApp {
        app: build_router(state.clone()),
        state,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.expect("response")
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        let mut request = Request::get(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(request.body(Body::empty()).expect("request")).await
    }

    async fn post_json(
        &self,
        uri: &str,
        token: Option<&str>,
        csrf: Option<&str>,
        payload: Value,
    ) -> Response {
        let mut request = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(csrf) = csrf {
            request = request.header(api::CSRF_HEADER, csrf);
        }
        self.send(
            request
                .body(Body::from(payload.to_string()))
                .expect("request"),
        )
        .await
    }

    async fn login(&self, email: &str) -> (UserId, String) {
        let response = self
            .post_json("/login", None, None, json!({ "email": email }))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let user_id = UserId(body["user_id"].as_i64().expect("user id"));
        let token = body["token"].as_str().expect("token").to_string();
        (user_id, token)
    }

    async fn csrf_token(&self, token: &str) -> String {
        let response = self.get("/profile/editor_prerequisites", Some(token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let page = text_body(response).await;
        let start = page
            .find("name=\"csrf-token\" content=\"")
            .expect("csrf meta tag")
            + "name=\"csrf-token\" content=\"".len();
        let end = page[start..].find('"').expect("end of token") + start;
        page[start..end].to_string()
    }

    async fn onboard(&self, token: &str, username: &str) {
        let csrf = self.csrf_token(token).await;
        let response = self
            .post_json(
                "/profile/editor_prerequisites_handler",
                Some(token),
                Some(&csrf),
                json!({ "agreed_to_terms": true, "username": username }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

async fn text_body(response: Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .expect("ascii location")
        .to_string()
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = test_app().await;
    let response = app.get("/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "ok");
}

#[tokio::test]
async fn login_requires_an_email_address() {
    let app = test_app().await;
    let response = app
        .post_json("/login", None, None, json!({ "email": "nobody" }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], 400);
    assert!(body["error"].as_str().expect("error").contains("email"));
}

#[tokio::test]
async fn invalid_session_tokens_are_rejected() {
    let app = test_app().await;
    let response = app.get("/learnhandler/init/0", Some("garbage")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], 401);
}

#[tokio::test]
async fn reader_plays_the_welcome_exploration_over_http() {
    let app = test_app().await;

    let response = app.get("/learnhandler/init/0", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let init = json_body(response).await;
    assert_eq!(init["block_number"], 0);
    assert_eq!(init["state_name"], "Welcome!");
    assert_eq!(init["state_history"], json!(["Welcome!"]));
    assert!(init["oppia_html"]
        .as_str()
        .expect("html")
        .contains("do you know where the name 'Oppia'"));

    let response = app
        .post_json(
            "/learnhandler/transition/0/Welcome!",
            None,
            None,
            json!({
                "answer": "0",
                "handler": "submit",
                "block_number": init["block_number"],
                "params": init["params"],
                "state_history": init["state_history"],
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let step = json_body(response).await;
    assert!(step["oppia_html"]
        .as_str()
        .expect("html")
        .contains("In fact, the word Oppia means 'learn'."));
    assert_eq!(step["block_number"], 1);
    assert_eq!(step["state_history"], json!(["Welcome!", "What language"]));
    assert_eq!(step["exploration_id"], "0");
    assert_eq!(step["finished"], false);

    let response = app
        .post_json(
            "/learnhandler/transition/0/What%20language",
            None,
            None,
            json!({
                "answer": "Finnish",
                "handler": "submit",
                "block_number": step["block_number"],
                "params": step["params"],
                "state_history": step["state_history"],
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let step = json_body(response).await;
    assert!(step["oppia_html"]
        .as_str()
        .expect("html")
        .contains("Yes! Oppia is the Finnish word for learn."));

    let response = app
        .post_json(
            "/learnhandler/transition/0/Things%20you%20can%20do",
            None,
            None,
            json!({
                "handler": "submit",
                "block_number": step["block_number"],
                "params": step["params"],
                "state_history": step["state_history"],
            }),
        )
        .await;
    let done = json_body(response).await;
    assert_eq!(done["finished"], true);
    assert_eq!(done["state_name"], "END");
    assert_eq!(done["params"], json!({}));
    assert_eq!(done["interactive_html"], "");
    assert_eq!(done["block_number"], 3);
}

#[tokio::test]
async fn unknown_explorations_are_not_found() {
    let app = test_app().await;
    let response = app.get("/learnhandler/init/nope", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["code"], 404);

    let response = app.get("/learn/nope", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reader_feedback_is_accepted() {
    let app = test_app().await;
    let response = app
        .post_json(
            "/learnhandler/give_feedback/0/Welcome!",
            None,
            None,
            json!({ "feedback": "Loved it", "state_history": ["Welcome!"] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({}));

    let stored = app
        .state
        .reader
        .storage
        .list_reader_feedback(&ExplorationId::new("0"))
        .await
        .expect("feedback");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].state_name, "Welcome!");
}

#[tokio::test]
async fn private_explorations_show_a_preview_banner_to_their_owner() {
    let app = test_app().await;
    let (owner_id, owner_token) = app.login("owner@example.com").await;
    let exploration_id = reader::explorations::create_new(
        &app.state.reader,
        owner_id,
        "Secret draft",
        "Test",
        None,
        true,
    )
    .await
    .expect("create");
    let uri = format!("/learn/{exploration_id}");

    let response = app.get(&uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get(&uri, Some(&owner_token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = text_body(response).await;
    assert!(page.contains("This is a preview"));
    assert!(page.contains("Secret draft"));

    let response = app.get("/learn/0", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!text_body(response).await.contains("This is a preview"));
}

#[tokio::test]
async fn random_redirect_skips_the_welcome_exploration() {
    let app = test_app().await;
    for _ in 0..10 {
        let response = app.get("/learn/random", None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let target = location(&response);
        assert!(target.starts_with("/learn/"));
        assert_ne!(target, "/learn/0");
    }

    let response = app.get("/learn/random?iframed=true", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).ends_with("?iframed=true"));
}

#[tokio::test]
async fn create_redirects_to_prerequisites_until_onboarded() {
    let app = test_app().await;

    let response = app.get("/create/0", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (_, token) = app.login("admin@example.com").await;
    let response = app.get("/create/0", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let target = location(&response);
    assert!(target.starts_with("/profile/editor_prerequisites"));
    assert!(target.contains("return_url=%2Fcreate%2F0"));

    let response = app.get(&target, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = text_body(response).await;
    assert!(page.contains("A few notes before you start editing"));
    assert!(page.contains("My preferred Oppia username"));
    assert!(page.contains("data-return-url=\"/create/0\""));

    app.onboard(&token, "admin").await;
    let response = app.get("/create/0", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text_body(response).await.contains("Welcome to Oppia!"));
}

#[tokio::test]
async fn editing_requires_rights() {
    let app = test_app().await;
    let (owner_id, owner_token) = app.login("owner@example.com").await;
    let (_, other_token) = app.login("other@example.com").await;
    app.onboard(&owner_token, "owner").await;
    app.onboard(&other_token, "other").await;

    let exploration_id = reader::explorations::create_new(
        &app.state.reader,
        owner_id,
        "Mine",
        "Test",
        None,
        false,
    )
    .await
    .expect("create");
    let uri = format!("/create/{exploration_id}");

    assert_eq!(app.get(&uri, Some(&owner_token)).await.status(), StatusCode::OK);
    assert_eq!(
        app.get(&uri, Some(&other_token)).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.get("/create/0", Some(&owner_token)).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.get("/create/missing", Some(&owner_token)).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn prerequisites_reject_bad_terms_and_usernames() {
    let app = test_app().await;
    let (_, token) = app.login("editor@example.com").await;
    let csrf = app.csrf_token(&token).await;
    let handler = "/profile/editor_prerequisites_handler";

    for (payload, expected) in [
        (json!({ "agreed_to_terms": false, "username": "abc" }), "you will need to accept"),
        (json!({ "agreed_to_terms": "Hasta la vista!", "username": "abc" }), "you will need to accept"),
        (json!({ "agreed_to_terms": true }), "Empty username supplied"),
        (json!({ "agreed_to_terms": true, "username": "" }), "Empty username supplied"),
        (json!({ "agreed_to_terms": true, "username": "!a!" }), "can only have alphanumeric characters"),
    ] {
        let response = app
            .post_json(handler, Some(&token), Some(&csrf), payload)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["code"], 400);
        assert!(body["error"].as_str().expect("error").contains(expected));
    }

    let response = app
        .post_json(
            handler,
            Some(&token),
            Some(&csrf),
            json!({ "agreed_to_terms": true, "username": "abcde" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get(handler, Some(&token)).await;
    assert_eq!(
        json_body(response).await,
        json!({ "agreed_to_terms": true, "username": "abcde" })
    );
}

#[tokio::test]
async fn prerequisites_require_login_and_csrf() {
    let app = test_app().await;
    let handler = "/profile/editor_prerequisites_handler";
    let payload = json!({ "agreed_to_terms": true, "username": "abcde" });

    let response = app.post_json(handler, None, None, payload.clone()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (_, token) = app.login("editor@example.com").await;
    let response = app
        .post_json(handler, Some(&token), None, payload.clone())
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post_json(handler, Some(&token), Some(&token), payload)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert_eq!(
        app.get("/profile/editor_prerequisites", None).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let app = test_app().await;
    let response = app
        .post_json(
            "/learnhandler/give_feedback/0/Welcome!",
            None,
            None,
            json!({ "feedback": "x".repeat(MAX_BODY_BYTES + 1) }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
