use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with, Fixture, INFO_PATH, LOGIN_FAILED_BODY, LOGIN_PATH, OUTDATED_MESSAGE};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn form_request(uri: &str, body: &str, cookie: Option<&str>) -> Request<String> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(http::header::COOKIE, cookie);
    }
    builder.body(body.to_string()).unwrap()
}

/// `PHPSESSID=...` from the Set-Cookie header, without attributes.
fn session_cookie(response: &axum::response::Response) -> String {
    let raw = response
        .headers()
        .get(http::header::SET_COOKIE)
        .expect("login should set a cookie")
        .to_str()
        .unwrap();
    raw.split(';').next().unwrap().to_string()
}

// --- login ---

#[tokio::test]
async fn login_success_returns_empty_200_with_cookie() {
    let resp = app()
        .oneshot(form_request(
            LOGIN_PATH,
            "username=demo&password=demo-password&appversion=2.40",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(session_cookie(&resp).starts_with("PHPSESSID="));
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn login_outdated_version_returns_202() {
    let resp = app()
        .oneshot(form_request(
            LOGIN_PATH,
            "username=demo&password=demo-password&appversion=2.10",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body = body_json(resp).await;
    assert_eq!(body["message"], OUTDATED_MESSAGE);
}

#[tokio::test]
async fn login_wrong_password_returns_body() {
    let resp = app()
        .oneshot(form_request(
            LOGIN_PATH,
            "username=demo&password=nope&appversion=2.40",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(http::header::SET_COOKIE).is_none());
    assert_eq!(body_bytes(resp).await, LOGIN_FAILED_BODY.as_bytes());
}

// --- info ---

#[tokio::test]
async fn info_without_session_is_forbidden() {
    let resp = app()
        .oneshot(form_request(INFO_PATH, "appversion=2.40", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app()
        .oneshot(form_request(INFO_PATH, "appversion=2.40", Some("PHPSESSID=forged")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

// --- full session ---

#[tokio::test]
async fn login_then_fetch_listing() {
    use tower::Service;

    let fixture = Fixture {
        cars: json!([{ "id": 1, "name": "Boot", "ex_pow": 0, "bat_pow": 4, "hdop": 1, "device_type_id": 8 }]),
        last_pos: json!(""),
        ..Fixture::default()
    };
    let mut app = app_with(fixture).into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            LOGIN_PATH,
            "username=demo&password=demo-password&appversion=2.40",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = session_cookie(&resp);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(INFO_PATH, "appversion=2.40", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["cars"][0]["name"], "Boot");
    assert_eq!(body["lastPos"], "");
}

#[tokio::test]
async fn default_listing_embeds_last_pos_string() {
    use tower::Service;

    let mut app = app().into_service();
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            LOGIN_PATH,
            "username=demo&password=demo-password&appversion=2.40",
            None,
        ))
        .await
        .unwrap();
    let cookie = session_cookie(&resp);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(INFO_PATH, "appversion=2.40", Some(&cookie)))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["cars"].as_array().unwrap().len(), 3);
    let last_pos: Value = serde_json::from_str(body["lastPos"].as_str().unwrap()).unwrap();
    assert_eq!(last_pos["type"], "FeatureCollection");
}
