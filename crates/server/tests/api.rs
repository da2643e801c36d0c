use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt;

use mesterbyg_server::{app, config::Config, db::Database, routes, AppState};

async fn setup() -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let storage_path = dir.path().join("storage");

    let config = Config {
        port: 0,
        database_url: format!("sqlite:{}?mode=rwc", db_path.display()),
        storage_path: storage_path.display().to_string(),
        jwt_secret: "test-secret".to_string(),
        public_origin: "https://mesterbyg.dk".to_string(),
        admin_email: "admin@mesterbyg.dk".to_string(),
        admin_password: "adminpassword".to_string(),
    };

    let db = Database::connect(&config.database_url).await.unwrap();
    db.run_migrations().await.unwrap();

    let state = AppState::new(db, config);
    routes::auth::seed_admin(&state).await.unwrap();

    (app(state), dir)
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn login(app: &Router) -> String {
    let (status, body) = send(
        app,
        request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "admin@mesterbyg.dk", "password": "adminpassword" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

async fn create_employee(app: &Router, token: &str, name: &str) -> Value {
    let (status, body) = send(
        app,
        request(
            Method::POST,
            "/api/employees",
            Some(token),
            Some(json!({ "name": name, "role": "Carpenter" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _dir) = setup().await;

    let response = app
        .oneshot(request(Method::GET, "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_probes_pass() {
    let (app, _dir) = setup().await;

    let (status, body) = send(&app, request(Method::GET, "/api/health/db", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, request(Method::GET, "/api/health/storage", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let (app, _dir) = setup().await;

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "admin@mesterbyg.dk", "password": "wrong" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let (app, _dir) = setup().await;

    let (status, _) = send(&app, request(Method::GET, "/api/employees", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        request(Method::GET, "/api/employees", Some("not-a-token"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn build_site_create_and_list_round_trip() {
    let (app, _dir) = setup().await;
    let token = login(&app).await;

    let (status, created) = send(
        &app,
        request(
            Method::POST,
            "/api/build-sites",
            Some(&token),
            Some(json!({ "name": "Site A", "address": "X", "city": "Aarhus" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let site_id = created["id"].as_str().unwrap().to_string();
    assert!(!site_id.is_empty());

    let (status, listed) = send(
        &app,
        request(Method::GET, "/api/build-sites", Some(&token), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let sites = listed["build_sites"].as_array().unwrap();
    assert!(sites
        .iter()
        .any(|s| s["id"] == site_id.as_str() && s["name"] == "Site A"));
}

#[tokio::test]
async fn employee_creation_returns_id_and_issues_qr_badge() {
    let (app, dir) = setup().await;
    let token = login(&app).await;

    let body = create_employee(&app, &token, "Jens Hansen").await;

    let employee_id = body["id"].as_str().unwrap();
    assert!(!employee_id.is_empty());

    // The badge URL points at stored PNG bytes
    let qr_url = body["qr_code_url"].as_str().unwrap();
    assert_eq!(
        qr_url,
        format!("/storage/employees/{employee_id}/Jens Hansen-QRCODE.png")
    );
    let object = qr_url.trim_start_matches("/storage/");
    assert!(dir.path().join("storage").join(object).exists());
}

#[tokio::test]
async fn employee_rejects_unknown_build_site() {
    let (app, _dir) = setup().await;
    let token = login(&app).await;

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/employees",
            Some(&token),
            Some(json!({ "name": "Jens", "build_site_id": "no-such-site" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown build site");
}

#[tokio::test]
async fn employee_joins_build_site_name() {
    let (app, _dir) = setup().await;
    let token = login(&app).await;

    let (_, site) = send(
        &app,
        request(
            Method::POST,
            "/api/build-sites",
            Some(&token),
            Some(json!({ "name": "Harbour Renovation" })),
        ),
    )
    .await;
    let site_id = site["id"].as_str().unwrap();

    let (status, employee) = send(
        &app,
        request(
            Method::POST,
            "/api/employees",
            Some(&token),
            Some(json!({ "name": "Jens", "build_site_id": site_id })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(employee["build_site_name"], "Harbour Renovation");
}

#[tokio::test]
async fn deleted_employees_disappear_from_the_list() {
    let (app, _dir) = setup().await;
    let token = login(&app).await;

    let body = create_employee(&app, &token, "Short Timer").await;
    let employee_id = body["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        request(
            Method::DELETE,
            &format!("/api/employees/{employee_id}"),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = send(
        &app,
        request(Method::GET, "/api/employees", Some(&token), None),
    )
    .await;
    let employees = listed["employees"].as_array().unwrap();
    assert!(employees.iter().all(|e| e["id"] != employee_id.as_str()));

    let (status, _) = send(
        &app,
        request(
            Method::GET,
            &format!("/api/employees/{employee_id}"),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_unlocks_with_the_default_pin() {
    let (app, _dir) = setup().await;
    let token = login(&app).await;

    let body = create_employee(&app, &token, "Jens Hansen").await;
    let employee_id = body["id"].as_str().unwrap().to_string();

    // Locked view is public and minimal
    let (status, locked) = send(
        &app,
        request(
            Method::GET,
            &format!("/api/public/profile/{employee_id}"),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(locked["locked"], true);
    assert_eq!(locked["name"], "Jens Hansen");
    assert!(locked.get("role").is_none());

    // Wrong PIN stays locked
    let (status, denied) = send(
        &app,
        request(
            Method::POST,
            &format!("/api/public/profile/{employee_id}/unlock"),
            None,
            Some(json!({ "pin": "0000" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(denied["valid"], false);
    assert!(denied.get("profile").is_none());

    // An empty settings table lazily seeds the default PIN 1234
    let (status, unlocked) = send(
        &app,
        request(
            Method::POST,
            &format!("/api/public/profile/{employee_id}/unlock"),
            None,
            Some(json!({ "pin": "1234" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unlocked["valid"], true);
    assert_eq!(unlocked["profile"]["name"], "Jens Hansen");

    // The lazy default was created exactly once
    let (_, history) = send(
        &app,
        request(Method::GET, "/api/settings/pin/history", Some(&token), None),
    )
    .await;
    let pins = history["pins"].as_array().unwrap();
    assert_eq!(pins.len(), 1);
    assert_eq!(pins[0]["pin"], "1234");
}

#[tokio::test]
async fn unknown_profile_is_not_found() {
    let (app, _dir) = setup().await;

    let (status, _) = send(
        &app,
        request(Method::GET, "/api/public/profile/nope", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn set_pin_rejects_non_digit_input() {
    let (app, _dir) = setup().await;
    let token = login(&app).await;

    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            "/api/settings/pin",
            Some(&token),
            Some(json!({ "pin": "12ab" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "PIN must be exactly 4 digits");
}

#[tokio::test]
async fn rotating_the_pin_invalidates_the_old_one() {
    let (app, _dir) = setup().await;
    let token = login(&app).await;

    let body = create_employee(&app, &token, "Jens").await;
    let employee_id = body["id"].as_str().unwrap().to_string();

    // Establish the default, then rotate
    let (status, current) = send(
        &app,
        request(Method::GET, "/api/settings/pin", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["pin"], "1234");

    let (status, _) = send(
        &app,
        request(
            Method::PUT,
            "/api/settings/pin",
            Some(&token),
            Some(json!({ "pin": "5678" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let unlock = |pin: &str| {
        request(
            Method::POST,
            &format!("/api/public/profile/{employee_id}/unlock"),
            None,
            Some(json!({ "pin": pin })),
        )
    };

    let (_, old) = send(&app, unlock("1234")).await;
    assert_eq!(old["valid"], false);

    let (_, new) = send(&app, unlock("5678")).await;
    assert_eq!(new["valid"], true);

    // Stale PINs remain as history
    let (_, history) = send(
        &app,
        request(Method::GET, "/api/settings/pin/history", Some(&token), None),
    )
    .await;
    assert_eq!(history["pins"].as_array().unwrap().len(), 2);
    assert_eq!(history["pins"][0]["pin"], "5678");
}

#[tokio::test]
async fn duplicate_user_email_conflicts() {
    let (app, _dir) = setup().await;
    let token = login(&app).await;

    let payload = json!({
        "email": "worker@mesterbyg.dk",
        "name": "Worker",
        "password": "longenough",
    });

    let (status, created) = send(
        &app,
        request(Method::POST, "/api/users", Some(&token), Some(payload.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    // Hashes never leave the server
    assert!(created.get("password_hash").is_none());

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/users", Some(&token), Some(payload)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn user_update_and_delete() {
    let (app, _dir) = setup().await;
    let token = login(&app).await;

    let (_, created) = send(
        &app,
        request(
            Method::POST,
            "/api/users",
            Some(&token),
            Some(json!({
                "email": "worker@mesterbyg.dk",
                "name": "Worker",
                "password": "longenough",
            })),
        ),
    )
    .await;
    let uid = created["id"].as_str().unwrap().to_string();

    let (status, updated) = send(
        &app,
        request(
            Method::PUT,
            &format!("/api/users/{uid}"),
            Some(&token),
            Some(json!({ "name": "Site Worker", "unlocked_by": "admin" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Site Worker");
    assert_eq!(updated["unlocked_by"], "admin");

    let (status, _) = send(
        &app,
        request(
            Method::DELETE,
            &format!("/api/users/{uid}"),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        request(Method::GET, &format!("/api/users/{uid}"), Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn feedback_submission_and_triage() {
    let (app, _dir) = setup().await;

    let (status, submitted) = send(
        &app,
        request(
            Method::POST,
            "/api/public/feedback",
            None,
            Some(json!({
                "message": "The gallery is broken on mobile",
                "email": "visitor@example.com",
                "url": "https://mesterbyg.dk/projects",
                "viewport": "390x844",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(submitted["status"], "new");
    let feedback_id = submitted["id"].as_str().unwrap().to_string();

    let token = login(&app).await;

    let (status, listed) = send(
        &app,
        request(Method::GET, "/api/feedback", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["feedback"].as_array().unwrap().len(), 1);

    let (status, updated) = send(
        &app,
        request(
            Method::PUT,
            &format!("/api/feedback/{feedback_id}/status"),
            Some(&token),
            Some(json!({ "status": "urgent" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "urgent");

    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            &format!("/api/feedback/{feedback_id}/status"),
            Some(&token),
            Some(json!({ "status": "bogus" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown feedback status: bogus");

    // Empty message never makes it in
    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/api/public/feedback",
            None,
            Some(json!({ "message": "   " })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn consultation_funnel_round_trip() {
    let (app, _dir) = setup().await;

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/api/public/consultations",
            None,
            Some(json!({ "name": "Anne", "phone": "" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = send(
        &app,
        request(
            Method::POST,
            "/api/public/consultations",
            None,
            Some(json!({
                "name": "Anne",
                "phone": "+45 12 34 56 78",
                "service": "Roofing",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["service"], "Roofing");

    let token = login(&app).await;
    let (status, listed) = send(
        &app,
        request(Method::GET, "/api/consultations", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["consultations"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn document_upload_stores_file_and_record() {
    let (app, dir) = setup().await;
    let token = login(&app).await;

    let body = create_employee(&app, &token, "Jens").await;
    let employee_id = body["id"].as_str().unwrap().to_string();

    let boundary = "test-boundary";
    let multipart_body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"contract.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\n\
         not really a pdf\r\n\
         --{boundary}--\r\n"
    );

    let req = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/employees/{employee_id}/documents"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(multipart_body))
        .unwrap();

    let (status, uploaded) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(uploaded["errors"].as_array().unwrap().len(), 0);

    let docs = uploaded["uploaded"].as_array().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["name"], "contract.pdf");
    assert_eq!(docs[0]["content_type"], "application/pdf");

    let stored = dir
        .path()
        .join("storage")
        .join(format!("employees/{employee_id}/documents/contract.pdf"));
    assert!(stored.exists());

    // Detail view now carries the document
    let (_, detail) = send(
        &app,
        request(
            Method::GET,
            &format!("/api/employees/{employee_id}"),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(detail["documents"].as_array().unwrap().len(), 1);
}
