mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{TestContext, config_for, create_user, png_bytes, test_context, test_context_with};
use school_cms::{
    AppConfig, MockMediaStore, auth, config::Env, create_router,
    models::{LoginResponse, Media, Post, PostPage},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceExt;

const BOUNDARY: &str = "cms-test-boundary";

fn app(ctx: &TestContext) -> Router {
    create_router(ctx.state.clone())
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// A multipart body with one `file` part and an optional `alt_text` part.
fn multipart_body(file_name: &str, content_type: &str, bytes: &[u8], alt_text: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(alt) = alt_text {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"alt_text\"\r\n\r\n{alt}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(user_id: i64, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/admin/media")
        .header("x-user-id", user_id.to_string())
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let ctx = test_context().await;
    let response = app(&ctx)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_admin_routes_require_authentication() {
    let ctx = test_context().await;
    for uri in ["/admin/posts", "/admin/users", "/admin/media", "/auth/me"] {
        let response = app(&ctx)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        let body: Value = body_json(response).await;
        assert_eq!(body["error"], "authentication required");
    }
}

#[tokio::test]
async fn test_missing_capability_is_forbidden() {
    let ctx = test_context().await;
    let author = create_user(&ctx.repo, "a@school.example", "author").await;

    let response = app(&ctx)
        .oneshot(
            Request::get("/admin/users")
                .header("x-user-id", author.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_post_lifecycle_over_http() {
    let ctx = test_context().await;
    let editor = create_user(&ctx.repo, "ed@school.example", "editor").await;

    let response = app(&ctx)
        .oneshot(
            Request::post("/admin/posts")
                .header("x-user-id", editor.id.to_string())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "title": "Open Evening", "status": "published" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let post: Post = body_json(response).await;
    assert_eq!(post.slug, "open-evening");

    let response = app(&ctx)
        .oneshot(
            Request::get("/posts/slug/open-evening")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&ctx)
        .oneshot(
            Request::get("/posts?per_page=5&kind=post")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let page: PostPage = body_json(response).await;
    assert_eq!(page.total, 1);
    assert_eq!(page.per_page, 5);

    let response = app(&ctx)
        .oneshot(Request::get("/posts?page=0").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_and_bearer_token_over_http() {
    let ctx = test_context_with(config_for(Env::Production), MockMediaStore::new()).await;
    let admin = create_user(&ctx.repo, "head@school.example", "admin").await;

    let response = app(&ctx)
        .oneshot(
            Request::post("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "email": "head@school.example", "password": common::TEST_PASSWORD })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let login: LoginResponse = body_json(response).await;

    let response = app(&ctx)
        .oneshot(
            Request::get("/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", login.token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me: Value = body_json(response).await;
    assert_eq!(me["id"], admin.id);

    // The development header is ignored in production.
    let response = app(&ctx)
        .oneshot(
            Request::get("/auth/me")
                .header("x-user-id", admin.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_site_bundle() {
    let ctx = test_context().await;
    school_cms::bootstrap::seed_default_settings(&ctx.repo)
        .await
        .unwrap();

    let response = app(&ctx)
        .oneshot(Request::get("/site").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let site: Value = body_json(response).await;
    assert!(site["settings"]["site_title"].is_string());
    assert!(site["menus"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_track_page_view_over_http() {
    let ctx = test_context().await;
    let response = app(&ctx)
        .oneshot(
            Request::post("/analytics/track")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::USER_AGENT, "integration-test")
                .body(Body::from(json!({ "path": "/about" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

// --- Media uploads ---

#[tokio::test]
async fn test_upload_png_stores_original_and_derivatives() {
    let ctx = test_context().await;
    let author = create_user(&ctx.repo, "a@school.example", "author").await;
    let body = multipart_body("Sports Day.png", "image/png", &png_bytes(1000, 600), Some("Pupils racing"));

    let response = app(&ctx).oneshot(upload_request(author.id, body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let media: Media = body_json(response).await;

    assert_eq!(media.original_name, "Sports Day.png");
    assert_eq!(media.mime_type, "image/png");
    assert_eq!(media.alt_text, "Pupils racing");
    assert_eq!((media.width, media.height), (Some(1000), Some(600)));
    assert_eq!(media.uploaded_by, Some(author.id));
    // The user's file name never reaches the storage key.
    assert!(!media.storage_key.contains("Sports"));
    assert!(media.storage_key.ends_with(".png"));

    let thumbnail = &media.variants["thumbnail"];
    assert_eq!((thumbnail.width, thumbnail.height), (150, 150));
    let medium = &media.variants["medium"];
    assert_eq!(medium.width, 768);

    let keys = ctx.store.keys();
    assert_eq!(keys.len(), 3);
    assert!(keys.contains(&media.storage_key));
    assert!(keys.contains(&thumbnail.key));
    let (content_type, _) = ctx.store.object(&medium.key).unwrap();
    assert_eq!(content_type, "image/png");
}

#[tokio::test]
async fn test_upload_pdf_has_no_variants() {
    let ctx = test_context().await;
    let author = create_user(&ctx.repo, "a@school.example", "author").await;
    let body = multipart_body(
        "term-dates.pdf",
        "application/pdf",
        b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF",
        None,
    );

    let response = app(&ctx).oneshot(upload_request(author.id, body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let media: Media = body_json(response).await;
    assert!(media.variants.is_empty());
    assert!(media.width.is_none());
    assert_eq!(ctx.store.keys(), vec![media.storage_key]);
}

#[tokio::test]
async fn test_upload_rejects_unsupported_type() {
    let ctx = test_context().await;
    let author = create_user(&ctx.repo, "a@school.example", "author").await;
    let body = multipart_body("notes.txt", "text/plain", b"hello", None);

    let response = app(&ctx).oneshot(upload_request(author.id, body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(ctx.store.keys().is_empty());
}

#[tokio::test]
async fn test_upload_rejects_mismatched_content() {
    let ctx = test_context().await;
    let author = create_user(&ctx.repo, "a@school.example", "author").await;

    let png_as_jpeg = multipart_body("photo.jpg", "image/jpeg", &png_bytes(20, 20), None);
    let response = app(&ctx).oneshot(upload_request(author.id, png_as_jpeg)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let fake_pdf = multipart_body("doc.pdf", "application/pdf", b"<html></html>", None);
    let response = app(&ctx).oneshot(upload_request(author.id, fake_pdf)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(ctx.store.keys().is_empty());
}

#[tokio::test]
async fn test_upload_rejects_oversized_file() {
    let config = AppConfig {
        max_upload_bytes: 1024,
        ..AppConfig::default()
    };
    let ctx = test_context_with(config, MockMediaStore::new()).await;
    let author = create_user(&ctx.repo, "a@school.example", "author").await;
    let body = multipart_body("big.pdf", "application/pdf", &vec![b'%'; 4096], None);

    let response = app(&ctx).oneshot(upload_request(author.id, body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(ctx.store.keys().is_empty());
}

#[tokio::test]
async fn test_upload_without_file_part() {
    let ctx = test_context().await;
    let author = create_user(&ctx.repo, "a@school.example", "author").await;
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"alt_text\"\r\n\r\nonly text\r\n--{BOUNDARY}--\r\n"
    );

    let response = app(&ctx)
        .oneshot(upload_request(author.id, body.into_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_store_failure_is_internal_error() {
    let ctx = test_context_with(AppConfig::default(), MockMediaStore::new_failing()).await;
    let author = create_user(&ctx.repo, "a@school.example", "author").await;
    let body = multipart_body("photo.png", "image/png", &png_bytes(40, 40), None);

    let response = app(&ctx).oneshot(upload_request(author.id, body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let (_, total) = ctx.repo.list_media(10, 0).await.unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_delete_media_removes_objects() {
    let ctx = test_context().await;
    let editor = create_user(&ctx.repo, "ed@school.example", "editor").await;
    let body = multipart_body("photo.png", "image/png", &png_bytes(200, 100), None);
    let response = app(&ctx).oneshot(upload_request(editor.id, body)).await.unwrap();
    let media: Media = body_json(response).await;
    assert_eq!(ctx.store.keys().len(), 2);

    let response = app(&ctx)
        .oneshot(
            Request::delete(format!("/admin/media/{}", media.id))
                .header("x-user-id", editor.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(ctx.store.keys().is_empty());
    assert!(ctx.repo.get_media(media.id).await.unwrap().is_none());

    let response = app(&ctx)
        .oneshot(
            Request::delete(format!("/admin/media/{}", media.id))
                .header("x-user-id", editor.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_requests_use_error_envelope() {
    let ctx = test_context().await;
    let admin = create_user(&ctx.repo, "head@school.example", "admin").await;

    let cases = [
        ("PUT", "/admin/menus/main", json!({ "items": [{ "url": "/x" }] }).to_string()),
        ("PUT", "/admin/menus/main", json!({ "items": [{ "label": "Home" }] }).to_string()),
        ("PUT", "/admin/settings/site_title", "not json".to_string()),
        ("POST", "/admin/posts", json!({ "title": 42 }).to_string()),
    ];
    for (method, uri, body) in cases {
        let response = app(&ctx)
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("x-user-id", admin.id.to_string())
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{method} {uri}");
        let body: Value = body_json(response).await;
        assert!(body["error"].is_string(), "{method} {uri}: {body}");
    }

    let response = app(&ctx)
        .oneshot(
            Request::get("/admin/posts/abc")
                .header("x-user-id", admin.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = body_json(response).await;
    assert!(body["error"].is_string());

    let response = app(&ctx)
        .oneshot(
            Request::post("/admin/posts")
                .header("x-user-id", admin.id.to_string())
                .body(Body::from(json!({ "title": "No header" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: Value = body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let ctx = test_context().await;
    let response = app(&ctx)
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc: Value = body_json(response).await;
    for path in ["/posts", "/admin/media", "/admin/settings/{key}", "/site"] {
        assert!(doc["paths"].get(path).is_some(), "{path} missing");
    }
}

// --- Live server ---

#[tokio::test]
async fn test_live_server_round_trip() {
    let ctx = test_context().await;
    let admin = create_user(&ctx.repo, "head@school.example", "admin").await;
    let token = auth::issue_token(&ctx.state.config, &admin).unwrap();
    let router = app(&ctx);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let address = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = reqwest::Client::new();
    let response = client
        .put(format!("{address}/admin/settings/site_title"))
        .bearer_auth(&token)
        .json(&json!("St Mary's Primary"))
        .send()
        .await
        .expect("request failed");
    assert_eq!(response.status(), 201);

    let response = client
        .get(format!("{address}/settings/site_title"))
        .send()
        .await
        .expect("request failed");
    assert!(response.status().is_success());
    let setting: Value = response.json().await.unwrap();
    assert_eq!(setting["value"], "St Mary's Primary");
}
