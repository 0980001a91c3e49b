use actix_web::http::{StatusCode, header};
use actix_web::{App, test, web};
use serde_json::{Value, json};

use quill_core::domain::{Comment, User};
use quill_core::ports::BaseRepository;
use quill_infra::JwtConfig;

use super::configure_routes;
use crate::state::AppState;

const CONTENT: &str = "This body is comfortably longer than twenty characters.";

fn test_state() -> AppState {
    AppState::in_memory(
        JwtConfig {
            secret: "handler-test-secret".to_string(),
            expiration_hours: 1,
            issuer: "quill-test".to_string(),
        },
        None,
    )
}

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(configure_routes),
        )
        .await
    };
}

/// Store a user directly and hand back an access token for it.
async fn seed_user(state: &AppState, username: &str, staff: bool) -> (User, String) {
    let mut user = User::new(
        username.to_string(),
        format!("{username}@example.com"),
        "not-a-real-hash".to_string(),
    );
    user.is_staff = staff;
    let user = state.users.save(user).await.unwrap();
    let token = state
        .tokens
        .generate_token(user.id, &user.username, user.roles())
        .unwrap();
    (user, token)
}

fn auth(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

fn new_post(token: &str, title: &str, status: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/posts")
        .insert_header(auth(token))
        .set_json(json!({ "title": title, "content": CONTENT, "status": status }))
}

/// Path of a post's detail route, taken from its canonical `url`.
fn detail_uri(post: &Value) -> String {
    post["url"].as_str().unwrap().to_string()
}

#[actix_rt::test]
async fn test_health_reports_storage() {
    let state = test_state();
    let app = init_app!(state);

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "memory");
}

#[actix_rt::test]
async fn test_signup_login_and_me() {
    let state = test_state();
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/signup")
        .set_json(json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "correct-horse",
            "password_confirm": "correct-horse",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let token = body["data"]["access_token"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["token_type"], "Bearer");

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(auth(&token))
        .to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["username"], "alice");
    assert_eq!(me["roles"], json!(["user"]));

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "username": "alice", "password": "wrong-password" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "username": "alice", "password": "correct-horse" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[actix_rt::test]
async fn test_signup_rejects_invalid_and_duplicate_accounts() {
    let state = test_state();
    let app = init_app!(state);
    seed_user(&state, "taken", false).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/signup")
        .set_json(json!({
            "username": "bob",
            "email": "not-an-email",
            "password": "12345678",
            "password_confirm": "87654321",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["email"].is_array());
    assert!(body["errors"]["password"].is_array());
    assert!(body["errors"]["password_confirm"].is_array());

    let req = test::TestRequest::post()
        .uri("/api/auth/signup")
        .set_json(json!({
            "username": "taken",
            "email": "fresh@example.com",
            "password": "correct-horse",
            "password_confirm": "correct-horse",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_rt::test]
async fn test_protected_routes_require_token() {
    let state = test_state();
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/posts")
        .set_json(json!({ "title": "Hello world", "content": CONTENT }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let req = test::TestRequest::get()
        .uri("/api/profile")
        .insert_header(auth("garbage"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[actix_rt::test]
async fn test_post_form_minimum_lengths() {
    let state = test_state();
    let app = init_app!(state);
    let (_, token) = seed_user(&state, "alice", false).await;

    let req = test::TestRequest::post()
        .uri("/api/posts")
        .insert_header(auth(&token))
        .set_json(json!({ "title": "Hey", "content": "too short" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["errors"]["title"][0],
        "Title must be at least 5 characters long."
    );
    assert_eq!(
        body["errors"]["content"][0],
        "Content must be at least 20 characters long."
    );
}

#[actix_rt::test]
async fn test_whitespace_padding_is_not_content() {
    let state = test_state();
    let app = init_app!(state);
    let (_, token) = seed_user(&state, "alice", false).await;

    let req = test::TestRequest::post()
        .uri("/api/posts")
        .insert_header(auth(&token))
        .set_json(json!({ "title": "   ab   ", "content": format!("{}x", " ".repeat(25)) }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["title"].is_array());
    assert!(body["errors"]["content"].is_array());

    let req = new_post(&token, "  Padded title  ", "published").to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(created["data"]["title"], "Padded title");

    let req = test::TestRequest::post()
        .uri(&format!("{}/comments", detail_uri(&created["data"])))
        .set_json(json!({ "text": "      " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["errors"]["text"][0],
        "Comment must be at least 5 characters long."
    );
}

#[actix_rt::test]
async fn test_create_derives_unique_slugs() {
    let state = test_state();
    let app = init_app!(state);
    let (_, token) = seed_user(&state, "alice", false).await;

    let req = new_post(&token, "My First Post!", "published").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let first: Value = test::read_body_json(resp).await;
    assert_eq!(first["data"]["slug"], "my-first-post");
    assert_eq!(first["message"], "Your post has been created successfully!");

    let req = new_post(&token, "My First Post!", "published").to_request();
    let second: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(second["data"]["slug"], "my-first-post-2");

    // The canonical url resolves to the detail view
    let req = test::TestRequest::get()
        .uri(&detail_uri(&first["data"]))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["post"]["id"], first["data"]["id"]);
}

#[actix_rt::test]
async fn test_drafts_stay_private() {
    let state = test_state();
    let app = init_app!(state);
    let (_, token) = seed_user(&state, "alice", false).await;

    let req = new_post(&token, "Unfinished thoughts", "draft").to_request();
    let draft: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::get().uri("/api/posts").to_request();
    let listing: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listing["total_items"], 0);
    assert_eq!(listing["items"], json!([]));

    let req = test::TestRequest::get()
        .uri(&detail_uri(&draft["data"]))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );

    let req = test::TestRequest::get()
        .uri("/api/posts/mine")
        .insert_header(auth(&token))
        .to_request();
    let mine: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(mine["total_items"], 1);
    assert_eq!(mine["items"][0]["status"], "draft");
}

#[actix_rt::test]
async fn test_search_filters_listing() {
    let state = test_state();
    let app = init_app!(state);
    let (_, token) = seed_user(&state, "alice", false).await;

    for title in ["Rust ownership basics", "Baking sourdough bread"] {
        let req = new_post(&token, title, "published").to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::get()
        .uri("/api/posts?search=SOURDOUGH")
        .to_request();
    let found: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(found["total_items"], 1);
    assert_eq!(found["items"][0]["title"], "Baking sourdough bread");
    assert_eq!(found["search"], "SOURDOUGH");

    let req = test::TestRequest::get()
        .uri("/api/posts?search=quantum")
        .to_request();
    let none: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(none["items"], json!([]));
}

#[actix_rt::test]
async fn test_listing_page_parameter() {
    let state = test_state();
    let app = init_app!(state);
    let (_, token) = seed_user(&state, "alice", false).await;

    for i in 0..7 {
        let req = new_post(&token, &format!("Numbered post {i}"), "published").to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::get()
        .uri("/api/posts?page=abc")
        .to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(first["page"], 1);
    assert_eq!(first["items"].as_array().unwrap().len(), 5);
    assert_eq!(first["has_next"], true);

    let req = test::TestRequest::get().uri("/api/posts?page=99").to_request();
    let last: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(last["page"], 2);
    assert_eq!(last["items"].as_array().unwrap().len(), 2);
    assert_eq!(last["has_previous"], true);

    for out_of_range in ["0", "-3"] {
        let req = test::TestRequest::get()
            .uri(&format!("/api/posts/mine?page={out_of_range}"))
            .insert_header(auth(&token))
            .to_request();
        let mine: Value = test::call_and_read_body_json(&app, req).await;
        // Ten per page on the author's own listing
        assert_eq!(mine["page"], 1);
        assert_eq!(mine["total_pages"], 1);

        let req = test::TestRequest::get()
            .uri(&format!("/api/posts?page={out_of_range}"))
            .to_request();
        let listing: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listing["page"], 2);
    }
}

#[actix_rt::test]
async fn test_only_author_may_edit_or_delete() {
    let state = test_state();
    let app = init_app!(state);
    let (_, alice) = seed_user(&state, "alice", false).await;
    let (_, mallory) = seed_user(&state, "mallory", false).await;

    let req = new_post(&alice, "Alice writes here", "published").to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("/api/posts/{id}"))
        .insert_header(auth(&mallory))
        .set_json(json!({ "title": "Defaced title", "content": CONTENT }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = test::TestRequest::delete()
        .uri(&format!("/api/posts/{id}"))
        .insert_header(auth(&mallory))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    // Untouched
    let post_id = uuid::Uuid::parse_str(&id).unwrap();
    let stored = state.posts.find_by_id(post_id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Alice writes here");

    let req = test::TestRequest::put()
        .uri(&format!("/api/posts/{id}"))
        .insert_header(auth(&alice))
        .set_json(json!({ "title": "Alice rewrites here", "content": CONTENT }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["data"]["title"], "Alice rewrites here");
    assert_eq!(updated["data"]["slug"], "alice-writes-here");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/posts/{id}"))
        .insert_header(auth(&alice))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert!(state.posts.find_by_id(post_id).await.unwrap().is_none());
}

#[actix_rt::test]
async fn test_comments_submission_and_visibility() {
    let state = test_state();
    let app = init_app!(state);
    let (_, alice) = seed_user(&state, "alice", false).await;
    let (_, bob) = seed_user(&state, "bob", false).await;

    let req = new_post(&alice, "Open for comments", "published").to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let comments_uri = format!("{}/comments", detail_uri(&created["data"]));

    let req = test::TestRequest::post()
        .uri(&comments_uri)
        .set_json(json!({ "text": "Hi" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["errors"]["text"][0],
        "Comment must be at least 5 characters long."
    );

    let req = test::TestRequest::post()
        .uri(&comments_uri)
        .set_json(json!({ "text": "Lovely read!", "guest_name": "Gus", "guest_email": "" }))
        .to_request();
    let guest: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(guest["data"]["author_name"], "Gus");

    // Guest fields are ignored for signed-in commenters
    let req = test::TestRequest::post()
        .uri(&comments_uri)
        .insert_header(auth(&bob))
        .set_json(json!({ "text": "Agreed with Gus", "guest_name": "Impostor" }))
        .to_request();
    let member: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(member["data"]["author_name"], "bob");

    // A hidden comment never shows on the detail page
    let post_id = uuid::Uuid::parse_str(created["data"]["id"].as_str().unwrap()).unwrap();
    let mut hidden = Comment::by_guest(post_id, Some("Spam".into()), None, "Buy cheap stuff".into());
    hidden.active = false;
    state.comments.save(hidden).await.unwrap();

    let req = test::TestRequest::get()
        .uri(&detail_uri(&created["data"]))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    let names: Vec<&str> = detail["comments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["author_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Gus", "bob"]);
}

#[actix_rt::test]
async fn test_comment_on_unknown_post_is_not_found() {
    let state = test_state();
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/posts/2025/1/1/nothing-here/comments")
        .set_json(json!({ "text": "Is anyone there?" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_rt::test]
async fn test_moderation_requires_staff() {
    let state = test_state();
    let app = init_app!(state);
    let (author, alice) = seed_user(&state, "alice", false).await;
    let (_, staff) = seed_user(&state, "editor", true).await;

    let req = new_post(&alice, "Moderated thread", "published").to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let post_id = uuid::Uuid::parse_str(created["data"]["id"].as_str().unwrap()).unwrap();

    let comment = state
        .comments
        .save(Comment::by_user(post_id, author.id, "Needs review".into()))
        .await
        .unwrap();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/comments/{}", comment.id))
        .insert_header(auth(&alice))
        .set_json(json!({ "active": false }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );
    assert!(state.comments.find_by_id(comment.id).await.unwrap().unwrap().active);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/comments/{}", comment.id))
        .insert_header(auth(&staff))
        .set_json(json!({ "active": false }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["updated"], 1);
    assert!(!state.comments.find_by_id(comment.id).await.unwrap().unwrap().active);

    let req = test::TestRequest::post()
        .uri("/api/comments/approve")
        .insert_header(auth(&staff))
        .set_json(json!({ "ids": [comment.id] }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["updated"], 1);
    assert!(state.comments.find_by_id(comment.id).await.unwrap().unwrap().active);
}

#[actix_rt::test]
async fn test_profile_created_once_and_updated() {
    let state = test_state();
    let app = init_app!(state);
    let (user, token) = seed_user(&state, "alice", false).await;

    let req = test::TestRequest::get()
        .uri("/api/profile")
        .insert_header(auth(&token))
        .to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(first["user"]["username"], "alice");
    assert_eq!(first["bio"], "");

    let req = test::TestRequest::get()
        .uri("/api/profile")
        .insert_header(auth(&token))
        .to_request();
    test::call_service(&app, req).await;
    let profile = state.profiles.find_by_user_id(user.id).await.unwrap().unwrap();

    let req = test::TestRequest::put()
        .uri("/api/profile")
        .insert_header(auth(&token))
        .set_json(json!({
            "first_name": "Alice",
            "last_name": "Liddell",
            "email": "alice@wonderland.test",
            "bio": "Curiouser and curiouser.",
            "avatar_url": "https://example.com/alice.png",
        }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["data"]["user"]["email"], "alice@wonderland.test");
    assert_eq!(updated["data"]["avatar_url"], "https://example.com/alice.png");

    let stored = state.profiles.find_by_user_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.id, profile.id);
    assert_eq!(stored.bio, "Curiouser and curiouser.");
}

#[actix_rt::test]
async fn test_profile_rejects_taken_email() {
    let state = test_state();
    let app = init_app!(state);
    let (_, token) = seed_user(&state, "alice", false).await;
    seed_user(&state, "bob", false).await;

    let req = test::TestRequest::put()
        .uri("/api/profile")
        .insert_header(auth(&token))
        .set_json(json!({ "email": "bob@example.com" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::CONFLICT
    );
}

#[cfg(feature = "rate-limit")]
#[actix_rt::test]
async fn test_comment_rate_limit() {
    use std::sync::Arc;
    use std::time::Duration;

    use quill_infra::{InMemoryRateLimiter, RateLimitConfig};

    let limiter = InMemoryRateLimiter::new(RateLimitConfig {
        max_requests: 1,
        window: Duration::from_secs(60),
    })
    .unwrap();
    let state = AppState {
        comment_limiter: Some(Arc::new(limiter)),
        ..test_state()
    };
    let app = init_app!(state);
    let (_, token) = seed_user(&state, "alice", false).await;

    let req = new_post(&token, "Popular post", "published").to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let comments_uri = format!("{}/comments", detail_uri(&created["data"]));

    let comment = || {
        test::TestRequest::post()
            .uri(&comments_uri)
            .peer_addr("203.0.113.7:40000".parse().unwrap())
            .set_json(json!({ "text": "First!!" }))
            .to_request()
    };

    assert_eq!(
        test::call_service(&app, comment()).await.status(),
        StatusCode::CREATED
    );

    let resp = test::call_service(&app, comment()).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.headers().contains_key(header::RETRY_AFTER));

    // A new port or a forged forwarding header is still the same client
    let req = test::TestRequest::post()
        .uri(&comments_uri)
        .peer_addr("203.0.113.7:40001".parse().unwrap())
        .insert_header(("X-Forwarded-For", "198.51.100.99"))
        .set_json(json!({ "text": "Second!!" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[cfg(feature = "rate-limit")]
#[actix_rt::test]
async fn test_comment_rate_limit_behind_trusted_proxy() {
    use std::sync::Arc;
    use std::time::Duration;

    use quill_infra::{InMemoryRateLimiter, RateLimitConfig};

    let limiter = InMemoryRateLimiter::new(RateLimitConfig {
        max_requests: 1,
        window: Duration::from_secs(60),
    })
    .unwrap();
    let state = AppState {
        comment_limiter: Some(Arc::new(limiter)),
        trust_proxy_headers: true,
        ..test_state()
    };
    let app = init_app!(state);
    let (_, token) = seed_user(&state, "alice", false).await;

    let req = new_post(&token, "Proxied post", "published").to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let comments_uri = format!("{}/comments", detail_uri(&created["data"]));

    // Every request arrives from the proxy's address
    let comment = |client: &str| {
        test::TestRequest::post()
            .uri(&comments_uri)
            .peer_addr("10.0.0.2:8000".parse().unwrap())
            .insert_header(("X-Forwarded-For", client.to_string()))
            .set_json(json!({ "text": "Via the proxy" }))
            .to_request()
    };

    assert_eq!(
        test::call_service(&app, comment("198.51.100.1")).await.status(),
        StatusCode::CREATED
    );
    assert_eq!(
        test::call_service(&app, comment("198.51.100.2")).await.status(),
        StatusCode::CREATED
    );
    assert_eq!(
        test::call_service(&app, comment("198.51.100.1")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}
