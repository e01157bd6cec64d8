mod common;

use common::{register_confirmed, spawn_server};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn registration_confirmation_and_token_flow() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    // Register: created unconfirmed.
    let created: Value = client
        .post(format!("{}/account/register", server.base_url))
        .json(&json!({"email": "john@example.com", "username": "john", "password": "cat"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["username"], "john");
    assert_eq!(created["confirmed"], false);

    // Valid credentials, but the content API refuses unconfirmed accounts.
    let resp = client
        .get(format!("{}/posts", server.base_url))
        .basic_auth("john@example.com", Some("cat"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Unconfirmed account");

    // Confirm with the mailed token.
    let token = server.token_from_mail("john@example.com").await;
    let resp = client
        .post(format!("{}/account/confirm", server.base_url))
        .basic_auth("john@example.com", Some("cat"))
        .json(&json!({"token": token}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Password auth now reaches the content API.
    let resp = client
        .get(format!("{}/posts", server.base_url))
        .basic_auth("john@example.com", Some("cat"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Issue an API token and use it as the Basic username.
    let issued: Value = client
        .get(format!("{}/token", server.base_url))
        .basic_auth("john@example.com", Some("cat"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let api_token = issued["token"].as_str().unwrap().to_string();
    assert_eq!(issued["expiration"], 3600);

    let resp = client
        .get(format!("{}/posts", server.base_url))
        .basic_auth(&api_token, Some(""))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // No token chaining: a token-authenticated caller cannot mint another.
    let resp = client
        .get(format!("{}/token", server.base_url))
        .basic_auth(&api_token, Some(""))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn anonymous_reads_but_cannot_write() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/posts", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(format!("{}/posts", server.base_url))
        .json(&json!({"body": "anonymous graffiti"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = client
        .get(format!("{}/token", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_credentials_collapse_to_one_401() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    register_confirmed(&server, &client, "john@example.com", "john", "cat").await;

    for (user, pass) in [
        ("john@example.com", "dog"),
        ("nobody@example.com", "cat"),
        ("not-a-real-token", ""),
    ] {
        let resp = client
            .get(format!("{}/posts", server.base_url))
            .basic_auth(user, Some(pass))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "for {user}:{pass}");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Invalid credentials");
    }
}

#[tokio::test]
async fn duplicate_registration_is_a_validation_error() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    register_confirmed(&server, &client, "john@example.com", "john", "cat").await;

    let resp = client
        .post(format!("{}/account/register", server.base_url))
        .json(&json!({"email": "john@example.com", "username": "john2", "password": "cat"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "bad request");
    assert!(body["message"].as_str().unwrap().contains("email"));
}

#[tokio::test]
async fn post_lifecycle_with_sanitized_markdown() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let author = register_confirmed(&server, &client, "john@example.com", "john", "cat").await;

    let post: Value = client
        .post(format!("{}/posts", server.base_url))
        .basic_auth("john@example.com", Some("cat"))
        .json(&json!({"body": "<script>x</script>hello http://a.com"}))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap();
    let html = post["body_html"].as_str().unwrap();
    assert!(!html.contains("script"));
    assert!(html.contains("hello"));
    assert!(html.contains("<a href=\"http://a.com\""));
    assert_eq!(post["author_id"].as_str().unwrap(), author.to_string());

    // Editing re-derives the HTML.
    let post_id = post["id"].as_str().unwrap();
    let edited: Value = client
        .put(format!("{}/posts/{}", server.base_url, post_id))
        .basic_auth("john@example.com", Some("cat"))
        .json(&json!({"body": "# Heading"}))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(edited["body_html"].as_str().unwrap().contains("<h1>Heading</h1>"));

    // A different author cannot edit it.
    register_confirmed(&server, &client, "susan@example.org", "susan", "dog").await;
    let resp = client
        .put(format!("{}/posts/{}", server.base_url, post_id))
        .basic_auth("susan@example.org", Some("dog"))
        .json(&json!({"body": "hijacked"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // An empty body is a validation error.
    let resp = client
        .post(format!("{}/posts", server.base_url))
        .basic_auth("john@example.com", Some("cat"))
        .json(&json!({"body": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn follow_graph_and_personalized_feed() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let john = register_confirmed(&server, &client, "john@example.com", "john", "cat").await;
    let susan = register_confirmed(&server, &client, "susan@example.org", "susan", "dog").await;

    for (auth, body) in [
        (("john@example.com", "cat"), "john writes"),
        (("susan@example.org", "dog"), "susan writes"),
    ] {
        client
            .post(format!("{}/posts", server.base_url))
            .basic_auth(auth.0, Some(auth.1))
            .json(&json!({"body": body}))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap();
    }

    // Before following: john's feed only has his own post (self-edge).
    let feed: Value = client
        .get(format!("{}/posts?feed=followed", server.base_url))
        .basic_auth("john@example.com", Some("cat"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feed["total"], 1);

    client
        .post(format!("{}/users/{}/follow", server.base_url, susan))
        .basic_auth("john@example.com", Some("cat"))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();

    let feed: Value = client
        .get(format!("{}/posts?feed=followed", server.base_url))
        .basic_auth("john@example.com", Some("cat"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feed["total"], 2);

    // Susan's follower listing shows john (reflexive edge excluded).
    let followers: Value = client
        .get(format!("{}/users/{}/followers", server.base_url, susan))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(followers["total"], 1);
    assert_eq!(followers["items"][0]["username"], "john");

    client
        .delete(format!("{}/users/{}/follow", server.base_url, susan))
        .basic_auth("john@example.com", Some("cat"))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();

    let feed: Value = client
        .get(format!("{}/posts?feed=followed", server.base_url))
        .basic_auth("john@example.com", Some("cat"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feed["total"], 1);

    // User profile exposes counts.
    let profile: Value = client
        .get(format!("{}/users/{}", server.base_url, john))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile["username"], "john");
    assert_eq!(profile["post_count"], 1);
}

#[tokio::test]
async fn comment_moderation_requires_the_capability() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    register_confirmed(&server, &client, "john@example.com", "john", "cat").await;
    // The configured admin address gets the all-capabilities role.
    register_confirmed(&server, &client, "admin@example.com", "admin", "boss").await;

    let post: Value = client
        .post(format!("{}/posts", server.base_url))
        .basic_auth("john@example.com", Some("cat"))
        .json(&json!({"body": "a post"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let post_id = post["id"].as_str().unwrap();

    let comment: Value = client
        .post(format!("{}/posts/{}/comments", server.base_url, post_id))
        .basic_auth("john@example.com", Some("cat"))
        .json(&json!({"body": "nice one"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let comment_id = comment["id"].as_str().unwrap();
    assert_eq!(comment["disabled"], false);

    // A regular user cannot moderate.
    let resp = client
        .patch(format!("{}/comments/{}/moderate", server.base_url, comment_id))
        .basic_auth("john@example.com", Some("cat"))
        .json(&json!({"disabled": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // The administrator can.
    let moderated: Value = client
        .patch(format!("{}/comments/{}/moderate", server.base_url, comment_id))
        .basic_auth("admin@example.com", Some("boss"))
        .json(&json!({"disabled": true}))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(moderated["disabled"], true);

    // The comment is hidden, not deleted.
    let fetched: Value = client
        .get(format!("{}/comments/{}", server.base_url, comment_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["disabled"], true);
    assert_eq!(fetched["body"], "nice one");
}

#[tokio::test]
async fn password_reset_and_email_change_flows() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    register_confirmed(&server, &client, "john@example.com", "john", "cat").await;

    // Forgot password: token arrives by mail, old password stops working.
    client
        .post(format!("{}/account/reset", server.base_url))
        .json(&json!({"email": "john@example.com"}))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();
    let token = server.token_from_mail("john@example.com").await;
    client
        .post(format!("{}/account/reset/apply", server.base_url))
        .json(&json!({"token": token, "new_password": "horse"}))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();

    let resp = client
        .get(format!("{}/posts", server.base_url))
        .basic_auth("john@example.com", Some("cat"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Email change: token goes to the new address.
    client
        .post(format!("{}/account/change_email", server.base_url))
        .basic_auth("john@example.com", Some("horse"))
        .json(&json!({"new_email": "john2@example.org", "password": "horse"}))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();
    let token = server.token_from_mail("john2@example.org").await;
    client
        .post(format!("{}/account/change_email/apply", server.base_url))
        .basic_auth("john@example.com", Some("horse"))
        .json(&json!({"token": token}))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();

    // The new address logs in; the old one does not.
    let resp = client
        .get(format!("{}/posts", server.base_url))
        .basic_auth("john2@example.org", Some("horse"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = client
        .get(format!("{}/posts", server.base_url))
        .basic_auth("john@example.com", Some("horse"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // A stale reset token no longer verifies as anything else.
    let resp = client
        .post(format!("{}/account/change_email/apply", server.base_url))
        .basic_auth("john2@example.org", Some("horse"))
        .json(&json!({"token": "garbage"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_resources_are_404() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let ghost = uuid::Uuid::new_v4();
    for path in [
        format!("/users/{ghost}"),
        format!("/posts/{ghost}"),
        format!("/comments/{ghost}"),
    ] {
        let resp = client
            .get(format!("{}{}", server.base_url, path))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "for {path}");
    }
}
