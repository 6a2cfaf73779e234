//! API integration tests
//!
//! These run against a live server backed by PostgreSQL.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::task::JoinSet;
use uuid::Uuid;

const BASE_URL: &str = "http://localhost:8080";

/// Register a fresh user and log it in, returning (uid, token)
async fn register_and_login(client: &Client, role: &str) -> (String, String) {
    let username = format!("it-{}", Uuid::new_v4().simple());

    let response = client
        .post(format!("{}/user", BASE_URL))
        .json(&json!({
            "username": username,
            "password": "testpass",
            "role": role
        }))
        .send()
        .await
        .expect("Failed to send register request");
    assert_eq!(response.status(), 201);

    let response = client
        .post(format!("{}/login", BASE_URL))
        .json(&json!({
            "username": username,
            "password": "testpass"
        }))
        .send()
        .await
        .expect("Failed to send login request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse login response");
    (
        body["user"]["uid"].as_str().expect("No uid in response").to_string(),
        body["token"].as_str().expect("No token in response").to_string(),
    )
}

async fn delete_user(client: &Client, uid: &str, token: &str) {
    let _ = client
        .delete(format!("{}/user/{}", BASE_URL, uid))
        .bearer_auth(token)
        .send()
        .await;
}

/// Create a book with `inventory` copies, returning its ISBN
async fn create_book(client: &Client, token: &str, inventory: i32) -> String {
    let isbn = format!("it-{}", &Uuid::new_v4().simple().to_string()[..12]);

    let response = client
        .post(format!("{}/book", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "isbn": isbn,
            "title": "Test Book",
            "author": "Test Author",
            "inventory": inventory
        }))
        .send()
        .await
        .expect("Failed to send create book request");
    assert_eq!(response.status(), 201);

    isbn
}

async fn get_book(client: &Client, isbn: &str) -> Value {
    client
        .get(format!("{}/book/{}", BASE_URL, isbn))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse book")
}

async fn delete_book(client: &Client, isbn: &str, token: &str) {
    let _ = client
        .delete(format!("{}/book/{}", BASE_URL, isbn))
        .bearer_auth(token)
        .send()
        .await;
}

async fn post_status(client: &Client, path: String, token: &str) -> StatusCode {
    client
        .post(format!("{}{}", BASE_URL, path))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to send request")
        .status()
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/login", BASE_URL))
        .json(&json!({
            "username": "nobody-by-that-name",
            "password": "wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_register_rejects_unknown_role() {
    let client = Client::new();

    let response = client
        .post(format!("{}/user", BASE_URL))
        .json(&json!({
            "username": "someone",
            "password": "testpass",
            "role": "ADMIN"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_list_books_is_public() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body.is_array());
}

#[tokio::test]
#[ignore]
async fn test_checkout_return_cycle() {
    let client = Client::new();
    let (librarian_uid, librarian) = register_and_login(&client, "LIBRARIAN").await;
    let (reader_uid, reader) = register_and_login(&client, "USER").await;
    let (other_uid, other) = register_and_login(&client, "USER").await;
    let isbn = format!("it-{}", &Uuid::new_v4().simple().to_string()[..12]);

    // Create a book with a single copy
    let response = client
        .post(format!("{}/book", BASE_URL))
        .bearer_auth(&librarian)
        .json(&json!({
            "isbn": isbn,
            "title": "Test Book",
            "author": "Test Author",
            "inventory": 1
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    // Checkout takes the last copy
    let response = client
        .post(format!("{}/checkout/{}", BASE_URL, isbn))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["inventory"], 0);
    assert_eq!(body["states"][0]["checkedOut"], true);
    assert_eq!(body["states"][0]["user"], reader_uid.as_str());

    // Nothing left for anyone else
    let response = client
        .post(format!("{}/checkout/{}", BASE_URL, isbn))
        .bearer_auth(&other)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    // Only the holder can return it
    let response = client
        .post(format!("{}/return/{}", BASE_URL, isbn))
        .bearer_auth(&other)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    let response = client
        .get(format!("{}/user/{}/checkouts", BASE_URL, reader_uid))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to send request");
    let held: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(held.as_array().map(Vec::len), Some(1));

    let response = client
        .post(format!("{}/return/{}", BASE_URL, isbn))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["inventory"], 1);
    assert_eq!(body["states"][0]["returned"], true);
    assert!(body["states"][0]["returnDate"].is_string());

    // Cleanup
    let response = client
        .delete(format!("{}/book/{}", BASE_URL, isbn))
        .bearer_auth(&librarian)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 204);

    delete_user(&client, &reader_uid, &reader).await;
    delete_user(&client, &other_uid, &other).await;
    delete_user(&client, &librarian_uid, &librarian).await;
}

#[tokio::test]
#[ignore]
async fn test_update_self_only() {
    let client = Client::new();
    let (uid, token) = register_and_login(&client, "USER").await;
    let (other_uid, other) = register_and_login(&client, "USER").await;

    let response = client
        .patch(format!("{}/user/{}", BASE_URL, other_uid))
        .bearer_auth(&token)
        .json(&json!({ "username": "hijacked" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 403);

    let new_name = format!("it-{}", Uuid::new_v4().simple());
    let response = client
        .patch(format!("{}/user", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "username": new_name, "password": "" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["username"], new_name.as_str());
    assert!(body.get("password").is_none());

    delete_user(&client, &uid, &token).await;
    delete_user(&client, &other_uid, &other).await;
}

#[tokio::test]
#[ignore]
async fn test_deleted_account_token_is_rejected() {
    let client = Client::new();
    let (uid, token) = register_and_login(&client, "LIBRARIAN").await;

    let response = client
        .delete(format!("{}/user/{}", BASE_URL, uid))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 204);

    let response = client
        .post(format!("{}/book", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "isbn": "it-ghost", "title": "Ghost", "inventory": 1 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 401);

    let response = client
        .get(format!("{}/users", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_demoted_librarian_loses_catalog_rights() {
    let client = Client::new();
    let (uid, token) = register_and_login(&client, "LIBRARIAN").await;

    let response = client
        .patch(format!("{}/user", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "role": "USER" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);

    let response = client
        .post(format!("{}/book", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "isbn": "it-demoted", "title": "Ghost", "inventory": 1 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 403);

    let response = client
        .get(format!("{}/users", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 403);

    delete_user(&client, &uid, &token).await;
}

#[tokio::test]
#[ignore]
async fn test_concurrent_checkouts_respect_inventory() {
    const COPIES: usize = 3;
    const ATTEMPTS: usize = 12;

    let client = Client::new();
    let (librarian_uid, librarian) = register_and_login(&client, "LIBRARIAN").await;
    let (reader_uid, reader) = register_and_login(&client, "USER").await;
    let isbn = create_book(&client, &librarian, COPIES as i32).await;

    let mut attempts = JoinSet::new();
    for _ in 0..ATTEMPTS {
        let (client, isbn, reader) = (client.clone(), isbn.clone(), reader.clone());
        attempts.spawn(async move { post_status(&client, format!("/checkout/{}", isbn), &reader).await });
    }

    let mut statuses = Vec::with_capacity(ATTEMPTS);
    while let Some(status) = attempts.join_next().await {
        statuses.push(status.expect("Checkout task panicked"));
    }

    let lent = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    let refused = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();
    assert_eq!(lent, COPIES);
    assert_eq!(refused, ATTEMPTS - COPIES);

    let book = get_book(&client, &isbn).await;
    assert_eq!(book["inventory"], 0);
    let states = book["states"].as_array().expect("No states");
    assert_eq!(states.len(), COPIES);
    assert!(states.iter().all(|e| e["checkedOut"] == true));

    for _ in 0..COPIES {
        assert_eq!(
            post_status(&client, format!("/return/{}", isbn), &reader).await,
            StatusCode::OK
        );
    }
    assert_eq!(get_book(&client, &isbn).await["inventory"], COPIES as i64);

    delete_book(&client, &isbn, &librarian).await;
    delete_user(&client, &reader_uid, &reader).await;
    delete_user(&client, &librarian_uid, &librarian).await;
}

#[tokio::test]
#[ignore]
async fn test_delete_refused_while_holding_a_copy() {
    let client = Client::new();
    let (librarian_uid, librarian) = register_and_login(&client, "LIBRARIAN").await;
    let (reader_uid, reader) = register_and_login(&client, "USER").await;
    let isbn = create_book(&client, &librarian, 1).await;

    assert_eq!(
        post_status(&client, format!("/checkout/{}", isbn), &reader).await,
        StatusCode::OK
    );

    let response = client
        .delete(format!("{}/user/{}", BASE_URL, reader_uid))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    assert_eq!(
        post_status(&client, format!("/return/{}", isbn), &reader).await,
        StatusCode::OK
    );

    let response = client
        .delete(format!("{}/user/{}", BASE_URL, reader_uid))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 204);

    // History survives with the borrower cleared
    let book = get_book(&client, &isbn).await;
    assert_eq!(book["states"][0]["returned"], true);
    assert!(book["states"][0]["user"].is_null());

    delete_book(&client, &isbn, &librarian).await;
    delete_user(&client, &librarian_uid, &librarian).await;
}

#[tokio::test]
#[ignore]
async fn test_delete_racing_checkout_never_strands_a_copy() {
    let client = Client::new();
    let (librarian_uid, librarian) = register_and_login(&client, "LIBRARIAN").await;
    let isbn = create_book(&client, &librarian, 1).await;

    for _ in 0..10 {
        let (reader_uid, reader) = register_and_login(&client, "USER").await;

        let checkout = {
            let (client, isbn, reader) = (client.clone(), isbn.clone(), reader.clone());
            tokio::spawn(async move { post_status(&client, format!("/checkout/{}", isbn), &reader).await })
        };
        let delete = {
            let (client, uid, reader) = (client.clone(), reader_uid.clone(), reader.clone());
            tokio::spawn(async move {
                client
                    .delete(format!("{}/user/{}", BASE_URL, uid))
                    .bearer_auth(&reader)
                    .send()
                    .await
                    .expect("Failed to send request")
                    .status()
            })
        };
        let checkout = checkout.await.expect("Checkout task panicked");
        let delete = delete.await.expect("Delete task panicked");

        if checkout == StatusCode::OK {
            // the hold landed first, so the account must survive
            assert_eq!(delete, StatusCode::CONFLICT);
            assert_eq!(
                post_status(&client, format!("/return/{}", isbn), &reader).await,
                StatusCode::OK
            );
            delete_user(&client, &reader_uid, &reader).await;
        } else {
            assert_eq!(delete, StatusCode::NO_CONTENT);
            assert_eq!(checkout, StatusCode::UNAUTHORIZED);
        }

        let book = get_book(&client, &isbn).await;
        assert_eq!(book["inventory"], 1);
        let states = book["states"].as_array().expect("No states");
        assert!(states.iter().all(|e| e["returned"] == true));
    }

    delete_book(&client, &isbn, &librarian).await;
    delete_user(&client, &librarian_uid, &librarian).await;
}
