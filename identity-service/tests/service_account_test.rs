mod common;

use axum::http::StatusCode;
use common::{TestApp, ADMIN_TOKEN, READER_TOKEN, WRITER_TOKEN};
use identity_service::store::ServiceAccountStore;
use rest_core::Permission;
use serde_json::json;

#[tokio::test]
async fn test_create_and_fetch_service_account() {
    let app = TestApp::spawn().await;

    let response = app
        .request(
            "POST",
            "/serviceaccount",
            Some(WRITER_TOKEN),
            Some(json!({
                "label": "ingest",
                "description": "nightly ingest",
                "ipRestrictions": "10.0.0.0/8",
                "permissions": ["enabled", "read_content"],
                "token": "SA:chosen-by-client"
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let body = response.json();
    assert_eq!(body["label"], "ingest");
    assert_eq!(body["username"], "ingest");
    assert_eq!(body["token"], serde_json::Value::Null);
    assert_eq!(body["permissions"], json!(["enabled", "read_content"]));

    let response = app
        .request("GET", "/serviceaccount/ingest", Some(READER_TOKEN), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["description"], "nightly ingest");
    assert_eq!(response.json()["ipRestrictions"], "10.0.0.0/8");
}

#[tokio::test]
async fn test_create_rejects_reserved_and_duplicate_labels() {
    let app = TestApp::spawn().await;
    app.seed_service_account("ingest", None, Permission::ENABLED).await;

    let response = app
        .request(
            "POST",
            "/serviceaccount",
            Some(WRITER_TOKEN),
            Some(json!({"label": "__system"})),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["field"], "label");

    let response = app
        .request(
            "POST",
            "/serviceaccount",
            Some(WRITER_TOKEN),
            Some(json!({"label": "ingest"})),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "service account already exists");
}

#[tokio::test]
async fn test_create_requires_write_user() {
    let app = TestApp::spawn().await;

    let response = app
        .request(
            "POST",
            "/serviceaccount",
            Some(READER_TOKEN),
            Some(json!({"label": "ingest"})),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json()["permission"], "write_user");
    assert!(app.store.find_service_account("ingest").await.is_err());
}

#[tokio::test]
async fn test_anonymous_requests_are_forbidden() {
    let app = TestApp::spawn().await;
    app.seed_service_account("ingest", None, Permission::ENABLED).await;

    let response = app.request("GET", "/serviceaccount", None, None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json()["permission"], "read_user");

    let response = app.request("GET", "/serviceaccount/ingest", None, None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_account_is_not_found() {
    let app = TestApp::spawn().await;
    let response = app
        .request("GET", "/serviceaccount/ghost", Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_pages_filters_and_orders() {
    let app = TestApp::spawn().await;
    for label in ["alpha", "bravo", "charlie", "delta", "echo"] {
        app.seed_service_account(label, None, Permission::ENABLED).await;
    }
    app.seed_service_account("foxtrot", Some("SA:fox"), Permission::ENABLED | Permission::READ_USER)
        .await;

    let response = app
        .request("GET", "/serviceaccount?page=0&results=2", Some(READER_TOKEN), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    let labels: Vec<_> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["label"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(labels, ["alpha", "bravo"]);
    assert_eq!(body["hasMore"], true);

    let response = app
        .request("GET", "/serviceaccount?page=2&results=2", Some(READER_TOKEN), None)
        .await;
    let body = response.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["hasMore"], false);

    let response = app
        .request("GET", "/serviceaccount?order=-label&results=1", Some(READER_TOKEN), None)
        .await;
    assert_eq!(response.json()["items"][0]["label"], "foxtrot");

    let response = app
        .request("GET", "/serviceaccount?token=null", Some(READER_TOKEN), None)
        .await;
    assert_eq!(response.json()["items"].as_array().unwrap().len(), 5);

    let response = app
        .request("GET", "/serviceaccount?permission__gt=1", Some(READER_TOKEN), None)
        .await;
    let body = response.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["label"], "foxtrot");
}

#[tokio::test]
async fn test_list_rejects_bad_paging_and_unknown_fields() {
    let app = TestApp::spawn().await;

    let response = app
        .request("GET", "/serviceaccount?page=abc", Some(READER_TOKEN), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["field"], "page");

    let response = app
        .request("GET", "/serviceaccount?password=x", Some(READER_TOKEN), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["field"], "password");
}

#[tokio::test]
async fn test_csv_export_omits_tokens() {
    let app = TestApp::spawn().await;
    app.seed_service_account("alpha", Some("SA:secret-alpha"), Permission::ENABLED).await;
    app.seed_service_account("bravo", None, Permission::ENABLED).await;

    let response = app
        .request_with(
            "GET",
            "/serviceaccount?results=1",
            Some(READER_TOKEN),
            &[("accept", "text/csv")],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.header("content-type").unwrap().starts_with("text/csv"));
    assert!(response
        .header("content-disposition")
        .unwrap()
        .contains("serviceaccount.csv"));

    let text = response.text();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines[0], "label,description,ipRestrictions,permissions,created");
    // every match is exported regardless of the page size
    assert_eq!(lines.len(), 3);
    assert!(!text.contains("secret-alpha"));
}

#[tokio::test]
async fn test_update_replaces_fields_and_guards_permissions() {
    let app = TestApp::spawn().await;
    app.seed_service_account("ingest", Some("SA:ingest"), Permission::ENABLED).await;

    let response = app
        .request(
            "PUT",
            "/serviceaccount/ingest",
            Some(WRITER_TOKEN),
            Some(json!({"description": "nightly", "permissions": ["enabled"]})),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["description"], "nightly");
    assert_eq!(response.json()["token"], "SA:ingest");

    let escalate = json!({"description": "nightly", "permissions": ["enabled", "edit_permissions"]});
    let response = app
        .request("PUT", "/serviceaccount/ingest", Some(WRITER_TOKEN), Some(escalate.clone()))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json()["permission"], "edit_permissions");
    let stored = app.store.find_service_account("ingest").await.unwrap();
    assert_eq!(stored.permission, Permission::ENABLED);

    let response = app
        .request("PUT", "/serviceaccount/ingest", Some(ADMIN_TOKEN), Some(escalate))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["permissions"], json!(["enabled", "edit_permissions"]));
}

#[tokio::test]
async fn test_put_without_body_is_a_field_error() {
    let app = TestApp::spawn().await;
    app.seed_service_account("ingest", None, Permission::ENABLED).await;

    let response = app
        .request("PUT", "/serviceaccount/ingest", Some(WRITER_TOKEN), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patch_rotates_and_revokes_token() {
    let app = TestApp::spawn().await;
    app.seed_service_account("ingest", Some("SA:old"), Permission::ENABLED | Permission::READ_USER)
        .await;

    let response = app
        .request(
            "PATCH",
            "/serviceaccount/ingest",
            Some(WRITER_TOKEN),
            Some(json!({"token": "x"})),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let rotated = response.json()["token"].as_str().unwrap().to_string();
    assert!(rotated.starts_with("SA:"));
    assert_ne!(rotated, "x");
    assert_ne!(rotated, "SA:old");

    // old token no longer authenticates, the new one does
    let response = app.request("GET", "/serviceaccount", Some("SA:old"), None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let response = app.request("GET", "/serviceaccount", Some(&rotated), None).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .request(
            "PATCH",
            "/serviceaccount/ingest",
            Some(WRITER_TOKEN),
            Some(json!({"token": null})),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["token"], serde_json::Value::Null);

    let response = app.request("GET", "/serviceaccount", Some(&rotated), None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_patch_of_other_fields_is_rejected() {
    let app = TestApp::spawn().await;
    app.seed_service_account("ingest", Some("SA:ingest"), Permission::ENABLED).await;

    let response = app
        .request(
            "PATCH",
            "/serviceaccount/ingest",
            Some(WRITER_TOKEN),
            Some(json!({"description": "x"})),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "specified field can't be patched");

    let stored = app.store.find_service_account("ingest").await.unwrap();
    assert_eq!(stored.description, "");
    assert_eq!(stored.token.as_deref(), Some("SA:ingest"));
}

#[tokio::test]
async fn test_service_account_manages_its_own_token() {
    let app = TestApp::spawn().await;
    app.seed_service_account("ingest", Some("SA:ingest"), Permission::ENABLED).await;
    app.seed_service_account("other", Some("SA:other"), Permission::ENABLED).await;

    let response = app
        .request("GET", "/serviceaccount/ingest", Some("SA:ingest"), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .request("GET", "/serviceaccount/other", Some("SA:ingest"), None)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .request(
            "PATCH",
            "/serviceaccount/ingest",
            Some("SA:ingest"),
            Some(json!({"token": true})),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_removes_the_account() {
    let app = TestApp::spawn().await;
    app.seed_service_account("ingest", None, Permission::ENABLED).await;

    let response = app
        .request("DELETE", "/serviceaccount/ingest", Some(READER_TOKEN), None)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .request("DELETE", "/serviceaccount/ingest", Some(WRITER_TOKEN), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.is_empty());

    let response = app
        .request("GET", "/serviceaccount/ingest", Some(WRITER_TOKEN), None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_property_listing_is_unsupported() {
    let app = TestApp::spawn().await;
    let response = app
        .request("GET", "/serviceaccount/__property/label", Some(READER_TOKEN), None)
        .await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}
