//! Admin REST adapter against a mock identity service.
//!
//! GREEN when:
//! - 404 on lookups maps to `Ok(None)`; required lookups map to `NotFound`.
//! - The created client's id is read from the `Location` header.
//! - One token request serves many admin calls.
//! - 401/409/5xx map to `Auth` / `Conflict` / `Api`.
//! - A 400 from the token endpoint is `Auth`; a 5xx there is `Api`.

use httpmock::prelude::*;
use kcb_admin::{
    AdminApi, AdminConnection, AdminCredentials, AdminError, ClientRepresentation,
    KeycloakAdminClient, RoleRepresentation,
};
use serde_json::json;

const TOKEN_PATH: &str = "/realms/master/protocol/openid-connect/token";

fn client_for(server: &MockServer) -> KeycloakAdminClient {
    KeycloakAdminClient::new(AdminConnection {
        base_url: server.base_url(),
        admin_realm: "master".to_string(),
        client_id: "admin-cli".to_string(),
        credentials: AdminCredentials::Password {
            username: "admin".to_string(),
            password: "admin-pw".to_string(),
        },
    })
}

async fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(TOKEN_PATH)
                .body_contains("grant_type=password")
                .body_contains("client_id=admin-cli");
            then.status(200)
                .json_body(json!({ "access_token": "tok-1", "expires_in": 300 }));
        })
        .await
}

#[tokio::test]
async fn missing_realm_is_none() {
    let server = MockServer::start_async().await;
    let _token = mock_token(&server).await;
    let realm = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/admin/realms/school")
                .header("Authorization", "Bearer tok-1");
            then.status(404).json_body(json!({ "error": "Realm not found." }));
        })
        .await;

    let admin = client_for(&server);
    let got = admin.get_realm("school").await.unwrap();

    assert!(got.is_none());
    realm.assert_async().await;
}

#[tokio::test]
async fn existing_realm_is_decoded() {
    let server = MockServer::start_async().await;
    let _token = mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/admin/realms/school");
            then.status(200).json_body(json!({
                "id": "r-1",
                "realm": "school",
                "enabled": true,
                "attributes": { "kcb.initialized": "true" },
                "sslRequired": "external"
            }));
        })
        .await;

    let admin = client_for(&server);
    let realm = admin.get_realm("school").await.unwrap().unwrap();

    assert_eq!(realm.realm.as_deref(), Some("school"));
    assert_eq!(realm.enabled, Some(true));
    assert_eq!(realm.attribute("kcb.initialized"), Some("true"));
}

#[tokio::test]
async fn token_is_requested_once_for_many_calls() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/admin/realms/school/roles/TEACHER");
            then.status(200)
                .json_body(json!({ "id": "role-1", "name": "TEACHER" }));
        })
        .await;

    let admin = client_for(&server);
    for _ in 0..3 {
        let role = admin.get_realm_role("school", "TEACHER").await.unwrap();
        assert_eq!(role.unwrap().name.as_deref(), Some("TEACHER"));
    }

    token.assert_hits_async(1).await;
}

#[tokio::test]
async fn rejected_token_request_is_auth_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(TOKEN_PATH);
            then.status(401)
                .json_body(json!({ "error": "invalid_grant" }));
        })
        .await;

    let admin = client_for(&server);
    let err = admin.get_realm("school").await.unwrap_err();

    match err {
        AdminError::Auth { status, message } => {
            assert_eq!(status, 401);
            assert!(message.contains("invalid_grant"), "{message}");
        }
        other => panic!("expected Auth, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_grant_400_is_auth_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(TOKEN_PATH);
            then.status(400).json_body(json!({
                "error": "invalid_grant",
                "error_description": "Invalid user credentials"
            }));
        })
        .await;

    let admin = client_for(&server);
    let err = admin.get_realm("school").await.unwrap_err();

    match err {
        AdminError::Auth { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("invalid_grant"), "{message}");
        }
        other => panic!("expected Auth, got {other:?}"),
    }
}

#[tokio::test]
async fn token_endpoint_outage_is_api_error() {
    let server = MockServer::start_async().await;
    let token = server
        .mock_async(|when, then| {
            when.method(POST).path(TOKEN_PATH);
            then.status(503).body("upstream unavailable");
        })
        .await;
    let realm = server
        .mock_async(|when, then| {
            when.method(GET).path("/admin/realms/school");
            then.status(200).json_body(json!({ "realm": "school" }));
        })
        .await;

    let admin = client_for(&server);
    let err = admin.get_realm("school").await.unwrap_err();

    match err {
        AdminError::Api { status, message } => {
            assert_eq!(status, 503);
            assert!(message.contains("upstream unavailable"), "{message}");
        }
        other => panic!("expected Api, got {other:?}"),
    }
    token.assert_hits_async(1).await;
    realm.assert_hits_async(0).await;
}

#[tokio::test]
async fn created_client_id_comes_from_location_header() {
    let server = MockServer::start_async().await;
    let _token = mock_token(&server).await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/admin/realms/school/clients")
                .json_body_partial(r#"{ "clientId": "reporting", "serviceAccountsEnabled": true }"#);
            then.status(201).header(
                "Location",
                "http://kc/admin/realms/school/clients/6c1f0e2a-0000-4000-8000-000000000001",
            );
        })
        .await;

    let admin = client_for(&server);
    let rep = ClientRepresentation {
        client_id: Some("reporting".to_string()),
        service_accounts_enabled: Some(true),
        ..Default::default()
    };
    let id = admin.create_client("school", &rep).await.unwrap();

    assert_eq!(id, "6c1f0e2a-0000-4000-8000-000000000001");
    create.assert_async().await;
}

#[tokio::test]
async fn find_client_keeps_exact_match_only() {
    let server = MockServer::start_async().await;
    let _token = mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/admin/realms/school/clients")
                .query_param("clientId", "reporting");
            then.status(200).json_body(json!([
                { "id": "c-2", "clientId": "reporting-legacy" },
                { "id": "c-1", "clientId": "reporting" }
            ]));
        })
        .await;

    let admin = client_for(&server);
    let found = admin.find_client("school", "reporting").await.unwrap();

    assert_eq!(found.unwrap().id.as_deref(), Some("c-1"));
}

#[tokio::test]
async fn duplicate_create_is_conflict() {
    let server = MockServer::start_async().await;
    let _token = mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/admin/realms/school/roles");
            then.status(409)
                .json_body(json!({ "errorMessage": "Role with name TEACHER already exists" }));
        })
        .await;

    let admin = client_for(&server);
    let err = admin
        .create_realm_role("school", &RoleRepresentation::named("TEACHER", None))
        .await
        .unwrap_err();

    assert!(matches!(err, AdminError::Conflict(_)), "{err:?}");
}

#[tokio::test]
async fn server_error_is_api_error() {
    let server = MockServer::start_async().await;
    let _token = mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/admin/realms/school");
            then.status(503).body("maintenance");
        })
        .await;

    let admin = client_for(&server);
    let err = admin
        .update_realm("school", &Default::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AdminError::Api {
            status: 503,
            message: "/admin/realms/school: maintenance".to_string(),
        }
    );
}

#[tokio::test]
async fn missing_service_account_user_is_not_found() {
    let server = MockServer::start_async().await;
    let _token = mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/admin/realms/school/clients/c-1/service-account-user");
            then.status(404);
        })
        .await;

    let admin = client_for(&server);
    let err = admin
        .get_service_account_user("school", "c-1")
        .await
        .unwrap_err();

    assert!(err.is_not_found(), "{err:?}");
}

#[tokio::test]
async fn composites_are_read_scoped_to_one_client() {
    let server = MockServer::start_async().await;
    let _token = mock_token(&server).await;
    let scoped = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/admin/realms/school/roles/TEACHER/composites/clients/c-1");
            then.status(200).json_body(json!([
                { "id": "cr-1", "name": "VIEW_REPORTS", "clientRole": true, "containerId": "c-1" }
            ]));
        })
        .await;

    let admin = client_for(&server);
    let roles = admin
        .get_realm_role_client_composites("school", "TEACHER", "c-1")
        .await
        .unwrap();

    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name_str(), "VIEW_REPORTS");
    scoped.assert_async().await;
}

#[tokio::test]
async fn client_secret_is_read_from_credential() {
    let server = MockServer::start_async().await;
    let _token = mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/admin/realms/school/clients/c-1/client-secret");
            then.status(200)
                .json_body(json!({ "type": "secret", "value": "stored-secret" }));
        })
        .await;

    let admin = client_for(&server);
    let secret = admin.get_client_secret("school", "c-1").await.unwrap();

    assert_eq!(secret.as_deref(), Some("stored-secret"));
}
