use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use custvault_gateway::{
    AuthMethod, FederatedIdentity, GatewayError, SecretsGateway, VaultGateway, VaultSettings,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

const ROOT_TOKEN: &str = "root-token";
const FEDERATED_TOKEN: &str = "federated-token";

#[derive(Clone, Default)]
struct MockVault {
    namespaces: Arc<Mutex<Vec<String>>>,
    remote_calls: Arc<Mutex<usize>>,
}

impl MockVault {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        *self.remote_calls.lock().unwrap() += 1;
        if let Some(ns) = headers.get("X-Vault-Namespace").and_then(|v| v.to_str().ok()) {
            self.namespaces.lock().unwrap().push(ns.to_string());
        }
        let token = headers
            .get("X-Vault-Token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if token == ROOT_TOKEN || token == FEDERATED_TOKEN {
            Ok(())
        } else {
            Err((
                StatusCode::FORBIDDEN,
                Json(json!({ "errors": ["permission denied"] })),
            )
                .into_response())
        }
    }
}

fn rotate(value: &str, by: u32) -> String {
    value
        .chars()
        .map(|c| match c.to_digit(10) {
            Some(d) => char::from_digit((d + by) % 10, 10).unwrap(),
            None => c,
        })
        .collect()
}

async fn encrypt(State(vault): State<MockVault>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(denied) = vault.authorize(&headers) {
        return denied;
    }
    let plaintext = body["plaintext"].as_str().unwrap_or_default();
    Json(json!({ "data": { "ciphertext": format!("vault:v1:{}", plaintext) } })).into_response()
}

async fn decrypt(State(vault): State<MockVault>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(denied) = vault.authorize(&headers) {
        return denied;
    }
    let ciphertext = body["ciphertext"].as_str().unwrap_or_default();
    match ciphertext.strip_prefix("vault:v1:") {
        Some(plaintext) => Json(json!({ "data": { "plaintext": plaintext } })).into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "errors": ["invalid ciphertext"] })),
        )
            .into_response(),
    }
}

async fn encode(State(vault): State<MockVault>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(denied) = vault.authorize(&headers) {
        return denied;
    }
    if body["transformation"] != "ssn-fpe" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "errors": ["unknown transformation"] })),
        )
            .into_response();
    }
    let value = body["value"].as_str().unwrap_or_default();
    Json(json!({ "data": { "encoded_value": rotate(value, 7) } })).into_response()
}

async fn decode(State(vault): State<MockVault>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(denied) = vault.authorize(&headers) {
        return denied;
    }
    let value = body["value"].as_str().unwrap_or_default();
    Json(json!({ "data": { "decoded_value": rotate(value, 3) } })).into_response()
}

async fn creds(State(vault): State<MockVault>, headers: HeaderMap) -> Response {
    if let Err(denied) = vault.authorize(&headers) {
        return denied;
    }
    Json(json!({ "data": { "username": "v-app-123", "password": "s3cr3t" } })).into_response()
}

async fn slow_encrypt() -> Response {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({ "data": { "ciphertext": "vault:v1:late" } })).into_response()
}

async fn broken_encrypt() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "errors": ["internal error"] })),
    )
        .into_response()
}

async fn bogus_encrypt() -> Response {
    Json(json!({ "data": { "ciphertext": "not-a-ciphertext" } })).into_response()
}

async fn identity(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
    let header_ok = headers
        .get("X-IDENTITY-HEADER")
        .and_then(|v| v.to_str().ok())
        == Some("identity-secret");
    let resource_ok = params.get("resource").map(String::as_str) == Some("https://management.azure.com/");
    let version_ok = params.get("api-version").map(String::as_str) == Some("2019-08-01");
    if header_ok && resource_ok && version_ok {
        Json(json!({ "access_token": "managed-identity-jwt" })).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn jwt_login(Json(body): Json<Value>) -> Response {
    if body["role"] == "dev-role" && body["jwt"] == "managed-identity-jwt" {
        Json(json!({ "auth": { "client_token": FEDERATED_TOKEN } })).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "errors": ["invalid role or jwt"] })),
        )
            .into_response()
    }
}

async fn start_mock() -> (String, MockVault) {
    let vault = MockVault::default();
    let app = Router::new()
        .route("/v1/transit/encrypt/:key", post(encrypt))
        .route("/v1/transit/decrypt/:key", post(decrypt))
        .route("/v1/transform/encode/:role", post(encode))
        .route("/v1/transform/decode/:role", post(decode))
        .route("/v1/database/creds/app", get(creds))
        .route("/v1/slow/encrypt/:key", post(slow_encrypt))
        .route("/v1/broken/encrypt/:key", post(broken_encrypt))
        .route("/v1/bogus/encrypt/:key", post(bogus_encrypt))
        .route("/v1/auth/jwt/login", post(jwt_login))
        .route("/identity", get(identity))
        .with_state(vault.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), vault)
}

fn settings(address: &str, transit_mount: &str) -> VaultSettings {
    VaultSettings {
        address: address.to_string(),
        namespace: Some("admin".to_string()),
        transit_mount: transit_mount.to_string(),
        key_name: "customer-key".to_string(),
        transform_mount: "transform".to_string(),
        timeout: Duration::from_millis(300),
    }
}

async fn token_gateway(address: &str, transit_mount: &str) -> VaultGateway {
    VaultGateway::connect(settings(address, transit_mount), AuthMethod::token(ROOT_TOKEN))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_encrypt_decrypt_round_trip() {
    let (address, vault) = start_mock().await;
    let gateway = token_gateway(&address, "transit").await;

    let ciphertext = gateway.encrypt("Tyler, Texas").await.unwrap();
    assert!(ciphertext.starts_with("vault:v1:"));
    assert_ne!(ciphertext, "Tyler, Texas");

    let plaintext = gateway.decrypt(&ciphertext).await.unwrap();
    assert_eq!(plaintext, "Tyler, Texas");

    let namespaces = vault.namespaces.lock().unwrap().clone();
    assert!(namespaces.iter().all(|ns| ns == "admin"));
    assert_eq!(namespaces.len(), 2);
}

#[tokio::test]
async fn test_decrypt_passes_legacy_plaintext_through() {
    let (address, vault) = start_mock().await;
    let gateway = token_gateway(&address, "transit").await;

    let value = gateway.decrypt("7000000").await.unwrap();
    assert_eq!(value, "7000000");
    assert_eq!(*vault.remote_calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_tokenize_round_trip() {
    let (address, _vault) = start_mock().await;
    let gateway = token_gateway(&address, "transit").await;

    let token = gateway.tokenize("360-56-6750", "ssn").await.unwrap();
    assert_ne!(token, "360-56-6750");
    assert_eq!(token.len(), "360-56-6750".len());

    let value = gateway.detokenize(&token, "ssn").await.unwrap();
    assert_eq!(value, "360-56-6750");
}

#[tokio::test]
async fn test_unknown_transformation_is_rejected() {
    let (address, _vault) = start_mock().await;
    let gateway = token_gateway(&address, "transit").await;

    let err = gateway.tokenize("360-56-6750", "phone").await.unwrap_err();
    match err {
        GatewayError::Rejected { status, message, .. } => {
            assert_eq!(status, 400);
            assert_eq!(message, "unknown transformation");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_token_is_rejected() {
    let (address, _vault) = start_mock().await;
    let gateway = VaultGateway::connect(settings(&address, "transit"), AuthMethod::token("wrong"))
        .await
        .unwrap();

    let err = gateway.encrypt("x").await.unwrap_err();
    assert!(matches!(err, GatewayError::Rejected { status: 403, .. }));
}

#[tokio::test]
async fn test_timeout_is_unavailable() {
    let (address, _vault) = start_mock().await;
    let gateway = token_gateway(&address, "slow").await;

    let err = gateway.encrypt("x").await.unwrap_err();
    assert!(err.is_unavailable(), "expected unavailable, got {err:?}");
}

#[tokio::test]
async fn test_server_error_is_unavailable() {
    let (address, _vault) = start_mock().await;
    let gateway = token_gateway(&address, "broken").await;

    let err = gateway.encrypt("x").await.unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_ciphertext_without_marker_is_malformed() {
    let (address, _vault) = start_mock().await;
    let gateway = token_gateway(&address, "bogus").await;

    let err = gateway.encrypt("x").await.unwrap_err();
    assert!(matches!(err, GatewayError::Malformed { .. }));
}

#[tokio::test]
async fn test_unreachable_gateway_is_unavailable() {
    let gateway = token_gateway("http://127.0.0.1:9", "transit").await;
    let err = gateway.encrypt("x").await.unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_read_database_credential() {
    let (address, _vault) = start_mock().await;
    let gateway = token_gateway(&address, "transit").await;

    let cred = gateway
        .read_database_credential("database/creds/app")
        .await
        .unwrap();
    assert_eq!(cred.username, "v-app-123");
    assert_eq!(cred.password(), "s3cr3t");
}

#[tokio::test]
async fn test_federated_identity_login() {
    let (address, _vault) = start_mock().await;
    let auth = AuthMethod::FederatedIdentity(FederatedIdentity {
        identity_endpoint: format!("{}/identity", address),
        identity_header: "identity-secret".to_string().into(),
        resource: "https://management.azure.com/".to_string(),
        login_mount: "jwt".to_string(),
        role: "dev-role".to_string(),
    });

    let gateway = VaultGateway::connect(settings(&address, "transit"), auth)
        .await
        .unwrap();
    let ciphertext = gateway.encrypt("15000000").await.unwrap();
    assert_eq!(gateway.decrypt(&ciphertext).await.unwrap(), "15000000");
}

#[tokio::test]
async fn test_federated_identity_bad_header_fails_connect() {
    let (address, _vault) = start_mock().await;
    let auth = AuthMethod::FederatedIdentity(FederatedIdentity {
        identity_endpoint: format!("{}/identity", address),
        identity_header: "wrong".to_string().into(),
        resource: "https://management.azure.com/".to_string(),
        login_mount: "jwt".to_string(),
        role: "dev-role".to_string(),
    });

    let result = VaultGateway::connect(settings(&address, "transit"), auth).await;
    assert!(matches!(result, Err(GatewayError::Rejected { status: 401, .. })));
}
