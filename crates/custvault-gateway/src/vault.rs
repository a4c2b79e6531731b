//! Vault-compatible HTTP gateway (transit + transform secrets engines)

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::auth::AuthMethod;
use crate::error::{GatewayError, Result};
use crate::traits::SecretsGateway;
use crate::types::{DatabaseCredential, is_ciphertext};

pub(crate) const TOKEN_HEADER: &str = "X-Vault-Token";
pub(crate) const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Where the gateway lives and which resources it exposes.
#[derive(Debug, Clone)]
pub struct VaultSettings {
    pub address: String,
    pub namespace: Option<String>,
    pub transit_mount: String,
    pub key_name: String,
    pub transform_mount: String,
    pub timeout: Duration,
}

/// Authenticated, read-only session established once at startup.
///
/// The token is never renewed. A process that outlives the token's TTL starts
/// getting `Rejected` errors.
#[derive(Debug)]
pub struct GatewaySession {
    pub address: String,
    pub namespace: Option<String>,
    pub transit_mount: String,
    pub key_name: String,
    pub transform_mount: String,
    token: SecretString,
}

impl GatewaySession {
    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }
}

pub struct VaultGateway {
    http: reqwest::Client,
    session: GatewaySession,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct EncryptData {
    ciphertext: String,
}

#[derive(Deserialize)]
struct DecryptData {
    plaintext: String,
}

#[derive(Deserialize)]
struct EncodeData {
    encoded_value: String,
}

#[derive(Deserialize)]
struct DecodeData {
    decoded_value: String,
}

#[derive(Deserialize)]
struct CredentialData {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

impl VaultGateway {
    /// Build the HTTP client, authenticate and return a ready gateway.
    pub async fn connect(settings: VaultSettings, auth: AuthMethod) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("custvault/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("HTTP client: {}", e)))?;

        let address = settings.address.trim_end_matches('/').to_string();
        info!(
            address = %address,
            namespace = settings.namespace.as_deref().unwrap_or(""),
            auth = auth.name(),
            "Connecting to secrets gateway"
        );

        let token = auth
            .acquire_token(&http, &address, settings.namespace.as_deref())
            .await?;

        Ok(Self {
            http,
            session: GatewaySession {
                address,
                namespace: settings.namespace,
                transit_mount: settings.transit_mount,
                key_name: settings.key_name,
                transform_mount: settings.transform_mount,
                token,
            },
        })
    }

    pub fn session(&self) -> &GatewaySession {
        &self.session
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(TOKEN_HEADER, self.session.token.expose_secret());
        match self.session.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => request.header(NAMESPACE_HEADER, ns),
            _ => request,
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let request = self.authorize(self.http.post(self.session.url(path)).json(&body));
        let response = send(request, operation).await?;
        let envelope: Envelope<T> = read_json(response, operation).await?;
        Ok(envelope.data)
    }

    async fn get<T: DeserializeOwned>(&self, operation: &'static str, path: &str) -> Result<T> {
        let request = self.authorize(self.http.get(self.session.url(path)));
        let response = send(request, operation).await?;
        let envelope: Envelope<T> = read_json(response, operation).await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl SecretsGateway for VaultGateway {
    async fn encrypt(&self, plaintext: &str) -> Result<String> {
        let path = format!(
            "{}/encrypt/{}",
            self.session.transit_mount, self.session.key_name
        );
        let data: EncryptData = self
            .post(
                "encrypt",
                &path,
                json!({ "plaintext": BASE64.encode(plaintext.as_bytes()) }),
            )
            .await?;

        if !is_ciphertext(&data.ciphertext) {
            return Err(GatewayError::malformed(
                "encrypt",
                "ciphertext is missing the vault:v marker",
            ));
        }
        Ok(data.ciphertext)
    }

    async fn decrypt(&self, value: &str) -> Result<String> {
        if !is_ciphertext(value) {
            debug!("Value carries no ciphertext marker, passing through");
            return Ok(value.to_string());
        }

        let path = format!(
            "{}/decrypt/{}",
            self.session.transit_mount, self.session.key_name
        );
        let data: DecryptData = self
            .post("decrypt", &path, json!({ "ciphertext": value }))
            .await?;

        let bytes = BASE64
            .decode(data.plaintext.as_bytes())
            .map_err(|e| GatewayError::malformed("decrypt", format!("plaintext is not base64: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| GatewayError::malformed("decrypt", format!("plaintext is not UTF-8: {}", e)))
    }

    async fn tokenize(&self, plaintext: &str, role: &str) -> Result<String> {
        let path = format!("{}/encode/{}", self.session.transform_mount, role);
        let data: EncodeData = self
            .post(
                "tokenize",
                &path,
                json!({ "value": plaintext, "transformation": transformation_name(role) }),
            )
            .await?;
        Ok(data.encoded_value)
    }

    async fn detokenize(&self, token: &str, role: &str) -> Result<String> {
        let path = format!("{}/decode/{}", self.session.transform_mount, role);
        let data: DecodeData = self
            .post(
                "detokenize",
                &path,
                json!({ "value": token, "transformation": transformation_name(role) }),
            )
            .await?;
        Ok(data.decoded_value)
    }

    async fn read_database_credential(&self, path: &str) -> Result<DatabaseCredential> {
        let data: CredentialData = self.get("read_database_credential", path).await?;
        debug!(path, username = %data.username, "Read database credential");
        Ok(DatabaseCredential::new(data.username, data.password))
    }
}

/// Transform roles are paired with an FPE transformation named `<role>-fpe`.
fn transformation_name(role: &str) -> String {
    format!("{}-fpe", role)
}

/// Send a request and turn non-2xx statuses into gateway errors.
pub(crate) async fn send(request: RequestBuilder, operation: &'static str) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| GatewayError::from_transport(operation, e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .filter(|b| !b.errors.is_empty())
        .map(|b| b.errors.join("; "))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());

    if status.is_server_error() {
        Err(GatewayError::unavailable(
            operation,
            format!("HTTP {}: {}", status.as_u16(), message),
        ))
    } else {
        Err(GatewayError::Rejected {
            operation,
            status: status.as_u16(),
            message,
        })
    }
}

/// Read the full body, then decode it. Body read failures are transport
/// problems, decode failures are malformed responses.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    operation: &'static str,
) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| GatewayError::from_transport(operation, e))?;
    serde_json::from_slice(&bytes).map_err(|e| GatewayError::malformed(operation, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_url_joins_paths() {
        let session = GatewaySession {
            address: "http://127.0.0.1:8200".to_string(),
            namespace: None,
            transit_mount: "transit".to_string(),
            key_name: "customer-key".to_string(),
            transform_mount: "data_protection/transform".to_string(),
            token: SecretString::from("t".to_string()),
        };
        assert_eq!(
            session.url("/transit/encrypt/customer-key"),
            "http://127.0.0.1:8200/v1/transit/encrypt/customer-key"
        );
        assert_eq!(
            session.url("database/creds/app"),
            "http://127.0.0.1:8200/v1/database/creds/app"
        );
    }

    #[test]
    fn test_transformation_name() {
        assert_eq!(transformation_name("ssn"), "ssn-fpe");
    }
}
