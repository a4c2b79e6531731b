//! Gateway authentication strategies

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{GatewayError, Result};
use crate::vault::{NAMESPACE_HEADER, read_json, send};

pub const DEFAULT_IDENTITY_RESOURCE: &str = "https://management.azure.com/";
const IDENTITY_API_VERSION: &str = "2019-08-01";

/// How the service obtains its gateway token. Chosen once at startup.
pub enum AuthMethod {
    /// A pre-issued token.
    Token(SecretString),
    /// Exchange a cloud managed-identity JWT for a gateway token.
    FederatedIdentity(FederatedIdentity),
}

/// Managed-identity endpoint plus the gateway JWT auth role to log in with.
pub struct FederatedIdentity {
    pub identity_endpoint: String,
    pub identity_header: SecretString,
    pub resource: String,
    pub login_mount: String,
    pub role: String,
}

#[derive(Deserialize)]
struct IdentityToken {
    access_token: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    auth: LoginAuth,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
}

impl AuthMethod {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token(SecretString::from(token.into()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::FederatedIdentity(_) => "federated_identity",
        }
    }

    pub(crate) async fn acquire_token(
        &self,
        http: &reqwest::Client,
        address: &str,
        namespace: Option<&str>,
    ) -> Result<SecretString> {
        match self {
            Self::Token(token) => {
                if token.expose_secret().is_empty() {
                    return Err(GatewayError::Configuration(
                        "gateway token is empty".to_string(),
                    ));
                }
                Ok(SecretString::from(token.expose_secret().to_string()))
            }
            Self::FederatedIdentity(identity) => identity.login(http, address, namespace).await,
        }
    }
}

impl FederatedIdentity {
    async fn login(
        &self,
        http: &reqwest::Client,
        address: &str,
        namespace: Option<&str>,
    ) -> Result<SecretString> {
        // 1. Managed identity JWT
        let request = http
            .get(&self.identity_endpoint)
            .query(&[
                ("resource", self.resource.as_str()),
                ("api-version", IDENTITY_API_VERSION),
            ])
            .header("X-IDENTITY-HEADER", self.identity_header.expose_secret());
        let response = send(request, "identity_token").await?;
        let identity: IdentityToken = read_json(response, "identity_token").await?;
        debug!("Obtained managed identity token");

        // 2. Gateway login
        let url = format!(
            "{}/v1/auth/{}/login",
            address,
            self.login_mount.trim_matches('/')
        );
        let mut request = http.post(url).json(&json!({
            "role": self.role,
            "jwt": identity.access_token,
        }));
        if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
            request = request.header(NAMESPACE_HEADER, ns);
        }
        let response = send(request, "login").await?;
        let login: LoginResponse = read_json(response, "login").await?;

        info!(mount = %self.login_mount, role = %self.role, "Logged in to secrets gateway");
        Ok(SecretString::from(login.auth.client_token))
    }
}
