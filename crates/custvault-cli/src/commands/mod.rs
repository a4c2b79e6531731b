pub mod records;
pub mod serve;

use anyhow::{Context, Result};
use custvault_config::{Config, DatabaseSource};
use custvault_core::FieldCodec;
use custvault_gateway::{SecretsGateway, VaultGateway};
use custvault_storage::{CustomerRepository, Database, DatabaseTarget, schema};
use std::sync::Arc;
use tracing::{info, warn};

/// Wire gateway, database and codec together from validated config.
pub async fn bootstrap(config: &Config) -> Result<CustomerRepository> {
    let gateway: Option<Arc<dyn SecretsGateway>> = match config.vault_settings() {
        Some(settings) => {
            let auth = config.auth_method(|key| std::env::var(key).ok())?;
            let gateway = VaultGateway::connect(settings, auth)
                .await
                .context("connecting to the secrets gateway")?;
            warn!("Gateway token and database credentials are never renewed");
            let gateway: Arc<dyn SecretsGateway> = Arc::new(gateway);
            Some(gateway)
        }
        None => {
            warn!("No secrets gateway configured, customer data is stored unprotected");
            None
        }
    };

    let target = match config.database_source()? {
        DatabaseSource::Url(url) => DatabaseTarget::Url(url),
        DatabaseSource::GatewayCredential {
            host,
            port,
            database,
            creds_path,
        } => {
            let gateway = gateway
                .as_ref()
                .context("database credentials require a secrets gateway")?;
            let credential = gateway
                .read_database_credential(&creds_path)
                .await
                .context("reading database credentials")?;
            info!(username = %credential.username, "Obtained database credentials");
            DatabaseTarget::MySql {
                host,
                port,
                database,
                credential,
            }
        }
    };

    let db = Database::connect(target, config.database.max_connections).await?;
    schema::prepare(&db).await?;

    let codec = match gateway {
        Some(gateway) => FieldCodec::new(gateway, config.protection_policy()),
        None => FieldCodec::unprotected(),
    };
    let repository = CustomerRepository::new(db, Arc::new(codec));
    if config.database.seed {
        repository
            .seed_demo_customers()
            .await
            .context("seeding demo customers")?;
    }
    Ok(repository)
}
