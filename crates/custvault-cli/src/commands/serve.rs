use anyhow::Result;
use custvault_server::{AppContext, CustomerServer};
use custvault_storage::CustomerRepository;

pub async fn handle(repository: CustomerRepository, host: String, port: u16) -> Result<()> {
    let context = AppContext::new(repository);
    CustomerServer::serve(context, &host, port).await
}
