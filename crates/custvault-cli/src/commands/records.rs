use anyhow::Result;
use custvault_storage::CustomerRepository;

pub async fn handle(repository: &CustomerRepository, limit: u32, raw: bool) -> Result<()> {
    let records = repository.read_all(limit, raw).await?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    repository.database().close().await;
    Ok(())
}
