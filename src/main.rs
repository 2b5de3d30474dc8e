use knowledge_ingestion::config::AppConfig;
use knowledge_ingestion::provision_service::ProvisionService;
use tracing::{info, debug, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing with debug level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive("knowledge_ingestion=debug".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap()))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting knowledge ingestion application");
    debug!("Environment variables: AZURE_SEARCH_SERVICE_ENDPOINT={}, BLOB_CONTAINER_NAME={}, SEARCH_DATA_DIR={}",
        std::env::var("AZURE_SEARCH_SERVICE_ENDPOINT").unwrap_or_else(|_| "not set".to_string()),
        std::env::var("BLOB_CONTAINER_NAME").unwrap_or_else(|_| "not set".to_string()),
        std::env::var("SEARCH_DATA_DIR").unwrap_or_else(|_| "not set".to_string())
    );

    let config = AppConfig::from_env()?;
    let service = ProvisionService::new(config)?;
    info!("Provisioning service initialized successfully");

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "provision".to_string());

    let result = match command.as_str() {
        "provision" => service.run().await,
        "retrieve" => {
            let question = args.collect::<Vec<_>>().join(" ");
            if question.is_empty() {
                error!("Usage: knowledge_ingestion retrieve <question>");
                std::process::exit(2);
            }
            service.retrieve(&question).await.map(|answer| {
                println!("{}", serde_json::to_string_pretty(&answer).unwrap_or_else(|_| answer.to_string()));
            })
        }
        "cleanup" => service.cleanup().await,
        other => {
            error!("Unknown command: {} (expected provision, retrieve or cleanup)", other);
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        error!("✗ Error: {}", e);
        return Err(e.into());
    }

    info!("✓ Done");
    Ok(())
}
