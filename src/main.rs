use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use formworks::server::{run_with_config, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port = std::env::var("FORMWORKS_HTTP_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(8383);
    let db_root = std::env::var("FORMWORKS_DB_FOLDER").unwrap_or_else(|_| "forms-db".to_string());
    let base_url = std::env::var("FORMWORKS_BASE_URL")
        .unwrap_or_else(|_| format!("http://localhost:{}", http_port));
    let strict_xml = std::env::var("FORMWORKS_STRICT_XML")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    info!(
        target: "formworks",
        "formworks starting: RUST_LOG='{}', http_port={}, db_root='{}', base_url='{}', strict_xml={}",
        rust_log, http_port, db_root, base_url, strict_xml
    );

    run_with_config(ServerConfig { http_port, db_root, base_url, strict_xml }).await
}
