//! Server command implementation

use anyhow::Result;
use filer_core::Config;

pub async fn cmd_serve(mut config: Config, host: Option<&str>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host.to_string();
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    println!("🚀 Starting filer web server...");
    println!("   Store: {}", config.store.root_dir.display());
    println!("   Workbook: {}", config.sheets.workbook_dir.display());
    println!(
        "   Listening: http://{}:{}",
        config.server.host, config.server.port
    );

    let host = config.server.host.clone();
    let port = config.server.port;
    filer_server::serve(config, &host, port).await
}
