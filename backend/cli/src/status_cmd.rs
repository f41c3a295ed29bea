//! CLI Status Command
//!
//! Asks a running server for its liveness and inference health.

use anyhow::Result;
use serde_json::Value;

pub async fn run(port: u16) -> Result<()> {
    let client = reqwest::Client::new();
    let base = format!("http://localhost:{port}");

    let health = match client.get(format!("{base}/api/health")).send().await {
        Ok(resp) => resp.json::<Value>().await?,
        Err(_) => {
            println!("ColdMail is not running on port {port}");
            return Ok(());
        }
    };

    println!("\nColdMail status\n");
    println!("  version: {}", health["version"].as_str().unwrap_or("unknown"));
    println!("  uptime:  {}s", health["uptimeSeconds"].as_u64().unwrap_or(0));

    let inference: Value = client
        .get(format!("{base}/api/dashboard/health"))
        .send()
        .await?
        .json()
        .await?;
    let service = &inference["data"]["services"]["inference"];
    println!(
        "  inference: {} ({} via {}, model {})\n",
        service["status"].as_str().unwrap_or("unknown"),
        service["baseUrl"].as_str().unwrap_or("?"),
        service["protocol"].as_str().unwrap_or("?"),
        service["model"].as_str().unwrap_or("?"),
    );

    Ok(())
}
