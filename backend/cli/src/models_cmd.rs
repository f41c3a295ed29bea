//! CLI Models Command
//!
//! Lists the models the configured endpoint reports and which one would be used.

use anyhow::Result;
use coldmail_inference::{select_model, HttpProviderFactory, InferenceConfig, ProviderFactory};

pub async fn run(config: &InferenceConfig) -> Result<()> {
    let provider = HttpProviderFactory::new().connect(config);
    let available = provider.available_models().await;

    println!("\nInference endpoint: {} ({})\n", config.base_url, config.protocol);

    if available.is_empty() {
        println!("  No models discovered (endpoint unreachable or empty).");
    } else {
        for model in &available {
            println!("  - {model}");
        }
    }

    println!(
        "\nConfigured: {}  Selected: {}\n",
        config.model,
        select_model(&config.model, &available)
    );
    Ok(())
}
