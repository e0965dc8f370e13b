use anyhow::Result;

use skgif_core::envelope::Envelope;

use crate::config::Config;
use crate::services::build_services;

/// CLI entry point: map one study and print it as a JSON-LD Product.
pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let services = build_services(config).await?;

    let product = match services.engine.find_product(id).await {
        Ok(Some(product)) => product,
        Ok(None) => {
            eprintln!("Error: Product not found: {}", id);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let node = services.jsonld.wrap(Envelope::Entity(&product))?;
    println!("{}", serde_json::to_string_pretty(&node)?);
    Ok(())
}
