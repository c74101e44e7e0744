//! `tessel tools` — List the registered tools and their parameters.

use tessel_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().unwrap_or_default();
    let registry = tessel_tools::builtin_registry(&config.tools, &config.sandbox)?;

    let mut schemas = registry.schemas();
    schemas.sort_by(|a, b| a.name.cmp(&b.name));

    println!("Registered tools:\n");
    for schema in schemas {
        println!("  {} — {}", schema.name, schema.description);
        for param in &schema.parameters {
            let marker = if param.required { "required" } else { "optional" };
            println!(
                "      {} ({}, {}) — {}",
                param.name, param.param_type, marker, param.description
            );
        }
        println!();
    }

    Ok(())
}
