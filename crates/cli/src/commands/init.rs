//! `tessel init` — Write a default configuration file.

use tessel_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if config_path.exists() {
        println!("Config already exists: {}", config_path.display());
        println!("Edit it directly, or delete it and re-run `tessel init`.");
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Wrote default config: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set an API key: export TESSEL_API_KEY=sk-...");
    println!("     (or use provider = \"ollama\" for a local model)");
    println!("  2. Try it: tessel run \"list the files in the current directory\"");

    Ok(())
}
