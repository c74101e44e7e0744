//! `tessel doctor` — Diagnose configuration and environment.

use tessel_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Tessel Doctor — diagnostics");
    println!("===========================\n");

    let mut issues = 0;

    // Config file
    let config_path = AppConfig::config_dir().join("config.toml");
    let config = if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => match config.validate() {
                Ok(()) => {
                    println!("  ok    config file valid");
                    Some(config)
                }
                Err(e) => {
                    println!("  FAIL  config file invalid: {e}");
                    issues += 1;
                    None
                }
            },
            Err(e) => {
                println!("  FAIL  config file unreadable: {e}");
                issues += 1;
                None
            }
        }
    } else {
        println!("  warn  no config file — run `tessel init` (defaults in effect)");
        Some(AppConfig::load().unwrap_or_default())
    };

    // API key / provider
    if let Some(config) = &config {
        let keyed = config.api_key.is_some()
            || config.providers.values().any(|p| p.api_key.is_some())
            || config.default_provider == "ollama";
        if keyed {
            println!("  ok    provider credentials present");
        } else {
            println!("  warn  no API key — set TESSEL_API_KEY or add api_key to config.toml");
            issues += 1;
        }

        match tessel_providers::build_provider(config) {
            Ok(provider) => match provider.health_check().await {
                Ok(true) => println!("  ok    provider '{}' reachable", provider.name()),
                Ok(false) | Err(_) => {
                    println!("  warn  provider '{}' not reachable", provider.name());
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  warn  provider not configured: {e}");
                issues += 1;
            }
        }
    }

    // Sandbox interpreter
    match tokio::process::Command::new("python3")
        .arg("--version")
        .output()
        .await
    {
        Ok(out) if out.status.success() => {
            let version = String::from_utf8_lossy(&out.stdout);
            println!("  ok    sandbox interpreter: {}", version.trim());
        }
        _ => {
            println!("  FAIL  python3 not found — the execute_code tool will not work");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  all checks passed");
    } else {
        println!("  {issues} issue(s) found, see above");
    }

    Ok(())
}
