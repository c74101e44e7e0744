//! `tessel run` — Run a single task through the agent loop.

use std::sync::Arc;

use tessel_agent::AgentLoop;
use tessel_config::AppConfig;
use tessel_core::EventBus;
use tessel_telemetry::TelemetryEngine;
use tokio_util::sync::CancellationToken;

pub async fn run(task: String, model: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    config.validate()?;

    if config.api_key.is_none() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set TESSEL_API_KEY, or add api_key to your config file:");
        eprintln!(
            "    {}",
            AppConfig::config_dir().join("config.toml").display()
        );
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = tessel_providers::build_provider(&config)?;
    let registry = Arc::new(tessel_tools::builtin_registry(
        &config.tools,
        &config.sandbox,
    )?);
    let event_bus = Arc::new(EventBus::default());
    let telemetry = Arc::new(TelemetryEngine::new());

    let model = model.unwrap_or_else(|| config.default_model.clone());
    let agent = AgentLoop::new(provider, registry, event_bus, &model)
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens)
        .with_max_iterations(config.agent.max_iterations)
        .with_loop_repeat_threshold(config.agent.loop_repeat_threshold)
        .with_parse_failure_limit(config.agent.parse_failure_limit)
        .with_telemetry(telemetry.clone());

    // Ctrl-C cancels the turn at the next state transition and kills any
    // in-flight sandbox child.
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  interrupted, stopping...");
            ctrl_c.cancel();
        }
    });

    let answer = agent
        .run_task(&config.agent.system_prompt, &task, &cancel)
        .await?;
    println!("{answer}");

    let usage = telemetry.usage_snapshot();
    tracing::info!(
        llm_calls = usage.llm_calls,
        tool_executions = usage.tool_executions,
        tokens = usage.total_input_tokens + usage.total_output_tokens,
        "task finished"
    );

    Ok(())
}
