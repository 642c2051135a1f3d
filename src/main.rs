use std::sync::Arc;

use skillpay::completion::NoopHooks;
use skillpay::config::AppConfig;
use skillpay::coordinator::SessionCoordinator;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _log_guard = skillpay::logging::init_logging(&config);

    tracing::info!("Starting SkillPay core in {} env", env);

    let coordinator = Arc::new(SessionCoordinator::new(
        &config.escrow,
        config.machine_id,
        Arc::new(NoopHooks),
    ));

    let port = get_port_override().unwrap_or(config.gateway.port);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(skillpay::gateway::serve(
        coordinator,
        &config.gateway.host,
        port,
    ))
}
