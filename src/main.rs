//! junban - Dependency-ordered startup and shutdown of local services
//!
//! Entry point for the junban application.

use clap::Parser;
use junban::adapters::{HealthChecker, ServiceHealthChecker};
use junban::cli::{Cli, Commands, ConfigCommands, PlanArgs, ServeArgs, ServiceArgs};
use junban::config::Config;
use junban::engine::ServiceStatus;
use junban::error::exit_code;
use junban::server::state::AppState;
use junban::JunbanError;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ Configuration is invalid: {}", e);
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    if let Err(e) = config.logging.init_subscriber(cli.log_level()) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::from(exit_code::GENERAL_ERROR as u8);
    }

    // Execute the command
    match run(cli, config) {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// Main application logic; returns the process exit code.
fn run(cli: Cli, config: Config) -> junban::Result<i32> {
    let runtime = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Serve(args) => runtime.block_on(cmd_serve(config, args)),
        Commands::Plan(args) => runtime.block_on(cmd_plan(config, args)),
        Commands::Up(args) => runtime.block_on(cmd_up(config, args.profile)),
        Commands::Down(args) => runtime.block_on(cmd_down(config, args.profile)),
        Commands::Start(args) => runtime.block_on(cmd_service(config, args, Action::Start)),
        Commands::Stop(args) => runtime.block_on(cmd_service(config, args, Action::Stop)),
        Commands::Restart(args) => runtime.block_on(cmd_service(config, args, Action::Restart)),
        Commands::Status(args) => runtime.block_on(cmd_status(config, args.profile)),
        Commands::Config(subcmd) => cmd_config(&config, &subcmd),
    }
}

/// Handle the `serve` command.
async fn cmd_serve(mut config: Config, args: ServeArgs) -> junban::Result<i32> {
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!(
        host = %config.host_name(),
        bind = %config.server.bind,
        port = %config.server.port,
        services = config.services.len(),
        "Starting junban server"
    );

    junban::serve(config).await?;
    Ok(exit_code::SUCCESS)
}

/// Handle the `plan` command.
async fn cmd_plan(config: Config, args: PlanArgs) -> junban::Result<i32> {
    let app = AppState::new(config);
    let plan = app.plan(args.profile.profile.as_deref()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", plan);
    }
    Ok(exit_code::SUCCESS)
}

/// Handle the `up` command.
async fn cmd_up(config: Config, profile: Option<String>) -> junban::Result<i32> {
    let app = AppState::new(config);
    let plan = app.plan(profile.as_deref()).await?;
    let result = app.orchestrator.start_all(&plan).await;
    app.orchestrator.prober().shutdown();
    let summary = result?;

    for outcome in &summary.outcomes {
        println!(
            "{:<24} {:<10} {}",
            outcome.service_id,
            outcome.status.to_string(),
            outcome.reason
        );
    }
    println!("{} in {}ms", summary, summary.elapsed_ms);

    Ok(if summary.is_success() {
        exit_code::SUCCESS
    } else {
        exit_code::PARTIAL_FAILURE
    })
}

/// Handle the `down` command.
async fn cmd_down(config: Config, profile: Option<String>) -> junban::Result<i32> {
    let app = AppState::new(config);
    let plan = app.plan(profile.as_deref()).await?;
    let summary = app.orchestrator.stop_all(&plan).await;
    app.orchestrator.prober().shutdown();

    for (service, message) in &summary.failed {
        println!("{:<24} failed     {}", service, message);
    }
    println!("{}", summary);

    Ok(if summary.is_success() {
        exit_code::SUCCESS
    } else {
        exit_code::PARTIAL_FAILURE
    })
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Start,
    Stop,
    Restart,
}

/// Handle the `start`, `stop` and `restart` commands.
async fn cmd_service(config: Config, args: ServiceArgs, action: Action) -> junban::Result<i32> {
    let app = AppState::new(config);
    let plan = app.plan(args.profile.profile.as_deref()).await?;
    let orchestrator = &app.orchestrator;

    let result = match action {
        Action::Start => orchestrator.start_one(&plan, &args.service).await,
        Action::Restart => orchestrator.restart_one(&plan, &args.service).await,
        Action::Stop => {
            let result = orchestrator.stop_one(&plan, &args.service).await;
            orchestrator.prober().shutdown();
            result?;
            println!("{}: stopped", args.service);
            return Ok(exit_code::SUCCESS);
        }
    };
    orchestrator.prober().shutdown();

    let outcome = result?;
    println!("{}: {} ({})", outcome.service_id, outcome.status, outcome.reason);

    Ok(if outcome.status == ServiceStatus::Started {
        exit_code::SUCCESS
    } else {
        exit_code::PARTIAL_FAILURE
    })
}

/// Handle the `status` command.
async fn cmd_status(config: Config, profile: Option<String>) -> junban::Result<i32> {
    let checker = ServiceHealthChecker::from_config(&config);
    let app = AppState::new(config);
    let plan = app.plan(profile.as_deref()).await?;

    println!("Host: {}", app.host_name);
    if let Some(profile) = &plan.profile {
        println!("Profile: {}", profile);
    }
    println!();

    for (i, id) in plan.order.iter().enumerate() {
        let readiness = match checker.check(id).await {
            Ok(state) => state.to_string(),
            Err(e) => format!("unreachable ({})", e),
        };
        println!("{:>3}. {:<24} {}", i + 1, id, readiness);
    }
    Ok(exit_code::SUCCESS)
}

/// Handle the `config` subcommand.
fn cmd_config(config: &Config, subcmd: &ConfigCommands) -> junban::Result<i32> {
    match subcmd {
        ConfigCommands::Validate => {
            tracing::debug!(?config, "Validated configuration");
            println!("✓ Configuration is valid");
        }
        ConfigCommands::Show => {
            let yaml = serde_yaml::to_string(config).map_err(|e| {
                JunbanError::config_with_source("Failed to serialize configuration", e)
            })?;
            println!("{}", yaml);
        }
    }
    Ok(exit_code::SUCCESS)
}
