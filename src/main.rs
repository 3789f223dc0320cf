//! Pixy fleet controller CLI.
//!
//! Provides both human-friendly and machine-friendly (robot mode) interfaces.
#![forbid(unsafe_code)]

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use console::style;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use pf::cli::{self, Cli, Commands};
use pf::clock::{Clock, MonotonicClock};
use pf::commands::{CommandOutcome, CommandRegistry, ENUMERATE, GET_PARAMETERS, SET_PARAMETERS};
use pf::config::{self, FleetConfig, LoadedConfig};
use pf::controller::{Controller, ControllerStatus};
use pf::device::mock::MockBus;
use pf::device::DeviceId;
use pf::error::{PfError, Result};
use pf::fleet::BatchReport;
use pf::logging;
use pf::mode::TickOutcome;
use pf::store::JsonFileStore;
use pf::sync::SyncReport;

/// Build information embedded at compile time.
mod build_info {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    pub fn git_sha() -> &'static str {
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    }

    pub fn git_dirty() -> &'static str {
        option_env!("VERGEN_GIT_DIRTY").unwrap_or("false")
    }

    pub fn build_timestamp() -> &'static str {
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
    }

    pub fn rustc_semver() -> &'static str {
        option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown")
    }

    pub fn target() -> &'static str {
        option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown")
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.robot, cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        output_error(&cli, &e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        None => print_quick_start(cli),
        Some(Commands::Run(args)) => cmd_run(cli, args)?,
        Some(Commands::Enumerate) => cmd_operator(cli, ENUMERATE)?,
        Some(Commands::GetParams) => cmd_operator(cli, GET_PARAMETERS)?,
        Some(Commands::SetParams) => cmd_operator(cli, SET_PARAMETERS)?,
        Some(Commands::Config(args)) => cmd_config(cli, args)?,
        Some(Commands::Version) => cmd_version(cli),
        Some(Commands::Completions(args)) => cmd_completions(args),
    }
    Ok(())
}

// === Quick Start ===

#[derive(Serialize)]
struct RobotQuickStart {
    tool: &'static str,
    version: &'static str,
    description: &'static str,
    control_loop: &'static str,
    operator_commands: [&'static str; 3],
    run_input: &'static str,
    output_modes: OutputModes,
}

#[derive(Serialize)]
struct OutputModes {
    human: &'static str,
    robot: &'static str,
    compact: &'static str,
}

fn print_quick_start(cli: &Cli) {
    if cli.use_json() {
        output_json(
            cli,
            &RobotQuickStart {
                tool: "pf",
                version: build_info::VERSION,
                description: "Pixy camera fleet controller",
                control_loop: "pf run [--enabled] [--cycles N]",
                operator_commands: ["pf enumerate", "pf get-params", "pf set-params"],
                run_input: "enable | disable | toggle | status | quit | <command name>",
                output_modes: OutputModes {
                    human: "--format=text (default)",
                    robot: "--robot or --format=json",
                    compact: "--format=json-compact",
                },
            },
        );
        return;
    }

    println!(
        "{} {} - Pixy camera fleet controller\n",
        style("pf").bold().cyan(),
        build_info::VERSION
    );
    println!("{}", style("QUICK START").bold().underlined());
    println!();
    println!("  {}  Run the control loop", style("pf run").green());
    println!("  {}  List cameras", style("pf enumerate").green());
    println!("  {}  Read parameters into the store", style("pf get-params").green());
    println!("  {}  Apply stored parameters", style("pf set-params").green());
    println!("  {}  Show effective config", style("pf config").green());
    println!();
    println!("{}", style("WHILE RUNNING (stdin)").bold().underlined());
    println!();
    println!("  enable | disable | toggle | status | quit | <command name>");
    println!();
    println!("Run {} for full help", style("pf --help").yellow());
}

// === Controller Construction ===

/// In-process camera bus with every configured camera attached.
fn simulated_bus(config: &FleetConfig) -> Arc<MockBus> {
    let ids: Vec<DeviceId> = config.devices.iter().map(|d| d.id).collect();
    debug!(cameras = ids.len(), "Starting simulated camera bus");
    Arc::new(MockBus::with_cameras(&ids))
}

fn build_controller(loaded: &LoadedConfig) -> Result<Controller> {
    let store = JsonFileStore::open(loaded.store_path()?)?;
    Controller::init(&loaded.config, simulated_bus(&loaded.config), Box::new(store))
}

// === Operator Commands ===

fn cmd_operator(cli: &Cli, name: &str) -> Result<()> {
    let loaded = config::load_effective(cli.config.as_deref())?;
    let mut controller = build_controller(&loaded)?;
    let outcome = CommandRegistry::standard().execute(name, &mut controller)?;
    output_outcome(cli, &controller, &outcome);
    outcome_result(&outcome)
}

fn outcome_result(outcome: &CommandOutcome) -> Result<()> {
    let report = match outcome {
        CommandOutcome::Enumerated(report) => report.reentry.clone(),
        CommandOutcome::ParametersRead(report) | CommandOutcome::ParametersWritten(report) => {
            if let Some(err) = &report.store_error {
                return Err(PfError::Store(err.clone()));
            }
            report.combined()
        }
    };
    report.into_result().map_err(PfError::from)
}

fn output_outcome(cli: &Cli, controller: &Controller, outcome: &CommandOutcome) {
    if cli.use_json() {
        output_json(cli, outcome);
        return;
    }
    match outcome {
        CommandOutcome::Enumerated(report) => {
            println!("{}", style("Cameras").bold());
            for device in &report.devices {
                println!(
                    "  {}  {:<10} firmware {}",
                    style(device.id).cyan(),
                    device.slot.as_deref().unwrap_or("-"),
                    device.firmware.as_deref().unwrap_or("unknown")
                );
            }
            print_failures(&report.reentry);
        }
        CommandOutcome::ParametersRead(report) => print_sync(controller, "Read", report),
        CommandOutcome::ParametersWritten(report) => print_sync(controller, "Applied", report),
    }
}

fn print_sync(controller: &Controller, verb: &str, report: &SyncReport) {
    println!("{} {} camera(s)", style(verb).bold(), report.parameters.len());
    for p in &report.parameters {
        println!(
            "  {} {:<10} AE {:<5} gain {:>3} comp {:>5}  AWB {:<5} rgb {:>3}/{:>3}/{:>3}",
            style(p.device).cyan(),
            controller.registry().slot_of(p.device).unwrap_or("-"),
            p.auto_exposure,
            p.exposure.gain,
            p.exposure.compensation,
            p.auto_white_balance,
            p.white_balance.red,
            p.white_balance.green,
            p.white_balance.blue
        );
    }
    print_failures(&report.combined());
}

fn print_failures(report: &BatchReport) {
    for failure in &report.failures {
        eprintln!("  {} {failure}", style("failed").red().bold());
    }
}

// === Control Loop ===

fn cmd_run(cli: &Cli, args: &cli::RunArgs) -> anyhow::Result<()> {
    let loaded = config::load_effective(cli.config.as_deref())?;
    let period = args
        .period_ms
        .map_or_else(|| loaded.config.cycle_period(), Duration::from_millis);
    let mut controller = build_controller(&loaded)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the control loop runtime")?;
    let result = runtime.block_on(control_loop(cli, args, &mut controller, period));
    // A pending stdin read would otherwise hold the runtime open.
    runtime.shutdown_background();
    result?;
    Ok(())
}

enum LineAction {
    Continue,
    Quit,
}

async fn control_loop(
    cli: &Cli,
    args: &cli::RunArgs,
    controller: &mut Controller,
    period: Duration,
) -> Result<()> {
    let clock = MonotonicClock::new();
    let registry = CommandRegistry::standard();
    let mut enabled = args.enabled;
    let mut cycles: u64 = 0;

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(
        period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
        enabled, "Control loop started"
    );
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let outcome = controller.tick(enabled, clock.elapsed());
                if outcome.transition.is_some() {
                    output_transition(cli, &outcome);
                }
                cycles += 1;
                if args.cycles.is_some_and(|max| cycles >= max) {
                    break;
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if matches!(handle_line(cli, &registry, controller, &mut enabled, line.trim()), LineAction::Quit) {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("Operator input closed");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read operator input");
                    stdin_open = false;
                }
            },
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    info!(cycles, "Control loop stopped");
    Ok(())
}

fn handle_line(
    cli: &Cli,
    registry: &CommandRegistry,
    controller: &mut Controller,
    enabled: &mut bool,
    line: &str,
) -> LineAction {
    match line.to_ascii_lowercase().as_str() {
        "" => {}
        "enable" => *enabled = true,
        "disable" => *enabled = false,
        "toggle" => *enabled = !*enabled,
        "status" => output_status(cli, &controller.status()),
        "quit" | "exit" => return LineAction::Quit,
        _ => match registry.execute(line, controller) {
            Ok(outcome) => output_outcome(cli, controller, &outcome),
            Err(e) => output_error(cli, &e.into()),
        },
    }
    LineAction::Continue
}

#[derive(Serialize)]
struct TransitionEvent<'a> {
    event: &'static str,
    #[serde(flatten)]
    outcome: &'a TickOutcome,
}

fn output_transition(cli: &Cli, outcome: &TickOutcome) {
    if cli.use_json() {
        output_json(
            cli,
            &TransitionEvent {
                event: "transition",
                outcome,
            },
        );
        return;
    }
    println!("mode {}", style(outcome.mode).bold());
    print_failures(&outcome.report);
}

fn output_status(cli: &Cli, status: &ControllerStatus) {
    if cli.use_json() {
        output_json(cli, status);
        return;
    }
    let mode = status
        .mode
        .map_or_else(|| "starting".to_string(), |m| m.to_string());
    println!("{} {}", style("mode").bold(), mode);
    for device in &status.devices {
        let run = device.state.run;
        println!(
            "  {} {:<10} {:<9} program {:<7} grabber {:<7}",
            style(device.id).cyan(),
            device.slot,
            if device.managed { "managed" } else { "unmanaged" },
            tri_state(run.program),
            tri_state(run.frame_grabber)
        );
    }
}

fn tri_state(state: Option<bool>) -> &'static str {
    match state {
        Some(true) => "running",
        Some(false) => "stopped",
        None => "unknown",
    }
}

// === Configuration ===

fn cmd_config(cli: &Cli, args: &cli::ConfigArgs) -> Result<()> {
    let loaded = config::load_effective(cli.config.as_deref())?;
    let path = match &loaded.source {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };

    if args.path {
        if cli.use_json() {
            output_json(
                cli,
                &serde_json::json!({
                    "path": path,
                    "exists": loaded.source.is_some(),
                }),
            );
        } else {
            println!("{}", path.display());
        }
        return Ok(());
    }

    if cli.use_json() {
        let store_path = loaded.store_path()?;
        output_json(
            cli,
            &serde_json::json!({
                "source": loaded.source,
                "store_path": store_path,
                "config": loaded.config,
            }),
        );
    } else {
        print!("{}", config::to_toml_string(&loaded.config)?);
    }
    Ok(())
}

// === Utilities ===

fn cmd_version(cli: &Cli) {
    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({
                "version": build_info::VERSION,
                "git_sha": build_info::git_sha(),
                "git_dirty": build_info::git_dirty() == "true",
                "build_timestamp": build_info::build_timestamp(),
                "rustc_version": build_info::rustc_semver(),
                "target": build_info::target(),
            }),
        );
    } else {
        println!("pf {}", build_info::VERSION);
        println!(
            "git: {}{}",
            build_info::git_sha(),
            if build_info::git_dirty() == "true" {
                " (dirty)"
            } else {
                ""
            }
        );
        println!("built: {}", build_info::build_timestamp());
        println!("rustc: {}", build_info::rustc_semver());
        println!("target: {}", build_info::target());
    }
}

fn cmd_completions(args: &cli::CompletionsArgs) {
    use clap::CommandFactory;
    clap_complete::generate(args.shell, &mut Cli::command(), "pf", &mut io::stdout());
}

fn output_json<T: Serialize + ?Sized>(cli: &Cli, data: &T) {
    let json = if cli.use_compact_json() {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(e) => warn!(error = %e, "Failed to encode output"),
    }
}

fn output_error(cli: &Cli, error: &anyhow::Error) {
    let pf_error = error.downcast_ref::<PfError>();
    let suggestion = pf_error.and_then(PfError::suggestion);
    if cli.use_json() {
        let json = serde_json::json!({
            "error": true,
            "message": format!("{error:#}"),
            "device": pf_error.and_then(PfError::device),
            "suggestion": suggestion,
            "recoverable": pf_error.is_some_and(PfError::is_user_recoverable),
        });
        eprintln!("{json}");
    } else {
        eprintln!("{}: {error:#}", style("Error").red().bold());
        if let Some(suggestion) = suggestion {
            eprintln!("{}: {suggestion}", style("Hint").yellow());
        }
    }
}
