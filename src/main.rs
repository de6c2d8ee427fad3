//! VPP dispatch entry point: CLI wiring around one scenario run.

use std::io;
use std::path::Path;
use std::process;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vpp_dispatch::config::ScenarioConfig;
use vpp_dispatch::io::export::{export_plan_csv, save_model_json};
use vpp_dispatch::pipeline;

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    seed_override: Option<u64>,
    plan_out: Option<String>,
    model_out: Option<String>,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: u16,
}

fn print_help() {
    eprintln!("vpp-dispatch: load forecasting and battery dispatch for a virtual power plant");
    eprintln!();
    eprintln!("Usage: vpp-dispatch [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!(
        "  --preset <name>          Use a built-in preset ({})",
        ScenarioConfig::PRESETS.join(", ")
    );
    eprintln!("  --seed <u64>             Override the synthetic data seed");
    eprintln!("  --plan-out <path>        Export the dispatch plan to CSV");
    eprintln!("  --model-out <path>       Save the fitted forecast model as JSON");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start REST API server after the run");
        eprintln!("  --port <u16>             API server port (default: 3000)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the demo preset is used.");
    eprintln!("Log verbosity follows RUST_LOG (default: info).");
}

/// Returns the value following the flag at `i`, or exits with a usage error.
fn flag_value<'a>(args: &'a [String], i: usize, flag: &str, what: &str) -> &'a str {
    match args.get(i) {
        Some(v) => v,
        None => {
            eprintln!("error: {flag} requires {what} argument");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        seed_override: None,
        plan_out: None,
        model_out: None,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: 3000,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                i += 1;
                cli.scenario_path =
                    Some(flag_value(&args, i, "--scenario", "a path").to_string());
            }
            "--preset" => {
                i += 1;
                cli.preset = Some(flag_value(&args, i, "--preset", "a name").to_string());
            }
            "--seed" => {
                i += 1;
                let raw = flag_value(&args, i, "--seed", "a u64");
                if let Ok(s) = raw.parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{raw}\" is not a valid u64");
                    process::exit(1);
                }
            }
            "--plan-out" => {
                i += 1;
                cli.plan_out = Some(flag_value(&args, i, "--plan-out", "a path").to_string());
            }
            "--model-out" => {
                i += 1;
                cli.model_out = Some(flag_value(&args, i, "--model-out", "a path").to_string());
            }
            #[cfg(feature = "api")]
            "--serve" => {
                cli.serve = true;
            }
            #[cfg(feature = "api")]
            "--port" => {
                i += 1;
                let raw = flag_value(&args, i, "--port", "a u16");
                if let Ok(p) = raw.parse::<u16>() {
                    cli.port = p;
                } else {
                    eprintln!("error: --port value \"{raw}\" is not a valid u16");
                    process::exit(1);
                }
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = parse_args();

    // --scenario takes priority, then --preset, then the demo default
    let loaded = if let Some(ref path) = cli.scenario_path {
        ScenarioConfig::from_toml_file(Path::new(path))
    } else if let Some(ref name) = cli.preset {
        ScenarioConfig::from_preset(name)
    } else {
        Ok(ScenarioConfig::demo())
    };
    let mut scenario = loaded.unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });

    if let Some(seed) = cli.seed_override {
        scenario.synthetic.seed = seed;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("{e}");
        }
        process::exit(1);
    }

    let out = pipeline::run_validated(&scenario).unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });

    println!("--- Forecast ---");
    println!("{}", out.metrics);
    println!(
        "lambda={} (requested {}, {} backoff steps)",
        out.model.lambda(),
        out.model.requested_lambda(),
        out.model.backoff_steps()
    );
    println!();

    for d in out.plan.decisions() {
        println!("{d}");
    }

    println!("\n{}", out.summary);

    if let Some(ref path) = cli.plan_out {
        if let Err(e) = export_plan_csv(&out.plan, Path::new(path)) {
            error!("failed to write plan CSV: {e}");
            process::exit(1);
        }
        info!(%path, "plan written");
    }

    if let Some(ref path) = cli.model_out {
        if let Err(e) = save_model_json(&out.model, Path::new(path)) {
            error!("failed to write model JSON: {e}");
            process::exit(1);
        }
        info!(%path, "model written");
    }

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(vpp_dispatch::api::AppState::from(out));
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            error!("failed to create tokio runtime: {e}");
            process::exit(1);
        });
        if let Err(e) = rt.block_on(vpp_dispatch::api::serve(state, addr)) {
            error!("API server error: {e}");
            process::exit(1);
        }
    }
}
