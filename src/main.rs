// src/main.rs

//! The main entry point. One binary, two modes: the OF-CONFIG server
//! (default) and the per-session NETCONF agent (`--agent`), which the SSH
//! transport launches as its `netconf` subsystem.

use anyhow::Result;
use ofcd::config::Config;
use ofcd::{agent, server};
use std::env;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, prelude::*, reload};

/// Environment variable seeding the default verbosity (0..4).
const VERBOSE_ENV: &str = "OFCD_VERBOSE";

fn print_usage(progname: &str) {
    println!("Usage: {progname} [-fh] [-d OVSDB] [-v level] [--config PATH]");
    println!(" -d,--db OVSDB          socket URI to communicate with OVSDB");
    println!("                        (e.g. -d unix:/var/run/openvswitch/db.sock)");
    println!(" -f,--foreground        run in foreground");
    println!(" -h,--help              display help");
    println!(" -v,--verbose level     verbose output level (0..4)");
    println!(" --config PATH          configuration file (TOML)");
    println!(" --agent                run as a per-session NETCONF agent");
}

/// Maps the numeric verbosity to a tracing filter directive.
fn filter_for(verbosity: u32) -> &'static str {
    match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    }
}

fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    let args: Vec<String> = env::args().collect();
    let progname = args.first().map(String::as_str).unwrap_or("ofcd");

    if args.contains(&"--version".to_string()) {
        println!("ofcd version {VERSION}");
        return Ok(());
    }
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage(progname);
        return Ok(());
    }

    let agent_mode = args.iter().any(|a| a == "--agent");

    // verbosity: environment first, command line wins
    let mut verbosity: u32 = env::var(VERBOSE_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut foreground = false;
    let mut config_path: Option<String> = None;
    let mut db_uri: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-v" | "--verbose" => {
                let Some(level) = args.get(i + 1).and_then(|v| v.parse().ok()) else {
                    eprintln!("-v requires a numeric level");
                    std::process::exit(1);
                };
                verbosity = level;
                i += 1;
            }
            "-d" | "--db" => {
                let Some(uri) = args.get(i + 1) else {
                    eprintln!("-d requires a socket URI");
                    std::process::exit(1);
                };
                db_uri = Some(uri.clone());
                i += 1;
            }
            "--config" => {
                let Some(path) = args.get(i + 1) else {
                    eprintln!("--config requires a path");
                    std::process::exit(1);
                };
                config_path = Some(path.clone());
                i += 1;
            }
            "-f" | "--foreground" => foreground = true,
            "--agent" => {}
            other => {
                eprintln!("Unknown option '{other}'");
                print_usage(progname);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = match &config_path {
        Some(path) => match Config::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from \"{path}\": {e}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(uri) = db_uri {
        config.db_uri = uri;
    }
    config.log_level = filter_for(verbosity).to_string();

    if agent_mode {
        // the agent talks NETCONF on stdio; logs go to stderr only
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(config.log_level.clone()))
            .compact()
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .init();

        let runtime = tokio::runtime::Runtime::new()?;
        return runtime.block_on(agent::run(config));
    }

    // the server goes to the background unless asked not to; this must
    // happen before the async runtime exists
    if !foreground && unsafe { libc::daemon(0, 0) } != 0 {
        eprintln!(
            "Going to background failed ({})",
            std::io::Error::last_os_error()
        );
        std::process::exit(1);
    }

    // reloadable filter so the server can re-assert it after init
    let (filter, reload_handle) = reload::Layer::new(EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(foreground)
                .with_writer(std::io::stderr),
        )
        .init();
    let reload_handle = Arc::new(reload_handle);

    let runtime = tokio::runtime::Runtime::new()?;
    if let Err(e) = runtime.block_on(server::run(config, reload_handle)) {
        error!("Server runtime error: {e}");
        std::process::exit(1);
    }
    Ok(())
}
