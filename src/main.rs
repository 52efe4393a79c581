//! Thin CLI layer: parse args, styled output, and call into mip-core.
//! Crash-proof: panic caught and reported; all errors return Result.

use clap::{Arg, ArgAction, Command};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::env;
use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

use mip_core::{HttpClient, InstallOptions, InstallReport};

// ---- UI helpers (no-op when stdout isn't a TTY) ----

fn use_color() -> bool {
    std::io::stdout().is_terminal()
        && env::var("NO_COLOR").unwrap_or_default().is_empty()
}

fn success(msg: &str) {
    if use_color() {
        println!("{}", msg.green());
    } else {
        println!("{}", msg);
    }
}

fn error(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.red());
    } else {
        eprintln!("{}", msg);
    }
}

fn warning(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.yellow());
    } else {
        eprintln!("{}", msg);
    }
}

fn dim(msg: &str) {
    if use_color() {
        println!("{}", msg.dimmed());
    } else {
        println!("{}", msg);
    }
}

/// Spinner shown while a quiet install runs; `None` when not quiet or not a TTY.
fn start_spinner(message: &str, quiet: bool) -> Option<ProgressBar> {
    if !quiet || !std::io::stderr().is_terminal() {
        return None;
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⠈⠐⠠⠰⠸⠹")
        .template("{spinner:.dim} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    Some(spinner)
}

fn report_json(package: &str, result: &Result<InstallReport, mip_core::MipError>) -> String {
    let value = match result {
        Ok(r) => serde_json::json!({
            "package": package,
            "status": "ok",
            "downloaded": r.downloaded,
            "skipped": r.skipped,
            "packages": r.packages,
        }),
        Err(e) => serde_json::json!({
            "package": package,
            "status": "partial",
            "error": e.to_string(),
        }),
    };
    value.to_string()
}

fn build_cli() -> Command {
    Command::new("mip")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Minimal package installer for MicroPython-style lib directories")
        .after_help(
            "Examples:\n  mip install aioble\n  mip install github:org/repo --version main\n  mip install file:///src/mypkg --target ./lib\n  mip hash lib/foo.py",
        )
        .subcommand(
            Command::new("install")
                .about("Install packages from the index, a repository, or a local manifest")
                .arg(
                    Arg::new("package")
                        .required(true)
                        .num_args(1..)
                        .help("Package name, github:owner/repo[/path], http(s):// or file:// URL"),
                )
                .arg(
                    Arg::new("index")
                        .long("index")
                        .short('i')
                        .help("Package index base URL (or set MIP_INDEX)"),
                )
                .arg(
                    Arg::new("target")
                        .long("target")
                        .short('t')
                        .help("Install directory (default: the lib entry of MICROPYPATH)"),
                )
                .arg(
                    Arg::new("version")
                        .long("version")
                        .help("Package version, or branch for github: references"),
                )
                .arg(
                    Arg::new("no-mpy")
                        .long("no-mpy")
                        .action(ArgAction::SetTrue)
                        .help("Install source .py files instead of precompiled .mpy"),
                )
                .arg(
                    Arg::new("mpy-version")
                        .long("mpy-version")
                        .value_parser(clap::value_parser!(u32))
                        .help("Bytecode version of the target device (or set MIP_MPY_VERSION)"),
                )
                .arg(
                    Arg::new("quiet")
                        .short('q')
                        .long("quiet")
                        .action(ArgAction::SetTrue)
                        .help("Minimal output; show spinner when busy"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output machine-readable JSON result"),
                ),
        )
        .subcommand(
            Command::new("hash")
                .about("Print the short hash of a file, as recorded in manifests")
                .arg(Arg::new("file").required(true).help("File to hash"))
                .arg(
                    Arg::new("len")
                        .long("len")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("8")
                        .help("Number of hex characters to keep"),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Print the URL a package reference resolves to")
                .arg(Arg::new("reference").required(true).help("URL, github: reference or relative path"))
                .arg(
                    Arg::new("version")
                        .long("version")
                        .help("Branch for github: references"),
                )
                .arg(
                    Arg::new("base")
                        .long("base")
                        .help("Manifest URL that relative references are resolved against"),
                ),
        )
}

fn run() -> Result<(), String> {
    let matches = build_cli().get_matches();
    let cwd = env::current_dir().map_err(|e| e.to_string())?;

    match matches.subcommand() {
        Some(("install", sub_m)) => {
            let quiet = sub_m.get_flag("quiet");
            let json_out = sub_m.get_flag("json");

            let mut opts = InstallOptions::from_env_and_config(&cwd);
            opts.quiet = quiet || json_out;
            if let Some(index) = sub_m.get_one::<String>("index") {
                opts.index = index.clone();
            }
            if let Some(target) = sub_m.get_one::<String>("target") {
                opts.target = Some(target.clone());
            }
            if let Some(version) = sub_m.get_one::<String>("version") {
                opts.version = Some(version.clone());
            }
            if let Some(mpy) = sub_m.get_one::<u32>("mpy-version") {
                opts.mpy_version = Some(*mpy);
            }
            if sub_m.get_flag("no-mpy") {
                opts.prefer_binary = false;
            }

            let packages: Vec<&String> = sub_m
                .get_many::<String>("package")
                .map(|v| v.collect())
                .unwrap_or_default();
            let client = HttpClient::new();
            let mut failed = Vec::new();
            for package in packages {
                let spinner = start_spinner(&format!("Installing {}", package), quiet && !json_out);
                let result = mip_core::install_with(&client, package, &opts);
                if let Some(s) = spinner {
                    s.finish_and_clear();
                }
                if json_out {
                    println!("{}", report_json(package, &result));
                }
                match result {
                    Ok(report) => {
                        if !json_out {
                            success(&format!(
                                "Installed {} ({} downloaded, {} up to date)",
                                package, report.downloaded, report.skipped
                            ));
                        }
                    }
                    Err(e) => {
                        if !json_out {
                            warning(&format!("Package {} may be partially installed.", package));
                        }
                        failed.push(format!("{}: {}", package, e));
                    }
                }
            }
            if !failed.is_empty() {
                return Err(failed.join("\n"));
            }
        }
        Some(("hash", sub_m)) => {
            let file = sub_m.get_one::<String>("file").ok_or("file required")?;
            let len = sub_m.get_one::<usize>("len").copied().unwrap_or(8);
            let hash = mip_core::file_short_hash(Path::new(file), len, mip_core::DEFAULT_CHUNK_SIZE)
                .map_err(|e| format!("Cannot hash {}: {}", file, e))?;
            println!("{}", hash);
        }
        Some(("resolve", sub_m)) => {
            let reference = sub_m.get_one::<String>("reference").ok_or("reference required")?;
            let version = sub_m.get_one::<String>("version").map(String::as_str);
            let base = sub_m.get_one::<String>("base").map(String::as_str);
            let url = mip_core::rewrite_url(reference, version, base).map_err(|e| e.to_string())?;
            println!("{}", url);
        }
        _ => {
            if use_color() {
                println!("{}", "mip".bright_cyan().bold());
            } else {
                println!("mip");
            }
            dim("Minimal package installer for MicroPython-style lib directories.");
            dim("\nRun `mip --help` for details.");
        }
    }

    Ok(())
}

fn main() {
    if !use_color() {
        colored::control::set_override(false);
    }

    let code = match std::panic::catch_unwind(run) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            error(&e);
            1
        }
        Err(_) => {
            error("An unexpected error occurred. Please report this issue.");
            1
        }
    };
    std::process::exit(code);
}
