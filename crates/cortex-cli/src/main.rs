//! `cortex` command-line tool
//!
//! Validate mode configurations, list modes, and dry-run transition
//! sequences against the recovery ladder.

mod commands;
mod simulate;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("cortex")
        .version(cortex_core::VERSION)
        .about("Cortex mode runtime tools")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate mode configuration files")
                .arg(
                    Arg::new("file")
                        .short('f')
                        .long("file")
                        .value_parser(value_parser!(PathBuf))
                        .conflicts_with("directory")
                        .help("Validate a single configuration file"),
                )
                .arg(
                    Arg::new("directory")
                        .short('d')
                        .long("dir")
                        .default_value("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Validate every .toml/.json file in a directory"),
                )
                .arg(
                    Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .action(ArgAction::SetTrue)
                        .help("Show warnings and details for valid files"),
                ),
        )
        .subcommand(
            Command::new("modes")
                .about("List configured modes")
                .arg(config_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("simulate")
                .about("Start a coordinator from a configuration and run a transition sequence")
                .arg(config_arg())
                .arg(
                    Arg::new("sequence")
                        .long("sequence")
                        .required(true)
                        .value_delimiter(',')
                        .help("Comma-separated target modes, in order"),
                )
                .arg(
                    Arg::new("fail")
                        .long("fail")
                        .value_delimiter(',')
                        .help("Modes whose activation is forced to fail"),
                )
                .arg(
                    Arg::new("offline")
                        .long("offline")
                        .action(ArgAction::SetTrue)
                        .help("Make every upstream call fail (network modes cannot activate)"),
                )
                .arg(json_arg()),
        )
}

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Mode configuration file (.toml or .json)")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn strings(args: &ArgMatches, id: &str) -> Vec<String> {
    args.get_many::<String>(id)
        .map(|values| values.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("validate", args)) => {
            let verbose = args.get_flag("verbose");
            if let Some(file) = args.get_one::<PathBuf>("file") {
                commands::validate_file(file, verbose)
            } else {
                let dir = args
                    .get_one::<PathBuf>("directory")
                    .cloned()
                    .unwrap_or_else(|| PathBuf::from("config"));
                commands::validate_directory(&dir, verbose)
            }
        }
        Some(("modes", args)) => {
            let config = args
                .get_one::<PathBuf>("config")
                .ok_or_else(|| anyhow::anyhow!("--config is required"))?;
            commands::list_modes(config, args.get_flag("json"))
        }
        Some(("simulate", args)) => {
            let config = args
                .get_one::<PathBuf>("config")
                .ok_or_else(|| anyhow::anyhow!("--config is required"))?;
            let options = simulate::Options {
                sequence: strings(args, "sequence"),
                fail: strings(args, "fail"),
                offline: args.get_flag("offline"),
                json: args.get_flag("json"),
            };
            simulate::run(config, &options).await
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}
