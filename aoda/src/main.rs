use aoda::command_argument_builder;
use aoda::handlers::{
    checks_path, handle_batch, handle_checks_list, handle_checks_reset, handle_checks_set,
    handle_scan, handle_scans_list, handle_scans_show,
};
use aoda_core::Settings;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let matches = command_argument_builder().get_matches();
    let quiet = matches.get_flag("quiet");
    let verbose = matches.get_flag("verbose");

    let default_filter = if verbose { "debug" } else if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = match Settings::load_with_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let outcome = match matches.subcommand() {
        Some(("scan", args)) => handle_scan(args, &settings, quiet).await,
        Some(("batch", args)) => handle_batch(args, &settings, quiet).await,
        Some(("checks", args)) => {
            let path = checks_path(args);
            let result = match args.subcommand() {
                Some(("list", sub)) => handle_checks_list(sub, &path),
                Some(("set", sub)) => handle_checks_set(sub, &path),
                Some(("reset", sub)) => handle_checks_reset(sub, &path),
                _ => unreachable!("clap should ensure we don't get here"),
            };
            result.map(|_| true)
        }
        Some(("scans", args)) => {
            let result = match args.subcommand() {
                Some(("list", _)) => handle_scans_list(args),
                Some(("show", sub)) => handle_scans_show(sub, args),
                _ => unreachable!("clap should ensure we don't get here"),
            };
            result.map(|_| true)
        }
        _ => unreachable!("clap should ensure we don't get here"),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    }
}
