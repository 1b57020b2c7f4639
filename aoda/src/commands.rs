use clap::{arg, command};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub const DEFAULT_STORE_DIR: &str = "~/.config/aoda/scans";
pub const DEFAULT_CHECKS_FILE: &str = "~/.config/aoda/checks.json";

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("aoda")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("aoda")
        .about("Crawl a website and audit every page for accessibility violations")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress progress output").required(false))
        .arg(arg!(-v --"verbose" "Enable debug logging").required(false))
        .subcommand_required(true)
        .subcommand(
            scan_options(
                command!("scan")
                    .about("Crawl a site from a seed URL and audit every page")
                    .arg(
                        arg!(-u --"url" <URL>)
                            .required(false)
                            .required_unless_present("resume")
                            .help("The https seed URL to start crawling from")
                            .conflicts_with("resume"),
                    )
                    .arg(
                        arg!(--"resume" <SCAN_ID>)
                            .required(false)
                            .help("Continue an interrupted scan from the scan store"),
                    ),
            )
            .arg(
                arg!(-o --"output" <PATH>)
                    .required(false)
                    .help("Save report to file (default: display to screen)")
                    .value_parser(clap::value_parser!(std::path::PathBuf)),
            ),
        )
        .subcommand(
            scan_options(
                command!("batch")
                    .about("Scan every URL in a file, several sites at a time")
                    .arg(
                        arg!(-H --"hosts-file" <PATH>)
                            .required(true)
                            .help("Path to a newline-delimited file of seed URLs")
                            .value_parser(clap::value_parser!(std::path::PathBuf)),
                    )
                    .arg(
                        arg!(-t --"threads" <NUM_WORKERS>)
                            .required(false)
                            .help("Number of sites scanned at once (default: AODA_BATCH_CONCURRENCY or 3)")
                            .value_parser(clap::value_parser!(usize)),
                    ),
            )
            .arg(
                arg!(-o --"output" <PATH>)
                    .required(false)
                    .help("Save the batch summary to file (default: display to screen)")
                    .value_parser(clap::value_parser!(std::path::PathBuf)),
            ),
        )
        .subcommand(
            command!("checks")
                .about("Inspect and edit the accessibility check configuration")
                .subcommand_required(true)
                .arg(checks_file_arg())
                .subcommand(
                    command!("list")
                        .about("List every known check, resolved for a user when given")
                        .arg(arg!(--"user" <USER_ID>).required(false).help("Resolve for this user")),
                )
                .subcommand(
                    command!("set")
                        .about("Change a check globally, or for one user with --user")
                        .arg(arg!(<CHECK_ID>).required(true).help("Rule id, e.g. color-contrast"))
                        .arg(
                            arg!(-s --"severity" <SEVERITY>)
                                .required(false)
                                .value_parser(["error", "warning", "alert", "disabled"]),
                        )
                        .arg(arg!(--"enable").required(false).conflicts_with("disable"))
                        .arg(arg!(--"disable").required(false).conflicts_with("enable"))
                        .arg(arg!(--"user" <USER_ID>).required(false).help("Override for this user only")),
                )
                .subcommand(
                    command!("reset")
                        .about("Remove overrides for a user")
                        .arg(arg!(--"user" <USER_ID>).required(true))
                        .arg(
                            arg!([CHECK_ID])
                                .required(false)
                                .help("Only reset this rule (default: all of the user's overrides)"),
                        ),
                ),
        )
        .subcommand(
            command!("scans")
                .about("Inspect stored scans")
                .subcommand_required(true)
                .arg(store_arg())
                .subcommand(command!("list").about("List stored scans, newest first"))
                .subcommand(
                    command!("show")
                        .about("Render the report of a stored scan")
                        .arg(arg!(<SCAN_ID>).required(true))
                        .arg(format_arg()),
                ),
        )
}

/// Crawl and audit options shared by `scan` and `batch`.
fn scan_options(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(--"max-pages" <N>)
            .required(false)
            .help("Maximum pages to scan (1-500)")
            .value_parser(clap::value_parser!(u64).range(1..=500))
            .default_value("50"),
    )
    .arg(
        arg!(--"max-depth" <N>)
            .required(false)
            .help("Maximum link depth from the seed (1-10)")
            .value_parser(clap::value_parser!(u64).range(1..=10))
            .default_value("3"),
    )
    .arg(
        arg!(--"allow-cross-domain")
            .required(false)
            .help("Follow links to other domains")
            .action(clap::ArgAction::SetTrue),
    )
    .arg(
        arg!(--"no-path-restriction")
            .required(false)
            .help("Follow links outside the seed URL's path")
            .action(clap::ArgAction::SetTrue),
    )
    .arg(
        arg!(--"screenshots")
            .required(false)
            .help("Capture element screenshots for violations")
            .action(clap::ArgAction::SetTrue),
    )
    .arg(
        arg!(--"max-screenshots" <N>)
            .required(false)
            .help("Screenshot cap per page (default: AODA_MAX_SCREENSHOTS_PER_PAGE or 5)")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(-m --"mode" <MODE>)
            .required(false)
            .help("Rule set: aoda (WCAG 2.0 A/AA) or wcag21")
            .value_parser(["aoda", "wcag21"])
            .default_value("aoda"),
    )
    .arg(
        arg!(--"user" <USER_ID>)
            .required(false)
            .help("Apply this user's check overrides"),
    )
    .arg(checks_file_arg())
    .arg(store_arg())
    .arg(format_arg())
}

fn format_arg() -> clap::Arg {
    arg!(-f --"format" <FORMAT>)
        .required(false)
        .help("Report format: text, json")
        .value_parser(["text", "json"])
        .default_value("text")
}

fn checks_file_arg() -> clap::Arg {
    arg!(-c --"checks" <PATH>)
        .required(false)
        .help("Check configuration file")
        .default_value(DEFAULT_CHECKS_FILE)
}

fn store_arg() -> clap::Arg {
    arg!(--"store" <DIR>)
        .required(false)
        .help("Directory for scan checkpoints")
        .default_value(DEFAULT_STORE_DIR)
}
