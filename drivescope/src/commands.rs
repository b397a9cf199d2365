use crate::CLAP_STYLING;
use clap::{arg, command};

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("drivescope")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("drivescope")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Show debug logging")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .global(true)
                .help("Settings file (default: ~/.config/drivescope/config.json)"),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Creates the drivescope config directory, settings file and database")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location of the drivescope config directory")
                        .default_value("~/.config/drivescope/"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help(
                            "Overwrites any existing settings file and database at the specified \
                        location.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("discover").about(
                "Registers every shared drive with its drive-level sharing and starts a fresh \
                files sheet. Abandons any walk in progress.",
            ),
        )
        .subcommand(
            command!("walk")
                .about(
                    "Walks one slice of a shared drive, resuming from the checkpoint if there is \
                one.",
                )
                .arg(
                    arg!(-b --"budget" <ITEMS>)
                        .required(false)
                        .help("Maximum items to emit in this invocation")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-d --"max-depth" <DEPTH>)
                        .required(false)
                        .help("Deepest folder level to descend into (the root is 0)")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(-t --"time-budget" <SECONDS>)
                        .required(false)
                        .help("Suspend after this many seconds, once at least one item is out")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"drive" <DRIVE_ID>)
                        .required(false)
                        .help("Walk this drive instead of the next pending one"),
                )
                .arg(
                    arg!(--"all")
                        .required(false)
                        .help("Keep walking slices until every drive is done")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("status")
                .about("Shows the drive registry and walk progress")
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("export")
                .about("Exports the files sheet")
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Export format: csv, json")
                        .value_parser(["csv", "json"])
                        .default_value("csv"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Write to file (default: stdout)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("checkpoint")
                .about("Inspect or reset the walk checkpoint")
                .subcommand_required(true)
                .subcommand(command!("show").about("Shows where the live walk stands"))
                .subcommand(
                    command!("clear")
                        .about("Discards the checkpoint; the drive restarts on the next walk"),
                ),
        )
}
