use colored::Colorize;
use drivescope::command_argument_builder;
use drivescope::handlers::{
    handle_checkpoint_clear, handle_checkpoint_show, handle_discover, handle_export, handle_init,
    handle_status, handle_walk,
};
use drivescope_core::print_banner;
use tracing::Level;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let level = if chosen_command.get_flag("verbose") {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // Logs go to stderr so exports on stdout stay clean
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    let result = match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("discover", primary_command)) => handle_discover(primary_command).await,
        Some(("walk", primary_command)) => handle_walk(primary_command).await,
        Some(("status", primary_command)) => handle_status(primary_command),
        Some(("export", primary_command)) => handle_export(primary_command),
        Some(("checkpoint", primary_command)) => match primary_command.subcommand() {
            Some(("show", secondary_command)) => handle_checkpoint_show(secondary_command),
            Some(("clear", secondary_command)) => handle_checkpoint_clear(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
