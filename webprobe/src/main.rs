use colored::Colorize;
use commands::command_argument_builder;
use tracing_subscriber::EnvFilter;
use webprobe::handlers::{handle_modules, handle_scan};

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose");

    init_tracing(quiet, verbose);

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    match chosen_command.subcommand() {
        Some(("scan", primary_command)) => handle_scan(primary_command, quiet).await,
        Some(("modules", _)) => handle_modules(),
        None => print_usage_hint(),
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

/// `-v` logs at debug, `-q` at warn, otherwise info. `RUST_LOG` still wins
/// when set.
fn init_tracing(quiet: bool, verbose: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_banner() {
    eprintln!(
        "{} {}",
        "webprobe".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_white()
    );
    eprintln!("{}", "heuristic web vulnerability scanner, for authorized testing only".dimmed());
    eprintln!();
}

fn print_usage_hint() {
    eprintln!(
        "Run {} to scan a site or {} for the module list.",
        "webprobe scan <URL>".bright_white().bold(),
        "webprobe modules".bright_white().bold()
    );
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
