mod common;
mod convert;

use clap::{ArgMatches, Command};
use miette::{IntoDiagnostic, Result};

static SUBCOMMAND_CONVERT: &str = "convert";

fn command() -> Command {
    Command::new("retrofy")
        .bin_name("retrofy")
        .version(env!("CARGO_PKG_VERSION"))
        .disable_help_subcommand(true)
        .subcommand_required(true)
        .about("new Python syntax for old Python interpreters")
        .subcommand(convert::command(SUBCOMMAND_CONVERT).display_order(0))
}

fn run(matches: &ArgMatches) -> Result<()> {
    if let Some(matches) = matches.subcommand_matches(SUBCOMMAND_CONVERT) {
        let version = semver::Version::parse(env!("CARGO_PKG_VERSION")).into_diagnostic()?;
        convert::run(matches, &version)
    } else {
        unreachable!()
    }
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("{:?}", err);
        std::process::exit(1);
    }
    std::process::exit(0);
}

fn try_main() -> Result<()> {
    // NOTE: catches internal errors that aren't _supposed_ to blow up
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("well that wasn't supposed to happen...\n");
        eprintln!("{}\n", panic_info);
        eprintln!("please report this as a bug, with the input that caused it")
    }));

    miette::set_hook(Box::new(|_diagnostic| {
        Box::new(
            miette::GraphicalReportHandler::new().with_theme(if common::is_plain() {
                miette::GraphicalTheme::unicode_nocolor()
            } else {
                miette::GraphicalTheme::unicode()
            }),
        )
    }))
    .into_diagnostic()?;

    common::init_logging();

    let matches = command().get_matches();
    tracing::debug!("{}", std::env::args().collect::<Vec<_>>().join(" "));
    run(&matches)
}
