use crate::common;
use clap::{builder::PossibleValuesParser, value_parser, Arg, ArgAction, ArgMatches, Command};
use miette::{bail, IntoDiagnostic, Result, WrapErr};
use retrofy_config::{find_config, read_config, Config, Pass};
use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

pub fn command(name: &'static str) -> Command {
    Command::new(name)
        .about("Rewrite Python code to run on older interpreters")
        .arg(
            Arg::new("stdin")
                .long("stdin")
                .help("Read source from stdin and write the result to stdout")
                .action(ArgAction::SetTrue)
                .conflicts_with("paths"),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .help("Report what would be rewritten, without writing anything")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("only")
                .long("only")
                .value_name("PASS")
                .help("Only run the named pass (repeatable)")
                .action(ArgAction::Append)
                .value_parser(PossibleValuesParser::new(Pass::ALL.map(Pass::name))),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Use this config instead of the nearest retrofy.toml")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("paths")
                .value_name("PATHS")
                .help("Files, or directories to search for *.py files")
                .num_args(1..)
                .value_parser(value_parser!(PathBuf)),
        )
}

pub fn run(matches: &ArgMatches, version: &semver::Version) -> Result<()> {
    let config = get_config(matches, version)?;
    let check = matches.get_flag("check");

    if matches.get_flag("stdin") {
        let mut contents = String::new();
        io::stdin()
            .read_to_string(&mut contents)
            .into_diagnostic()?;
        let converted = convert(&config, "stdin", &contents)?;
        if check {
            if converted != contents {
                bail!("stdin would be rewritten");
            }
        } else {
            io::stdout()
                .write_all(converted.as_bytes())
                .into_diagnostic()?;
        }
        return Ok(());
    }

    let Some(paths) = matches.get_many::<PathBuf>("paths") else {
        bail!("specify `--stdin` or some paths to convert")
    };
    let mut failed = 0;
    let mut would_change = 0;
    for path in paths {
        for file in common::python_files(path)? {
            match convert_path(&config, &file) {
                Err(report) => {
                    eprintln!("{:?}", report);
                    failed += 1;
                }
                Ok((converted, original)) if converted != original => {
                    if check {
                        eprintln!("{} would be rewritten", file.display());
                        would_change += 1;
                    } else {
                        eprintln!("Rewriting {}", file.display());
                        fs::write(&file, converted)
                            .into_diagnostic()
                            .wrap_err(format!("error writing {}", file.display()))?;
                    }
                }
                Ok(_) => {
                    tracing::debug!(path = %file.display(), "nothing to rewrite");
                }
            }
        }
    }
    if failed > 0 {
        bail!("{failed} file(s) could not be converted");
    }
    if would_change > 0 {
        bail!("{would_change} file(s) would be rewritten");
    }
    Ok(())
}

/// The `--config` file or the nearest `retrofy.toml`, with `--only` applied.
fn get_config(matches: &ArgMatches, version: &semver::Version) -> Result<Config> {
    let config_path = match matches.get_one::<PathBuf>("config") {
        Some(path) => Some(path.clone()),
        None => {
            let cwd = std::env::current_dir().into_diagnostic()?;
            find_config(&cwd)
        }
    };
    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "reading config");
            read_config(path)?
        }
        None => Config::default(),
    };
    config.check_version(version)?;

    if let Some(only) = matches.get_many::<String>("only") {
        let mut passes = only
            .map(|name| Pass::from_str(name).map_err(|err| miette::miette!("{err}")))
            .collect::<Result<Vec<_>>>()?;
        passes.sort();
        passes.dedup();
        config.passes = passes;
    }
    Ok(config)
}

fn convert_path(config: &Config, path: &Path) -> Result<(String, String)> {
    let original = fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err(format!("error reading {}", path.display()))?;
    let converted = convert(config, &path.to_string_lossy(), &original)?;
    Ok((converted, original))
}

pub fn convert(config: &Config, name: &str, contents: &str) -> Result<String> {
    retrofy_desugar::convert_with(config, contents)
        .map_err(|err| err.into_report(name, contents.to_string()))
}
