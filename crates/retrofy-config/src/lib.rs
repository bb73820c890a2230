//! # The retrofy config file
#![warn(missing_docs)]

mod pass;
#[cfg(test)]
mod tests;
mod version;

use indexmap::IndexMap;
use miette::{Diagnostic, IntoDiagnostic, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use pass::*;
pub use version::*;

/// `"retrofy.toml"`
pub static CONFIG_FILE_NAME: &str = "retrofy.toml";

/// Feature name to the first Python version whose `typing` module has it.
pub type FeatureTable = IndexMap<String, PythonVersion>;

/// Retrofy configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional retrofy version requirement.
    #[serde(rename = "retrofy-version")]
    pub required_retrofy_version: Option<semver::VersionReq>,

    /// The rewriters to run. They always run in pipeline order, whatever the
    /// order they are listed in.
    #[serde(default = "Pass::defaults")]
    pub passes: Vec<Pass>,

    /// `typing` features that need a `typing_extensions` fallback.
    #[serde(
        default = "default_typing_extensions",
        rename = "typing-extensions"
    )]
    pub typing_extensions: FeatureTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            required_retrofy_version: None,
            passes: Pass::defaults(),
            typing_extensions: default_typing_extensions(),
        }
    }
}

impl Config {
    /// Parse a config from TOML source.
    pub fn parse(name: &str, input: &str) -> Result<Self, ParseError> {
        toml::from_str(input).map_err(|toml_error| {
            let location = toml_error
                .line_col()
                .map(|(line, col)| miette::SourceOffset::from_location(input, line + 1, col + 1));
            match location {
                Some(offset) => ParseError::Located {
                    input: miette::NamedSource::new(name, input.to_string()),
                    location: (offset.offset(), 0).into(),
                    description: toml_error.to_string(),
                },
                None => ParseError::Unlocated {
                    description: toml_error.to_string(),
                },
            }
        })
    }

    /// Should `pass` run?
    pub fn runs(&self, pass: Pass) -> bool {
        self.passes.contains(&pass)
    }

    /// Check the `retrofy-version` requirement against the running version.
    pub fn check_version(&self, current: &semver::Version) -> Result<(), VersionMismatch> {
        match &self.required_retrofy_version {
            Some(required) if !required.matches(current) => Err(VersionMismatch {
                required: required.clone(),
                current: current.clone(),
            }),
            _ => Ok(()),
        }
    }
}

/// The default `[typing-extensions]` table.
pub fn default_typing_extensions() -> FeatureTable {
    IndexMap::from_iter([
        (String::from("Literal"), PythonVersion::new(3, 8)),
        (String::from("final"), PythonVersion::new(3, 8)),
        (String::from("get_args"), PythonVersion::new(3, 10)),
        (String::from("get_origin"), PythonVersion::new(3, 10)),
        (String::from("TypeAlias"), PythonVersion::new(3, 10)),
    ])
}

/// A malformed config file.
#[derive(Error, Debug, Diagnostic)]
pub enum ParseError {
    /// An error we can point at.
    #[error("{description}")]
    #[diagnostic(severity(Error))]
    Located {
        /// The config source.
        #[source_code]
        input: miette::NamedSource,
        /// Where it went wrong.
        #[label("here")]
        location: miette::SourceSpan,
        /// What went wrong.
        description: String,
    },
    /// An error without a location.
    #[error("{description}")]
    #[diagnostic(severity(Error))]
    Unlocated {
        /// What went wrong.
        description: String,
    },
}

/// The running retrofy doesn't satisfy `retrofy-version`.
#[derive(Error, Debug, Diagnostic)]
#[error("retrofy {current} does not satisfy the required version {required}")]
#[diagnostic(severity(Error), help("install a retrofy version that satisfies the requirement"))]
pub struct VersionMismatch {
    /// The requirement from the config.
    pub required: semver::VersionReq,
    /// The running version.
    pub current: semver::Version,
}

/// Read in a config file.
pub fn read_config<P: AsRef<Path>>(path: P) -> miette::Result<Config> {
    let contents = std::fs::read_to_string(&path)
        .into_diagnostic()
        .wrap_err(format!(
            "error reading config at {:?}",
            path.as_ref().as_os_str()
        ))?;

    Config::parse(&path.as_ref().to_string_lossy(), &contents)
        .map_err(miette::Report::from)
        .wrap_err(format!(
            "error reading config at {:?}",
            path.as_ref().as_os_str()
        ))
}

/// Look for a config file in `start` and its ancestors.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|path| path.is_file())
}
