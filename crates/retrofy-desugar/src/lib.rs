#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

mod build;
mod builtin_generics;
mod dataclass;
mod error;
pub mod imports;
mod match_statement;
mod type_alias;
mod typing_extensions;
mod union;
mod walrus;

pub use error::{DesugarError, DesugarErrorReport, Error};
pub use retrofy_config::{Config, FeatureTable, Pass, PythonVersion};
use retrofy_cst::Module;

/// Rewrite `source` with every default pass.
pub fn convert(source: &str) -> Result<String, Error> {
    convert_with(&Config::default(), source)
}

/// Rewrite `source` with the passes `config` enables, in pipeline order.
pub fn convert_with(config: &Config, source: &str) -> Result<String, Error> {
    let mut module = Module::parse(source)?;
    for pass in Pass::ALL {
        if config.runs(pass) {
            module = run_pass(config, pass, module)?;
        }
    }
    Ok(module.render())
}

/// Run a single pass.
pub fn run_pass(config: &Config, pass: Pass, module: Module) -> Result<Module, DesugarError> {
    let _span = tracing::debug_span!("pass", name = pass.name()).entered();
    match pass {
        Pass::BuiltinGenerics => builtin_generics::desugar(module),
        Pass::Walrus => walrus::desugar(module),
        Pass::TypeAlias => type_alias::desugar(module),
        Pass::Dataclass => dataclass::desugar(module),
        Pass::TypingExtensions => {
            let features = typing_extensions::Features::typing(&config.typing_extensions);
            typing_extensions::desugar(module, &features)
        }
        Pass::Final => {
            typing_extensions::desugar(module, &typing_extensions::Features::final_marker())
        }
        Pass::Match => match_statement::desugar(module),
        Pass::Union => union::desugar(module),
    }
}

/// `list[int]` → `typing.List[int]` in annotations.
pub fn desugar_builtin_generics(module: Module) -> Result<Module, DesugarError> {
    run_pass(&Config::default(), Pass::BuiltinGenerics, module)
}

/// Inline assignments → assignments before the statement.
pub fn desugar_walrus(module: Module) -> Result<Module, DesugarError> {
    run_pass(&Config::default(), Pass::Walrus, module)
}

/// `type` statements → assignments and `TypeVar`s.
pub fn desugar_type_alias(module: Module) -> Result<Module, DesugarError> {
    run_pass(&Config::default(), Pass::TypeAlias, module)
}

/// `__match_args__` for dataclasses.
pub fn desugar_dataclass(module: Module) -> Result<Module, DesugarError> {
    run_pass(&Config::default(), Pass::Dataclass, module)
}

/// Version-guarded `typing_extensions` fallbacks, with the default feature table.
pub fn desugar_typing_extensions(module: Module) -> Result<Module, DesugarError> {
    run_pass(&Config::default(), Pass::TypingExtensions, module)
}

/// A version-guarded no-op fallback for `typing.final`.
pub fn desugar_final(module: Module) -> Result<Module, DesugarError> {
    run_pass(&Config::default(), Pass::Final, module)
}

/// `match` statements → `if` chains.
pub fn desugar_match(module: Module) -> Result<Module, DesugarError> {
    run_pass(&Config::default(), Pass::Match, module)
}

/// `A | B` annotations → `typing.Union[A, B]`.
pub fn desugar_union(module: Module) -> Result<Module, DesugarError> {
    run_pass(&Config::default(), Pass::Union, module)
}

/// The indentation unit for new blocks.
pub(crate) fn block_indent(module: &Module) -> String {
    if module.default_indent.is_empty() {
        String::from("    ")
    } else {
        module.default_indent.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_leaves_plain_code_untouched() {
        let source = "\"\"\"Docs.\"\"\"\n\nimport os  # why\n\n\ndef main(argv):\n    for arg in argv[1:]:\n        print(arg, end='')\n";
        similar_asserts::assert_eq!(convert(source).unwrap(), source);
    }

    #[test]
    fn it_runs_only_configured_passes() {
        let config = Config::parse("retrofy.toml", "passes = [\"union\"]\n").unwrap();
        let source = "def f(x: int | None, y: list[int]):\n    return (z := x)\n";
        similar_asserts::assert_eq!(
            convert_with(&config, source).unwrap(),
            "import typing\ndef f(x: typing.Union[int, None], y: list[int]):\n    return (z := x)\n"
        );
    }

    #[test]
    fn it_reports_syntax_errors() {
        assert!(matches!(convert("match x:\n"), Err(Error::Parse(_))));
    }
}
