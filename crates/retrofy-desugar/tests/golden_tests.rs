use retrofy_desugar::{Config, Pass};
use std::{path::Path, str::FromStr};

datatest_stable::harness!(test, "tests/golden", r"^.*/*.py");

/// Files under `tests/golden/<pass>/` run that pass alone,
/// files under `tests/golden/all/` run the whole pipeline.
fn test(path: &Path) -> datatest_stable::Result<()> {
    let input = std::fs::read_to_string(path)?;
    let name = path.to_string_lossy();
    let pass = path
        .parent()
        .and_then(Path::file_name)
        .map(|dir| dir.to_string_lossy().into_owned())
        .ok_or("golden files live in a directory named after their pass")?;

    let actual = rewrite(&pass, &name, &input)?;

    let expected_path = path.with_extension("expected");
    if std::env::var("UPDATE_GOLDEN").is_ok() {
        std::fs::write(&expected_path, &actual)?;
        return Ok(());
    }
    let expected = std::fs::read_to_string(&expected_path)?;
    if actual != expected {
        return Err(DiffError { expected, actual }.into());
    }

    // Running again over the output changes nothing.
    let again = rewrite(&pass, &expected_path.to_string_lossy(), &expected)?;
    if again != expected {
        return Err(DiffError {
            expected,
            actual: again,
        }
        .into());
    }
    Ok(())
}

fn rewrite(pass: &str, name: &str, input: &str) -> datatest_stable::Result<String> {
    if pass == "all" {
        return retrofy_desugar::convert(input)
            .map_err(|err| format!("{:?}", err.into_report(name, input.to_string())).into());
    }
    let pass = Pass::from_str(pass)?;
    let module = retrofy_cst::Module::parse(input).map_err(|err| {
        let report = miette::Report::new(err.into_report(name, input.to_string()));
        format!("{:?}", report)
    })?;
    let module = retrofy_desugar::run_pass(&Config::default(), pass, module)?;
    Ok(module.render())
}

struct DiffError {
    expected: String,
    actual: String,
}

impl std::fmt::Debug for DiffError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::fmt::Display for DiffError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let diff = similar_asserts::SimpleDiff::from_str(
            &self.expected,
            &self.actual,
            "expected",
            "actual",
        );
        write!(f, "{}", diff)
    }
}

impl std::error::Error for DiffError {}
