use std::path::Path;

datatest_stable::harness!(test, "tests/golden", r"^.*/*.py");

fn test(path: &Path) -> datatest_stable::Result<()> {
    let expected = std::fs::read_to_string(path)?;
    let module = retrofy_cst::Module::parse(&expected)
        .map_err(|err| err.into_report(&path.to_string_lossy(), expected.clone()))?;
    let actual = module.render();
    if actual != expected {
        return Err(DiffError { expected, actual }.into());
    }
    Ok(())
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
