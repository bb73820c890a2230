datatest_stable::harness!(test, "tests/golden", r"^.*/*.expected");

/// Every golden output ends in `assert`s, so running it checks the rewrite
/// kept the behaviour.
fn test(path: &std::path::Path) -> datatest_stable::Result<()> {
    let output = match std::process::Command::new("python3").arg(path).output() {
        Ok(output) => output,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            eprintln!("python3 not found, skipping {}", path.display());
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    Ok(())
}
