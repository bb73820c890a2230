use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

fn retrofy() -> Command {
    let mut cmd = Command::cargo_bin("retrofy").expect("retrofy binary to be built");
    cmd.env("RETROFY_PLAIN", "true");
    cmd
}

static WALRUS: &str = "if (n := len(items)) > 3:\n    print(n)\n";
static WALRUS_CONVERTED: &str = "n = len(items)\nif n > 3:\n    print(n)\n";

#[test]
fn it_rewrites_files_in_place() -> Result<(), Box<dyn std::error::Error>> {
    let temp = assert_fs::TempDir::new()?;
    let file = temp.child("pkg/main.py");
    file.write_str(WALRUS)?;
    let notes = temp.child("pkg/notes.txt");
    notes.write_str(WALRUS)?;
    let hidden = temp.child(".venv/lib.py");
    hidden.write_str(WALRUS)?;

    retrofy()
        .current_dir(temp.path())
        .args(["convert", "pkg"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Rewriting"));

    file.assert(WALRUS_CONVERTED);
    notes.assert(WALRUS);
    hidden.assert(WALRUS);
    Ok(())
}

#[test]
fn it_checks_without_writing() -> Result<(), Box<dyn std::error::Error>> {
    let temp = assert_fs::TempDir::new()?;
    let file = temp.child("main.py");
    file.write_str(WALRUS)?;
    let clean = temp.child("clean.py");
    clean.write_str("print('hi')\n")?;

    retrofy()
        .current_dir(temp.path())
        .args(["convert", "--check", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("main.py would be rewritten"))
        .stderr(predicate::str::contains("clean.py").not());

    file.assert(WALRUS);
    Ok(())
}

#[test]
fn it_converts_stdin() {
    retrofy()
        .args(["convert", "--stdin"])
        .write_stdin("match x:\n    case 1:\n        one()\n")
        .assert()
        .success()
        .stdout("if x == 1:\n    one()\n");
}

#[test]
fn it_runs_only_the_requested_passes() {
    retrofy()
        .args(["convert", "--stdin", "--only", "union"])
        .write_stdin("def f(x: int | None):\n    return (y := x)\n")
        .assert()
        .success()
        .stdout("import typing\ndef f(x: typing.Union[int, None]):\n    return (y := x)\n");

    retrofy()
        .args(["convert", "--stdin", "--only", "nonsense"])
        .write_stdin("")
        .assert()
        .failure();
}

#[test]
fn it_reads_the_nearest_config() -> Result<(), Box<dyn std::error::Error>> {
    let temp = assert_fs::TempDir::new()?;
    temp.child("retrofy.toml")
        .write_str("passes = [\"walrus\"]\n")?;
    let nested = temp.child("src");
    nested.create_dir_all()?;

    retrofy()
        .current_dir(nested.path())
        .args(["convert", "--stdin"])
        .write_stdin("x: int | None = (y := 1)\n")
        .assert()
        .success()
        .stdout("y = 1; x: int | None = y\n");
    Ok(())
}

#[test]
fn it_rejects_bad_configs() -> Result<(), Box<dyn std::error::Error>> {
    let temp = assert_fs::TempDir::new()?;
    let config = temp.child("retrofy.toml");

    config.write_str("retrofy-version = \">=999\"\n")?;
    retrofy()
        .current_dir(temp.path())
        .args(["convert", "--stdin"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not satisfy"));

    config.write_str("passes = [\"teleport\"]\n")?;
    retrofy()
        .args(["convert", "--stdin", "--config"])
        .arg(config.path())
        .write_stdin("")
        .assert()
        .failure();
    Ok(())
}

#[test]
fn it_reports_errors_and_leaves_files_alone() -> Result<(), Box<dyn std::error::Error>> {
    let temp = assert_fs::TempDir::new()?;
    let broken = temp.child("broken.py");
    broken.write_str("match x:\n")?;
    let fine = temp.child("fine.py");
    fine.write_str(WALRUS)?;

    retrofy()
        .current_dir(temp.path())
        .args(["convert", "broken.py", "fine.py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken.py"))
        .stderr(predicate::str::contains("1 file(s) could not be converted"));

    broken.assert("match x:\n");
    fine.assert(WALRUS_CONVERTED);
    Ok(())
}
