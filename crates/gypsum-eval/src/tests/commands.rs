use std::fs;
use std::time::Duration;

use crate::tests::eval_in;
use crate::{CommandLine, CommandRunner, EvalError, EvalResult, Phase, VariableScope};
use gypsum_syntax::{value, Value};
use pretty_assertions::assert_eq;

fn eval_in_dir(text: &str, runner: &CommandRunner) -> (tempfile::TempDir, EvalResult<Value>) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("data.txt"), "from a file\n").unwrap();
    let build_file = dir.path().join("test.gyp");
    let out = eval_in(
        text,
        &VariableScope::new(),
        Phase::Early,
        runner,
        &build_file,
    );
    (dir, out)
}

#[test_log::test]
fn shell_commands_run_next_to_the_build_file() {
    let text = r#"
{
  'contents': '<!(cat data.txt)',
  'words': ['<!@(echo a b c)'],
  'argv': "<!(['echo', 'x  y'])",
}
"#;
    let (_dir, out) = eval_in_dir(text, &CommandRunner::default());
    assert_eq!(
        out.unwrap(),
        value!({
            "contents": "from a file",
            "words": ["a", "b", "c"],
            "argv": "x  y",
        })
    );
}

#[test_log::test]
fn command_output_is_expanded_again() {
    let text = r#"
{
  'variables': {'v': 'value'},
  'out': '<!(echo "<(v)")',
}
"#;
    let (_dir, out) = eval_in_dir(text, &CommandRunner::default());
    assert_eq!(out.unwrap().as_mapping().unwrap()["out"], value!("value"));
}

#[test_log::test]
fn failing_command() {
    let (_dir, out) = eval_in_dir("{'a': '<!(echo oops >&2; exit 3)'}", &CommandRunner::default());
    let err = out.unwrap_err();
    assert_eq!(err.kind(), "CommandEvaluationError");
    match err {
        EvalError::CommandFailed { stderr, .. } => assert_eq!(stderr, "oops"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test_log::test]
fn timeout() {
    let runner = CommandRunner::new(Some(Duration::from_millis(100)));
    let (_dir, out) = eval_in_dir("{'a': '<!(sleep 5)'}", &runner);
    assert!(matches!(out, Err(EvalError::CommandTimedOut { .. })));
}

#[test_log::test]
fn results_are_cached() {
    let dir = tempfile::tempdir().unwrap();
    let counter = dir.path().join("count");
    let runner = CommandRunner::default();
    let command = CommandLine::Shell(format!("echo x >> {0}; wc -l < {0}", counter.display()));

    let first = runner.run(&command, dir.path()).unwrap();
    let second = runner.run(&command, dir.path()).unwrap();
    assert_eq!(first.trim(), "1");
    assert_eq!(first, second);
}
