use std::path::Path;

use gypsum_syntax::{parse_document, Value};

use crate::{process_document, CommandRunner, EvalResult, Phase, VariableScope};

mod commands;
mod conditions;
mod expansion;

pub(crate) fn eval_in(
    text: &str,
    scope: &VariableScope,
    phase: Phase,
    runner: &CommandRunner,
    build_file: &Path,
) -> EvalResult<Value> {
    let Value::Mapping(mut doc) = parse_document(text).unwrap() else {
        panic!("build file must be a dict");
    };
    process_document(&mut doc, phase, scope, runner, build_file)?;
    Ok(Value::Mapping(doc))
}

pub(crate) fn eval_with(text: &str, scope: &VariableScope, phase: Phase) -> EvalResult<Value> {
    eval_in(
        text,
        scope,
        phase,
        &CommandRunner::default(),
        Path::new("test.gyp"),
    )
}

pub(crate) fn eval(text: &str) -> EvalResult<Value> {
    eval_with(text, &VariableScope::new(), Phase::Early)
}
