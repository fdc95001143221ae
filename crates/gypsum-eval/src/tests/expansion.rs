use crate::tests::{eval, eval_with};
use crate::{EvalError, Phase, VariableScope};
use gypsum_syntax::{value, Value};
use pretty_assertions::assert_eq;

#[test_log::test]
fn variables_and_defaults() {
    let text = r#"
{
  'variables': {'arch%': 'x64', 'name': 'foo'},
  'defines': ['ARCH=<(arch)', 'NAME_<(name)'],
}
"#;
    assert_eq!(
        eval(text).unwrap(),
        value!({
            "variables": {"arch%": "x64", "name": "foo"},
            "defines": ["ARCH=x64", "NAME_foo"],
        })
    );

    // A default never overrides a variable set from outside
    let scope: VariableScope = [("arch".to_string(), Value::from("arm"))].into_iter().collect();
    let out = eval_with(text, &scope, Phase::Early).unwrap();
    assert_eq!(
        out.as_mapping().unwrap()["defines"],
        value!(["ARCH=arm", "NAME_foo"])
    );
}

#[test_log::test]
fn variables_reference_each_other() {
    let text = r#"
{
  'variables': {
    'root': 'out',
    'gen': '<(root)/gen',
    'variables': {'nested%': 'inner'},
    'nested%': '<(nested)',
  },
  'outputs': ['<(gen)/a.h', '<(nested)'],
}
"#;
    let out = eval(text).unwrap();
    assert_eq!(
        out.as_mapping().unwrap()["outputs"],
        value!(["out/gen/a.h", "inner"])
    );
}

#[test_log::test]
fn list_expansion_splices() {
    let text = r#"
{
  'variables': {'libs': ['-lz', '-lm', 'with space']},
  'ldflags': ['-g', '<@(libs)', '-O2'],
  'joined': '<(libs)',
}
"#;
    let out = eval(text).unwrap();
    let out = out.as_mapping().unwrap();
    assert_eq!(out["ldflags"], value!(["-g", "-lz", "-lm", "with space", "-O2"]));
    assert_eq!(out["joined"], value!("-lz -lm \"with space\""));
}

#[test_log::test]
fn automatic_variables() {
    let text = r#"
{
  'target_name': 'foo',
  'sources': ['a.c', 'b.c'],
  'product': 'lib<(_target_name)',
  'inputs': ['<@(_sources)'],
}
"#;
    let out = eval(text).unwrap();
    let out = out.as_mapping().unwrap();
    assert_eq!(out["product"], value!("libfoo"));
    assert_eq!(out["inputs"], value!(["a.c", "b.c"]));
}

#[test_log::test]
fn canonical_integers() {
    let text = r#"
{
  'variables': {'n': 3},
  'count': '<(n)',
  'prefixed': '1<(n)',
  'padded': '0<(n)',
  'untouched': '7',
}
"#;
    let out = eval(text).unwrap();
    let out = out.as_mapping().unwrap();
    assert_eq!(out["count"], Value::Integer(3));
    assert_eq!(out["prefixed"], Value::Integer(13));
    assert_eq!(out["padded"], value!("03"));
    assert_eq!(out["untouched"], value!("7"));
}

#[test_log::test]
fn unbalanced_reference_is_literal() {
    let out = eval("{'a': 'x <(y'}").unwrap();
    assert_eq!(out, value!({"a": "x <(y"}));
}

#[test_log::test]
fn phases() {
    let text = "{'a': '>(late)', 'b': '<(early)', 'c': '>@(list)'}";
    let scope: VariableScope = [
        ("early".to_string(), Value::from("E")),
        ("late".to_string(), Value::from("L")),
    ]
    .into_iter()
    .collect();

    let early = eval_with(text, &scope, Phase::Early).unwrap();
    assert_eq!(early, value!({"a": ">(late)", "b": "E", "c": ">@(list)"}));

    let text = "{'a': '>(late)', 'flags': ['>@(list)']}";
    let mut scope = scope;
    scope.set("list", value!(["x", "y"]));
    let late = eval_with(text, &scope, Phase::Late).unwrap();
    assert_eq!(late, value!({"a": "L", "flags": ["x", "y"]}));
}

#[test_log::test]
fn undefined_variable() {
    let err = eval("{'a': '<(nope)'}").unwrap_err();
    assert_eq!(err.kind(), "UndefinedVariableError");
    assert!(matches!(err, EvalError::UndefinedVariable { ref name, .. } if name == "nope"));
}

#[test_log::test]
fn self_reference_overflows() {
    let err = eval("{'variables': {'a': '<(b)', 'b': '<(a)'}, 'c': '<(a)'}").unwrap_err();
    assert_eq!(err.kind(), "VariableExpansionOverflowError");
}

#[test_log::test]
fn list_expansion_must_stand_alone() {
    let err = eval("{'variables': {'l': ['x']}, 'bad': ['pre<@(l)']}").unwrap_err();
    assert_eq!(err.kind(), "VariableExpansionError");

    let err = eval("{'variables': {'l': ['x']}, 'bad': '<@(l)'}").unwrap_err();
    assert!(matches!(err, EvalError::InvalidExpansion { .. }));
}
