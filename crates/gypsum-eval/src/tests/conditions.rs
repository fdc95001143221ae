use crate::tests::{eval, eval_with};
use crate::{EvalError, Phase, VariableScope};
use gypsum_syntax::{value, Value};
use pretty_assertions::assert_eq;

#[test_log::test]
fn chosen_branches_merge() {
    let text = r#"
{
  'variables': {'OS': 'linux'},
  'defines': ['BASE'],
  'conditions': [
    ['OS=="linux"', {'defines': ['LINUX']}, {'defines': ['OTHER']}],
    ['OS=="mac"', {'defines': ['MAC']}, 'OS=="linux"', {'defines': ['CHAINED']}],
    ['OS=="win"', {'defines': ['WIN']}],
  ],
}
"#;
    assert_eq!(
        eval(text).unwrap(),
        value!({
            "variables": {"OS": "linux"},
            "defines": ["BASE", "LINUX", "CHAINED"],
        })
    );
}

#[test_log::test]
fn else_branch_and_nesting() {
    let text = r#"
{
  'variables': {'OS': 'mac', 'use_x%': 0},
  'conditions': [
    ['OS=="linux"', {'libs': ['-ldl']}, {
      'libs': ['-framework Foundation'],
      'conditions': [
        ['use_x==0', {'cflags': ['-DNO_X']}],
      ],
    }],
  ],
}
"#;
    let out = eval(text).unwrap();
    let out = out.as_mapping().unwrap();
    assert_eq!(out["libs"], value!(["-framework Foundation"]));
    assert_eq!(out["cflags"], value!(["-DNO_X"]));
    assert!(!out.contains_key("conditions"));
}

#[test_log::test]
fn branch_sees_variables_and_expands() {
    let text = r#"
{
  'variables': {'arch': 'arm'},
  'conditions': [
    ['"<(arch)"=="arm"', {'variables': {'bits': 32}, 'defines': ['BITS=<(bits)']}],
  ],
}
"#;
    let out = eval(text).unwrap();
    assert_eq!(out.as_mapping().unwrap()["defines"], value!(["BITS=32"]));
}

#[test_log::test]
fn target_conditions_wait_for_late_phase() {
    let text = r#"
{
  'type': 'static_library',
  'target_conditions': [
    ['_type=="static_library"', {'defines': ['STATIC']}],
  ],
}
"#;
    let early = eval(text).unwrap();
    assert!(early.as_mapping().unwrap().contains_key("target_conditions"));

    let late = eval_with(text, &VariableScope::new(), Phase::Late).unwrap();
    assert_eq!(
        late,
        value!({"type": "static_library", "defines": ["STATIC"]})
    );
}

#[test_log::test]
fn errors() {
    let err = eval("{'conditions': [['nope==1', {}]]}").unwrap_err();
    assert_eq!(err.kind(), "UndefinedVariableError");

    let err = eval("{'conditions': [['1 ==', {}]]}").unwrap_err();
    assert_eq!(err.kind(), "ConditionError");

    let err = eval("{'conditions': [['1']]}").unwrap_err();
    assert!(matches!(err, EvalError::Condition { .. }));

    let err = eval("{'conditions': [['1', {}, {}, 'extra']]}").unwrap_err();
    assert!(matches!(err, EvalError::Condition { .. }));

    let err = eval("{'conditions': [['1', 'not a dict']]}").unwrap_err();
    assert!(matches!(err, EvalError::Condition { .. }));
}

#[test_log::test]
fn integer_comparisons() {
    let scope: VariableScope = [("level".to_string(), Value::Integer(2))].into_iter().collect();
    let text = r#"
{
  'conditions': [
    ['level>=2 and level<3', {'ok': 1}],
    ['level in [1, 2]', {'member': 1}],
  ],
}
"#;
    assert_eq!(
        eval_with(text, &scope, Phase::Early).unwrap(),
        value!({"ok": 1, "member": 1})
    );
}
