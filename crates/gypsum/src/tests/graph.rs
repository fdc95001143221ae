use gypsum_syntax::{value, Value};
use pretty_assertions::assert_eq;

use super::{build_graph, names, target, Tree};
use crate::error::GypError;
use crate::graph::GraphError;

#[test_log::test]
fn hard_dependency_is_built_first() {
    let tree = Tree::new(&[(
        "hard.gyp",
        r#"
{
  'targets': [
    {'target_name': 'a', 'type': 'static_library', 'sources': ['a.c']},
    {
      'target_name': 'b',
      'type': 'static_library',
      'sources': ['b.c'],
      'dependencies': ['c'],
      'export_dependent_settings': ['c'],
    },
    {
      'target_name': 'c',
      'type': 'static_library',
      'hard_dependency': 1,
      'sources': ['c.c'],
      'direct_dependent_settings': {'include_dirs': ['gen']},
    },
    {'target_name': 'd', 'type': 'static_library', 'sources': ['d.c'], 'dependencies': ['b']},
  ],
}
"#,
    )]);
    let graph = build_graph(&tree.context("hard.gyp")).unwrap();

    let d = target(&graph, "d");
    assert_eq!(names(&graph, &d.build_dependencies), vec!["c"]);
    // Imported through b's export
    let config = d.dict["configurations"].as_mapping().unwrap()["Default"].clone();
    assert_eq!(config.as_mapping().unwrap()["include_dirs"], value!(["gen"]));

    let order: Vec<&str> = graph.ordered().map(|t| t.name.name.as_str()).collect();
    let position = |name| order.iter().position(|n| *n == name).unwrap();
    assert!(position("c") < position("d"));
    // A static library keeps hard dependencies it builds against
    let b = target(&graph, "b");
    assert_eq!(names(&graph, &b.build_dependencies), vec!["c"]);
    assert!(target(&graph, "a").build_dependencies.is_empty());
}

#[test_log::test]
fn executables_wait_for_everything_they_link() {
    let tree = Tree::new(&[(
        "app.gyp",
        r#"
{
  'targets': [
    {
      'target_name': 'app',
      'type': 'executable',
      'sources': ['main.c'],
      'dependencies': ['base'],
    },
    {
      'target_name': 'base',
      'type': 'static_library',
      'sources': ['base.c'],
      'dependencies': ['zlib'],
      'libraries': ['-lm'],
    },
    {
      'target_name': 'zlib',
      'type': 'static_library',
      'sources': ['zlib.c'],
      'link_settings': {'libraries': ['-lpthread']},
    },
  ],
}
"#,
    )]);
    let graph = build_graph(&tree.context("app.gyp")).unwrap();
    let app = target(&graph, "app");
    assert_eq!(names(&graph, &app.build_dependencies), vec!["base", "zlib"]);
    assert_eq!(app.dict["libraries"], value!(["-lm", "-lpthread"]));
    assert_eq!(target(&graph, "base").dict.get("libraries"), None);
}

#[test_log::test]
fn dependency_cycle_names_every_target() {
    let tree = Tree::new(&[(
        "cycle.gyp",
        r#"
{
  'targets': [
    {'target_name': 't0', 'type': 'none', 'dependencies': ['t1']},
    {'target_name': 't1', 'type': 'none', 'dependencies': ['t2']},
    {'target_name': 't2', 'type': 'none', 'dependencies': ['t0']},
    {'target_name': 'free', 'type': 'none'},
  ],
}
"#,
    )]);
    let err = build_graph(&tree.context("cycle.gyp")).unwrap_err();
    assert_eq!(err.kind(), "DependencyCycleError");
    let GypError::Graph(GraphError::DependencyCycle { cycle }) = err else {
        panic!("unexpected error {err}");
    };
    let short: Vec<&str> = cycle
        .iter()
        .map(|c| c.rsplit(':').next().unwrap())
        .collect();
    assert_eq!(short, vec!["t0#target", "t1#target", "t2#target", "t0#target"]);
}

#[test_log::test]
fn duplicate_target() {
    let tree = Tree::new(&[(
        "dup.gyp",
        r#"
{
  'targets': [
    {'target_name': 'foo', 'type': 'none'},
    {'target_name': 'foo', 'type': 'none'},
  ],
}
"#,
    )]);
    let err = build_graph(&tree.context("dup.gyp")).unwrap_err();
    assert_eq!(err.kind(), "DuplicateTargetError");
    let message = err.to_string();
    assert!(message.contains("foo#target"), "{message}");
    assert!(message.contains("dup.gyp"), "{message}");
}

#[test_log::test]
fn duplicate_rule() {
    let tree = Tree::new(&[(
        "rules.gyp",
        r#"
{
  'targets': [
    {
      'target_name': 'gen',
      'type': 'none',
      'rules': [
        {'rule_name': 'bar', 'extension': 'in', 'outputs': ['a'], 'action': ['x']},
        {'rule_name': 'bar', 'extension': 'idl', 'outputs': ['b'], 'action': ['y']},
      ],
    },
  ],
}
"#,
    )]);
    let err = build_graph(&tree.context("rules.gyp")).unwrap_err();
    assert_eq!(err.kind(), "DuplicateRuleError");
    let message = err.to_string();
    assert!(message.contains("bar"), "{message}");
    assert!(message.contains("gen#target"), "{message}");
}

#[test_log::test]
fn missing_dependency() {
    let tree = Tree::new(&[
        (
            "app.gyp",
            "{'targets': [{'target_name': 'app', 'type': 'none', \
             'dependencies': ['lib/lib.gyp:nope']}]}",
        ),
        ("lib/lib.gyp", "{'targets': [{'target_name': 'lib', 'type': 'none'}]}"),
    ]);
    let err = build_graph(&tree.context("app.gyp")).unwrap_err();
    assert_eq!(err.kind(), "MissingDependencyError");
    assert!(err.to_string().contains("lib.gyp:nope#target"), "{err}");
}

#[test_log::test]
fn wildcard_into_own_file_skips_the_referrer() {
    let tree = Tree::new(&[(
        "w.gyp",
        r#"
{
  'targets': [
    {'target_name': 'all', 'type': 'none', 'dependencies': ['w.gyp:*']},
    {'target_name': 'x', 'type': 'none'},
    {'target_name': 'y', 'type': 'none', 'suppress_wildcard': 1},
  ],
}
"#,
    )]);
    let graph = build_graph(&tree.context("w.gyp")).unwrap();
    assert_eq!(names(&graph, &target(&graph, "all").dependencies), vec!["x"]);
}

#[test_log::test]
fn settings_cross_build_files() {
    let tree = Tree::new(&[
        (
            "app/app.gyp",
            r#"
{
  'targets': [
    {
      'target_name': 'app',
      'type': 'executable',
      'sources': ['main.c'],
      'dependencies': ['../lib/lib.gyp:*'],
    },
  ],
}
"#,
        ),
        (
            "lib/lib.gyp",
            r#"
{
  'targets': [
    {
      'target_name': 'lib',
      'type': 'static_library',
      'sources': ['lib.c'],
      'all_dependent_settings': {'defines': ['USE_LIB']},
      'direct_dependent_settings': {'include_dirs': ['include']},
    },
    {'target_name': 'tests', 'type': 'executable', 'suppress_wildcard': 1},
  ],
}
"#,
        ),
    ]);
    let graph = build_graph(&tree.context("app/app.gyp")).unwrap();
    let app = target(&graph, "app");
    assert_eq!(names(&graph, &app.dependencies), vec!["lib"]);
    let config = app.dict["configurations"].as_mapping().unwrap()["Default"]
        .as_mapping()
        .unwrap()
        .clone();
    assert_eq!(config["defines"], value!(["USE_LIB"]));
    // Rebased from lib/ to app/
    assert_eq!(config["include_dirs"], value!(["../lib/include"]));
}

#[test_log::test]
fn configurations_inherit() {
    let tree = Tree::new(&[(
        "cfg.gyp",
        r#"
{
  'target_defaults': {
    'defines': ['COMMON'],
    'configurations': {
      'Base': {'abstract': 1, 'defines': ['BASE']},
      'Debug': {'inherit_from': ['Base'], 'defines': ['DEBUG']},
      'Release': {'inherit_from': ['Base'], 'optimization': 'speed'},
    },
  },
  'targets': [{'target_name': 't', 'type': 'executable', 'sources': ['t.c']}],
}
"#,
    )]);
    let graph = build_graph(&tree.context("cfg.gyp")).unwrap();
    let t = target(&graph, "t");
    let configs: Vec<&String> = t.configurations().map(|(name, _)| name).collect();
    assert_eq!(configs, vec!["Debug", "Release"]);
    assert_eq!(t.default_configuration(), Some("Debug"));
    assert_eq!(
        t.configuration("Debug").unwrap()["defines"],
        value!(["COMMON", "BASE", "DEBUG"])
    );
    assert_eq!(
        t.configuration("Release").unwrap().get("optimization"),
        Some(&Value::from("speed"))
    );
    assert_eq!(t.dict.get("defines"), None);
}

#[test_log::test]
fn invalid_configuration_key() {
    let tree = Tree::new(&[(
        "cfg.gyp",
        "{'targets': [{'target_name': 't', 'type': 'none', \
         'configurations': {'Debug': {'sources': ['x.c']}}}]}",
    )]);
    let err = build_graph(&tree.context("cfg.gyp")).unwrap_err();
    assert_eq!(err.kind(), "ConfigurationError");
}
