use pretty_assertions::assert_eq;

use super::{build_plan, Tree};
use crate::error::GypError;
use crate::plan::{BuildPath, Language, PlanError};
use crate::target::TargetType;

#[test_log::test]
fn duplicate_basenames() {
    let tree = Tree::new(&[(
        "dup.gyp",
        r#"
{
  'targets': [
    {
      'target_name': 'lib',
      'type': 'static_library',
      'sources': ['sub1/file.c', 'sub2/file.c', 'other.c', 'README.md'],
    },
  ],
}
"#,
    )]);
    let err = build_plan(&tree.context("dup.gyp")).unwrap_err();
    assert_eq!(err.kind(), "DuplicateBasenameError");
    let GypError::Plan(PlanError::DuplicateBasename { collisions, .. }) = &err else {
        panic!("unexpected error {err}");
    };
    assert_eq!(
        collisions,
        &vec![(
            "file".to_string(),
            vec!["sub1/file.c".to_string(), "sub2/file.c".to_string()]
        )]
    );
    assert!(err.to_string().contains("sub1/file.c sub2/file.c"), "{err}");
}

#[test_log::test]
fn duplicate_outputs() {
    let tree = Tree::new(&[(
        "gen.gyp",
        r#"
{
  'targets': [
    {
      'target_name': 'one',
      'type': 'none',
      'actions': [
        {'action_name': 'a', 'outputs': ['<(PRODUCT_DIR)/x.h'], 'action': ['touch', 'x']},
      ],
    },
    {
      'target_name': 'two',
      'type': 'none',
      'copies': [{'destination': '<(PRODUCT_DIR)', 'files': ['x.h']}],
    },
  ],
}
"#,
    )]);
    let err = build_plan(&tree.context("gen.gyp")).unwrap_err();
    assert_eq!(err.kind(), "DuplicateOutputError");
    assert!(err.to_string().contains("<(PRODUCT_DIR)/x.h"), "{err}");
}

#[test_log::test]
fn executable_with_generated_sources() {
    let tree = Tree::new(&[
        (
            "src/app.gyp",
            r#"
{
  'targets': [
    {
      'target_name': 'app',
      'type': 'executable',
      'sources': ['main.cc', 'proto/msg.proto'],
      'dependencies': ['../lib/lib.gyp:util'],
      'rules': [
        {
          'rule_name': 'protoc',
          'extension': 'proto',
          'outputs': ['<(INTERMEDIATE_DIR)/<(RULE_INPUT_ROOT).pb.cc'],
          'action': ['protoc', '<(RULE_INPUT_PATH)', '--out=<(INTERMEDIATE_DIR)'],
          'process_outputs_as_sources': 1,
        },
      ],
      'configurations': {
        'Debug': {'defines': ['DEBUG'], 'debug_info': 1},
        'Release': {'optimization': 'speed'},
      },
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
      'target_name': 'util',
      'type': 'static_library',
      'sources': ['util.c'],
      'link_settings': {'libraries': ['-lm']},
    },
  ],
}
"#,
        ),
    ]);
    let plan = build_plan(&tree.context("src/app.gyp")).unwrap();
    // util only has Default; it is built with its own settings in every configuration
    assert_eq!(plan.configurations, vec!["Debug", "Release", "Default"]);
    let names: Vec<&str> = plan.targets.iter().map(|t| t.name.name.as_str()).collect();
    assert_eq!(names, vec!["util", "app"]);

    let util = &plan.targets[0];
    assert_eq!(util.product, BuildPath::product("obj/lib/libutil.a"));
    assert_eq!(util.base, "lib");

    let app = &plan.targets[1];
    assert_eq!(app.target_type, TargetType::Executable);
    assert_eq!(app.product, BuildPath::product("app"));
    assert_eq!(app.actions.len(), 1);
    let protoc = &app.actions[0];
    assert_eq!(protoc.name, "protoc");
    assert_eq!(protoc.rule_source, Some(BuildPath::source("src/proto/msg.proto")));
    assert_eq!(
        protoc.outputs,
        vec![BuildPath::product("obj/src/app.gen/msg.pb.cc")]
    );
    assert_eq!(
        protoc.command,
        "protoc proto/msg.proto \"--out=$!PRODUCT_DIR/obj/src/app.gen\""
    );

    let compiled: Vec<(&str, Language)> = app
        .compiles
        .iter()
        .map(|c| (c.object.path.as_str(), c.language))
        .collect();
    assert_eq!(
        compiled,
        vec![
            ("obj/src/app.main.o", Language::Cxx),
            ("obj/src/app.msg.pb.o", Language::Cxx),
        ]
    );

    let link = app.link.as_ref().unwrap();
    assert_eq!(link.static_libraries, vec![util.product.clone()]);
    assert_eq!(link.system_libraries, vec!["-lm"]);
    assert_eq!(app.prerequisites, vec![util.product.clone()]);

    let debug = app.settings("Debug");
    assert_eq!(debug.defines, vec!["DEBUG"]);
    assert_eq!(debug.generic.get("debug_info").map(String::as_str), Some("1"));
    let release = app.settings("Release");
    assert!(release.defines.is_empty());
    assert_eq!(release.generic.get("optimization").map(String::as_str), Some("speed"));
}

#[test_log::test]
fn single_configuration_flag() {
    let tree = Tree::new(&[(
        "a.gyp",
        "{'targets': [{'target_name': 'a', 'type': 'none', \
         'configurations': {'Debug': {}, 'Release': {}}}]}",
    )]);
    let mut ctx = tree.context("a.gyp");
    ctx.generator_flags.insert("config".to_string(), "Release".to_string());
    assert_eq!(build_plan(&ctx).unwrap().configurations, vec!["Release"]);

    ctx.generator_flags.insert("config".to_string(), "Profile".to_string());
    let err = build_plan(&ctx).unwrap_err();
    assert_eq!(err.kind(), "ConfigurationError");
}
