use gypsum_syntax::value;
use pretty_assertions::assert_eq;

use super::Tree;
use crate::context::BuildContextBuilder;
use crate::error::GypError;
use crate::loader::{LoadError, Loader};
use gypsum_eval::CommandRunner;

fn load(tree: &Tree, build_file: &str, includes: Vec<String>) -> Result<Vec<String>, GypError> {
    let ctx = BuildContextBuilder::default()
        .build_files(vec![tree.path(build_file)])
        .includes(includes)
        .build()
        .unwrap();
    let runner = CommandRunner::new(None);
    let files = Loader::new(&ctx, &runner, "make").load_all()?;
    Ok(files.keys().cloned().collect())
}

#[test_log::test]
fn includes_merge_under_the_includer() {
    let tree = Tree::new(&[
        (
            "app/app.gyp",
            r#"
{
  'includes': ['../common.gypi'],
  'variables': {'level': 'app'},
  'targets': [{'target_name': 'app', 'type': 'none', 'level': '<(level)'}],
}
"#,
        ),
        (
            "common.gypi",
            r#"
{
  'variables': {'level': 'common', 'shared': 'yes'},
  'target_defaults': {'include_dirs': ['include'], 'shared': '<(shared)'},
}
"#,
        ),
    ]);
    let ctx = BuildContextBuilder::default()
        .build_files(vec![tree.path("app/app.gyp")])
        .build()
        .unwrap();
    let runner = CommandRunner::new(None);
    let loader = Loader::new(&ctx, &runner, "make");
    let file = loader.load_file(&tree.path("app/app.gyp"), None).unwrap();

    assert_eq!(file.included_files, vec![tree.path("common.gypi")]);
    let target = file.targets().next().unwrap();
    assert_eq!(target["level"], value!("app"));
    assert_eq!(target["shared"], value!("yes"));
    // Rebased from the include's directory to the build file's
    assert_eq!(target["include_dirs"], value!(["../include"]));
    assert_eq!(target["toolset"], value!("target"));
}

#[test_log::test]
fn forced_includes_apply_to_dependencies_too() {
    let tree = Tree::new(&[
        (
            "app.gyp",
            "{'targets': [{'target_name': 'app', 'type': 'none', \
             'dependencies': ['lib/lib.gyp:lib']}]}",
        ),
        ("lib/lib.gyp", "{'targets': [{'target_name': 'lib', 'type': 'none'}]}"),
        ("forced.gypi", "{'variables': {'forced': 1}}"),
    ]);
    let files = load(&tree, "app.gyp", vec![tree.path("forced.gypi")]).unwrap();
    assert_eq!(files, vec![tree.path("app.gyp"), tree.path("lib/lib.gyp")]);
}

#[test_log::test]
fn include_not_found() {
    let tree = Tree::new(&[("a.gyp", "{'includes': ['missing.gypi'], 'targets': []}")]);
    let err = load(&tree, "a.gyp", vec![]).unwrap_err();
    assert_eq!(err.kind(), "IncludeNotFoundError");
    assert!(err.to_string().contains("missing.gypi"), "{err}");
}

#[test_log::test]
fn cyclic_include() {
    let tree = Tree::new(&[
        ("a.gyp", "{'includes': ['one.gypi'], 'targets': []}"),
        ("one.gypi", "{'includes': ['two.gypi']}"),
        ("two.gypi", "{'includes': ['one.gypi']}"),
    ]);
    let err = load(&tree, "a.gyp", vec![]).unwrap_err();
    assert_eq!(err.kind(), "CyclicIncludeError");
    let GypError::Load(LoadError::CyclicInclude { chain }) = err else {
        panic!("unexpected error {err}");
    };
    assert_eq!(
        chain,
        vec![
            tree.path("a.gyp"),
            tree.path("one.gypi"),
            tree.path("two.gypi"),
            tree.path("one.gypi"),
        ]
    );
}

#[test_log::test]
fn parse_errors_name_the_file() {
    let tree = Tree::new(&[("bad.gyp", "{'targets': [}")]);
    let err = load(&tree, "bad.gyp", vec![]).unwrap_err();
    assert_eq!(err.kind(), "ParseError");
    assert!(err.to_string().contains("bad.gyp"), "{err}");
}

#[test_log::test]
fn toolsets_expand() {
    let tree = Tree::new(&[(
        "tools.gyp",
        "{'targets': [{'target_name': 'gen', 'type': 'executable', \
         'toolsets': ['host', 'target']}]}",
    )]);
    let ctx = BuildContextBuilder::default()
        .build_files(vec![tree.path("tools.gyp")])
        .build()
        .unwrap();
    let runner = CommandRunner::new(None);
    let file = Loader::new(&ctx, &runner, "make")
        .load_file(&tree.path("tools.gyp"), None)
        .unwrap();
    let toolsets: Vec<_> = file.targets().map(|t| t["toolset"].clone()).collect();
    assert_eq!(toolsets, vec![value!("host"), value!("target")]);
}
