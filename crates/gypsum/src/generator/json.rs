//! The JSON backend: the build plan itself, one document per target plus a project index, for
//! tools that want to drive their own builds. Placeholders are left in place.

use gypsum_util::path::join;
use serde::Serialize;
use serde_json::json;

use super::{target_file, EmitContext, EmitError, EmitResult, EmittedFile, Emitter};
use crate::plan::{ActionStep, CopyStep, TargetPlan};

pub struct JsonEmitter;

fn to_json<T: Serialize + ?Sized>(path: String, value: &T) -> EmitResult<EmittedFile> {
    match serde_json::to_string_pretty(value) {
        Ok(mut contents) => {
            contents.push('\n');
            Ok(EmittedFile { path, contents })
        }
        Err(source) => Err(EmitError::Serialize { path, source }),
    }
}

fn target_path(cx: &EmitContext<'_>, target: &TargetPlan) -> String {
    join(cx.ctx.output_dir(), &target_file(target, "json"))
}

/// Appends one JSON document per line.
fn append_line<T: Serialize>(value: &T, out: &mut String) -> EmitResult<()> {
    let line = serde_json::to_string(value).map_err(|source| EmitError::Serialize {
        path: "<step>".to_string(),
        source,
    })?;
    out.push_str(&line);
    out.push('\n');
    Ok(())
}

impl Emitter for JsonEmitter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn emit_target(
        &self,
        cx: &EmitContext<'_>,
        target: &TargetPlan,
    ) -> EmitResult<Vec<EmittedFile>> {
        let path = cx.output_path(&target_path(cx, target));
        Ok(vec![to_json(path, target)?])
    }

    fn emit_action(
        &self,
        _cx: &EmitContext<'_>,
        _target: &TargetPlan,
        _configuration: &str,
        _index: usize,
        action: &ActionStep,
        out: &mut String,
    ) -> EmitResult<()> {
        append_line(action, out)
    }

    fn emit_copy(
        &self,
        _cx: &EmitContext<'_>,
        _target: &TargetPlan,
        _configuration: &str,
        copy: &CopyStep,
        out: &mut String,
    ) -> EmitResult<()> {
        append_line(copy, out)
    }

    fn finalize(&self, cx: &EmitContext<'_>) -> EmitResult<Vec<EmittedFile>> {
        let targets: Vec<_> = cx
            .plan
            .targets
            .iter()
            .map(|target| {
                json!({
                    "name": target.name.to_string(),
                    "type": target.target_type,
                    "file": target_path(cx, target),
                    "product": target.product,
                    "prerequisites": target.prerequisites,
                })
            })
            .collect();
        let project = json!({
            "configurations": cx.plan.configurations,
            "build_files": cx.plan.build_files,
            "targets": targets,
        });
        let path = cx.output_path(&join(cx.ctx.output_dir(), "project.json"));
        Ok(vec![to_json(path, &project)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::BuildPath;

    #[test]
    fn steps_as_lines() {
        let copy = CopyStep {
            source: BuildPath::source("data/a.txt"),
            destination: BuildPath::product("a.txt"),
        };
        let mut out = String::new();
        append_line(&copy, &mut out).unwrap();
        append_line(&copy, &mut out).unwrap();
        assert_eq!(out.lines().count(), 2);
        let value: serde_json::Value = serde_json::from_str(out.lines().next().unwrap()).unwrap();
        assert_eq!(value["destination"]["root"], "product");
        assert_eq!(value["source"]["path"], "data/a.txt");
    }
}
