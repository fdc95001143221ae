//! Backends. Each one turns the build plan into its build tool's own files.
//!
//! Targets render independently and in parallel; the manifest that ties them together is
//! rendered once every target is done.

pub mod json;
pub mod make;
pub mod ninja;
pub mod ninja_syntax;

use std::fs;
use std::path::Path;

use gypsum_util::path::{join, normalize, relative_to};
use itertools::Itertools;
use phf::phf_map;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::context::BuildContext;
use crate::plan::{ActionStep, BuildPlan, ConfigSettings, CopyStep, TargetPlan};

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("could not write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{backend}: {setting} = {value} in {target} has no translation")]
    UnsupportedSetting {
        backend: &'static str,
        setting: String,
        value: String,
        target: String,
    },
    #[error("unknown format {0}, expected one of: {known}", known = known_formats())]
    UnknownFormat(String),
    #[error("could not serialize {path}: {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl EmitError {
    pub fn kind(&self) -> &'static str {
        match self {
            EmitError::Io { .. } => "IOError",
            EmitError::UnsupportedSetting { .. } => "UnsupportedSettingError",
            EmitError::UnknownFormat(_) | EmitError::Serialize { .. } => "GypError",
        }
    }
}

pub type EmitResult<T> = Result<T, EmitError>;

/// A generated file, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    /// Relative to the working directory.
    pub path: String,
    pub contents: String,
}

/// What every backend reads.
pub struct EmitContext<'a> {
    pub ctx: &'a BuildContext,
    pub plan: &'a BuildPlan,
    /// The toplevel directory, relative to the working directory.
    pub depth: String,
    /// Where generated files go, relative to the working directory.
    pub output_root: String,
}

impl<'a> EmitContext<'a> {
    pub fn new(ctx: &'a BuildContext, plan: &'a BuildPlan) -> Self {
        EmitContext {
            ctx,
            plan,
            depth: ctx.depth(),
            output_root: ctx.output_root(),
        }
    }

    /// The build directory of `configuration`, relative to the toplevel directory.
    pub fn build_dir(&self, configuration: &str) -> String {
        let output_root = relative_to(&self.output_root, &self.depth);
        join(&output_root, &join(self.ctx.output_dir(), configuration))
    }

    /// A path relative to the output root, as the working directory sees it.
    pub fn output_path(&self, path: &str) -> String {
        join(&self.output_root, path)
    }
}

/// A build tool's backend.
pub trait Emitter: Sync {
    fn name(&self) -> &'static str;

    /// Every file one target needs.
    fn emit_target(
        &self,
        cx: &EmitContext<'_>,
        target: &TargetPlan,
    ) -> EmitResult<Vec<EmittedFile>>;

    /// Append the statements that run `action` in `configuration` to `out`.
    fn emit_action(
        &self,
        cx: &EmitContext<'_>,
        target: &TargetPlan,
        configuration: &str,
        index: usize,
        action: &ActionStep,
        out: &mut String,
    ) -> EmitResult<()>;

    fn emit_copy(
        &self,
        cx: &EmitContext<'_>,
        target: &TargetPlan,
        configuration: &str,
        copy: &CopyStep,
        out: &mut String,
    ) -> EmitResult<()>;

    /// The manifests that tie the per-target files together, written last.
    fn finalize(&self, cx: &EmitContext<'_>) -> EmitResult<Vec<EmittedFile>>;
}

pub static EMITTERS: phf::Map<&'static str, &'static dyn Emitter> = phf_map! {
    "json" => &json::JsonEmitter as &dyn Emitter,
    "make" => &make::MakeEmitter as &dyn Emitter,
    "ninja" => &ninja::NinjaEmitter as &dyn Emitter,
};

fn known_formats() -> String {
    EMITTERS.keys().copied().sorted().join(", ")
}

pub fn emitter(format: &str) -> EmitResult<&'static dyn Emitter> {
    EMITTERS
        .get(format)
        .copied()
        .ok_or_else(|| EmitError::UnknownFormat(format.to_string()))
}

/// Render and write every file of one backend. Per-target files are rendered in parallel and
/// written before the manifests, so a manifest never refers to a file that is missing.
pub fn emit(emitter: &dyn Emitter, cx: &EmitContext<'_>) -> EmitResult<Vec<String>> {
    info!(
        "{}: generating {} targets",
        emitter.name(),
        cx.plan.targets.len()
    );
    let rendered: Vec<Vec<EmittedFile>> = cx
        .plan
        .targets
        .par_iter()
        .map(|target| emitter.emit_target(cx, target))
        .collect::<EmitResult<_>>()?;

    let mut written = Vec::new();
    for file in rendered.into_iter().flatten() {
        write_file(&file)?;
        written.push(file.path);
    }
    for file in emitter.finalize(cx)? {
        write_file(&file)?;
        written.push(file.path);
    }
    Ok(written)
}

/// Write `file`, leaving it untouched if it already has these contents so that build tools do
/// not see a spurious change.
pub fn write_file(file: &EmittedFile) -> EmitResult<()> {
    let io_error = |source| EmitError::Io {
        path: file.path.clone(),
        source,
    };
    let path = Path::new(&file.path);
    if fs::read_to_string(path).is_ok_and(|existing| existing == file.contents) {
        debug!("{} is up to date", file.path);
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, &file.contents).map_err(io_error)?;
    info!("wrote {}", file.path);
    Ok(())
}

/// Compiler flags for the backend-neutral switches of one configuration.
pub fn generic_cflags(
    backend: &'static str,
    target: &TargetPlan,
    settings: &ConfigSettings,
) -> EmitResult<Vec<String>> {
    let mut flags = Vec::new();
    for (setting, value) in &settings.generic {
        let flag = match (setting.as_str(), value.as_str()) {
            ("warnings_as_errors" | "debug_info", "0" | "false") => None,
            ("warnings_as_errors", "1" | "true") => Some("-Werror"),
            ("debug_info", "1" | "true") => Some("-g"),
            ("optimization", "none") => Some("-O0"),
            ("optimization", "speed") => Some("-O2"),
            ("optimization", "size") => Some("-Os"),
            ("optimization", "debug") => Some("-Og"),
            _ => {
                return Err(EmitError::UnsupportedSetting {
                    backend,
                    setting: setting.clone(),
                    value: value.clone(),
                    target: target.name.to_string(),
                });
            }
        };
        flags.extend(flag.map(str::to_string));
    }
    Ok(flags)
}

/// Where generated per-target files go under a backend's own root: next to the build file's
/// path, named after the target and toolset.
pub fn target_file(target: &TargetPlan, extension: &str) -> String {
    normalize(&join(
        &target.base,
        &format!("{}.{}.{extension}", target.name.name, target.name.toolset),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::BuildPath;
    use crate::target::{QualifiedTarget, TargetType, Toolset};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn target() -> TargetPlan {
        TargetPlan {
            name: QualifiedTarget::new("src/a.gyp", "a", Toolset::target()),
            target_type: TargetType::Executable,
            base: "src".to_string(),
            actions: vec![],
            copies: vec![],
            compiles: vec![],
            link: None,
            product: BuildPath::product("a"),
            prerequisites: vec![],
            configurations: IndexMap::new(),
        }
    }

    #[test]
    fn generic_settings() {
        let mut settings = ConfigSettings::default();
        settings.generic.insert("optimization".to_string(), "size".to_string());
        settings.generic.insert("warnings_as_errors".to_string(), "1".to_string());
        settings.generic.insert("debug_info".to_string(), "0".to_string());
        assert_eq!(
            generic_cflags("ninja", &target(), &settings).unwrap(),
            vec!["-Os", "-Werror"]
        );

        settings.generic.insert("optimization".to_string(), "fastest".to_string());
        let err = generic_cflags("ninja", &target(), &settings).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedSettingError");
        assert_eq!(
            err.to_string(),
            "ninja: optimization = fastest in src/a.gyp:a#target has no translation"
        );
    }

    #[test]
    fn registry() {
        assert_eq!(emitter("ninja").unwrap().name(), "ninja");
        let err = emitter("xcode").err().unwrap();
        assert!(matches!(err, EmitError::UnknownFormat(_)));
        assert_eq!(
            err.to_string(),
            "unknown format xcode, expected one of: json, make, ninja"
        );
        assert_eq!(target_file(&target(), "mk"), "src/a.target.mk");
    }
}
