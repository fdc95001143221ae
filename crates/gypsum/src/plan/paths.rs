//! Where files live. Build files name paths relative to themselves; the plan names every path
//! relative to one of three roots, and each backend decides how to spell those roots.

use std::borrow::Cow;
use std::fmt;

use cow_utils::CowUtils;
use gypsum_util::path::{is_absolute, join, normalize};
use serde::Serialize;

use crate::target::{QualifiedTarget, TargetType};

pub const PRODUCT_DIR: &str = "$!PRODUCT_DIR";
pub const INTERMEDIATE_DIR: &str = "$!INTERMEDIATE_DIR";
pub const CONFIGURATION_NAME: &str = "$|CONFIGURATION_NAME";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathRoot {
    /// Relative to the toplevel directory (`--depth`).
    Source,
    /// Relative to the build directory of the configuration being built.
    Product,
    Absolute,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BuildPath {
    pub root: PathRoot,
    pub path: String,
}

impl BuildPath {
    pub fn source(path: impl AsRef<str>) -> Self {
        BuildPath {
            root: PathRoot::Source,
            path: normalize(path.as_ref()),
        }
    }

    pub fn product(path: impl AsRef<str>) -> Self {
        BuildPath {
            root: PathRoot::Product,
            path: normalize(path.as_ref()),
        }
    }

    pub fn absolute(path: impl AsRef<str>) -> Self {
        BuildPath {
            root: PathRoot::Absolute,
            path: normalize(path.as_ref()),
        }
    }

    /// Read a path as written in a build file whose directory is `base` (toplevel-relative).
    /// Placeholders other than the product directory must already be substituted.
    pub fn parse(text: &str, base: &str) -> Self {
        match text.strip_prefix(PRODUCT_DIR) {
            Some(rest) => BuildPath::product(rest.trim_start_matches('/')),
            None if is_absolute(text) => BuildPath::absolute(text),
            None => BuildPath::source(join(base, text)),
        }
    }

    /// The path with `CONFIGURATION_NAME` replaced by `configuration`.
    pub fn configured(&self, configuration: &str) -> Cow<'_, str> {
        self.path.cow_replace(CONFIGURATION_NAME, configuration)
    }

    pub fn extension(&self) -> &str {
        gypsum_util::path::split_extension(&self.path).1
    }
}

impl fmt::Display for BuildPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.root {
            PathRoot::Product => write!(f, "<(PRODUCT_DIR)/{}", self.path),
            PathRoot::Source | PathRoot::Absolute => write!(f, "{}", self.path),
        }
    }
}

/// The directory under the build directory that holds a target's intermediate files:
/// `obj[.toolset]/<build file dir>`.
pub fn object_dir(target: &QualifiedTarget, base: &str) -> String {
    join(&format!("obj{}", target.toolset.dir_suffix()), base)
}

/// Per-target scratch space, what `INTERMEDIATE_DIR` names.
pub fn intermediate_dir(target: &QualifiedTarget, base: &str) -> String {
    join(&object_dir(target, base), &format!("{}.gen", target.name))
}

pub fn object_file(target: &QualifiedTarget, base: &str, source: &BuildPath) -> BuildPath {
    let (stem, _) = gypsum_util::path::split_extension(gypsum_util::path::basename(&source.path));
    BuildPath::product(join(
        &object_dir(target, base),
        &format!("{}.{stem}.o", target.name),
    ))
}

/// Product naming overrides a target may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductOverrides {
    pub name: Option<String>,
    pub prefix: Option<String>,
    pub extension: Option<String>,
    /// Already parsed; a product directory is normally under `PRODUCT_DIR`.
    pub dir: Option<BuildPath>,
}

/// What building a target produces. `none` targets produce a stamp file so that dependents have
/// something to wait for.
pub fn product_path(
    target: &QualifiedTarget,
    target_type: TargetType,
    base: &str,
    overrides: &ProductOverrides,
) -> BuildPath {
    let (prefix, extension, dir) = match target_type {
        TargetType::Executable => ("", "", String::new()),
        TargetType::StaticLibrary => ("lib", "a", object_dir(target, base)),
        TargetType::SharedLibrary => ("lib", "so", "lib".to_string()),
        TargetType::LoadableModule => ("lib", "so", String::new()),
        TargetType::None => {
            return BuildPath::product(join(
                &object_dir(target, base),
                &format!("{}.stamp", target.name),
            ));
        }
    };

    let name = overrides.name.as_deref().unwrap_or(&target.name);
    let prefix = overrides.prefix.as_deref().unwrap_or(prefix);
    let extension = overrides
        .extension
        .as_deref()
        .unwrap_or(extension)
        .trim_start_matches('.');
    let file = match extension {
        "" => format!("{prefix}{name}"),
        ext => format!("{prefix}{name}.{ext}"),
    };

    match &overrides.dir {
        Some(dir) => BuildPath {
            root: dir.root,
            path: join(&dir.path, &file),
        },
        None => BuildPath::product(join(&dir, &file)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Toolset;
    use pretty_assertions::assert_eq;

    fn name(n: &str, toolset: &str) -> QualifiedTarget {
        QualifiedTarget::new("src/app.gyp", n, Toolset::new(toolset))
    }

    #[test]
    fn parse_roots() {
        assert_eq!(BuildPath::parse("a/../b.c", "src"), BuildPath::source("src/b.c"));
        assert_eq!(
            BuildPath::parse("$!PRODUCT_DIR/gen/x.h", "src"),
            BuildPath::product("gen/x.h")
        );
        assert_eq!(BuildPath::parse("/usr/include", "src"), BuildPath::absolute("/usr/include"));
        assert_eq!(BuildPath::parse("$!PRODUCT_DIR", "src"), BuildPath::product("."));
    }

    #[test]
    fn products() {
        let none = ProductOverrides::default();
        let target = name("app", "target");
        assert_eq!(
            product_path(&target, TargetType::Executable, "src", &none).path,
            "app"
        );
        assert_eq!(
            product_path(&target, TargetType::StaticLibrary, "src", &none).path,
            "obj/src/libapp.a"
        );
        assert_eq!(
            product_path(&target, TargetType::SharedLibrary, "src", &none).path,
            "lib/libapp.so"
        );
        assert_eq!(
            product_path(&name("gen", "host"), TargetType::None, "src", &none).path,
            "obj.host/src/gen.stamp"
        );

        let overrides = ProductOverrides {
            name: Some("plugin".to_string()),
            prefix: Some(String::new()),
            extension: Some(".bundle".to_string()),
            dir: Some(BuildPath::product("plugins")),
        };
        assert_eq!(
            product_path(&target, TargetType::LoadableModule, "src", &overrides),
            BuildPath::product("plugins/plugin.bundle")
        );
    }

    #[test]
    fn objects() {
        let source = BuildPath::source("src/sub/file.cc");
        assert_eq!(
            object_file(&name("app", "target"), "src", &source).path,
            "obj/src/app.file.o"
        );
        assert_eq!(
            intermediate_dir(&name("app", "host"), ""),
            "obj.host/app.gen"
        );
    }
}
