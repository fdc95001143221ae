//! Naming targets across build files and toolsets.

use std::fmt;
use std::str::FromStr;

use derive_more::Display;
use gypsum_util::path::{dirname, join, normalize};
use serde::Serialize;

/// The platform a target is built for. `target` is the default; `host` builds tools that run
/// during the build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize)]
#[serde(transparent)]
pub struct Toolset(String);

impl Toolset {
    pub fn new(name: impl Into<String>) -> Self {
        Toolset(name.into())
    }

    pub fn target() -> Self {
        Toolset::new("target")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_host(&self) -> bool {
        self.0 == "host"
    }

    /// The suffix generated files use to keep toolsets apart; empty for `target`.
    pub fn dir_suffix(&self) -> String {
        if self.0 == "target" {
            String::new()
        } else {
            format!(".{}", self.0)
        }
    }
}

/// A target's fully qualified name: `path/to/file.gyp:name#toolset`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QualifiedTarget {
    pub build_file: String,
    pub name: String,
    pub toolset: Toolset,
}

impl QualifiedTarget {
    pub fn new(build_file: impl Into<String>, name: impl Into<String>, toolset: Toolset) -> Self {
        Self {
            build_file: build_file.into(),
            name: name.into(),
            toolset,
        }
    }

    /// `name#toolset`, the way duplicate definitions are reported.
    pub fn short(&self) -> String {
        format!("{}#{}", self.name, self.toolset)
    }

    pub fn build_file_dir(&self) -> &str {
        dirname(&self.build_file)
    }
}

impl fmt::Display for QualifiedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.build_file, self.name, self.toolset)
    }
}

/// A dependency as written in a build file: `[path/to/other.gyp:]name[#toolset]`. The name may
/// be `*` to mean every target of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRef<'a> {
    pub build_file: Option<&'a str>,
    pub name: &'a str,
    pub toolset: Option<&'a str>,
}

impl<'a> DependencyRef<'a> {
    pub fn parse(text: &'a str) -> Self {
        let (rest, toolset) = match text.rsplit_once('#') {
            Some((rest, toolset)) => (rest, Some(toolset)),
            None => (text, None),
        };
        // A drive letter's colon is part of the path
        let split = rest
            .rfind(':')
            .filter(|&i| !(i == 1 && rest.as_bytes()[0].is_ascii_alphabetic() && rest.len() > 2));
        let (build_file, name) = match split {
            Some(i) => (Some(&rest[..i]), &rest[i + 1..]),
            None => (None, rest),
        };
        DependencyRef {
            build_file,
            name,
            toolset,
        }
    }

    /// Resolve against the target doing the referencing.
    pub fn qualify(&self, referrer: &QualifiedTarget) -> QualifiedTarget {
        let build_file = match self.build_file {
            Some(file) => join(referrer.build_file_dir(), file),
            None => normalize(&referrer.build_file),
        };
        let toolset = self
            .toolset
            .map(Toolset::new)
            .unwrap_or_else(|| referrer.toolset.clone());
        QualifiedTarget::new(build_file, self.name, toolset)
    }

    pub fn is_wildcard(&self) -> bool {
        self.name == "*"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    #[display("executable")]
    Executable,
    #[display("static_library")]
    StaticLibrary,
    #[display("shared_library")]
    SharedLibrary,
    #[display("loadable_module")]
    LoadableModule,
    #[display("none")]
    None,
}

impl TargetType {
    /// Types that are fully linked; nothing links into them transitively past this point.
    pub fn is_linkable(self) -> bool {
        matches!(
            self,
            TargetType::Executable | TargetType::SharedLibrary | TargetType::LoadableModule
        )
    }

    pub fn compiles(self) -> bool {
        self != TargetType::None
    }
}

impl FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "executable" => TargetType::Executable,
            "static_library" => TargetType::StaticLibrary,
            "shared_library" => TargetType::SharedLibrary,
            "loadable_module" => TargetType::LoadableModule,
            "none" => TargetType::None,
            other => return Err(other.to_string()),
        })
    }
}
