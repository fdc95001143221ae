//! The ninja backend: one build directory per configuration, holding a root `build.ninja` and one
//! file per target pulled in with `subninja`.

use std::collections::BTreeMap;

use cow_utils::CowUtils;
use gypsum_util::path::{basename, join, relative_to};
use gypsum_util::shell::encode_posix_arg;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

use super::ninja_syntax::{escape, Build, Rule, Writer};
use super::{generic_cflags, EmitContext, EmitResult, EmittedFile, Emitter};
use crate::plan::paths::{CONFIGURATION_NAME, PRODUCT_DIR};
use crate::plan::{ActionStep, BuildPath, CopyStep, Language, PathRoot, TargetPlan};
use crate::target::TargetType;

static RULE_NAME_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());

const LINK_POOL_DEPTH: usize = 4;

pub struct NinjaEmitter;

/// Path spelling for one configuration's build directory.
struct Paths {
    configuration: String,
    /// From the build directory back to the toplevel directory.
    build_to_root: String,
    /// The build directory, relative to the toplevel directory.
    build_dir: String,
}

impl Paths {
    fn new(cx: &EmitContext<'_>, configuration: &str) -> Self {
        let build_dir = cx.build_dir(configuration);
        Paths {
            configuration: configuration.to_string(),
            build_to_root: relative_to(".", &build_dir),
            build_dir,
        }
    }

    /// A path as ninja, running in the build directory, sees it.
    fn path(&self, path: &BuildPath) -> String {
        let configured = path.configured(&self.configuration);
        match path.root {
            PathRoot::Product | PathRoot::Absolute => configured.into_owned(),
            PathRoot::Source => join(&self.build_to_root, &configured),
        }
    }

    fn paths<'p>(&self, paths: impl IntoIterator<Item = &'p BuildPath>) -> Vec<String> {
        paths.into_iter().map(|p| self.path(p)).collect()
    }

    /// Where a target's own ninja file goes, relative to the build directory.
    fn target_file(target: &TargetPlan) -> String {
        join(
            &format!("obj{}", target.name.toolset.dir_suffix()),
            &join(&target.base, &format!("{}.ninja", target.name.name)),
        )
    }

    /// An action's command line: run from the build file's directory, with the product
    /// directory spelled relative to it.
    fn command(&self, target: &TargetPlan, command: &str) -> String {
        let base_dir = join(&self.build_to_root, &target.base);
        let base_to_build = relative_to(&self.build_dir, &target.base);
        let command = command
            .cow_replace(PRODUCT_DIR, &base_to_build)
            .cow_replace(CONFIGURATION_NAME, &self.configuration)
            .into_owned();
        format!("cd {} && {}", encode_posix_arg(&base_dir), escape(&command))
    }
}

fn rule_name(target: &TargetPlan, index: usize, action: &ActionStep) -> String {
    let name = format!(
        "{}{}_{}_{index}",
        target.name.name,
        target.name.toolset.dir_suffix(),
        action.name
    );
    RULE_NAME_UNSAFE.replace_all(&name, "_").into_owned()
}

fn flags(values: &[String]) -> Vec<String> {
    values.iter().map(|v| escape(&encode_posix_arg(v)).into_owned()).collect()
}

impl NinjaEmitter {
    fn emit_target_config(
        &self,
        cx: &EmitContext<'_>,
        target: &TargetPlan,
        configuration: &str,
    ) -> EmitResult<EmittedFile> {
        let paths = Paths::new(cx, configuration);
        let mut writer = Writer::new();
        writer.comment(&format!("{} ({})", target.name, target.target_type));

        if target.name.toolset.is_host() {
            for tool in ["cc", "cxx", "ld", "ldxx", "ar"] {
                writer.variable(tool, &format!("${tool}_host"), 0);
            }
        }

        let prerequisites = paths.paths(&target.prerequisites);
        let mut out = writer.finish();
        for (index, action) in target.actions.iter().enumerate() {
            self.emit_action(cx, target, configuration, index, action, &mut out)?;
        }
        for copy in &target.copies {
            self.emit_copy(cx, target, configuration, copy, &mut out)?;
        }
        let mut writer = Writer::new();

        if !target.compiles.is_empty() {
            let settings = target.settings(configuration);
            let mut cflags = flags(&settings.cflags);
            cflags.extend(generic_cflags("ninja", target, settings)?);
            let defines = settings
                .defines
                .iter()
                .map(|d| escape(&encode_posix_arg(&format!("-D{d}"))).into_owned())
                .collect_vec();
            let includes = settings
                .include_dirs
                .iter()
                .map(|i| escape(&encode_posix_arg(&format!("-I{}", paths.path(i)))).into_owned())
                .collect_vec();

            writer.newline();
            writer.variable_list("defines", &defines, 0);
            writer.variable_list("includes", &includes, 0);
            writer.variable_list("cflags", &cflags, 0);
            writer.variable_list("cflags_c", &flags(&settings.cflags_c), 0);
            writer.variable_list("cflags_cc", &flags(&settings.cflags_cc), 0);

            let order_only = paths
                .paths(target.generated())
                .into_iter()
                .chain(prerequisites.iter().cloned())
                .collect_vec();
            for compile in &target.compiles {
                writer.build(&Build {
                    outputs: vec![paths.path(&compile.object)],
                    rule: match compile.language {
                        Language::C => "cc",
                        Language::Cxx => "cxx",
                    },
                    inputs: vec![paths.path(&compile.source)],
                    order_only: order_only.clone(),
                    ..Default::default()
                });
            }
        }

        writer.newline();
        match &target.link {
            Some(link) => {
                let settings = target.settings(configuration);
                let mut inputs = paths.paths(&link.objects);
                let (rule, mut variables) = match target.target_type {
                    TargetType::StaticLibrary => ("alink", vec![]),
                    TargetType::SharedLibrary | TargetType::LoadableModule => (
                        "solink",
                        vec![("soname", basename(&link.output.path).to_string())],
                    ),
                    _ => ("link", vec![]),
                };
                if target.target_type != TargetType::StaticLibrary {
                    inputs.extend(paths.paths(&link.static_libraries));
                    variables.push(("ldflags", flags(&settings.ldflags).join(" ")));
                    variables.push(("libs", flags(&link.system_libraries).join(" ")));
                    variables.push(("solibs", paths.paths(&link.shared_libraries).join(" ")));
                    if target.compiles.iter().any(|c| c.language == Language::Cxx) {
                        variables.push(("ld", "$ldxx".to_string()));
                    }
                }
                writer.build(&Build {
                    outputs: vec![paths.path(&link.output)],
                    rule,
                    inputs,
                    implicit: paths.paths(&link.shared_libraries),
                    order_only: prerequisites,
                    variables,
                });
            }
            None => {
                writer.build(&Build {
                    outputs: vec![paths.path(&target.product)],
                    rule: "stamp",
                    inputs: paths.paths(target.generated()),
                    order_only: prerequisites,
                    ..Default::default()
                });
            }
        }
        out.push_str(&writer.finish());

        Ok(EmittedFile {
            path: cx.output_path(&join(
                &join(cx.ctx.output_dir(), configuration),
                &Paths::target_file(target),
            )),
            contents: out,
        })
    }

    fn emit_root(&self, cx: &EmitContext<'_>, configuration: &str) -> EmittedFile {
        let paths = Paths::new(cx, configuration);
        let toolchain = &cx.ctx.toolchain;
        let mut writer = Writer::new();

        let target = &toolchain.target;
        writer.variable("cc", target.cc.as_deref().unwrap_or("cc"), 0);
        writer.variable("cxx", target.cxx.as_deref().unwrap_or("c++"), 0);
        writer.variable("ld", target.ld.as_deref().unwrap_or("$cc"), 0);
        writer.variable("ldxx", target.ld.as_deref().unwrap_or("$cxx"), 0);
        writer.variable("ar", target.ar.as_deref().unwrap_or("ar"), 0);
        let host = &toolchain.host;
        writer.variable("cc_host", host.cc.as_deref().unwrap_or("$cc"), 0);
        writer.variable("cxx_host", host.cxx.as_deref().unwrap_or("$cxx"), 0);
        writer.variable("ld_host", host.ld.as_deref().unwrap_or("$cc_host"), 0);
        writer.variable("ldxx_host", host.ld.as_deref().unwrap_or("$cxx_host"), 0);
        writer.variable("ar_host", host.ar.as_deref().unwrap_or("$ar"), 0);
        writer.newline();

        writer.pool("link_pool", LINK_POOL_DEPTH);
        writer.newline();

        let compile = |tool: &str, lang_flags: &str| {
            format!(
                "${tool} -MMD -MF $out.d $defines $includes $cflags ${lang_flags} \
                 -c $in -o $out"
            )
        };
        let cc = compile("cc", "cflags_c");
        let cxx = compile("cxx", "cflags_cc");
        let rules = [
            ("cc", Rule {
                command: &cc,
                description: Some("CC $out"),
                depfile: Some("$out.d"),
                deps: Some("gcc"),
                ..Default::default()
            }),
            ("cxx", Rule {
                command: &cxx,
                description: Some("CXX $out"),
                depfile: Some("$out.d"),
                deps: Some("gcc"),
                ..Default::default()
            }),
            ("alink", Rule {
                command: "rm -f $out && $ar rcs $out $in",
                description: Some("AR $out"),
                ..Default::default()
            }),
            ("solink", Rule {
                command: "$ld -shared $ldflags -o $out -Wl,-soname=$soname \
                          -Wl,--whole-archive $in -Wl,--no-whole-archive $solibs $libs",
                description: Some("SOLINK $out"),
                pool: Some("link_pool"),
                ..Default::default()
            }),
            ("link", Rule {
                command: "$ld $ldflags -o $out -Wl,--start-group $in -Wl,--end-group \
                          $solibs $libs",
                description: Some("LINK $out"),
                pool: Some("link_pool"),
                ..Default::default()
            }),
            ("stamp", Rule {
                command: "touch $out",
                description: Some("STAMP $out"),
                ..Default::default()
            }),
            ("copy", Rule {
                command: "ln -f $in $out 2>/dev/null || (rm -rf $out && cp -af $in $out)",
                description: Some("COPY $in $out"),
                ..Default::default()
            }),
        ];
        for (name, rule) in &rules {
            writer.rule(name, rule);
        }
        writer.newline();

        for target in &cx.plan.targets {
            writer.subninja(&Paths::target_file(target));
        }

        // Short names, for building a target by name
        let mut short_names: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for target in &cx.plan.targets {
            let product = paths.path(&target.product);
            if target.name.name != product && !target.name.toolset.is_host() {
                short_names
                    .entry(target.name.name.as_str())
                    .or_default()
                    .push(product);
            }
        }
        if !short_names.is_empty() {
            writer.newline();
            writer.comment("Short names for targets.");
            for (name, products) in &short_names {
                writer.build(&Build {
                    outputs: vec![name.to_string()],
                    rule: "phony",
                    inputs: products.clone(),
                    ..Default::default()
                });
            }
        }

        let all = cx
            .plan
            .targets
            .iter()
            .map(|t| paths.path(&t.product))
            .sorted()
            .dedup()
            .collect_vec();
        if !all.is_empty() {
            writer.newline();
            writer.build(&Build {
                outputs: vec!["all".to_string()],
                rule: "phony",
                inputs: all,
                ..Default::default()
            });
            writer.default(&["all"]);
        }

        EmittedFile {
            path: cx.output_path(&join(
                &join(cx.ctx.output_dir(), configuration),
                "build.ninja",
            )),
            contents: writer.finish(),
        }
    }
}

impl Emitter for NinjaEmitter {
    fn name(&self) -> &'static str {
        "ninja"
    }

    fn emit_target(
        &self,
        cx: &EmitContext<'_>,
        target: &TargetPlan,
    ) -> EmitResult<Vec<EmittedFile>> {
        cx.plan
            .configurations
            .iter()
            .map(|configuration| self.emit_target_config(cx, target, configuration))
            .collect()
    }

    fn emit_action(
        &self,
        cx: &EmitContext<'_>,
        target: &TargetPlan,
        configuration: &str,
        index: usize,
        action: &ActionStep,
        out: &mut String,
    ) -> EmitResult<()> {
        let paths = Paths::new(cx, configuration);
        let name = rule_name(target, index, action);
        let command = paths.command(target, &action.command);
        let description = match &action.message {
            Some(message) => escape(message).into_owned(),
            None => format!("ACTION {}: {}", target.name.name, action.name),
        };

        let mut writer = Writer::new();
        writer.newline();
        writer.rule(
            &name,
            &Rule {
                command: &command,
                description: Some(&description),
                ..Default::default()
            },
        );
        writer.build(&Build {
            outputs: paths.paths(&action.outputs),
            rule: &name,
            inputs: paths.paths(&action.inputs),
            order_only: paths.paths(&target.prerequisites),
            ..Default::default()
        });
        out.push_str(&writer.finish());
        Ok(())
    }

    fn emit_copy(
        &self,
        cx: &EmitContext<'_>,
        _target: &TargetPlan,
        configuration: &str,
        copy: &CopyStep,
        out: &mut String,
    ) -> EmitResult<()> {
        let paths = Paths::new(cx, configuration);
        let mut writer = Writer::new();
        writer.build(&Build {
            outputs: vec![paths.path(&copy.destination)],
            rule: "copy",
            inputs: vec![paths.path(&copy.source)],
            ..Default::default()
        });
        out.push_str(&writer.finish());
        Ok(())
    }

    fn finalize(&self, cx: &EmitContext<'_>) -> EmitResult<Vec<EmittedFile>> {
        Ok(cx
            .plan
            .configurations
            .iter()
            .map(|configuration| self.emit_root(cx, configuration))
            .collect())
    }
}
