//! The make backend: a toplevel `Makefile` that includes one `.mk` file per target. The
//! configuration is picked when make runs, with `BUILDTYPE`.

use std::fmt::Write as _;

use cow_utils::CowUtils;
use gypsum_util::path::relative_to;
use gypsum_util::shell::{encode_posix_arg, encode_posix_list};
use itertools::Itertools;

use super::{generic_cflags, target_file, EmitContext, EmitResult, EmittedFile, Emitter};
use crate::plan::{ActionStep, BuildPath, CopyStep, Language, PathRoot, TargetPlan};
use crate::target::TargetType;

pub struct MakeEmitter;

const HEADER: &str = "# This file is generated by gyp; do not edit.\n";

const SHARED_HEADER: &str = r#"
# The V=1 flag on command line makes us verbosely print command lines.
ifdef V
  quiet=
else
  quiet=quiet_
endif

builddir ?= $(builddir_name)/$(BUILDTYPE)
abs_builddir := $(abspath $(builddir))
obj := $(builddir)/obj

# Every object file, for pulling in the dependency files the compiler writes.
all_deps :=

escape_quotes = $(subst ','\'',$(1))
exact_echo = printf '%s\n' '$(call escape_quotes,$(1))'

DEPFLAGS = -MMD -MF $@.d

quiet_cmd_cc = CC($(TOOLSET)) $@
cmd_cc = $(CC.$(TOOLSET)) $(GYP_CFLAGS) $(DEPFLAGS) -c -o $@ $<

quiet_cmd_cxx = CXX($(TOOLSET)) $@
cmd_cxx = $(CXX.$(TOOLSET)) $(GYP_CXXFLAGS) $(DEPFLAGS) -c -o $@ $<

quiet_cmd_touch = TOUCH $@
cmd_touch = touch $@

quiet_cmd_copy = COPY $@
cmd_copy = ln -f "$<" "$@" 2>/dev/null || (rm -rf "$@" && cp -af "$<" "$@")

quiet_cmd_alink = AR($(TOOLSET)) $@
cmd_alink = rm -f $@ && $(AR.$(TOOLSET)) crs $@ $(filter %.o,$^)

quiet_cmd_link = LINK($(TOOLSET)) $@
cmd_link = $(LINK.$(TOOLSET)) $(GYP_LDFLAGS) -o $@ -Wl,--start-group $(LD_INPUTS) -Wl,--end-group $(LIBS)

quiet_cmd_solink = SOLINK($(TOOLSET)) $@
cmd_solink = $(LINK.$(TOOLSET)) -shared $(GYP_LDFLAGS) -Wl,-soname=$(@F) -o $@ -Wl,--whole-archive $(LD_INPUTS) -Wl,--no-whole-archive $(LIBS)

quiet_cmd_solink_module = SOLINK_MODULE($(TOOLSET)) $@
cmd_solink_module = $(LINK.$(TOOLSET)) -shared $(GYP_LDFLAGS) -Wl,-soname=$(@F) -o $@ -Wl,--start-group $(LD_INPUTS) -Wl,--end-group $(LIBS)

# do_cmd: print the quiet or full command line, make the output's directory, run it.
define do_cmd
@$(call exact_echo,  $($(quiet)cmd_$(1)))
@mkdir -p "$(dir $@)"
@$(cmd_$(1))
endef

# "all" comes first so that it is the default goal.
.PHONY: all
all:

"#;

/// Escape text for a make variable assignment, where `$` expands and `#` starts a comment.
/// Product directory and configuration placeholders become make variables.
fn escape(text: &str) -> String {
    text.cow_replace("$", "$$")
        .cow_replace("#", "\\#")
        .cow_replace("$$!PRODUCT_DIR", "$(abs_builddir)")
        .cow_replace("$$|CONFIGURATION_NAME", "$(BUILDTYPE)")
        .into_owned()
}

/// A path in a rule's targets or prerequisites, as make sees it from the output root.
fn path(path: &BuildPath) -> String {
    let escaped = escape(&path.path).cow_replace(" ", "\\ ").into_owned();
    match path.root {
        PathRoot::Source => format!("$(srcdir)/{escaped}"),
        PathRoot::Product => format!("$(builddir)/{escaped}"),
        PathRoot::Absolute => escaped,
    }
}

fn paths<'p>(list: impl IntoIterator<Item = &'p BuildPath>) -> Vec<String> {
    list.into_iter().map(path).collect()
}

fn flags(values: &[String]) -> Vec<String> {
    values.iter().map(|v| escape(&encode_posix_arg(v))).collect()
}

/// `NAME := a b c`, one value per line.
fn write_list(out: &mut String, name: &str, values: &[String]) {
    if values.is_empty() {
        let _ = writeln!(out, "{name} :=");
        return;
    }
    let _ = writeln!(out, "{name} := \\\n\t{}", values.join(" \\\n\t"));
}

/// A rule whose recipe runs `cmd_<command>`.
fn write_rule(out: &mut String, outputs: &[String], inputs: &[String], order_only: &[String]) {
    let _ = write!(out, "{}:", outputs.join(" "));
    for input in inputs {
        let _ = write!(out, " {input}");
    }
    if !order_only.is_empty() {
        let _ = write!(out, " | {}", order_only.join(" "));
    }
    out.push('\n');
}

fn make_name(target: &TargetPlan, index: usize, action: &ActionStep) -> String {
    format!(
        "{}{}_{}_{index}",
        target.name.name,
        target.name.toolset.dir_suffix(),
        action.name
    )
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
    .collect()
}

impl MakeEmitter {
    fn emit_compiles(
        &self,
        target: &TargetPlan,
        prerequisites: &[String],
        out: &mut String,
    ) -> EmitResult<()> {
        for configuration in target.configurations.keys() {
            let settings = target.settings(configuration);
            let defines = settings
                .defines
                .iter()
                .map(|d| escape(&encode_posix_arg(&format!("-D{d}"))))
                .collect_vec();
            let includes = settings
                .include_dirs
                .iter()
                .map(|i| format!("-I{}", path(i)))
                .collect_vec();
            let mut cflags = flags(&settings.cflags);
            cflags.extend(generic_cflags("make", target, settings)?);

            let _ = writeln!(out, "# Flags passed to all source files ({configuration}).");
            write_list(out, &format!("DEFS_{configuration}"), &defines);
            write_list(out, &format!("INCS_{configuration}"), &includes);
            write_list(out, &format!("CFLAGS_{configuration}"), &cflags);
            write_list(out, &format!("CFLAGS_C_{configuration}"), &flags(&settings.cflags_c));
            write_list(out, &format!("CFLAGS_CC_{configuration}"), &flags(&settings.cflags_cc));
            out.push('\n');
        }

        write_list(out, "OBJS", &paths(target.compiles.iter().map(|c| &c.object)));
        out.push_str("\nall_deps += $(OBJS)\n\n");
        out.push_str("$(OBJS): TOOLSET := $(TOOLSET)\n");
        out.push_str(
            "$(OBJS): GYP_CFLAGS := $(DEFS_$(BUILDTYPE)) $(INCS_$(BUILDTYPE)) \
             $(CFLAGS_$(BUILDTYPE)) $(CFLAGS_C_$(BUILDTYPE))\n",
        );
        out.push_str(
            "$(OBJS): GYP_CXXFLAGS := $(DEFS_$(BUILDTYPE)) $(INCS_$(BUILDTYPE)) \
             $(CFLAGS_$(BUILDTYPE)) $(CFLAGS_CC_$(BUILDTYPE))\n",
        );
        // Generated sources and headers must exist before anything compiles
        let order_only = paths(target.generated())
            .into_iter()
            .chain(prerequisites.iter().cloned())
            .collect_vec();
        if !order_only.is_empty() {
            let _ = writeln!(out, "$(OBJS): | {}", order_only.join(" "));
        }
        out.push('\n');

        for compile in &target.compiles {
            write_rule(out, &[path(&compile.object)], &[path(&compile.source)], &[]);
            let command = match compile.language {
                Language::C => "cc",
                Language::Cxx => "cxx",
            };
            let _ = writeln!(out, "\t$(call do_cmd,{command})");
        }
        out.push('\n');
        Ok(())
    }

    fn emit_link(&self, target: &TargetPlan, prerequisites: &[String], out: &mut String) {
        let product = path(&target.product);
        let Some(link) = &target.link else {
            // Nothing to link: a stamp that waits for everything the target generates
            write_rule(out, &[product.clone()], &paths(target.generated()), prerequisites);
            out.push_str("\t$(call do_cmd,touch)\n\n");
            return;
        };

        for configuration in target.configurations.keys() {
            let settings = target.settings(configuration);
            write_list(out, &format!("LDFLAGS_{configuration}"), &flags(&settings.ldflags));
        }
        write_list(out, "LIBS", &flags(&link.system_libraries));
        out.push('\n');

        let mut inputs = vec!["$(OBJS)".to_string()];
        let command = match target.target_type {
            TargetType::StaticLibrary => "alink",
            TargetType::SharedLibrary => "solink",
            TargetType::LoadableModule => "solink_module",
            _ => "link",
        };
        if target.target_type != TargetType::StaticLibrary {
            inputs.extend(paths(&link.static_libraries));
            inputs.extend(paths(&link.shared_libraries));
            let _ = writeln!(out, "{product}: GYP_LDFLAGS := $(LDFLAGS_$(BUILDTYPE))");
            let _ = writeln!(out, "{product}: LIBS := $(LIBS)");
            let _ = writeln!(out, "{product}: LD_INPUTS := {}", inputs.join(" "));
        }
        let _ = writeln!(out, "{product}: TOOLSET := $(TOOLSET)");
        write_rule(out, &[product], &inputs, prerequisites);
        let _ = writeln!(out, "\t$(call do_cmd,{command})\n");
    }

    fn emit_root(&self, cx: &EmitContext<'_>) -> EmittedFile {
        let plan = cx.plan;
        let srcdir = relative_to(&cx.depth, &cx.output_root);
        let default_configuration = plan
            .configurations
            .first()
            .map(String::as_str)
            .unwrap_or("Default");

        let mut out = String::from(HEADER);
        out.push_str("\nMAKEFLAGS=-r\n\n");
        let _ = writeln!(out, "srcdir := {}", escape(&srcdir));
        let _ = writeln!(out, "builddir_name ?= {}", escape(cx.ctx.output_dir()));
        let _ = writeln!(out, "BUILDTYPE ?= {}", escape(default_configuration));
        out.push_str(SHARED_HEADER);

        let toolchain = &cx.ctx.toolchain;
        let tool = |value: &Option<String>, fallback: &str| match value {
            Some(value) => escape(value),
            None => fallback.to_string(),
        };
        out.push_str("# Toolchain, overridable from the environment when gyp ran.\n");
        let target = &toolchain.target;
        let _ = writeln!(out, "CC.target ?= {}", tool(&target.cc, "$(CC)"));
        let _ = writeln!(out, "CXX.target ?= {}", tool(&target.cxx, "$(CXX)"));
        let _ = writeln!(out, "LINK.target ?= {}", tool(&target.ld, "$(CXX.target)"));
        let _ = writeln!(out, "AR.target ?= {}", tool(&target.ar, "$(AR)"));
        let host = &toolchain.host;
        let _ = writeln!(out, "CC.host ?= {}", tool(&host.cc, "gcc"));
        let _ = writeln!(out, "CXX.host ?= {}", tool(&host.cxx, "g++"));
        let _ = writeln!(out, "LINK.host ?= {}", tool(&host.ld, "$(CXX.host)"));
        let _ = writeln!(out, "AR.host ?= {}", tool(&host.ar, "ar"));
        out.push('\n');

        for target in &plan.targets {
            let _ = writeln!(out, "include {}", escape(&target_file(target, "mk")));
        }
        out.push_str("\n-include $(addsuffix .d,$(all_deps))\n\n");

        let root_to_cwd = relative_to(".", &cx.output_root);
        let command = encode_posix_list(
            [cx.ctx.gyp_binary.clone(), "-fmake".to_string()]
                .into_iter()
                .chain(cx.ctx.regenerate_args.iter().cloned())
                .chain(cx.ctx.build_files.iter().cloned())
                .collect_vec(),
        );
        let build_files = plan
            .build_files
            .iter()
            .map(|f| format!("$(srcdir)/{}", escape(&relative_to(f, &cx.depth))))
            .join(" ");
        out.push_str("quiet_cmd_regen_makefile = ACTION Regenerating $@\n");
        let _ = writeln!(
            out,
            "cmd_regen_makefile = cd {} && {}",
            escape(&encode_posix_arg(&root_to_cwd)),
            escape(&command)
        );
        let _ = writeln!(out, "Makefile: {build_files}");
        out.push_str("\t$(call do_cmd,regen_makefile)\n");

        EmittedFile {
            path: cx.output_path("Makefile"),
            contents: out,
        }
    }
}

impl Emitter for MakeEmitter {
    fn name(&self) -> &'static str {
        "make"
    }

    fn emit_target(
        &self,
        cx: &EmitContext<'_>,
        target: &TargetPlan,
    ) -> EmitResult<Vec<EmittedFile>> {
        let mut out = String::from(HEADER);
        let _ = writeln!(out, "\nTOOLSET := {}", target.name.toolset);
        let _ = writeln!(out, "TARGET := {}\n", target.name.name);

        // Make has a single configuration at a time; steps don't depend on it
        let configuration = cx.plan.configurations.first().map(String::as_str).unwrap_or("");
        for (index, action) in target.actions.iter().enumerate() {
            self.emit_action(cx, target, configuration, index, action, &mut out)?;
        }
        for copy in &target.copies {
            self.emit_copy(cx, target, configuration, copy, &mut out)?;
        }
        if !target.copies.is_empty() {
            out.push('\n');
        }

        let prerequisites = paths(&target.prerequisites);
        if target.compiles.is_empty() {
            // OBJS of the previously included target must not leak into this one
            out.push_str("OBJS :=\n\n");
        } else {
            self.emit_compiles(target, &prerequisites, &mut out)?;
        }
        self.emit_link(target, &prerequisites, &mut out);

        let product = path(&target.product);
        let _ = writeln!(out, "# Build {} by name.", target.name.name);
        let _ = writeln!(out, ".PHONY: {}", target.name.name);
        let _ = writeln!(out, "{}: {product}\n", target.name.name);
        let _ = writeln!(out, "all: {}", target.name.name);

        Ok(vec![EmittedFile {
            path: cx.output_path(&target_file(target, "mk")),
            contents: out,
        }])
    }

    fn emit_action(
        &self,
        _cx: &EmitContext<'_>,
        target: &TargetPlan,
        _configuration: &str,
        index: usize,
        action: &ActionStep,
        out: &mut String,
    ) -> EmitResult<()> {
        let name = make_name(target, index, action);
        let description = match &action.message {
            Some(message) => escape(message),
            None => format!("ACTION {}_{} $@", target.name.name, action.name),
        };
        let base = escape(&encode_posix_arg(&target.base));
        let _ = writeln!(out, "quiet_cmd_{name} = {description}");
        let _ = writeln!(
            out,
            "cmd_{name} = cd $(srcdir)/{base}; {}",
            escape(&action.command)
        );

        let outputs = paths(&action.outputs);
        let Some((first, rest)) = outputs.split_first() else {
            return Ok(());
        };
        write_rule(
            out,
            &[first.clone()],
            &paths(&action.inputs),
            &paths(&target.prerequisites),
        );
        let _ = writeln!(out, "\t$(call do_cmd,{name})");
        // The other outputs come along with the first
        for other in rest {
            let _ = writeln!(out, "{other}: {first} ;");
        }
        out.push('\n');
        Ok(())
    }

    fn emit_copy(
        &self,
        _cx: &EmitContext<'_>,
        _target: &TargetPlan,
        _configuration: &str,
        copy: &CopyStep,
        out: &mut String,
    ) -> EmitResult<()> {
        write_rule(out, &[path(&copy.destination)], &[path(&copy.source)], &[]);
        out.push_str("\t$(call do_cmd,copy)\n");
        Ok(())
    }

    fn finalize(&self, cx: &EmitContext<'_>) -> EmitResult<Vec<EmittedFile>> {
        Ok(vec![self.emit_root(cx)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn escapes_for_make() {
        assert_eq!(escape("echo $HOME # x"), "echo $$HOME \\# x");
        assert_eq!(
            escape("tool -o $!PRODUCT_DIR/gen/$|CONFIGURATION_NAME.h"),
            "tool -o $(abs_builddir)/gen/$(BUILDTYPE).h"
        );
        assert_eq!(path(&BuildPath::source("src/a b.c")), "$(srcdir)/src/a\\ b.c");
        assert_eq!(path(&BuildPath::product("lib/libz.so")), "$(builddir)/lib/libz.so");
    }

    #[test]
    fn lists() {
        let mut out = String::new();
        write_list(&mut out, "OBJS", &[]);
        write_list(&mut out, "LIBS", &["-lm".to_string(), "-lz".to_string()]);
        assert_eq!(out, "OBJS :=\nLIBS := \\\n\t-lm \\\n\t-lz\n");
    }
}
