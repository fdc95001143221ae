//! Writing `.ninja` files: statements, escaping, and wrapping long lines with `$` continuations.

use std::borrow::Cow;
use std::fmt::Write as _;

use cow_utils::CowUtils;
use itertools::Itertools;

const WIDTH: usize = 78;

/// Escape a value for use anywhere `$` is special.
pub fn escape(text: &str) -> Cow<'_, str> {
    text.cow_replace("$", "$$")
}

/// Escape a path in a `build` line, where spaces and colons separate paths.
pub fn escape_path(path: &str) -> String {
    path.cow_replace("$ ", "$$ ")
        .cow_replace(" ", "$ ")
        .cow_replace(":", "$:")
        .into_owned()
}

#[derive(Debug, Clone, Default)]
pub struct Rule<'a> {
    pub command: &'a str,
    pub description: Option<&'a str>,
    pub depfile: Option<&'a str>,
    pub deps: Option<&'a str>,
    pub pool: Option<&'a str>,
    pub restat: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Build<'a> {
    pub outputs: Vec<String>,
    pub rule: &'a str,
    pub inputs: Vec<String>,
    pub implicit: Vec<String>,
    pub order_only: Vec<String>,
    pub variables: Vec<(&'a str, String)>,
}

#[derive(Debug)]
pub struct Writer {
    out: String,
}

impl Writer {
    pub fn new() -> Self {
        Writer { out: String::new() }
    }

    pub fn finish(self) -> String {
        self.out
    }

    pub fn newline(&mut self) {
        self.out.push('\n');
    }

    pub fn comment(&mut self, text: &str) {
        for line in text.lines() {
            let _ = writeln!(self.out, "# {line}");
        }
    }

    pub fn variable(&mut self, key: &str, value: &str, indent: usize) {
        if value.is_empty() {
            return;
        }
        self.line(&format!("{key} = {value}"), indent);
    }

    /// A variable holding several words; nothing is written when there are none.
    pub fn variable_list<S: AsRef<str>>(&mut self, key: &str, values: &[S], indent: usize) {
        let value = values
            .iter()
            .map(AsRef::as_ref)
            .filter(|v| !v.is_empty())
            .join(" ");
        self.variable(key, &value, indent);
    }

    pub fn pool(&mut self, name: &str, depth: usize) {
        self.line(&format!("pool {name}"), 0);
        self.variable("depth", &depth.to_string(), 1);
    }

    pub fn rule(&mut self, name: &str, rule: &Rule<'_>) {
        self.line(&format!("rule {name}"), 0);
        self.variable("command", rule.command, 1);
        if let Some(description) = rule.description {
            self.variable("description", description, 1);
        }
        if let Some(depfile) = rule.depfile {
            self.variable("depfile", depfile, 1);
        }
        if let Some(deps) = rule.deps {
            self.variable("deps", deps, 1);
        }
        if let Some(pool) = rule.pool {
            self.variable("pool", pool, 1);
        }
        if rule.restat {
            self.variable("restat", "1", 1);
        }
    }

    pub fn build(&mut self, build: &Build<'_>) {
        let paths = |list: &[String]| list.iter().map(|p| escape_path(p)).join(" ");
        let mut line = format!("build {}: {}", paths(&build.outputs), build.rule);
        if !build.inputs.is_empty() {
            let _ = write!(line, " {}", paths(&build.inputs));
        }
        if !build.implicit.is_empty() {
            let _ = write!(line, " | {}", paths(&build.implicit));
        }
        if !build.order_only.is_empty() {
            let _ = write!(line, " || {}", paths(&build.order_only));
        }
        self.line(&line, 0);
        for (key, value) in &build.variables {
            self.variable(key, value, 1);
        }
    }

    pub fn subninja(&mut self, path: &str) {
        self.line(&format!("subninja {}", escape_path(path)), 0);
    }

    pub fn default(&mut self, targets: &[&str]) {
        self.line(&format!("default {}", targets.iter().map(|t| escape_path(t)).join(" ")), 0);
    }

    /// Write `text`, breaking it at unescaped spaces so that no line runs past the width when
    /// that can be helped.
    fn line(&mut self, text: &str, indent: usize) {
        let mut leading = "  ".repeat(indent);
        let mut text = text;
        while leading.len() + text.len() > WIDTH {
            // Leave room for the trailing " $"
            let available = WIDTH.saturating_sub(leading.len() + 2);
            let space = break_before(text, available).or_else(|| break_after(text, available));
            let Some(space) = space else {
                break;
            };
            let _ = writeln!(self.out, "{leading}{} $", &text[..space]);
            text = &text[space + 1..];
            leading = "  ".repeat(indent + 2);
        }
        let _ = writeln!(self.out, "{leading}{text}");
    }
}

/// A space is escaped when preceded by an odd number of `$`.
fn is_unescaped_space(text: &str, index: usize) -> bool {
    let dollars = text[..index].bytes().rev().take_while(|&b| b == b'$').count();
    dollars % 2 == 0
}

fn break_before(text: &str, limit: usize) -> Option<usize> {
    text.match_indices(' ')
        .map(|(i, _)| i)
        .filter(|&i| i > 0 && i <= limit && is_unescaped_space(text, i))
        .last()
}

fn break_after(text: &str, limit: usize) -> Option<usize> {
    text.match_indices(' ')
        .map(|(i, _)| i)
        .find(|&i| i > limit && is_unescaped_space(text, i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn escapes() {
        assert_eq!(escape("echo $HOME"), "echo $$HOME");
        assert_eq!(escape_path("c:/a b/x.c"), "c$:/a$ b/x.c");
    }

    #[test]
    fn statements() {
        let mut writer = Writer::new();
        writer.rule(
            "cc",
            &Rule {
                command: "$cc -c $in -o $out",
                description: Some("CC $out"),
                depfile: Some("$out.d"),
                deps: Some("gcc"),
                ..Default::default()
            },
        );
        writer.build(&Build {
            outputs: vec!["obj/a.o".to_string()],
            rule: "cc",
            inputs: vec!["../../a.c".to_string()],
            order_only: vec!["gen/a.h".to_string()],
            variables: vec![("cflags", "-O2".to_string())],
            ..Default::default()
        });
        writer.default(&["all"]);
        assert_eq!(
            writer.finish(),
            "rule cc\n  command = $cc -c $in -o $out\n  description = CC $out\n  \
             depfile = $out.d\n  deps = gcc\nbuild obj/a.o: cc ../../a.c || gen/a.h\n  \
             cflags = -O2\ndefault all\n"
        );
    }

    #[test]
    fn wraps_long_lines() {
        let mut writer = Writer::new();
        let inputs: Vec<String> = (0..12).map(|i| format!("source_file_{i}.c")).collect();
        writer.build(&Build {
            outputs: vec!["out".to_string()],
            rule: "phony",
            inputs,
            ..Default::default()
        });
        let text = writer.finish();
        assert!(text.lines().count() > 1);
        for line in text.lines() {
            assert!(line.len() <= WIDTH, "{line}");
        }
        assert!(text.lines().next().unwrap().ends_with(" $"));
        assert!(text.lines().nth(1).unwrap().starts_with("    source_file_"));
    }
}
