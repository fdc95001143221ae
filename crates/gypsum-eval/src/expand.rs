//! Variable and command references inside strings.
//!
//! A reference is `<(name)`, `<@(name)`, `<!(command)` or `<!@(command)`; late references use
//! `>` in place of `<`. The `@` forms expand in list context and must make up the whole string.

use std::cell::{Cell, RefCell};
use std::path::Path;

use fxhash::FxHashMap;
use gypsum_syntax::{parse_document, Value};
use gypsum_util::shell::{encode_posix_list, split_words};
use gypsum_util::split::is_canonical_int;
use once_cell::sync::Lazy;
use regex::Regex;
use scopeguard::defer;
use tracing::{debug, trace};

use crate::command::{CommandLine, CommandRunner};
use crate::condition::Expr;
use crate::errors::{EvalError, EvalResult};
use crate::scope::VariableScope;

static REFERENCE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"([<>])(!?)(@?)\(").unwrap());

/// Rounds of re-expansion allowed before a value is declared non-terminating.
pub const MAX_EXPANSION_ROUNDS: usize = 64;

/// Nesting allowed for references within references, including the output of commands.
const MAX_EXPANSION_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// `<` references, expanded while loading.
    Early,
    /// `>` references, expanded once dependent settings have been merged.
    Late,
}

impl Phase {
    pub fn sigil(self) -> char {
        match self {
            Phase::Early => '<',
            Phase::Late => '>',
        }
    }
}

/// One reference found in a string.
#[derive(Debug, PartialEq, Eq)]
struct Reference<'a> {
    /// Byte range of the whole reference, sigil through closing paren.
    start: usize,
    end: usize,
    is_command: bool,
    is_list: bool,
    contents: &'a str,
}

/// Find the index of the paren closing the one at `open`, honoring nested brackets of any kind.
fn find_closing_paren(input: &str, open: usize) -> Option<usize> {
    let mut stack = Vec::new();
    for (i, c) in input[open..].char_indices() {
        match c {
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(expected) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn find_references(input: &str, phase: Phase) -> Vec<Reference<'_>> {
    let mut ret = Vec::new();
    let mut search_from = 0;
    while let Some(caps) = REFERENCE_REGEX.captures_at(input, search_from) {
        let Some(whole) = caps.get(0) else {
            break;
        };
        let sigil_matches = caps[1].starts_with(phase.sigil());
        let open = whole.end() - 1;

        match find_closing_paren(input, open) {
            Some(close) if sigil_matches => {
                ret.push(Reference {
                    start: whole.start(),
                    end: close + 1,
                    is_command: !caps[2].is_empty(),
                    is_list: !caps[3].is_empty(),
                    contents: &input[open + 1..close],
                });
                search_from = close + 1;
            }
            // Unbalanced or belonging to the other phase: leave it for someone else
            _ => search_from = whole.end(),
        }
    }
    ret
}

/// Expands references of a single phase against a scope.
pub struct Expander<'a> {
    runner: &'a CommandRunner,
    phase: Phase,
    build_file: &'a Path,
    depth: Cell<usize>,
    /// Parsed condition expressions, keyed by their expanded text.
    pub(crate) conditions: RefCell<FxHashMap<String, Expr>>,
}

impl<'a> Expander<'a> {
    pub fn new(runner: &'a CommandRunner, phase: Phase, build_file: &'a Path) -> Self {
        Self {
            runner,
            phase,
            build_file,
            depth: Cell::new(0),
            conditions: RefCell::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn build_file(&self) -> &Path {
        self.build_file
    }

    pub(crate) fn file_name(&self) -> String {
        self.build_file.display().to_string()
    }

    fn invalid(&self, input: &str, message: impl Into<String>) -> EvalError {
        EvalError::InvalidExpansion {
            input: input.to_string(),
            file: self.file_name(),
            message: message.into(),
        }
    }

    fn overflow(&self, input: &str) -> EvalError {
        EvalError::ExpansionOverflow {
            input: input.to_string(),
            file: self.file_name(),
            limit: MAX_EXPANSION_ROUNDS,
        }
    }

    /// Expand every reference of this expander's phase in `input` until none remain.
    ///
    /// Strings without references come back untouched. Expanded strings that spell a canonical
    /// integer come back as integers. Strings made entirely of a `@` reference come back as lists.
    pub fn expand(&self, input: &str, scope: &VariableScope) -> EvalResult<Value> {
        if self.depth.get() >= MAX_EXPANSION_DEPTH {
            return Err(self.overflow(input));
        }
        self.depth.set(self.depth.get() + 1);
        defer! {
            self.depth.set(self.depth.get() - 1);
        }

        let mut current = input.to_string();
        let mut expanded_any = false;
        for _ in 0..MAX_EXPANSION_ROUNDS {
            let references = find_references(&current, self.phase);
            if references.is_empty() {
                if expanded_any && is_canonical_int(&current) {
                    if let Ok(i) = current.parse() {
                        return Ok(Value::Integer(i));
                    }
                }
                return Ok(Value::String(current));
            }

            expanded_any = true;
            match self.expand_references(&current, &references, scope)? {
                Value::String(s) => {
                    trace!("{:?} -> {:?}", current, s);
                    current = s;
                }
                Value::List(items) => {
                    return items
                        .into_iter()
                        .map(|item| match item {
                            Value::String(s) => self.expand(&s, scope),
                            other => Ok(other),
                        })
                        .collect::<EvalResult<Vec<_>>>()
                        .map(Value::List);
                }
                other => return Ok(other),
            }
        }

        Err(self.overflow(input))
    }

    /// Expand `input` and require a string or integer result.
    pub fn expand_scalar(&self, input: &str, scope: &VariableScope) -> EvalResult<Value> {
        let value = self.expand(input, scope)?;
        if value.is_scalar() {
            Ok(value)
        } else {
            Err(self.invalid(
                input,
                format!("expansion in string context produced a {}", value.type_name()),
            ))
        }
    }

    fn expand_references(
        &self,
        input: &str,
        references: &[Reference<'_>],
        scope: &VariableScope,
    ) -> EvalResult<Value> {
        if let Some(list_ref) = references.iter().find(|r| r.is_list) {
            if references.len() != 1 || list_ref.start != 0 || list_ref.end != input.len() {
                return Err(self.invalid(
                    input,
                    "list expansion must make up the entire string",
                ));
            }
            return self.expand_one(input, list_ref, scope);
        }

        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        for reference in references {
            out.push_str(&input[last..reference.start]);
            let replacement = self.expand_one(input, reference, scope)?;
            let Some(text) = replacement.to_scalar_string() else {
                return Err(self.invalid(input, "reference did not expand to a string"));
            };
            out.push_str(&text);
            last = reference.end;
        }
        out.push_str(&input[last..]);
        Ok(Value::String(out))
    }

    fn expand_one(
        &self,
        input: &str,
        reference: &Reference<'_>,
        scope: &VariableScope,
    ) -> EvalResult<Value> {
        // Contents are expanded before they are used as a name or a command
        let contents = match self.expand(reference.contents, scope)? {
            Value::String(s) => s,
            Value::Integer(i) => i.to_string(),
            other => {
                return Err(self.invalid(
                    input,
                    format!("reference contents expanded to a {}", other.type_name()),
                ));
            }
        };

        let replacement = if reference.is_command {
            let output = self.run_command(input, &contents)?;
            Value::String(output)
        } else {
            let name = contents.trim();
            match scope.get(name) {
                None => {
                    return Err(EvalError::UndefinedVariable {
                        name: name.to_string(),
                        file: self.file_name(),
                    });
                }
                Some(Value::List(items)) if !reference.is_list => {
                    let items = items
                        .iter()
                        .map(|i| {
                            i.to_scalar_string()
                                .ok_or_else(|| self.invalid(input, "nested list in variable"))
                        })
                        .collect::<EvalResult<Vec<_>>>()?;
                    Value::String(encode_posix_list(items))
                }
                Some(Value::Mapping(_)) => {
                    return Err(self.invalid(input, format!("{name} is a dict")));
                }
                Some(value) => value.clone(),
            }
        };

        if !reference.is_list {
            return Ok(replacement);
        }

        match replacement {
            Value::List(items) => Ok(Value::List(items)),
            scalar => {
                let text = scalar.to_scalar_string().unwrap_or_default();
                let words = split_words(&text).map_err(|e| self.invalid(input, e.to_string()))?;
                Ok(Value::List(words.into_iter().map(Value::String).collect()))
            }
        }
    }

    fn run_command(&self, input: &str, contents: &str) -> EvalResult<String> {
        let command = if contents.trim_start().starts_with('[') {
            let argv = parse_document(contents)
                .map_err(|e| self.invalid(input, format!("bad command list: {e}")))?;
            let Value::List(items) = argv else {
                return Err(self.invalid(input, "command must be a string or a list"));
            };
            let argv = items
                .iter()
                .map(|i| {
                    i.to_scalar_string()
                        .ok_or_else(|| self.invalid(input, "command list items must be strings"))
                })
                .collect::<EvalResult<Vec<_>>>()?;
            CommandLine::Argv(argv)
        } else {
            CommandLine::Shell(contents.to_string())
        };

        let cwd = self.build_file.parent().unwrap_or(Path::new(""));
        debug!(
            "{} running {:?} for {}",
            self.phase.sigil(),
            command.display(),
            self.file_name()
        );
        self.runner.run(&command, cwd)
    }
}
