//! Merging one build-file dict into another: includes, `target_defaults`, chosen condition
//! branches and dependent settings all go through here.

use gypsum_syntax::{Mapping, Value};
use gypsum_util::path::{join, relative_to};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{EvalError, EvalResult};

const PATH_SECTIONS: &[&str] = &[
    "destination",
    "files",
    "include_dirs",
    "inputs",
    "libraries",
    "outputs",
    "sources",
];

static PATH_SECTION_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(dir|file|path)s?$").unwrap());

/// Items that are flags, absolute, or still carry a reference are never rebased.
static NOT_A_RELATIVE_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^['"]?[-/$<>^]"#).unwrap());

/// Strip the list-policy (`=`, `+`, `?`) and filter (`!`) suffixes from a key.
pub fn base_key(key: &str) -> &str {
    key.trim_end_matches(['=', '+', '?', '!'])
}

/// Whether values under `key` are paths relative to the file that declared them.
pub fn is_path_section(key: &str) -> bool {
    let key = base_key(key);
    PATH_SECTIONS.contains(&key) || PATH_SECTION_SUFFIX.is_match(key)
}

/// The directories of the file being merged into and the file the values come from. Relative
/// paths are rebased from `fro_dir` to `to_dir` when the two differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeContext<'a> {
    pub to_dir: &'a str,
    pub fro_dir: &'a str,
}

impl<'a> MergeContext<'a> {
    pub fn new(to_dir: &'a str, fro_dir: &'a str) -> Self {
        Self { to_dir, fro_dir }
    }

    /// Merging within a single directory.
    pub fn local(dir: &'a str) -> Self {
        Self::new(dir, dir)
    }

    pub fn rebase_path(&self, item: &str) -> String {
        if self.to_dir == self.fro_dir || NOT_A_RELATIVE_PATH.is_match(item) {
            return item.to_string();
        }
        let prefix = relative_to(self.fro_dir, self.to_dir);
        let mut ret = join(&prefix, item);
        if item.ends_with('/') && !ret.ends_with('/') {
            ret.push('/');
        }
        ret
    }

    fn rebase(&self, value: &Value, is_paths: bool) -> Value {
        match value {
            Value::String(s) if is_paths => Value::String(self.rebase_path(s)),
            other => other.clone(),
        }
    }
}

fn is_singleton(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.starts_with('-'),
        Value::Integer(_) => true,
        _ => false,
    }
}

/// Merge `fro` into `to`, appending (or prepending) list items.
///
/// Scalars are replaced, dicts merge recursively. Scalars other than flags appear at most once
/// per list: appending a duplicate is a no-op, prepending one moves it to the front.
pub fn merge_lists(
    to: &mut Vec<Value>,
    fro: &[Value],
    ctx: MergeContext<'_>,
    is_paths: bool,
    append: bool,
) -> EvalResult<()> {
    let mut prepend_index = 0;

    for item in fro {
        let to_item = match item {
            Value::String(_) | Value::Integer(_) => ctx.rebase(item, is_paths),
            Value::Mapping(m) => {
                let mut merged = Mapping::new();
                merge_dicts(&mut merged, m, ctx)?;
                Value::Mapping(merged)
            }
            Value::List(l) => {
                let mut merged = Vec::new();
                merge_lists(&mut merged, l, ctx, is_paths, true)?;
                Value::List(merged)
            }
        };
        let singleton = is_singleton(&to_item);

        if append {
            if !(singleton && to.contains(&to_item)) {
                to.push(to_item);
            }
        } else {
            if singleton {
                if let Some(pos) = to.iter().position(|v| *v == to_item) {
                    to.remove(pos);
                    if pos < prepend_index {
                        prepend_index -= 1;
                    }
                }
            }
            to.insert(prepend_index, to_item);
            prepend_index += 1;
        }
    }

    Ok(())
}

fn mismatch(key: &str, fro: &Value, to: &Value) -> EvalError {
    EvalError::MergeTypeMismatch {
        key: key.to_string(),
        from: fro.type_name(),
        to: to.type_name(),
    }
}

/// Merge `fro` into `to`. List keys may carry a policy suffix: `key=` replaces the list, `key+`
/// prepends to it and `key?` only sets it when absent.
pub fn merge_dicts(to: &mut Mapping, fro: &Mapping, ctx: MergeContext<'_>) -> EvalResult<()> {
    for (key, value) in fro {
        if let Some(existing) = to.get(key) {
            let compatible = match value {
                Value::String(_) | Value::Integer(_) => existing.is_scalar(),
                _ => std::mem::discriminant(value) == std::mem::discriminant(existing),
            };
            if !compatible {
                return Err(mismatch(key, value, existing));
            }
        }

        match value {
            Value::String(_) | Value::Integer(_) => {
                to.insert(key.clone(), ctx.rebase(value, is_path_section(key)));
            }
            Value::Mapping(m) => {
                let entry = to
                    .entry(key.clone())
                    .or_insert_with(|| Value::Mapping(Mapping::new()));
                if let Value::Mapping(existing) = entry {
                    merge_dicts(existing, m, ctx)?;
                }
            }
            Value::List(items) => merge_list_entry(to, fro, key, items, ctx)?,
        }
    }

    Ok(())
}

fn merge_list_entry(
    to: &mut Mapping,
    fro: &Mapping,
    key: &str,
    items: &[Value],
    ctx: MergeContext<'_>,
) -> EvalResult<()> {
    let (list_base, policy) = match key.chars().last() {
        Some(c @ ('=' | '+' | '?')) => (&key[..key.len() - 1], Some(c)),
        _ => (key, None),
    };

    let incompatible = match policy {
        Some('=') => vec![list_base.to_string(), format!("{list_base}?")],
        Some('+') => vec![format!("{list_base}="), format!("{list_base}?")],
        Some('?') => vec![
            list_base.to_string(),
            format!("{list_base}="),
            format!("{list_base}+"),
        ],
        _ => vec![format!("{list_base}="), format!("{list_base}?")],
    };
    if let Some(other) = incompatible.into_iter().find(|k| fro.contains_key(k)) {
        return Err(EvalError::IncompatibleListPolicies(key.to_string(), other));
    }

    match to.get(list_base) {
        Some(_) if policy == Some('?') => return Ok(()),
        Some(Value::List(_)) if policy == Some('=') => {
            to.insert(list_base.to_string(), Value::List(Vec::new()));
        }
        Some(Value::List(_)) => {}
        Some(other) => return Err(mismatch(list_base, &Value::List(Vec::new()), other)),
        None => {
            to.insert(list_base.to_string(), Value::List(Vec::new()));
        }
    }

    if let Some(Value::List(existing)) = to.get_mut(list_base) {
        merge_lists(
            existing,
            items,
            ctx,
            is_path_section(list_base),
            policy != Some('+'),
        )?;
    }
    Ok(())
}
