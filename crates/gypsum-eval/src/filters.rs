//! `key!` and `key/` list filters.
//!
//! `sources!` lists items to drop from `sources`. `sources/` is a list of
//! `['exclude'|'include', regex]` pairs applied in order. Dropped items land in
//! `sources_excluded`, and both filter keys are removed once applied.

use gypsum_syntax::{Mapping, Value};
use regex::Regex;
use tracing::trace;

use crate::errors::{EvalError, EvalResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Undecided,
    Exclude,
    Include,
}

fn invalid(name: &str, key: &str, message: impl Into<String>) -> EvalError {
    EvalError::InvalidFilter {
        name: name.to_string(),
        key: key.to_string(),
        message: message.into(),
    }
}

fn item_text(item: &Value) -> String {
    item.to_scalar_string().unwrap_or_else(|| item.to_string())
}

fn apply_regex_filters(
    name: &str,
    regex_key: &str,
    filters: &Value,
    list: &[Value],
    actions: &mut [Action],
) -> EvalResult<()> {
    let Value::List(filters) = filters else {
        return Err(invalid(name, regex_key, "must be a list"));
    };

    for filter in filters {
        let (action, pattern) = match filter.as_list().map(Vec::as_slice) {
            Some([Value::String(action), Value::String(pattern)]) => (action, pattern),
            _ => {
                return Err(invalid(
                    name,
                    regex_key,
                    format!("filters must be [action, pattern] pairs, found {filter}"),
                ));
            }
        };
        let action = match action.as_str() {
            "exclude" => Action::Exclude,
            "include" => Action::Include,
            other => return Err(invalid(name, regex_key, format!("unrecognized action {other}"))),
        };
        let re = Regex::new(pattern)
            .map_err(|e| invalid(name, regex_key, format!("bad pattern {pattern:?}: {e}")))?;

        for (item, slot) in list.iter().zip(actions.iter_mut()) {
            if *slot != action && re.is_match(&item_text(item)) {
                *slot = action;
            }
        }
    }
    Ok(())
}

/// Apply every list filter in `dict`, then recurse into its values.
pub fn process_list_filters(name: &str, dict: &mut Mapping) -> EvalResult<()> {
    let mut lists: Vec<String> = Vec::new();
    let mut orphans = Vec::new();

    for (key, value) in dict.iter() {
        let Some(list_key) = key.strip_suffix(['!', '/']) else {
            continue;
        };
        if !value.is_list() {
            return Err(invalid(
                name,
                key,
                format!("must be a list, not {}", value.type_name()),
            ));
        }
        match dict.get(list_key) {
            // Nothing to operate on
            None => orphans.push(key.clone()),
            Some(Value::List(_)) => {
                if !lists.iter().any(|l| l == list_key) {
                    lists.push(list_key.to_string());
                }
            }
            Some(other) => {
                return Err(invalid(
                    name,
                    list_key,
                    format!("filtered key must be a list, not {}", other.type_name()),
                ));
            }
        }
    }
    for orphan in orphans {
        dict.shift_remove(&orphan);
    }

    for list_key in lists {
        let exclude_key = format!("{list_key}!");
        let regex_key = format!("{list_key}/");
        let excluded_key = format!("{list_key}_excluded");

        let list = match dict.get(&list_key) {
            Some(Value::List(l)) => l.clone(),
            _ => Vec::new(),
        };
        let mut actions = vec![Action::Undecided; list.len()];

        if let Some(Value::List(excludes)) = dict.shift_remove(&exclude_key) {
            for (item, slot) in list.iter().zip(actions.iter_mut()) {
                if excludes.contains(item) {
                    *slot = Action::Exclude;
                }
            }
        }
        if let Some(filters) = dict.shift_remove(&regex_key) {
            apply_regex_filters(name, &regex_key, &filters, &list, &mut actions)?;
        }

        if dict.contains_key(&excluded_key) {
            return Err(invalid(
                name,
                &excluded_key,
                format!("must not be present before filters are applied to {list_key}"),
            ));
        }

        let (excluded, kept): (Vec<_>, Vec<_>) = list
            .into_iter()
            .zip(actions)
            .partition(|(_, action)| *action == Action::Exclude);
        let excluded: Vec<Value> = excluded.into_iter().map(|(v, _)| v).collect();
        trace!("{name}: {list_key} filtered out {} items", excluded.len());

        dict.insert(
            list_key.clone(),
            Value::List(kept.into_iter().map(|(v, _)| v).collect()),
        );
        if !excluded.is_empty() {
            dict.insert(excluded_key, Value::List(excluded));
        }
    }

    for (key, value) in dict.iter_mut() {
        match value {
            Value::Mapping(m) => process_list_filters(key, m)?,
            Value::List(l) => process_list_filters_in_list(key, l)?,
            _ => {}
        }
    }
    Ok(())
}

fn process_list_filters_in_list(name: &str, list: &mut [Value]) -> EvalResult<()> {
    for item in list {
        match item {
            Value::Mapping(m) => process_list_filters(name, m)?,
            Value::List(l) => process_list_filters_in_list(name, l)?,
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gypsum_syntax::value;
    use pretty_assertions::assert_eq;

    fn filtered(v: Value) -> EvalResult<Value> {
        let Value::Mapping(mut m) = v else {
            panic!("not a mapping")
        };
        process_list_filters("test", &mut m)?;
        Ok(Value::Mapping(m))
    }

    #[test]
    fn exclusion_list() {
        let out = filtered(value!({
            "sources": ["a.c", "b_win.c", "c.c"],
            "sources!": ["b_win.c", "missing.c"],
        }))
        .unwrap();
        assert_eq!(
            out,
            value!({"sources": ["a.c", "c.c"], "sources_excluded": ["b_win.c"]})
        );
    }

    #[test]
    fn regex_filters_apply_in_order() {
        let out = filtered(value!({
            "sources": ["a_linux.cc", "a_mac.cc", "a_win.cc", "main.cc"],
            "sources/": [["exclude", "_(linux|mac|win)\\.cc$"], ["include", "_linux\\.cc$"]],
        }))
        .unwrap();
        assert_eq!(
            out,
            value!({
                "sources": ["a_linux.cc", "main.cc"],
                "sources_excluded": ["a_mac.cc", "a_win.cc"],
            })
        );
    }

    #[test]
    fn orphan_filter_is_dropped() {
        let out = filtered(value!({"sources!": ["x.c"]})).unwrap();
        assert_eq!(out, value!({}));
    }

    #[test]
    fn recurses_into_targets() {
        let out = filtered(value!({
            "targets": [{"target_name": "t", "defines": ["A", "B"], "defines!": ["A"]}],
        }))
        .unwrap();
        assert_eq!(
            out,
            value!({
                "targets": [{"target_name": "t", "defines": ["B"], "defines_excluded": ["A"]}],
            })
        );
    }

    #[test]
    fn errors() {
        let err = filtered(value!({
            "sources": ["a.c"],
            "sources!": ["a.c"],
            "sources_excluded": [],
        }))
        .unwrap_err();
        assert_eq!(err.kind(), "ListFilterError");

        let err = filtered(value!({"sources": ["a.c"], "sources/": [["drop", "a"]]})).unwrap_err();
        assert!(matches!(err, EvalError::InvalidFilter { .. }));

        let err = filtered(value!({"sources": "a.c", "sources!": ["a.c"]})).unwrap_err();
        assert!(matches!(err, EvalError::InvalidFilter { .. }));
    }
}
