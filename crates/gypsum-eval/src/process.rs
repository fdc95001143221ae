//! Walking a loaded build file: expanding references and applying `conditions` (or
//! `target_conditions` in the late phase) dict by dict, innermost scopes seeing their parents'
//! variables.

use gypsum_syntax::{Mapping, Value};
use tracing::trace;

use crate::condition::{parse_condition, ConditionError};
use crate::errors::{EvalError, EvalResult};
use crate::expand::{Expander, Phase};
use crate::merge::{merge_dicts, MergeContext};
use crate::scope::VariableScope;

impl Phase {
    /// The key holding this phase's conditions.
    pub fn conditions_key(self) -> &'static str {
        match self {
            Phase::Early => "conditions",
            Phase::Late => "target_conditions",
        }
    }
}

fn scope_for(parent: &VariableScope, dict: &Mapping, dict_key: Option<&str>) -> VariableScope {
    let mut scope = parent.clone();
    scope.load_automatic_variables(dict);
    scope.load_variables_dict(dict, dict_key);
    scope
}

impl Expander<'_> {
    fn condition_error(&self, condition: &str, message: impl Into<String>) -> EvalError {
        EvalError::Condition {
            condition: condition.to_string(),
            file: self.file_name(),
            message: message.into(),
        }
    }

    /// Expand and process every value of `dict` in place.
    ///
    /// `dict_key` is the key `dict` lives under in its parent; `variables` dicts get special
    /// treatment for `%` defaults.
    pub fn process_dict(
        &self,
        dict: &mut Mapping,
        parent: &VariableScope,
        dict_key: Option<&str>,
    ) -> EvalResult<()> {
        let mut scope = parent.clone();
        scope.load_automatic_variables(dict);

        if let Some(Value::Mapping(variables)) = dict.get_mut("variables") {
            // Siblings may reference each other; raw values are resolved by recursive expansion
            for (key, value) in variables.iter() {
                scope.set(key.clone(), value.clone());
            }
            self.process_dict(variables, &scope, Some("variables"))?;
        }
        let scope = scope_for(parent, dict, dict_key);

        for (key, value) in dict.iter_mut() {
            if key == "variables" {
                continue;
            }
            if let Value::String(s) = value {
                let expanded = self.expand(s, &scope)?;
                if !expanded.is_scalar() {
                    return Err(EvalError::InvalidExpansion {
                        input: s.clone(),
                        file: self.file_name(),
                        message: format!(
                            "expansion for key {key} must be a string or integer, found {}",
                            expanded.type_name()
                        ),
                    });
                }
                *value = expanded;
            }
        }

        // Expansion may have changed automatics
        let scope = scope_for(parent, dict, dict_key);
        self.process_conditions(dict, &scope)?;

        // And conditions may have changed anything
        let scope = scope_for(parent, dict, dict_key);
        for (key, value) in dict.iter_mut() {
            if key == "variables" {
                continue;
            }
            match value {
                Value::Mapping(m) => self.process_dict(m, &scope, Some(key.as_str()))?,
                Value::List(l) => self.process_list(l, &scope)?,
                _ => {}
            }
        }

        Ok(())
    }

    /// Expand the strings of `list` in place, splicing list expansions into it.
    pub fn process_list(&self, list: &mut Vec<Value>, scope: &VariableScope) -> EvalResult<()> {
        let mut index = 0;
        while index < list.len() {
            match &mut list[index] {
                Value::Mapping(m) => self.process_dict(m, scope, None)?,
                Value::List(l) => self.process_list(l, scope)?,
                Value::String(s) => match self.expand(s, scope)? {
                    Value::List(items) => {
                        let count = items.len();
                        list.splice(index..=index, items);
                        index += count;
                        continue;
                    }
                    expanded => list[index] = expanded,
                },
                Value::Integer(_) => {}
            }
            index += 1;
        }
        Ok(())
    }

    /// Evaluate this phase's conditions in `dict`, merging each chosen branch into it.
    pub fn process_conditions(&self, dict: &mut Mapping, scope: &VariableScope) -> EvalResult<()> {
        let key = self.phase().conditions_key();
        let Some(conditions) = dict.shift_remove(key) else {
            return Ok(());
        };
        let Value::List(conditions) = conditions else {
            return Err(self.condition_error(key, format!("{key} must be a list")));
        };

        for condition in conditions {
            if let Some(mut chosen) = self.choose_branch(&condition, scope)? {
                self.process_dict(&mut chosen, scope, None)?;
                merge_dicts(dict, &chosen, MergeContext::local(""))?;
            }
        }
        Ok(())
    }

    /// Pick the branch of `[cond, {then}, cond2, {then2}, ..., {else}]` that applies, if any.
    fn choose_branch(
        &self,
        condition: &Value,
        scope: &VariableScope,
    ) -> EvalResult<Option<Mapping>> {
        let key = self.phase().conditions_key();
        let Value::List(parts) = condition else {
            return Err(self.condition_error(
                &condition.to_string(),
                format!("each of {key} must be a list"),
            ));
        };
        if parts.len() < 2 {
            return Err(self.condition_error(
                &condition.to_string(),
                format!("must have at least 2 items, not {}", parts.len()),
            ));
        }

        let mut i = 0;
        let mut result = None;
        while i < parts.len() {
            let expr = &parts[i];
            let Some(Value::Mapping(if_true)) = parts.get(i + 1) else {
                return Err(self.condition_error(
                    &expr.to_string(),
                    "must be followed by a dict",
                ));
            };
            let if_false = match parts.get(i + 2) {
                Some(Value::Mapping(m)) => {
                    i += 3;
                    if i != parts.len() {
                        return Err(self.condition_error(
                            &expr.to_string(),
                            format!("has {} unexpected trailing items", parts.len() - i),
                        ));
                    }
                    Some(m)
                }
                _ => {
                    i += 2;
                    None
                }
            };

            // Later expressions are only evaluated while nothing has matched
            if result.is_none() {
                result = if self.eval_condition(expr, scope)? {
                    Some(if_true.clone())
                } else {
                    if_false.cloned()
                };
            }
        }
        Ok(result)
    }

    /// Expand and evaluate a single condition expression.
    pub fn eval_condition(&self, expr: &Value, scope: &VariableScope) -> EvalResult<bool> {
        let Value::String(text) = expr else {
            return Err(self.condition_error(&expr.to_string(), "condition must be a string"));
        };
        let expanded = self
            .expand_scalar(text, scope)?
            .to_scalar_string()
            .unwrap_or_default();

        let cached = self.conditions.borrow().get(&expanded).cloned();
        let parsed = match cached {
            Some(parsed) => parsed,
            None => {
                let parsed = parse_condition(&expanded)
                    .map_err(|e| self.map_condition_error(&expanded, e))?;
                self.conditions
                    .borrow_mut()
                    .insert(expanded.clone(), parsed.clone());
                parsed
            }
        };

        let result = parsed
            .evaluate(scope)
            .map_err(|e| self.map_condition_error(&expanded, e))?
            .is_truthy();
        trace!("condition {expanded:?} -> {result}");
        Ok(result)
    }

    fn map_condition_error(&self, condition: &str, err: ConditionError) -> EvalError {
        match err {
            ConditionError::UndefinedName(name) => EvalError::UndefinedVariable {
                name,
                file: self.file_name(),
            },
            ConditionError::Syntax(message) | ConditionError::Type(message) => {
                self.condition_error(condition, message)
            }
        }
    }
}
