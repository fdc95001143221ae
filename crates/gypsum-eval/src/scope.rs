use gypsum_syntax::{Mapping, Value};
use im_rc::HashMap;

/// Variables visible at one point of a build file.
///
/// Every nested dict sees a copy of its parent's variables plus its own, so scopes are cloned
/// freely; the persistent map makes that cheap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableScope {
    vars: HashMap<String, Value>,
}

impl VariableScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Expose a dict's own scalar and list keys as `_key` variables.
    pub(crate) fn load_automatic_variables(&mut self, dict: &Mapping) {
        for (key, value) in dict {
            if matches!(value, Value::String(_) | Value::Integer(_) | Value::List(_)) {
                self.set(format!("_{key}"), value.clone());
            }
        }
    }

    /// Load the `variables` sub-dict of `dict`. Names ending in `%` are defaults that only apply
    /// when the variable is not already set.
    pub(crate) fn load_variables_dict(&mut self, dict: &Mapping, dict_key: Option<&str>) {
        let Some(Value::Mapping(variables)) = dict.get("variables") else {
            return;
        };

        for (key, value) in variables {
            if value.is_mapping() {
                continue;
            }

            let (name, value) = match key.strip_suffix('%') {
                Some(name) => {
                    if self.contains(name) {
                        continue;
                    }
                    // In a variables dict, a sibling key overrides the nested default
                    match dict.get(name) {
                        Some(sibling) if dict_key == Some("variables") => (name, sibling),
                        _ => (name, value),
                    }
                }
                None => (key.as_str(), value),
            };
            self.set(name, value.clone());
        }
    }
}

impl FromIterator<(String, Value)> for VariableScope {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}
