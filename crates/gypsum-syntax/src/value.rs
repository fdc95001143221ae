use std::fmt;

use derive_more::{From, IsVariant};
use indexmap::IndexMap;
use itertools::Itertools;

pub type Mapping = IndexMap<String, Value>;

/// A node in a loaded build file: the tagged union every later stage works on.
#[derive(Debug, Clone, PartialEq, Eq, From, IsVariant)]
pub enum Value {
    String(String),
    Integer(i64),
    List(Vec<Value>),
    Mapping(Mapping),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Integer(value as i64)
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "str",
            Value::Integer(_) => "int",
            Value::List(_) => "list",
            Value::Mapping(_) => "dict",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::String(_) | Value::Integer(_))
    }

    /// Strings and integers rendered as text; containers have no scalar form.
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            _ => None,
        }
    }

    /// Python truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::String(s) => !s.is_empty(),
            Value::Integer(i) => *i != 0,
            Value::List(l) => !l.is_empty(),
            Value::Mapping(m) => !m.is_empty(),
        }
    }

    /// Every scalar of a list, as text. Non-lists and nested containers yield nothing.
    pub fn string_items(&self) -> Vec<String> {
        self.as_list()
            .map(|l| l.iter().filter_map(Value::to_scalar_string).collect())
            .unwrap_or_default()
    }
}

fn write_python_str(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "'")?;
    for c in s.chars() {
        match c {
            '\\' => write!(f, "\\\\")?,
            '\'' => write!(f, "\\'")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "'")
}

/// Renders in the same literal syntax the loader reads.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write_python_str(f, s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::List(l) => write!(f, "[{}]", l.iter().join(", ")),
            Value::Mapping(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_python_str(f, k)?;
                    write!(f, ": {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Build a [Value] from literal syntax, for tests.
///
/// ```
/// use gypsum_syntax::{value, Value};
/// let v = value!({"a": ["x", 1], "b": {"c": "d"}});
/// assert_eq!(v.to_string(), "{'a': ['x', 1], 'b': {'c': 'd'}}");
/// ```
#[macro_export]
macro_rules! value {
    ({ $($key:literal : $val:tt),* $(,)? }) => {{
        #[allow(unused_mut)]
        let mut map = $crate::Mapping::new();
        $( map.insert($key.to_string(), $crate::value!($val)); )*
        $crate::Value::Mapping(map)
    }};
    ([ $($val:tt),* $(,)? ]) => {
        $crate::Value::List(vec![$($crate::value!($val)),*])
    };
    ($other:expr) => {
        $crate::Value::from($other)
    };
}
