//! Command parameters.

use std::collections::BTreeMap;

use super::value::Value;

/// Build positional [`Params`] from heterogeneous values.
///
/// ```
/// use fluidb_common::params;
///
/// let p = params![42_i64, "hello", 3.5_f64];
/// assert_eq!(p.len(), 3);
/// assert_eq!(params![].len(), 0);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::Positional(::std::vec::Vec::new())
    };
    ($($val:expr),+ $(,)?) => {
        $crate::Params::Positional(vec![$($crate::Value::from($val)),+])
    };
}

/// Parameters bound to a command.
///
/// Named parameters live in a sorted map, so two named sets with the same
/// entries are equal regardless of the order the caller supplied them in.
/// Names are stored without a prefix; connections add whatever sigil the
/// driver expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Params {
    /// Parameters bound by position.
    Positional(Vec<Value>),
    /// Parameters bound by name.
    Named(BTreeMap<String, Value>),
}

impl Params {
    /// No parameters.
    pub fn none() -> Self {
        Params::Positional(Vec::new())
    }

    /// Builds named parameters from `(name, value)` pairs.
    ///
    /// A leading `:`, `@` or `$` on a name is dropped.
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        Params::Named(
            pairs
                .into_iter()
                .map(|(k, v)| {
                    let name = k.as_ref().trim_start_matches([':', '@', '$']);
                    (name.to_string(), v.into())
                })
                .collect(),
        )
    }

    /// Returns the number of parameters.
    pub fn len(&self) -> usize {
        match self {
            Params::Positional(values) => values.len(),
            Params::Named(map) => map.len(),
        }
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Params {
    fn default() -> Self {
        Params::none()
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl From<BTreeMap<String, Value>> for Params {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Params::Named(map)
    }
}
