//! Primary keys.
//!
//! Every table has a [`KeyPolicy`]: its ordered key column names and
//! whether the database generates the key. Tables without a registered
//! policy use a single auto-increment column named after the configured
//! default (`id`).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use fluidb_common::{FluidError, FluidResult, Record, Value};

/// A key made of several named, non-null components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundKey {
    components: BTreeMap<String, Value>,
}

impl CompoundKey {
    /// Builds a key from `(name, value)` pairs. Fails if there are no
    /// components or any of them is null.
    pub fn new<I, K, V>(components: I) -> FluidResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut map = BTreeMap::new();
        for (name, value) in components {
            let name = name.into();
            let value = value.into();
            if value.is_null() {
                return Err(FluidError::malformed_key(format!(
                    "component '{}' is null",
                    name
                )));
            }
            map.insert(name, value);
        }
        if map.is_empty() {
            return Err(FluidError::malformed_key("no components"));
        }
        Ok(Self { components: map })
    }

    /// Reads the named components out of a record. Every name must be
    /// present and non-null.
    pub fn from_record(names: &[String], record: &Record) -> FluidResult<Self> {
        let mut components = Vec::with_capacity(names.len());
        for name in names {
            match record.get(name) {
                Some(value) if !value.is_null() => components.push((name.clone(), value.clone())),
                _ => {
                    return Err(FluidError::malformed_key(format!(
                        "missing component '{}'",
                        name
                    )))
                }
            }
        }
        Self::new(components)
    }

    /// Returns a component.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.components.get(name)
    }

    /// Iterates components sorted by name.
    pub fn components(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.components.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Always false; a compound key has at least one component.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Display for CompoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, (name, value)) in self.components().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        write!(f, ")")
    }
}

/// A row's key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A single column key.
    Simple(Value),
    /// A multi-column key.
    Compound(CompoundKey),
}

impl Key {
    /// Builds a simple key.
    pub fn simple(value: impl Into<Value>) -> Self {
        Key::Simple(value.into())
    }

    /// Returns the simple key value.
    pub fn as_simple(&self) -> Option<&Value> {
        match self {
            Key::Simple(value) => Some(value),
            Key::Compound(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Simple(value) => write!(f, "{}", value),
            Key::Compound(key) => write!(f, "{}", key),
        }
    }
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        Key::Simple(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Simple(Value::I64(value))
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Simple(Value::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Simple(Value::Text(value))
    }
}

impl From<CompoundKey> for Key {
    fn from(key: CompoundKey) -> Self {
        Key::Compound(key)
    }
}

/// Key columns and generation policy of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPolicy {
    names: Vec<String>,
    auto_increment: bool,
}

impl KeyPolicy {
    /// Returns the key column names in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns true if the database generates the key.
    pub fn auto_increment(&self) -> bool {
        self.auto_increment
    }

    /// Returns true for multi-column keys.
    pub fn is_compound(&self) -> bool {
        self.names.len() > 1
    }
}

/// Per-table key policies.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    default_policy: KeyPolicy,
    policies: HashMap<String, KeyPolicy>,
    /// Tables whose rows have been addressed through their policy.
    used: HashSet<String>,
}

impl KeyResolver {
    /// Creates a resolver whose default key is a single auto-increment
    /// column called `default_name`.
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            default_policy: KeyPolicy {
                names: vec![default_name.into()],
                auto_increment: true,
            },
            policies: HashMap::new(),
            used: HashSet::new(),
        }
    }

    /// Registers the key of a table.
    ///
    /// Without an explicit `auto_increment`, single-column keys are
    /// generated and compound keys are not. A compound key cannot be
    /// generated. Once rows of the table have been stored or read, the
    /// policy can no longer change.
    pub fn register(
        &mut self,
        table: &str,
        names: &[&str],
        auto_increment: Option<bool>,
    ) -> FluidResult<()> {
        let mut ordered: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if name.is_empty() {
                return Err(FluidError::malformed_key("empty key column name"));
            }
            if !ordered.iter().any(|n| n == name) {
                ordered.push((*name).to_string());
            }
        }
        if ordered.is_empty() {
            return Err(FluidError::malformed_key(format!(
                "no key columns for table '{}'",
                table
            )));
        }

        let compound = ordered.len() > 1;
        let auto_increment = auto_increment.unwrap_or(!compound);
        if compound && auto_increment {
            return Err(FluidError::InvalidConfig {
                message: format!("compound key of '{}' cannot auto-increment", table),
            });
        }

        let policy = KeyPolicy {
            names: ordered,
            auto_increment,
        };
        if self.used.contains(table) && *self.policy(table) != policy {
            return Err(FluidError::InvalidConfig {
                message: format!("key of table '{}' cannot change after first use", table),
            });
        }
        self.policies.insert(table.to_string(), policy);
        Ok(())
    }

    /// Freezes the policy of a table.
    pub(crate) fn mark_used(&mut self, table: &str) {
        if !self.used.contains(table) {
            self.used.insert(table.to_string());
        }
    }

    /// Returns the policy of a table.
    pub fn policy(&self, table: &str) -> &KeyPolicy {
        self.policies.get(table).unwrap_or(&self.default_policy)
    }

    /// Returns the key column names of a table.
    pub fn key_names(&self, table: &str) -> &[String] {
        self.policy(table).names()
    }

    /// Returns true if the table's key is generated.
    pub fn is_auto_increment(&self, table: &str) -> bool {
        self.policy(table).auto_increment()
    }

    /// Returns the generated key column, if any.
    pub fn auto_increment_column(&self, table: &str) -> Option<&str> {
        let policy = self.policy(table);
        if policy.auto_increment {
            policy.names.first().map(String::as_str)
        } else {
            None
        }
    }

    /// Extracts a record's key. Returns `None` when no key column holds a
    /// value; a compound key with only some components set is malformed.
    pub fn key_of(&self, table: &str, record: &Record) -> FluidResult<Option<Key>> {
        let policy = self.policy(table);
        let present = policy
            .names
            .iter()
            .filter(|name| record.get(*name).is_some_and(|v| !v.is_null()))
            .count();

        if present == 0 {
            return Ok(None);
        }
        if !policy.is_compound() {
            let value = record.get(&policy.names[0]).cloned().unwrap_or(Value::Null);
            return Ok(Some(Key::Simple(value)));
        }
        CompoundKey::from_record(&policy.names, record).map(|key| Some(Key::Compound(key)))
    }

    /// Writes a key into a record.
    pub fn set_key(&self, table: &str, record: &mut Record, key: &Key) -> FluidResult<()> {
        for (name, value) in self.key_columns(table, key)? {
            record.insert(name, value);
        }
        Ok(())
    }

    /// Pairs each key column of a table with its value in `key`.
    pub fn key_columns(&self, table: &str, key: &Key) -> FluidResult<Vec<(String, Value)>> {
        let policy = self.policy(table);
        match key {
            Key::Simple(value) if !policy.is_compound() => {
                Ok(vec![(policy.names[0].clone(), value.clone())])
            }
            Key::Simple(_) => Err(FluidError::malformed_key(format!(
                "table '{}' needs a compound key on ({})",
                table,
                policy.names.join(", ")
            ))),
            Key::Compound(compound) => {
                if compound.len() != policy.names.len() {
                    return Err(FluidError::malformed_key(format!(
                        "table '{}' has {} key columns, key has {}",
                        table,
                        policy.names.len(),
                        compound.len()
                    )));
                }
                policy
                    .names
                    .iter()
                    .map(|name| match compound.get(name) {
                        Some(value) => Ok((name.clone(), value.clone())),
                        None => Err(FluidError::malformed_key(format!(
                            "missing component '{}'",
                            name
                        ))),
                    })
                    .collect()
            }
        }
    }
}
