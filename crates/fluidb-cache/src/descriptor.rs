//! Cache keys for query results.
//!
//! A [`CommandDescriptor`] identifies a read by the shape of its result,
//! its SQL text and its parameters. Positional parameters compare in
//! order; named parameters compare as a set sorted by name.

use std::fmt;
use std::ops::BitOr;

use fluidb_common::Params;

/// Shape of the result a command is read into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CommandTag(u8);

impl CommandTag {
    /// Command executed for its side effects.
    pub const EXEC: CommandTag = CommandTag(0);
    /// Single value.
    pub const CELL: CommandTag = CommandTag(1);
    /// Whole row.
    pub const ROW: CommandTag = CommandTag(2);
    /// Multiple rows or values.
    pub const MULTI: CommandTag = CommandTag(4);

    /// Returns the raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if every bit of `other` is set.
    pub const fn contains(self, other: CommandTag) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CommandTag {
    type Output = CommandTag;

    fn bitor(self, rhs: CommandTag) -> CommandTag {
        CommandTag(self.0 | rhs.0)
    }
}

/// Normalized description of a read command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandDescriptor {
    tag: CommandTag,
    sql: String,
    params: Params,
}

impl CommandDescriptor {
    /// Creates a descriptor.
    pub fn new(tag: CommandTag, sql: impl Into<String>, params: Params) -> Self {
        Self {
            tag,
            sql: sql.into(),
            params,
        }
    }

    /// Returns the result shape.
    pub fn tag(&self) -> CommandTag {
        self.tag
    }

    /// Returns the SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }
}

impl fmt::Display for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({} params)", self.tag.0, self.sql, self.params.len())
    }
}
