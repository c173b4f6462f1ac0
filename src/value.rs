use crate::datetime::Datetime;
use crate::tree::{ArrayId, TableId};
use crate::Span;
use std::borrow::Cow;
use std::fmt;

/// A decoded TOML value.
///
/// Scalar variants carry their payload inline; tables and arrays carry a
/// handle into the [`Tree`](crate::Tree) that owns them. Strings borrow from
/// the source document whenever the literal needed no unescaping.
#[derive(Clone, PartialEq)]
pub enum Value<'de> {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(Cow<'de, str>),
    Datetime(Datetime),
    Table(TableId),
    Array(ArrayId),
}

impl<'de> Value<'de> {
    /// Discriminant of this value, with date-times split by sub-variant.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Boolean(..) => ValueKind::Boolean,
            Value::Integer(..) => ValueKind::Integer,
            Value::Float(..) => ValueKind::Float,
            Value::String(..) => ValueKind::String,
            Value::Datetime(dt) => match (dt.date, dt.time, dt.offset) {
                (Some(..), Some(..), Some(..)) => ValueKind::OffsetDatetime,
                (Some(..), Some(..), None) => ValueKind::LocalDatetime,
                (Some(..), None, _) => ValueKind::LocalDate,
                (None, _, _) => ValueKind::LocalTime,
            },
            Value::Table(..) => ValueKind::Table,
            Value::Array(..) => ValueKind::Array,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&Datetime> {
        match self {
            Value::Datetime(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<TableId> {
        match self {
            Value::Table(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<ArrayId> {
        match self {
            Value::Array(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::Datetime(v) => write!(f, "{v:?}"),
            Value::Table(id) => write!(f, "{id:?}"),
            Value::Array(id) => write!(f, "{id:?}"),
        }
    }
}

/// The discriminant of a [`Value`], including the four date-time
/// sub-variants.
///
/// Also serves as the element type of a uniform array, see
/// [`ArrayKind`](crate::ArrayKind).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ValueKind {
    Boolean,
    Integer,
    Float,
    String,
    OffsetDatetime,
    LocalDatetime,
    LocalDate,
    LocalTime,
    Table,
    Array,
}

/// A table key together with the span of its source text.
///
/// For quoted keys the span covers the quotes; `name` is always the decoded
/// text without them.
#[derive(Clone, PartialEq)]
pub struct Key<'de> {
    pub name: Cow<'de, str>,
    pub span: Span,
}

impl fmt::Debug for Key<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.name, f)
    }
}
