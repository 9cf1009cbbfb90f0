use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::ContainerHandle;

/// Name under which the activating event is bound in every scope
pub const EVENT_VAR: &str = "event";

/// A variable scope
pub type Vars = HashMap<String, Value>;

/// Anything the host fires triggers for
///
/// Implemented for every `Send + Sync + Debug + 'static` type, so host event
/// structs can be passed straight to [`crate::Trigger::activate`].
pub trait Event: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync + fmt::Debug> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<'a> dyn Event + 'a {
    /// Downcast to the host's concrete event type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Shared reference to an event
pub type EventRef = Arc<dyn Event>;

/// Stable identity of an actor (the subject a cooldown applies to)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Uuid);

impl ActorId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ActorId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A value visible to scripts
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Event(EventRef),
    Container(ContainerHandle),
    Actor(ActorId),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Event(_) => "event",
            Value::Container(_) => "container",
            Value::Actor(_) => "actor",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view of the value; numeric strings are parsed
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_event(&self) -> Option<&EventRef> {
        match self {
            Value::Event(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<ContainerHandle> {
        match self {
            Value::Container(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_actor(&self) -> Option<ActorId> {
        match self {
            Value::Actor(a) => Some(*a),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Event(_) | Value::Container(_) | Value::Actor(_) => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Event(a), Value::Event(b)) => Arc::ptr_eq(a, b),
            (Value::Container(a), Value::Container(b)) => a == b,
            (Value::Actor(a), Value::Actor(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Event(e) => write!(f, "{:?}", e),
            Value::Container(h) => write!(f, "{}", h),
            Value::Actor(a) => write!(f, "{}", a),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<ActorId> for Value {
    fn from(a: ActorId) -> Self {
        Value::Actor(a)
    }
}

impl From<ContainerHandle> for Value {
    fn from(h: ContainerHandle) -> Self {
        Value::Container(h)
    }
}

impl From<EventRef> for Value {
    fn from(e: EventRef) -> Self {
        Value::Event(e)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Chat {
        message: String,
    }

    #[test]
    fn test_event_downcast() {
        let event: EventRef = Arc::new(Chat {
            message: "hi".to_string(),
        });

        assert!(event.is::<Chat>());
        assert_eq!(event.downcast_ref::<Chat>().unwrap().message, "hi");
        assert!(event.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_ne!(Value::Int(3), Value::Str("3".into()));

        let event: EventRef = Arc::new(1u8);
        assert_eq!(Value::Event(event.clone()), Value::Event(event));
        assert_ne!(
            Value::Event(Arc::new(1u8)),
            Value::Event(Arc::new(1u8) as EventRef)
        );
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::from("2.5").as_f64(), Some(2.5));
        assert_eq!(Value::Int(4).as_f64(), Some(4.0));
        assert_eq!(Value::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_display_list() {
        let v = Value::from(vec![1i64, 2, 3]);
        assert_eq!(v.to_string(), "[1, 2, 3]");
        assert!(v.is_truthy());
        assert!(!Value::Null.is_truthy());
    }

    #[test]
    fn test_actor_id_parse() {
        let id = ActorId::random();
        let parsed: ActorId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
