//! Named shared-object table
//!
//! The coordinator creates objects once at startup, then publishes
//! accessors for them. Accessor registration order is preserved: a
//! handle published later may depend on objects published earlier,
//! never the reverse.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use hive_core::RegistryError;
use hive_protocol::{AccessorInfo, ObjectKind, ObjectOp, Reply};

use crate::primitives::{CounterQueue, FlagEvent, PollLock};

/// A shared object living inside the registry process
#[derive(Debug, Clone)]
pub enum SharedObject {
    /// Poll-acquired lock
    Lock(Arc<PollLock>),
    /// Manual-reset event
    Event(Arc<FlagEvent>),
    /// Counting-barrier queue
    Queue(Arc<CounterQueue>),
}

impl SharedObject {
    /// Kind tag of this object
    pub fn kind(&self) -> ObjectKind {
        match self {
            SharedObject::Lock(_) => ObjectKind::Lock,
            SharedObject::Event(_) => ObjectKind::Event,
            SharedObject::Queue(_) => ObjectKind::Queue,
        }
    }
}

/// Table of named shared objects and their published accessors
#[derive(Debug, Default)]
pub struct Registry {
    objects: DashMap<String, SharedObject>,
    /// (accessor, object) pairs in registration order
    accessors: Mutex<Vec<(String, String)>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate and store a shared object.
    ///
    /// Names are identities: a duplicate name is rejected rather than
    /// silently overwritten.
    pub fn create_object(&self, name: &str, kind: ObjectKind) -> Result<(), RegistryError> {
        use dashmap::mapref::entry::Entry;

        let object = match kind {
            ObjectKind::Lock => SharedObject::Lock(Arc::new(PollLock::new())),
            ObjectKind::Event => SharedObject::Event(Arc::new(FlagEvent::new())),
            ObjectKind::Queue => SharedObject::Queue(Arc::new(CounterQueue::new())),
        };

        match self.objects.entry(name.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateObject(name.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(object);
                Ok(())
            }
        }
    }

    /// Direct handle to a lock object (coordinator-side use)
    pub fn lock(&self, name: &str) -> Result<Arc<PollLock>, RegistryError> {
        match self.object(name)? {
            SharedObject::Lock(lock) => Ok(lock),
            other => Err(RegistryError::WrongKind {
                accessor: name.to_string(),
                kind: other.kind(),
                op: "lock handle".to_string(),
            }),
        }
    }

    /// Direct handle to an event object (coordinator-side use)
    pub fn event(&self, name: &str) -> Result<Arc<FlagEvent>, RegistryError> {
        match self.object(name)? {
            SharedObject::Event(event) => Ok(event),
            other => Err(RegistryError::WrongKind {
                accessor: name.to_string(),
                kind: other.kind(),
                op: "event handle".to_string(),
            }),
        }
    }

    /// Direct handle to a queue object (coordinator-side use)
    pub fn queue(&self, name: &str) -> Result<Arc<CounterQueue>, RegistryError> {
        match self.object(name)? {
            SharedObject::Queue(queue) => Ok(queue),
            other => Err(RegistryError::WrongKind {
                accessor: name.to_string(),
                kind: other.kind(),
                op: "queue handle".to_string(),
            }),
        }
    }

    /// Look up an object by name
    pub fn object(&self, name: &str) -> Result<SharedObject, RegistryError> {
        self.objects
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::UnknownObject(name.to_string()))
    }

    /// Publish a named accessor for an existing object.
    ///
    /// Register accessors in the order remote code needs them.
    pub fn register_accessor(&self, accessor: &str, object: &str) -> Result<(), RegistryError> {
        if !self.objects.contains_key(object) {
            return Err(RegistryError::UnknownObject(object.to_string()));
        }

        let mut accessors = self.accessors.lock().expect("accessor table poisoned");
        if accessors.iter().any(|(name, _)| name == accessor) {
            return Err(RegistryError::DuplicateAccessor(accessor.to_string()));
        }
        accessors.push((accessor.to_string(), object.to_string()));
        Ok(())
    }

    /// Published accessors, in registration order
    pub fn list_accessors(&self) -> Vec<AccessorInfo> {
        self.accessors
            .lock()
            .expect("accessor table poisoned")
            .iter()
            .filter_map(|(accessor, object)| {
                self.objects.get(object).map(|entry| AccessorInfo {
                    name: accessor.clone(),
                    kind: entry.value().kind(),
                })
            })
            .collect()
    }

    /// Resolve an accessor to the object behind it
    pub fn resolve(&self, accessor: &str) -> Result<SharedObject, RegistryError> {
        let object_name = self
            .accessors
            .lock()
            .expect("accessor table poisoned")
            .iter()
            .find(|(name, _)| name == accessor)
            .map(|(_, object)| object.clone())
            .ok_or_else(|| RegistryError::UnknownAccessor(accessor.to_string()))?;
        self.object(&object_name)
    }

    /// Apply a remote operation to the object behind an accessor
    pub fn apply(&self, accessor: &str, op: &ObjectOp) -> Result<Reply, RegistryError> {
        let object = self.resolve(accessor)?;
        let wrong_kind = || RegistryError::WrongKind {
            accessor: accessor.to_string(),
            kind: object.kind(),
            op: op.name().to_string(),
        };

        let reply = match (&object, op) {
            (SharedObject::Lock(lock), ObjectOp::TryAcquire) => Reply::Bool(lock.try_acquire()),
            (SharedObject::Lock(lock), ObjectOp::Release) => {
                lock.release();
                Reply::Unit
            }
            (SharedObject::Lock(lock), ObjectOp::IsLocked) => Reply::Bool(lock.locked()),

            (SharedObject::Event(event), ObjectOp::Set) => {
                event.set();
                Reply::Unit
            }
            (SharedObject::Event(event), ObjectOp::Clear) => {
                event.clear();
                Reply::Unit
            }
            (SharedObject::Event(event), ObjectOp::IsSet) => Reply::Bool(event.is_set()),

            (SharedObject::Queue(queue), ObjectOp::Put { value, times }) => {
                queue.put(value.clone(), *times);
                Reply::Unit
            }
            (SharedObject::Queue(queue), ObjectOp::Get) => Reply::Item(queue.get()),
            (SharedObject::Queue(queue), ObjectOp::GetLast) => Reply::Item(queue.get_last()),
            (SharedObject::Queue(queue), ObjectOp::Len) => Reply::Count(queue.len() as u64),
            (SharedObject::Queue(queue), ObjectOp::AttachCounter) => {
                queue.attach_counter();
                Reply::Unit
            }
            (SharedObject::Queue(queue), ObjectOp::DetachCounter) => {
                queue.detach_counter();
                Reply::Unit
            }
            (SharedObject::Queue(queue), ObjectOp::ResetCounter) => {
                queue.reset_counter();
                Reply::Unit
            }
            (SharedObject::Queue(queue), ObjectOp::CounterItems) => {
                Reply::Items(queue.counter_items())
            }

            _ => return Err(wrong_kind()),
        };

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_protocol::Value;

    #[test]
    fn test_duplicate_object_rejected() {
        let registry = Registry::new();
        registry.create_object("lock", ObjectKind::Lock).unwrap();

        let result = registry.create_object("lock", ObjectKind::Event);
        assert!(matches!(result, Err(RegistryError::DuplicateObject(name)) if name == "lock"));

        // Original object untouched
        assert_eq!(registry.object("lock").unwrap().kind(), ObjectKind::Lock);
    }

    #[test]
    fn test_accessor_requires_existing_object() {
        let registry = Registry::new();
        let result = registry.register_accessor("get_lock", "lock");
        assert!(matches!(result, Err(RegistryError::UnknownObject(_))));
    }

    #[test]
    fn test_duplicate_accessor_rejected() {
        let registry = Registry::new();
        registry.create_object("lock", ObjectKind::Lock).unwrap();
        registry.register_accessor("get_lock", "lock").unwrap();

        let result = registry.register_accessor("get_lock", "lock");
        assert!(matches!(result, Err(RegistryError::DuplicateAccessor(_))));
    }

    #[test]
    fn test_accessors_listed_in_registration_order() {
        let registry = Registry::new();
        registry.create_object("ports", ObjectKind::Queue).unwrap();
        registry.create_object("lock", ObjectKind::Lock).unwrap();
        registry.create_object("published", ObjectKind::Event).unwrap();

        registry.register_accessor("get_ports", "ports").unwrap();
        registry.register_accessor("get_lock", "lock").unwrap();
        registry
            .register_accessor("get_published", "published")
            .unwrap();

        let accessors = registry.list_accessors();
        let names: Vec<&str> = accessors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["get_ports", "get_lock", "get_published"]);
        assert_eq!(accessors[0].kind, ObjectKind::Queue);
        assert_eq!(accessors[1].kind, ObjectKind::Lock);
        assert_eq!(accessors[2].kind, ObjectKind::Event);
    }

    #[test]
    fn test_apply_lock_ops() {
        let registry = Registry::new();
        registry.create_object("lock", ObjectKind::Lock).unwrap();
        registry.register_accessor("get_lock", "lock").unwrap();

        assert_eq!(
            registry.apply("get_lock", &ObjectOp::TryAcquire).unwrap(),
            Reply::Bool(true)
        );
        assert_eq!(
            registry.apply("get_lock", &ObjectOp::TryAcquire).unwrap(),
            Reply::Bool(false)
        );
        assert_eq!(
            registry.apply("get_lock", &ObjectOp::Release).unwrap(),
            Reply::Unit
        );
        assert_eq!(
            registry.apply("get_lock", &ObjectOp::IsLocked).unwrap(),
            Reply::Bool(false)
        );
    }

    #[test]
    fn test_apply_wrong_kind() {
        let registry = Registry::new();
        registry.create_object("lock", ObjectKind::Lock).unwrap();
        registry.register_accessor("get_lock", "lock").unwrap();

        let result = registry.apply("get_lock", &ObjectOp::Get);
        assert!(matches!(result, Err(RegistryError::WrongKind { .. })));
    }

    #[test]
    fn test_apply_unknown_accessor() {
        let registry = Registry::new();
        let result = registry.apply("nope", &ObjectOp::Get);
        assert!(matches!(result, Err(RegistryError::UnknownAccessor(_))));
    }

    #[test]
    fn test_apply_queue_ops() {
        let registry = Registry::new();
        registry.create_object("ports", ObjectKind::Queue).unwrap();
        registry.register_accessor("get_ports", "ports").unwrap();

        registry
            .apply("get_ports", &ObjectOp::AttachCounter)
            .unwrap();
        registry
            .apply(
                "get_ports",
                &ObjectOp::Put {
                    value: Value::Int(3001),
                    times: 1,
                },
            )
            .unwrap();

        assert_eq!(
            registry.apply("get_ports", &ObjectOp::Len).unwrap(),
            Reply::Count(1)
        );
        assert_eq!(
            registry.apply("get_ports", &ObjectOp::CounterItems).unwrap(),
            Reply::Items(vec![Value::Int(3001)])
        );
        assert_eq!(
            registry.apply("get_ports", &ObjectOp::Get).unwrap(),
            Reply::Item(Some(Value::Int(3001)))
        );
    }
}
