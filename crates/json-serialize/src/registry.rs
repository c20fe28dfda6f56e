use std::any::TypeId;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::class::{JsonClass, CLASS_ID_KEY};
use crate::class_id::ClassId;
use crate::error::SerializeError;

type SnapshotFn = fn(&dyn JsonClass) -> Result<Value, SerializeError>;
type ReviveFn =
    fn(&ClassDescriptor, &Map<String, Value>) -> Result<Box<dyn JsonClass>, SerializeError>;

/// Everything the codec needs to know about one registered class.
pub struct ClassDescriptor {
    class_id: ClassId,
    type_id: TypeId,
    type_name: &'static str,
    fields: BTreeSet<String>,
    snapshot: SnapshotFn,
    revive: ReviveFn,
}

impl ClassDescriptor {
    /// Build a descriptor for `T` under the given id.
    ///
    /// Eagerly serializes `T::default()`: the probe both validates that the
    /// type can be rebuilt by field assignment and fixes the known field
    /// table used when decoding. A type whose default instance does not
    /// serialize to a JSON object fails with
    /// [`SerializeError::NonObjectClass`].
    pub fn of<T>(class_id: ClassId) -> Result<Self, SerializeError>
    where
        T: Default + Serialize + DeserializeOwned + std::any::Any,
    {
        let probe = serde_json::to_value(T::default())
            .map_err(|_| SerializeError::NonObjectClass(std::any::type_name::<T>()))?;
        let Value::Object(snapshot) = probe else {
            return Err(SerializeError::NonObjectClass(std::any::type_name::<T>()));
        };
        Ok(Self {
            class_id,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            fields: snapshot.keys().cloned().collect(),
            snapshot: snapshot_instance::<T>,
            revive: revive_instance::<T>,
        })
    }

    pub fn class_id(&self) -> &ClassId {
        &self.class_id
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether decoding may assign a field of this name.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    /// Known field names, fixed at registration time.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub(crate) fn snapshot_of(&self, value: &dyn JsonClass) -> Result<Value, SerializeError> {
        (self.snapshot)(value)
    }

    pub(crate) fn revive_from(
        &self,
        data: &Map<String, Value>,
    ) -> Result<Box<dyn JsonClass>, SerializeError> {
        (self.revive)(self, data)
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("class_id", &self.class_id)
            .field("type_name", &self.type_name)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

fn snapshot_instance<T>(value: &dyn JsonClass) -> Result<Value, SerializeError>
where
    T: Serialize + std::any::Any,
{
    let Some(concrete) = value.as_any().downcast_ref::<T>() else {
        return Err(SerializeError::NotSerializable(value.type_name()));
    };
    Ok(serde_json::to_value(concrete)?)
}

fn revive_instance<T>(
    descriptor: &ClassDescriptor,
    data: &Map<String, Value>,
) -> Result<Box<dyn JsonClass>, SerializeError>
where
    T: Default + Serialize + DeserializeOwned + std::any::Any,
{
    // Start from the default snapshot so fields missing from the wire keep
    // their default values; keys outside the field table are dropped.
    let Value::Object(mut snapshot) = serde_json::to_value(T::default())? else {
        return Err(SerializeError::NonObjectClass(std::any::type_name::<T>()));
    };
    for (name, value) in data {
        if name == CLASS_ID_KEY || !descriptor.has_field(name) {
            continue;
        }
        snapshot.insert(name.clone(), value.clone());
    }
    let instance: T = serde_json::from_value(Value::Object(snapshot))?;
    Ok(Box::new(instance))
}

/// Store of registered classes: canonical wire id to descriptor, plus a
/// reverse index from the Rust type used when encoding.
///
/// Explicit instances are independently constructible, so tests can build
/// isolated registries; [`global()`] is the process-wide default that
/// [`declare`](crate::declare()), [`encode`](crate::encode) and
/// [`decode`](crate::decode) operate on. Registrations are never pruned.
#[derive(Default)]
pub struct Registry {
    classes: HashMap<String, Arc<ClassDescriptor>>,
    by_type: HashMap<TypeId, Arc<ClassDescriptor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor.
    ///
    /// Fails with [`SerializeError::DuplicateClass`] if the canonical wire
    /// id is already taken; the registry is left unchanged. The first
    /// registration of a given Rust type wins the reverse index, so a type
    /// registered under two ids keeps encoding under the first.
    pub fn register(&mut self, descriptor: ClassDescriptor) -> Result<(), SerializeError> {
        let wire_id = descriptor.class_id().to_string();
        if self.classes.contains_key(&wire_id) {
            return Err(SerializeError::DuplicateClass(wire_id));
        }
        let descriptor = Arc::new(descriptor);
        self.by_type
            .entry(descriptor.type_id())
            .or_insert_with(|| Arc::clone(&descriptor));
        self.classes.insert(wire_id, descriptor);
        Ok(())
    }

    /// Resolve a wire tag to a descriptor.
    ///
    /// A version-qualified tag that is registered resolves exactly; bare
    /// tags and unknown or stale versions resolve to the highest registered
    /// version of the base, so data written against an old registration
    /// still loads against its replacement. Fails with
    /// [`SerializeError::UnresolvedClass`] when no registration shares the
    /// base.
    pub fn resolve(&self, tag: &str) -> Result<&Arc<ClassDescriptor>, SerializeError> {
        let id = ClassId::parse(tag)?;
        if id.version() > 0 {
            if let Some(found) = self.classes.get(&id.to_string()) {
                return Ok(found);
            }
        }
        self.classes
            .values()
            .filter(|descriptor| descriptor.class_id().base() == id.base())
            .max_by_key(|descriptor| descriptor.class_id().version())
            .ok_or_else(|| SerializeError::UnresolvedClass(tag.to_string()))
    }

    /// Reverse lookup by Rust type, used when encoding.
    pub fn descriptor_of(&self, type_id: TypeId) -> Option<Arc<ClassDescriptor>> {
        self.by_type.get(&type_id).map(Arc::clone)
    }

    /// Whether the exact wire id is registered.
    pub fn contains(&self, tag: &str) -> bool {
        self.classes.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterate over the registered descriptors.
    pub fn iter(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.classes.values().map(|descriptor| descriptor.as_ref())
    }
}

static GLOBAL: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(Registry::new()));

/// The process-wide default registry.
///
/// Populated through [`declare`](crate::declare()) during program
/// initialization; encode and decode traffic takes read locks only and
/// never holds one across nested work. Callers that must interleave
/// registration with live traffic provide their own mutual exclusion
/// around both; the lock here only keeps the map itself consistent.
pub fn global() -> &'static RwLock<Registry> {
    &GLOBAL
}

pub(crate) fn read_global() -> RwLockReadGuard<'static, Registry> {
    GLOBAL.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_global() -> RwLockWriteGuard<'static, Registry> {
    GLOBAL.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Probe {
        label: String,
        count: u32,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct ProbeV2 {
        label: String,
        count: u32,
        note: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Grams(u32);

    fn descriptor<T>(tag: &str) -> ClassDescriptor
    where
        T: Default + Serialize + DeserializeOwned + std::any::Any,
    {
        ClassDescriptor::of::<T>(ClassId::parse(tag).unwrap()).unwrap()
    }

    #[test]
    fn test_register_and_resolve_exact() {
        let mut registry = Registry::new();
        registry.register(descriptor::<Probe>("Probe")).unwrap();

        let found = registry.resolve("Probe").unwrap();
        assert_eq!(found.type_id(), TypeId::of::<Probe>());
        assert_eq!(found.class_id().to_string(), "Probe");
        assert!(registry.contains("Probe"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_rejected_registry_unchanged() {
        let mut registry = Registry::new();
        registry.register(descriptor::<Probe>("Probe")).unwrap();

        let err = registry.register(descriptor::<ProbeV2>("Probe")).unwrap_err();
        assert!(matches!(err, SerializeError::DuplicateClass(_)));

        let found = registry.resolve("Probe").unwrap();
        assert_eq!(found.type_id(), TypeId::of::<Probe>());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_version_fallback_prefers_newest() {
        let mut registry = Registry::new();
        registry.register(descriptor::<Probe>("Probe")).unwrap();
        registry.register(descriptor::<ProbeV2>("Probe:2")).unwrap();

        for tag in ["Probe", "Probe:2", "Probe:7"] {
            let found = registry.resolve(tag).unwrap();
            assert_eq!(found.type_id(), TypeId::of::<ProbeV2>(), "tag {tag}");
        }
    }

    #[test]
    fn test_stale_qualified_version_upgrades() {
        let mut registry = Registry::new();
        registry.register(descriptor::<Probe>("Probe")).unwrap();
        registry.register(descriptor::<ProbeV2>("Probe:2")).unwrap();

        let found = registry.resolve("Probe:1").unwrap();
        assert_eq!(found.type_id(), TypeId::of::<ProbeV2>());
    }

    #[test]
    fn test_unknown_base_fails() {
        let registry = Registry::new();
        assert!(matches!(
            registry.resolve("Nope"),
            Err(SerializeError::UnresolvedClass(_))
        ));
    }

    #[test]
    fn test_malformed_tag_fails() {
        let registry = Registry::new();
        assert!(matches!(
            registry.resolve("a:b"),
            Err(SerializeError::InvalidClassId(_))
        ));
    }

    #[test]
    fn test_reverse_lookup_first_registration_wins() {
        let mut registry = Registry::new();
        registry.register(descriptor::<Probe>("Probe")).unwrap();
        registry.register(descriptor::<Probe>("ProbeAlias")).unwrap();

        let found = registry.descriptor_of(TypeId::of::<Probe>()).unwrap();
        assert_eq!(found.class_id().to_string(), "Probe");
        assert!(registry.resolve("ProbeAlias").is_ok());
    }

    #[test]
    fn test_non_object_default_rejected() {
        let err = ClassDescriptor::of::<Grams>(ClassId::new("Grams").unwrap()).unwrap_err();
        assert!(matches!(err, SerializeError::NonObjectClass(_)));
    }

    #[test]
    fn test_field_table_comes_from_default_snapshot() {
        let descriptor = descriptor::<Probe>("Probe");
        assert!(descriptor.has_field("label"));
        assert!(descriptor.has_field("count"));
        assert!(!descriptor.has_field("nickname"));
        assert_eq!(descriptor.fields().count(), 2);
    }

    #[test]
    fn test_revive_gates_on_field_table() {
        let descriptor = descriptor::<Probe>("Probe");
        let data = serde_json::json!({
            "_CLSID_": "Probe",
            "label": "a",
            "nickname": "dropped",
        });
        let Value::Object(data) = data else { unreachable!() };

        let revived = descriptor.revive_from(&data).unwrap();
        let probe = (*revived).as_any().downcast_ref::<Probe>().unwrap();
        assert_eq!(probe.label, "a");
        assert_eq!(probe.count, 0);
    }
}
