//! Storage for instances and arrays.

use jcvm_asm::Fault;
use jcvm_types::{AppletId, ArrayKind, ClassIndex, JByte, JInt, JRef, JShort, JWord, PackageId};

use crate::consts::MAX_HEAP_SIZE;

/// Element storage of a transient array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayData {
    /// Boolean and byte arrays.
    Bytes(Vec<JByte>),
    /// Short arrays.
    Shorts(Vec<JShort>),
    /// Int arrays.
    Ints(Vec<JInt>),
    /// Reference arrays.
    Refs(Vec<JRef>),
}

impl ArrayData {
    fn for_kind(kind: ArrayKind, length: usize) -> Self {
        match kind {
            ArrayKind::Boolean | ArrayKind::Byte => Self::Bytes(vec![0; length]),
            ArrayKind::Short => Self::Shorts(vec![0; length]),
            ArrayKind::Int => Self::Ints(vec![0; length]),
            ArrayKind::Reference => Self::Refs(vec![JRef::NULL; length]),
        }
    }

    /// Number of elements.
    pub fn length(&self) -> usize {
        match self {
            Self::Bytes(data) => data.len(),
            Self::Shorts(data) => data.len(),
            Self::Ints(data) => data.len(),
            Self::Refs(data) => data.len(),
        }
    }
}

/// What a heap handle designates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectBody {
    /// A class instance; fields are machine words, ints spanning two.
    Instance {
        /// Package of the instantiated class.
        package: PackageId,
        /// Class descriptor offset within that package.
        class_index: ClassIndex,
        /// Field words, zero-initialised at allocation.
        fields: Vec<JWord>,
    },
    /// A transient array.
    Array {
        /// Element type.
        kind: ArrayKind,
        /// Element class of a reference array, for store checks.
        element_class: Option<(PackageId, ClassIndex)>,
        /// Element storage.
        data: ArrayData,
    },
    /// A read-only view of a static array initialised in flash.
    PersistentArray {
        /// Package whose StaticField component holds the values.
        package: PackageId,
        /// Index into that component's array initialisers.
        init_index: u16,
        /// Element type.
        kind: ArrayKind,
        /// Number of elements.
        length: u16,
    },
}

/// A heap entry: its owning context and its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapObject {
    owner: AppletId,
    body: ObjectBody,
}

impl HeapObject {
    /// The context that owns this object.
    pub fn owner(&self) -> AppletId {
        self.owner
    }

    /// The object body.
    pub fn body(&self) -> &ObjectBody {
        &self.body
    }

    pub(crate) fn body_mut(&mut self) -> &mut ObjectBody {
        &mut self.body
    }

    /// Whether the object lives in persistent storage.
    pub fn is_persistent(&self) -> bool {
        matches!(self.body, ObjectBody::PersistentArray { .. })
    }
}

/// Handle-addressed storage for instances and arrays.
///
/// Handles are dense and start at 1, keeping the null sentinel
/// unrepresentable. A wiped slot stays occupied so later allocations never
/// resurrect a dangling handle.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Option<HeapObject>>,
    payload: usize,
}

impl Heap {
    /// An empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    fn charge(&mut self, cost: usize) -> Result<(), Fault> {
        let payload = self.payload + cost;
        if payload > MAX_HEAP_SIZE {
            return Err(Fault::Security);
        }
        self.payload = payload;
        Ok(())
    }

    fn insert(&mut self, object: HeapObject) -> Result<u16, Fault> {
        let handle = u16::try_from(self.objects.len() + 1).map_err(|_| Fault::Security)?;
        if handle > JRef::MAX_HANDLE {
            return Err(Fault::Security);
        }
        self.objects.push(Some(object));
        Ok(handle)
    }

    /// Allocate a zero-initialised instance.
    pub fn allocate_instance(
        &mut self,
        owner: AppletId,
        package: PackageId,
        class_index: ClassIndex,
        field_words: u16,
    ) -> Result<JRef, Fault> {
        self.charge(field_words as usize * 2)?;
        let handle = self.insert(HeapObject {
            owner,
            body: ObjectBody::Instance {
                package,
                class_index,
                fields: vec![0; field_words as usize],
            },
        })?;
        Ok(JRef::instance(handle))
    }

    /// Allocate a zero-initialised array. Length zero is valid; a negative
    /// length faults before any storage is touched.
    pub fn allocate_array(
        &mut self,
        owner: AppletId,
        kind: ArrayKind,
        length: JShort,
        element_class: Option<(PackageId, ClassIndex)>,
    ) -> Result<JRef, Fault> {
        if length < 0 {
            return Err(Fault::NegativeArraySize);
        }
        let length = length as usize;
        self.charge(length * kind.element_size())?;
        let handle = self.insert(HeapObject {
            owner,
            body: ObjectBody::Array {
                kind,
                element_class,
                data: ArrayData::for_kind(kind, length),
            },
        })?;
        Ok(JRef::array(handle, kind == ArrayKind::Reference))
    }

    /// Materialise the persistent view of a flash static array, reusing the
    /// handle when it already exists.
    pub fn persistent_array(
        &mut self,
        owner: AppletId,
        package: PackageId,
        init_index: u16,
        kind: ArrayKind,
        length: u16,
    ) -> Result<JRef, Fault> {
        for (slot, object) in self.objects.iter().enumerate() {
            if let Some(HeapObject {
                body:
                    ObjectBody::PersistentArray {
                        package: existing_package,
                        init_index: existing_index,
                        ..
                    },
                ..
            }) = object
            {
                if (*existing_package, *existing_index) == (package, init_index) {
                    return Ok(JRef::array(slot as u16 + 1, false).persistent());
                }
            }
        }

        let handle = self.insert(HeapObject {
            owner,
            body: ObjectBody::PersistentArray {
                package,
                init_index,
                kind,
                length,
            },
        })?;
        Ok(JRef::array(handle, false).persistent())
    }

    fn slot(&self, reference: JRef) -> Result<usize, Fault> {
        if reference.is_null() {
            return Err(Fault::NullPointer);
        }
        let slot = reference.handle() as usize - 1;
        if slot >= self.objects.len() {
            return Err(Fault::Security);
        }
        Ok(slot)
    }

    /// The object behind a reference. Null faults with `NullPointer` before
    /// anything else; a dangling handle is a firewall violation.
    pub fn get(&self, reference: JRef) -> Result<&HeapObject, Fault> {
        let slot = self.slot(reference)?;
        self.objects[slot].as_ref().ok_or(Fault::Security)
    }

    /// The object behind a reference, mutable.
    pub fn get_mut(&mut self, reference: JRef) -> Result<&mut HeapObject, Fault> {
        let slot = self.slot(reference)?;
        self.objects[slot].as_mut().ok_or(Fault::Security)
    }

    /// Wipe every transient object, as applet deselection does. Persistent
    /// views survive; wiped handles dangle and are caught at dereference.
    pub fn clear_transient(&mut self) {
        let mut payload = self.payload;
        for object in &mut self.objects {
            let transient = object
                .as_ref()
                .map(|o| !o.is_persistent())
                .unwrap_or(false);
            if transient {
                if let Some(gone) = object.take() {
                    payload -= Self::cost_of(&gone);
                }
            }
        }
        self.payload = payload;
    }

    fn cost_of(object: &HeapObject) -> usize {
        match &object.body {
            ObjectBody::Instance { fields, .. } => fields.len() * 2,
            ObjectBody::Array { kind, data, .. } => data.length() * kind.element_size(),
            ObjectBody::PersistentArray { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (AppletId, PackageId) {
        (AppletId::new(0), PackageId::new(0).unwrap())
    }

    #[test]
    fn instances_are_zeroed_and_tagged() {
        let (owner, package) = ids();
        let mut heap = Heap::new();

        let r = heap
            .allocate_instance(owner, package, ClassIndex::new(4), 3)
            .unwrap();
        assert!(!r.is_null());
        assert!(!r.is_array());

        match heap.get(r).unwrap().body() {
            ObjectBody::Instance { fields, .. } => assert_eq!(fields, &vec![0, 0, 0]),
            body => panic!("unexpected body {body:?}"),
        }
    }

    #[test]
    fn zero_length_arrays_are_valid_negative_fault() {
        let (owner, _) = ids();
        let mut heap = Heap::new();

        let r = heap
            .allocate_array(owner, ArrayKind::Short, 0, None)
            .unwrap();
        match heap.get(r).unwrap().body() {
            ObjectBody::Array { data, .. } => assert_eq!(data.length(), 0),
            body => panic!("unexpected body {body:?}"),
        }

        assert_eq!(
            heap.allocate_array(owner, ArrayKind::Short, -1, None),
            Err(Fault::NegativeArraySize)
        );
    }

    #[test]
    fn payload_ceiling_is_enforced() {
        let (owner, _) = ids();
        let mut heap = Heap::new();

        heap.allocate_array(owner, ArrayKind::Byte, (MAX_HEAP_SIZE - 2) as JShort, None)
            .unwrap();
        assert_eq!(
            heap.allocate_array(owner, ArrayKind::Byte, 3, None),
            Err(Fault::Security)
        );
        heap.allocate_array(owner, ArrayKind::Byte, 2, None).unwrap();
    }

    #[test]
    fn null_and_dangling_dereference() {
        let (owner, _) = ids();
        let mut heap = Heap::new();

        assert_eq!(heap.get(JRef::NULL).unwrap_err(), Fault::NullPointer);
        assert_eq!(heap.get(JRef::instance(9)).unwrap_err(), Fault::Security);

        let r = heap.allocate_array(owner, ArrayKind::Byte, 1, None).unwrap();
        heap.clear_transient();
        assert_eq!(heap.get(r).unwrap_err(), Fault::Security);
    }

    #[test]
    fn persistent_views_are_deduplicated_and_survive_wipes() {
        let (owner, package) = ids();
        let mut heap = Heap::new();

        let first = heap
            .persistent_array(owner, package, 0, ArrayKind::Short, 2)
            .unwrap();
        let again = heap
            .persistent_array(owner, package, 0, ArrayKind::Short, 2)
            .unwrap();
        assert_eq!(first, again);
        assert!(first.is_persistent());

        heap.clear_transient();
        assert!(heap.get(first).is_ok());
    }
}
