//! Heap-facing opcodes: arrays, instance fields, statics, allocation and
//! type tests.

use jcvm_asm::Fault;
use jcvm_cap::{StaticRef, TypeInfo};
use jcvm_types::{ArrayKind, ClassIndex, JInt, JRef, JShort, JWord, PackageId};

use crate::heap::{ArrayData, ObjectBody};
use crate::interpreter::Interpreter;
use crate::resolve::{
    static_field, ClassHandler, ConstantPoolHandler, ExportHandler, ImportHandler,
};

/// Width class of a field access opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Reference,
    Byte,
    Short,
    Int,
}

/// Array type operands of `newarray`, `checkcast` and `instanceof`.
const T_BOOLEAN: u8 = 10;
const T_BYTE: u8 = 11;
const T_SHORT: u8 = 12;
const T_INT: u8 = 13;
const T_REFERENCE_ARRAY: u8 = 14;

fn array_kind_from_atype(atype: u8) -> Result<ArrayKind, Fault> {
    match atype {
        T_BOOLEAN => Ok(ArrayKind::Boolean),
        T_BYTE => Ok(ArrayKind::Byte),
        T_SHORT => Ok(ArrayKind::Short),
        T_INT => Ok(ArrayKind::Int),
        _ => Err(Fault::Security),
    }
}

/// Whether an array of `actual` elements serves an access of `expected`
/// width; boolean arrays are accessed through the byte opcodes.
fn element_kind_matches(expected: ArrayKind, actual: ArrayKind) -> bool {
    expected == actual || (expected == ArrayKind::Byte && actual == ArrayKind::Boolean)
}

enum Loaded {
    Word(JWord),
    Int(JInt),
}

impl Interpreter {
    pub(crate) fn op_newarray(&mut self) -> Result<(), Fault> {
        let atype = self.fetch_u8()?;
        let kind = array_kind_from_atype(atype)?;
        let length = self.pop()?;
        let owner = self.current_applet()?;
        let reference = self.heap.allocate_array(owner, kind, length, None)?;
        self.push_ref(reference)
    }

    pub(crate) fn op_anewarray(&mut self) -> Result<(), Fault> {
        let index = self.fetch_u16()?;
        let package = self.current_package()?;
        let cp = ConstantPoolHandler::new(&self.flash, package);
        let element = cp.resolve_class_ref(cp.class_ref(index)?)?;
        let length = self.pop()?;
        let owner = self.current_applet()?;
        let reference =
            self.heap
                .allocate_array(owner, ArrayKind::Reference, length, Some(element))?;
        self.push_ref(reference)
    }

    pub(crate) fn op_arraylength(&mut self) -> Result<(), Fault> {
        let reference = self.pop_ref()?;
        let length = match self.object(reference)?.body() {
            ObjectBody::Array { data, .. } => data.length() as JShort,
            ObjectBody::PersistentArray { length, .. } => *length as JShort,
            ObjectBody::Instance { .. } => return Err(Fault::Security),
        };
        self.push(length)
    }

    pub(crate) fn op_array_load(&mut self, kind: ArrayKind) -> Result<(), Fault> {
        let index = self.pop()?;
        let reference = self.pop_ref()?;

        let loaded = match self.object(reference)?.body() {
            ObjectBody::Array {
                kind: actual, data, ..
            } => {
                if !element_kind_matches(kind, *actual) {
                    return Err(Fault::Security);
                }
                let at = Self::array_index(index, data.length())?;
                match data {
                    ArrayData::Bytes(values) => Loaded::Word(values[at] as JWord),
                    ArrayData::Shorts(values) => Loaded::Word(values[at]),
                    ArrayData::Ints(values) => Loaded::Int(values[at]),
                    ArrayData::Refs(values) => Loaded::Word(values[at].to_word()),
                }
            }
            ObjectBody::PersistentArray {
                package,
                init_index,
                kind: actual,
                length,
            } => {
                if !element_kind_matches(kind, *actual) {
                    return Err(Fault::Security);
                }
                let at = Self::array_index(index, *length as usize)?;
                self.persistent_element(*package, *init_index, *actual, at)?
            }
            ObjectBody::Instance { .. } => return Err(Fault::Security),
        };

        match loaded {
            Loaded::Word(word) => self.push(word),
            Loaded::Int(int) => self.push_int(int),
        }
    }

    fn array_index(index: JShort, length: usize) -> Result<usize, Fault> {
        if index < 0 || index as usize >= length {
            return Err(Fault::IndexOutOfBounds);
        }
        Ok(index as usize)
    }

    /// Read one element of a flash-backed static array.
    fn persistent_element(
        &self,
        package: PackageId,
        init_index: u16,
        kind: ArrayKind,
        at: usize,
    ) -> Result<Loaded, Fault> {
        let cap = self.flash.cap(package)?;
        let init = cap.static_field()?.array_init(init_index)?;
        let values = init.values;

        Ok(match kind {
            ArrayKind::Boolean | ArrayKind::Byte => {
                Loaded::Word(*values.get(at).ok_or(Fault::Security)? as i8 as JWord)
            }
            ArrayKind::Short | ArrayKind::Reference => {
                let raw = values.get(2 * at..2 * at + 2).ok_or(Fault::Security)?;
                Loaded::Word(JShort::from_be_bytes([raw[0], raw[1]]))
            }
            ArrayKind::Int => {
                let raw = values.get(4 * at..4 * at + 4).ok_or(Fault::Security)?;
                Loaded::Int(JInt::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
            }
        })
    }

    pub(crate) fn op_array_store(&mut self, kind: ArrayKind) -> Result<(), Fault> {
        enum Stored {
            Word(JWord),
            Int(JInt),
            Ref(JRef),
        }

        let value = match kind {
            ArrayKind::Int => Stored::Int(self.pop_int()?),
            ArrayKind::Reference => Stored::Ref(self.pop_ref()?),
            _ => Stored::Word(self.pop()?),
        };
        let index = self.pop()?;
        let reference = self.pop_ref()?;

        // Structure, bounds and type checks under a shared borrow; the
        // store-compatibility check walks the class hierarchy.
        let element_class = match self.object(reference)?.body() {
            ObjectBody::Array {
                kind: actual,
                element_class,
                data,
            } => {
                if !element_kind_matches(kind, *actual) {
                    return Err(Fault::Security);
                }
                Self::array_index(index, data.length())?;
                *element_class
            }
            // Flash-backed arrays are read-only views.
            ObjectBody::PersistentArray { .. } => return Err(Fault::Security),
            ObjectBody::Instance { .. } => return Err(Fault::Security),
        };

        if let Stored::Ref(stored) = &value {
            if !stored.is_null() {
                let target = element_class.ok_or(Fault::Security)?;
                if !self.ref_assignable(*stored, target)? {
                    return Err(Fault::ArrayStore);
                }
            }
        }

        let at = index as usize;
        match (self.object_mut(reference)?.body_mut(), value) {
            (ObjectBody::Array { data: ArrayData::Bytes(values), kind: actual, .. }, Stored::Word(word)) => {
                values[at] = if *actual == ArrayKind::Boolean {
                    // Booleans keep only the low-order bit.
                    (word & 1) as i8
                } else {
                    word as i8
                };
            }
            (ObjectBody::Array { data: ArrayData::Shorts(values), .. }, Stored::Word(word)) => {
                values[at] = word;
            }
            (ObjectBody::Array { data: ArrayData::Ints(values), .. }, Stored::Int(int)) => {
                values[at] = int;
            }
            (ObjectBody::Array { data: ArrayData::Refs(values), .. }, Stored::Ref(stored)) => {
                values[at] = stored;
            }
            _ => return Err(Fault::Security),
        }
        Ok(())
    }

    /// Whether the object behind `value` may stand where `target` is
    /// expected.
    pub(crate) fn ref_assignable(
        &self,
        value: JRef,
        target: (PackageId, ClassIndex),
    ) -> Result<bool, Fault> {
        let handler = ClassHandler::new(&self.flash, self.current_package()?);
        match self.heap.get(value)?.body() {
            ObjectBody::Instance {
                package,
                class_index,
                ..
            } => handler.type_compatible((*package, *class_index), target),
            // Arrays stand wherever the root class or one of its
            // interfaces is expected.
            ObjectBody::Array { .. } | ObjectBody::PersistentArray { .. } => {
                match self.flash.cap(target.0)?.class()?.type_info(target.1)? {
                    TypeInfo::Class(class) => class.is_object(),
                    TypeInfo::Interface(_) => {
                        let (object_package, object_class) = handler.object_class()?;
                        for index in 0..object_class.interface_count()? {
                            let record = object_class.implemented_interface(index)?;
                            let resolved = ConstantPoolHandler::new(&self.flash, object_package)
                                .resolve_class_ref(record.interface)?;
                            if resolved == target {
                                return Ok(true);
                            }
                        }
                        Ok(false)
                    }
                }
            }
        }
    }

    fn cast_compatible(&self, reference: JRef, atype: u8, index: u16) -> Result<bool, Fault> {
        let package = self.current_package()?;
        let cp = ConstantPoolHandler::new(&self.flash, package);

        match atype {
            0 => {
                let target = cp.resolve_class_ref(cp.class_ref(index)?)?;
                self.ref_assignable(reference, target)
            }
            T_BOOLEAN | T_BYTE | T_SHORT | T_INT => {
                let expected = array_kind_from_atype(atype)?;
                Ok(match self.heap.get(reference)?.body() {
                    ObjectBody::Array { kind, .. } => *kind == expected,
                    ObjectBody::PersistentArray { kind, .. } => *kind == expected,
                    ObjectBody::Instance { .. } => false,
                })
            }
            T_REFERENCE_ARRAY => {
                let target_element = cp.resolve_class_ref(cp.class_ref(index)?)?;
                match self.heap.get(reference)?.body() {
                    ObjectBody::Array {
                        kind: ArrayKind::Reference,
                        element_class,
                        ..
                    } => {
                        let element = element_class.ok_or(Fault::Security)?;
                        ClassHandler::new(&self.flash, package)
                            .type_compatible(element, target_element)
                    }
                    _ => Ok(false),
                }
            }
            _ => Err(Fault::Security),
        }
    }

    /// `checkcast`: the operand stays on the stack; an incompatible
    /// non-null operand faults.
    pub(crate) fn op_checkcast(&mut self) -> Result<(), Fault> {
        let atype = self.fetch_u8()?;
        let index = self.fetch_u16()?;
        let reference = JRef::from_word(self.peek(0)?);

        if !reference.is_null() && !self.cast_compatible(reference, atype, index)? {
            return Err(Fault::ClassCast);
        }
        Ok(())
    }

    /// `instanceof`: pops the operand and pushes 0 or 1; null is an
    /// instance of nothing.
    pub(crate) fn op_instanceof(&mut self) -> Result<(), Fault> {
        let atype = self.fetch_u8()?;
        let index = self.fetch_u16()?;
        let reference = self.pop_ref()?;

        let compatible =
            !reference.is_null() && self.cast_compatible(reference, atype, index)?;
        self.push(compatible as JShort)
    }

    pub(crate) fn op_new(&mut self) -> Result<(), Fault> {
        let index = self.fetch_u16()?;
        let package = self.current_package()?;
        let cp = ConstantPoolHandler::new(&self.flash, package);
        let (target_package, class_index) = cp.resolve_class_ref(cp.class_ref(index)?)?;

        // Interfaces are not instantiable.
        self.flash
            .cap(target_package)?
            .class()?
            .class_info(class_index)?;
        let field_words = ClassHandler::new(&self.flash, package)
            .instance_fields_size(target_package, class_index)?;

        let owner = self.current_applet()?;
        let reference =
            self.heap
                .allocate_instance(owner, target_package, class_index, field_words)?;
        self.push_ref(reference)
    }

    fn instance_field_token(&self, index: u16) -> Result<u8, Fault> {
        let package = self.current_package()?;
        let (_, token) =
            ConstantPoolHandler::new(&self.flash, package).instance_field_ref(index)?;
        Ok(token)
    }

    pub(crate) fn op_getfield(
        &mut self,
        kind: FieldKind,
        wide: bool,
        this_mode: bool,
    ) -> Result<(), Fault> {
        let index = if wide {
            self.fetch_u16()?
        } else {
            self.fetch_u8()? as u16
        };
        let reference = if this_mode {
            JRef::from_word(self.read_local_word(0)?)
        } else {
            self.pop_ref()?
        };
        if reference.is_null() {
            return Err(Fault::NullPointer);
        }
        let token = self.instance_field_token(index)?;

        let loaded = {
            let ObjectBody::Instance { fields, .. } = self.object(reference)?.body() else {
                return Err(Fault::Security);
            };
            match kind {
                FieldKind::Reference | FieldKind::Byte | FieldKind::Short => {
                    Loaded::Word(*fields.get(token as usize).ok_or(Fault::Security)?)
                }
                FieldKind::Int => {
                    let high = *fields.get(token as usize).ok_or(Fault::Security)?;
                    let low = *fields.get(token as usize + 1).ok_or(Fault::Security)?;
                    Loaded::Int(((high as u16 as u32) << 16 | low as u16 as u32) as JInt)
                }
            }
        };

        match loaded {
            Loaded::Word(word) => self.push(word),
            Loaded::Int(int) => self.push_int(int),
        }
    }

    pub(crate) fn op_putfield(
        &mut self,
        kind: FieldKind,
        wide: bool,
        this_mode: bool,
    ) -> Result<(), Fault> {
        let index = if wide {
            self.fetch_u16()?
        } else {
            self.fetch_u8()? as u16
        };

        let int_value;
        let word_value;
        match kind {
            FieldKind::Int => {
                int_value = self.pop_int()?;
                word_value = 0;
            }
            FieldKind::Byte => {
                int_value = 0;
                word_value = self.pop()? as i8 as JWord;
            }
            _ => {
                int_value = 0;
                word_value = self.pop()?;
            }
        }

        let reference = if this_mode {
            JRef::from_word(self.read_local_word(0)?)
        } else {
            self.pop_ref()?
        };
        if reference.is_null() {
            return Err(Fault::NullPointer);
        }
        let token = self.instance_field_token(index)?;

        let ObjectBody::Instance { fields, .. } = self.object_mut(reference)?.body_mut() else {
            return Err(Fault::Security);
        };
        match kind {
            FieldKind::Reference | FieldKind::Byte | FieldKind::Short => {
                *fields.get_mut(token as usize).ok_or(Fault::Security)? = word_value;
            }
            FieldKind::Int => {
                *fields.get_mut(token as usize).ok_or(Fault::Security)? =
                    (int_value >> 16) as JWord;
                *fields.get_mut(token as usize + 1).ok_or(Fault::Security)? = int_value as JWord;
            }
        }
        Ok(())
    }

    /// Resolve a static field reference to a concrete package and image
    /// offset.
    fn resolve_static_field_ref(&self, sref: StaticRef) -> Result<(PackageId, u16), Fault> {
        match sref {
            StaticRef::Internal { offset } => Ok((self.current_package()?, offset)),
            StaticRef::External {
                package_token,
                class_token,
                token,
            } => {
                let package = self.current_package()?;
                let target = ImportHandler::new(&self.flash, package).package_id(package_token)?;
                let offset = ExportHandler::new(&self.flash, target)
                    .exported_static_field_offset(class_token, token)?;
                Ok((target, offset))
            }
        }
    }

    pub(crate) fn op_getstatic(&mut self, kind: FieldKind) -> Result<(), Fault> {
        let index = self.fetch_u16()?;
        let package = self.current_package()?;
        let sref = ConstantPoolHandler::new(&self.flash, package).static_field_ref(index)?;
        let (target, offset) = self.resolve_static_field_ref(sref)?;

        match kind {
            FieldKind::Byte => {
                let value = static_field::read_byte(&self.flash, target, offset)?;
                self.push(value as JShort)
            }
            FieldKind::Short => {
                let value = static_field::read_short(&self.flash, target, offset)?;
                self.push(value)
            }
            FieldKind::Int => {
                let value = static_field::read_int(&self.flash, target, offset)?;
                self.push_int(value)
            }
            FieldKind::Reference => {
                let reference = match static_field::read_ref_cell(&self.flash, target, offset)? {
                    static_field::StaticRefCell::Null => JRef::NULL,
                    static_field::StaticRefCell::Stored(reference) => reference,
                    static_field::StaticRefCell::ArrayInit(ordinal) => {
                        let (element_kind, length) = {
                            let init =
                                self.flash.cap(target)?.static_field()?.array_init(ordinal)?;
                            (init.kind, init.length() as u16)
                        };
                        let owner = self.current_applet()?;
                        self.heap
                            .persistent_array(owner, target, ordinal, element_kind, length)?
                    }
                };
                self.push_ref(reference)
            }
        }
    }

    pub(crate) fn op_putstatic(&mut self, kind: FieldKind) -> Result<(), Fault> {
        let index = self.fetch_u16()?;
        let package = self.current_package()?;
        let sref = ConstantPoolHandler::new(&self.flash, package).static_field_ref(index)?;
        let (target, offset) = self.resolve_static_field_ref(sref)?;

        match kind {
            FieldKind::Byte => {
                let value = self.pop()?;
                static_field::write_byte(&mut self.flash, target, offset, value as i8)
            }
            FieldKind::Short => {
                let value = self.pop()?;
                static_field::write_short(&mut self.flash, target, offset, value)
            }
            FieldKind::Int => {
                let value = self.pop_int()?;
                static_field::write_int(&mut self.flash, target, offset, value)
            }
            FieldKind::Reference => {
                let value = self.pop_ref()?;
                static_field::write_ref_cell(&mut self.flash, target, offset, value)
            }
        }
    }
}
