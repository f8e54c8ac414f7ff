//! CAP image assembly for tests.
//!
//! Builds installable package images component by component, mirroring the
//! layouts the runtime reads. Method, class and constant-pool offsets are
//! returned at insertion time so test bytecode can reference them.

use jcvm_cap::{ClassRef, ComponentTag, CpTag};
use jcvm_types::ArrayKind;

/// Description of one class descriptor to install.
#[derive(Debug, Default, Clone)]
pub struct ClassDef {
    /// Mark the class Shareable for cross-context invocation.
    pub shareable: bool,
    /// Raw superclass reference; `None` installs the root class.
    pub super_class_ref: Option<u16>,
    /// Instance field words declared by this class alone.
    pub declared_instance_size: u8,
    /// First token covered by the public method table.
    pub public_base: u8,
    /// Public virtual method table entries.
    pub public_table: Vec<u16>,
    /// First token covered by the package method table.
    pub package_base: u8,
    /// Package virtual method table entries.
    pub package_table: Vec<u16>,
    /// Implemented interfaces: raw reference and per-method public tokens.
    pub interfaces: Vec<(u16, Vec<u8>)>,
}

#[derive(Debug, Clone)]
struct HandlerDef {
    start: u16,
    length: u16,
    stop: bool,
    handler: u16,
    catch_type_index: u16,
}

#[derive(Debug, Clone)]
struct StaticsDef {
    image_size: u16,
    reference_count: u16,
    array_inits: Vec<(ArrayKind, Vec<u8>)>,
    non_default_values: Vec<u8>,
}

/// Builder for one installable CAP package image.
#[derive(Debug, Clone)]
pub struct CapBuilder {
    aid: Vec<u8>,
    handler_capacity: u8,
    handlers: Vec<HandlerDef>,
    methods: Vec<u8>,
    classes: Vec<u8>,
    constant_pool: Vec<[u8; 4]>,
    imports: Vec<Vec<u8>>,
    exports: Vec<(u16, Vec<u16>, Vec<u16>)>,
    statics: Option<StaticsDef>,
}

impl CapBuilder {
    /// A package with the given AID and no exception handler slots.
    pub fn new(aid: &[u8]) -> Self {
        Self {
            aid: aid.to_vec(),
            handler_capacity: 0,
            handlers: Vec::new(),
            methods: Vec::new(),
            classes: Vec::new(),
            constant_pool: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            statics: None,
        }
    }

    /// Reserve exception handler slots. Must precede any [`Self::add_method`]
    /// because the handler table sits ahead of the method bodies.
    pub fn with_handler_capacity(mut self, capacity: u8) -> Self {
        assert!(self.methods.is_empty(), "reserve handlers before methods");
        self.handler_capacity = capacity;
        self
    }

    /// Fill the next reserved handler slot.
    pub fn add_handler(
        &mut self,
        start: u16,
        length: u16,
        handler: u16,
        catch_type_index: u16,
        stop: bool,
    ) {
        assert!(self.handlers.len() < self.handler_capacity as usize);
        self.handlers.push(HandlerDef {
            start,
            length,
            stop,
            handler,
            catch_type_index,
        });
    }

    /// Append a method, returning its Method component offset.
    pub fn add_method(&mut self, max_stack: u8, nargs: u8, max_locals: u8, code: &[u8]) -> u16 {
        let offset = 1 + 8 * self.handler_capacity as u16 + self.methods.len() as u16;
        if max_stack <= 0x0F && nargs <= 0x0F && max_locals <= 0x0F {
            self.methods.push(max_stack);
            self.methods.push(nargs << 4 | max_locals);
        } else {
            self.methods.push(0x80);
            self.methods.push(max_stack);
            self.methods.push(nargs);
            self.methods.push(max_locals);
        }
        self.methods.extend_from_slice(code);
        offset
    }

    /// Append a class descriptor, returning its info-area offset.
    pub fn add_class(&mut self, def: &ClassDef) -> u16 {
        assert!(def.interfaces.len() <= 0x0F);
        let offset = self.classes.len() as u16;

        let flags = if def.shareable { 0x4u8 } else { 0 };
        self.classes.push(flags << 4 | def.interfaces.len() as u8);
        let super_ref = def.super_class_ref.unwrap_or(0xFFFF);
        self.classes.extend_from_slice(&super_ref.to_be_bytes());
        self.classes.push(def.declared_instance_size);
        self.classes.push(0); // first reference token
        self.classes.push(0); // reference count
        self.classes.push(def.public_base);
        self.classes.push(def.public_table.len() as u8);
        self.classes.push(def.package_base);
        self.classes.push(def.package_table.len() as u8);
        for entry in &def.public_table {
            self.classes.extend_from_slice(&entry.to_be_bytes());
        }
        for entry in &def.package_table {
            self.classes.extend_from_slice(&entry.to_be_bytes());
        }
        for (interface_ref, indexes) in &def.interfaces {
            self.classes.extend_from_slice(&interface_ref.to_be_bytes());
            self.classes.push(indexes.len() as u8);
            self.classes.extend_from_slice(indexes);
        }

        offset
    }

    /// Append an interface descriptor, returning its info-area offset.
    pub fn add_interface(&mut self, super_interfaces: &[u16]) -> u16 {
        assert!(super_interfaces.len() <= 0x0F);
        let offset = self.classes.len() as u16;

        self.classes.push(0x8 << 4 | super_interfaces.len() as u8);
        for super_ref in super_interfaces {
            self.classes.extend_from_slice(&super_ref.to_be_bytes());
        }

        offset
    }

    fn add_cp_entry(&mut self, tag: CpTag, info: [u8; 3]) -> u16 {
        let offset = self.constant_pool.len() as u16;
        self.constant_pool
            .push([tag as u8, info[0], info[1], info[2]]);
        offset
    }

    /// Append a Classref entry for a raw class reference.
    pub fn add_classref(&mut self, class_ref: u16) -> u16 {
        let [high, low] = class_ref.to_be_bytes();
        self.add_cp_entry(CpTag::Classref, [high, low, 0])
    }

    /// Append a Classref entry for an external class.
    pub fn add_external_classref(&mut self, package_token: u8, class_token: u8) -> u16 {
        self.add_classref(ClassRef::external(package_token, class_token).to_u16())
    }

    /// Append an InstanceFieldref entry.
    pub fn add_instance_field_ref(&mut self, class_ref: u16, token: u8) -> u16 {
        let [high, low] = class_ref.to_be_bytes();
        self.add_cp_entry(CpTag::InstanceFieldref, [high, low, token])
    }

    /// Append a VirtualMethodref entry.
    pub fn add_virtual_method_ref(&mut self, class_ref: u16, token: u8) -> u16 {
        let [high, low] = class_ref.to_be_bytes();
        self.add_cp_entry(CpTag::VirtualMethodref, [high, low, token])
    }

    /// Append a SuperMethodref entry.
    pub fn add_super_method_ref(&mut self, class_ref: u16, token: u8) -> u16 {
        let [high, low] = class_ref.to_be_bytes();
        self.add_cp_entry(CpTag::SuperMethodref, [high, low, token])
    }

    /// Append a StaticMethodref entry for an internal method offset.
    pub fn add_static_method_ref(&mut self, method_offset: u16) -> u16 {
        let [high, low] = method_offset.to_be_bytes();
        self.add_cp_entry(CpTag::StaticMethodref, [0, high, low])
    }

    /// Append a StaticMethodref entry for an imported method.
    pub fn add_external_static_method_ref(
        &mut self,
        package_token: u8,
        class_token: u8,
        method_token: u8,
    ) -> u16 {
        self.add_cp_entry(
            CpTag::StaticMethodref,
            [0x80 | package_token, class_token, method_token],
        )
    }

    /// Append a StaticFieldref entry for an internal image offset.
    pub fn add_static_field_ref(&mut self, image_offset: u16) -> u16 {
        let [high, low] = image_offset.to_be_bytes();
        self.add_cp_entry(CpTag::StaticFieldref, [0, high, low])
    }

    /// Append a StaticFieldref entry for an imported field.
    pub fn add_external_static_field_ref(
        &mut self,
        package_token: u8,
        class_token: u8,
        field_token: u8,
    ) -> u16 {
        self.add_cp_entry(
            CpTag::StaticFieldref,
            [0x80 | package_token, class_token, field_token],
        )
    }

    /// Register an imported package AID, returning its package token.
    pub fn add_import(&mut self, aid: &[u8]) -> u8 {
        let token = self.imports.len() as u8;
        self.imports.push(aid.to_vec());
        token
    }

    /// Export a class with its static field and method offsets, returning
    /// its class token.
    pub fn add_export(
        &mut self,
        class_offset: u16,
        field_offsets: &[u16],
        method_offsets: &[u16],
    ) -> u8 {
        let token = self.exports.len() as u8;
        self.exports
            .push((class_offset, field_offsets.to_vec(), method_offsets.to_vec()));
        token
    }

    /// Describe the StaticField component.
    pub fn set_statics(
        &mut self,
        image_size: u16,
        reference_count: u16,
        array_inits: &[(ArrayKind, Vec<u8>)],
        non_default_values: &[u8],
    ) {
        self.statics = Some(StaticsDef {
            image_size,
            reference_count,
            array_inits: array_inits.to_vec(),
            non_default_values: non_default_values.to_vec(),
        });
    }

    fn push_component(bytes: &mut Vec<u8>, tag: ComponentTag, info: &[u8]) {
        bytes.push(tag as u8);
        bytes.extend_from_slice(&(info.len() as u16).to_be_bytes());
        bytes.extend_from_slice(info);
    }

    /// Assemble the package image.
    pub fn build(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        let mut header = vec![0xDE, 0xCA, 0xFF, 0xED, 0x02, 0x02, 0x00, 0x00, 0x01];
        header.push(self.aid.len() as u8);
        header.extend_from_slice(&self.aid);
        Self::push_component(&mut bytes, ComponentTag::Header, &header);

        if !self.classes.is_empty() {
            Self::push_component(&mut bytes, ComponentTag::Class, &self.classes);
        }

        if !self.imports.is_empty() {
            let mut imports = vec![self.imports.len() as u8];
            for aid in &self.imports {
                imports.push(0); // minor
                imports.push(1); // major
                imports.push(aid.len() as u8);
                imports.extend_from_slice(aid);
            }
            Self::push_component(&mut bytes, ComponentTag::Import, &imports);
        }

        let mut methods = vec![self.handler_capacity];
        for slot in 0..self.handler_capacity as usize {
            match self.handlers.get(slot) {
                Some(handler) => {
                    methods.extend_from_slice(&handler.start.to_be_bytes());
                    let bits = (handler.stop as u16) << 15 | (handler.length & 0x7FFF);
                    methods.extend_from_slice(&bits.to_be_bytes());
                    methods.extend_from_slice(&handler.handler.to_be_bytes());
                    methods.extend_from_slice(&handler.catch_type_index.to_be_bytes());
                }
                // An unfilled slot covers nothing.
                None => methods.extend_from_slice(&[0; 8]),
            }
        }
        methods.extend_from_slice(&self.methods);
        Self::push_component(&mut bytes, ComponentTag::Method, &methods);

        let mut pool = (self.constant_pool.len() as u16).to_be_bytes().to_vec();
        for entry in &self.constant_pool {
            pool.extend_from_slice(entry);
        }
        Self::push_component(&mut bytes, ComponentTag::ConstantPool, &pool);

        if let Some(statics) = &self.statics {
            let mut info = Vec::new();
            info.extend_from_slice(&statics.image_size.to_be_bytes());
            info.extend_from_slice(&statics.reference_count.to_be_bytes());
            info.extend_from_slice(&(statics.array_inits.len() as u16).to_be_bytes());
            for (kind, values) in &statics.array_inits {
                let type_byte = match kind {
                    ArrayKind::Boolean => 2,
                    ArrayKind::Byte => 3,
                    ArrayKind::Short => 4,
                    ArrayKind::Int => 5,
                    ArrayKind::Reference => panic!("array initialisers are primitive"),
                };
                info.push(type_byte);
                info.extend_from_slice(&(values.len() as u16).to_be_bytes());
                info.extend_from_slice(values);
            }
            let default_count = statics.image_size - statics.non_default_values.len() as u16;
            info.extend_from_slice(&default_count.to_be_bytes());
            info.extend_from_slice(&(statics.non_default_values.len() as u16).to_be_bytes());
            info.extend_from_slice(&statics.non_default_values);
            Self::push_component(&mut bytes, ComponentTag::StaticField, &info);
        }

        if !self.exports.is_empty() {
            let mut exports = vec![self.exports.len() as u8];
            for (class_offset, fields, methods) in &self.exports {
                exports.extend_from_slice(&class_offset.to_be_bytes());
                exports.push(fields.len() as u8);
                exports.push(methods.len() as u8);
                for offset in fields {
                    exports.extend_from_slice(&offset.to_be_bytes());
                }
                for offset in methods {
                    exports.extend_from_slice(&offset.to_be_bytes());
                }
            }
            Self::push_component(&mut bytes, ComponentTag::Export, &exports);
        }

        bytes
    }
}
