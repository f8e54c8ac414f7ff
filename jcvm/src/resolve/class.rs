//! Class hierarchy walks: virtual dispatch, casts, instance sizing.

use jcvm_asm::Fault;
use jcvm_cap::{ClassInfo, FlashMemory, TypeInfo, VirtualMethodRef};
use jcvm_types::{ClassIndex, PackageId};

use crate::consts::SYSTEM_PACKAGE;
use crate::resolve::ConstantPoolHandler;

/// Method table slot of a method the class inherits without implementing.
const INHERITED_SLOT: u16 = 0xFFFF;

/// Bound on superclass and superinterface walks; a longer chain can only be
/// a cycle in a malformed image.
const WALK_LIMIT: usize = 255;

/// Hierarchy walks over the Class components of the registry.
#[derive(Debug, Clone, Copy)]
pub struct ClassHandler<'a> {
    flash: &'a FlashMemory,
    package: PackageId,
}

impl<'a> ClassHandler<'a> {
    /// A handler resolving from `package`'s point of view.
    pub fn new(flash: &'a FlashMemory, package: PackageId) -> Self {
        Self { flash, package }
    }

    fn cp(&self, package: PackageId) -> ConstantPoolHandler<'a> {
        ConstantPoolHandler::new(self.flash, package)
    }

    /// Resolve a virtual method reference to `(package, method offset)`,
    /// dispatching on the token's visibility bit. The walk starts at the
    /// reference's declared class; use [`Self::virtual_dispatch`] when the
    /// receiver's runtime class is known.
    pub fn method_offset(&self, vref: VirtualMethodRef) -> Result<(PackageId, u16), Fault> {
        if vref.is_public() {
            self.public_method_offset(vref)
        } else {
            self.package_method_offset(vref)
        }
    }

    /// Resolve a virtual method token against a receiver's runtime class,
    /// so an overriding subclass method wins over the declared one.
    pub fn virtual_dispatch(
        &self,
        receiver: (PackageId, ClassIndex),
        vref: VirtualMethodRef,
    ) -> Result<(PackageId, u16), Fault> {
        let class = self.flash.cap(receiver.0)?.class()?.class_info(receiver.1)?;
        if vref.is_public() {
            self.public_offset_from(receiver.0, class, vref.table_token())
        } else {
            self.package_offset_from(receiver.0, class, vref.table_token())
        }
    }

    /// Resolve a public virtual method token through the class hierarchy.
    pub fn public_method_offset(&self, vref: VirtualMethodRef) -> Result<(PackageId, u16), Fault> {
        if !vref.is_public() {
            return Err(Fault::Security);
        }
        let (package, class) = self.cp(self.package).class_ref_to_class(vref.class_ref)?;
        self.public_offset_from(package, class, vref.table_token())
    }

    /// Resolve a package-visible virtual method token through the class
    /// hierarchy.
    pub fn package_method_offset(&self, vref: VirtualMethodRef) -> Result<(PackageId, u16), Fault> {
        if vref.is_public() {
            return Err(Fault::Security);
        }
        let (package, class) = self.cp(self.package).class_ref_to_class(vref.class_ref)?;
        self.package_offset_from(package, class, vref.table_token())
    }

    /// Resolve a package-visible method token starting from a concrete
    /// class.
    fn package_offset_from(
        &self,
        package: PackageId,
        class: ClassInfo<'a>,
        token: u8,
    ) -> Result<(PackageId, u16), Fault> {
        let (mut package, mut class) = (package, class);

        for _ in 0..WALK_LIMIT {
            if class.is_object()? || token >= class.package_method_table_base()? {
                break;
            }
            (package, class) = self.cp(package).class_ref_to_class(class.super_class_ref()?)?;
        }
        if class.is_object()? && token < class.package_method_table_base()? {
            return Err(Fault::Security);
        }

        for _ in 0..WALK_LIMIT {
            let base = class.package_method_table_base()?;
            if token < base {
                return Err(Fault::Security);
            }
            let entry = class.package_method_entry(token - base)?;
            if entry != INHERITED_SLOT {
                return Ok((package, entry));
            }
            if class.is_object()? {
                return Err(Fault::Security);
            }
            (package, class) = self.cp(package).class_ref_to_class(class.super_class_ref()?)?;
        }
        Err(Fault::Security)
    }

    /// Resolve a public method token starting from a concrete class: climb
    /// to the class whose table covers the token, then chase inherited
    /// slots upward until a real method offset appears.
    fn public_offset_from(
        &self,
        package: PackageId,
        class: ClassInfo<'a>,
        token: u8,
    ) -> Result<(PackageId, u16), Fault> {
        let (mut package, mut class) = (package, class);

        for _ in 0..WALK_LIMIT {
            if class.is_object()? || token >= class.public_method_table_base()? {
                break;
            }
            (package, class) = self.cp(package).class_ref_to_class(class.super_class_ref()?)?;
        }
        if class.is_object()? && token < class.public_method_table_base()? {
            return Err(Fault::Security);
        }

        for _ in 0..WALK_LIMIT {
            let base = class.public_method_table_base()?;
            if token < base {
                return Err(Fault::Security);
            }
            let entry = class.public_method_entry(token - base)?;
            if entry != INHERITED_SLOT {
                return Ok((package, entry));
            }
            if class.is_object()? {
                return Err(Fault::Security);
            }
            (package, class) = self.cp(package).class_ref_to_class(class.super_class_ref()?)?;
        }
        Err(Fault::Security)
    }

    /// Resolve an interface method invocation against a concrete class:
    /// find the interface in the class's implemented-interface table, map
    /// the method index to a public token, and dispatch through the public
    /// table. Array receivers (`class` absent) dispatch through the root
    /// class instead.
    pub fn implemented_interface_method_offset(
        &self,
        class: Option<(PackageId, ClassIndex)>,
        interface: (PackageId, ClassIndex),
        method_index: u8,
    ) -> Result<(PackageId, u16), Fault> {
        let (package, class) = match class {
            Some((package, offset)) => (
                package,
                self.flash.cap(package)?.class()?.class_info(offset)?,
            ),
            None => self.object_class()?,
        };

        for index in 0..class.interface_count()? {
            let record = class.implemented_interface(index)?;
            let resolved = self.cp(package).resolve_class_ref(record.interface)?;
            if resolved != interface {
                continue;
            }
            let token = *record
                .indexes
                .get(method_index as usize)
                .ok_or(Fault::Security)?;
            return self.public_offset_from(package, class, token);
        }

        Err(Fault::Security)
    }

    /// The root class, installed at a fixed offset of the system package.
    pub fn object_class(&self) -> Result<(PackageId, ClassInfo<'a>), Fault> {
        let class = self
            .flash
            .cap(SYSTEM_PACKAGE)?
            .class()?
            .class_info(ClassIndex::new(0))?;
        if !class.is_object()? {
            return Err(Fault::Security);
        }
        Ok((SYSTEM_PACKAGE, class))
    }

    /// Whether type `s` is assignable to type `t`, both named by their
    /// package and descriptor offset.
    pub fn type_compatible(
        &self,
        s: (PackageId, ClassIndex),
        t: (PackageId, ClassIndex),
    ) -> Result<bool, Fault> {
        let s_info = self.flash.cap(s.0)?.class()?.type_info(s.1)?;
        let t_info = self.flash.cap(t.0)?.class()?.type_info(t.1)?;

        match (s_info, t_info) {
            (TypeInfo::Class(_), TypeInfo::Class(target)) => {
                if target.is_object()? {
                    return Ok(true);
                }
                let (mut package, mut class) =
                    (s.0, self.flash.cap(s.0)?.class()?.class_info(s.1)?);
                for _ in 0..WALK_LIMIT {
                    if (package, class.offset()) == t {
                        return Ok(true);
                    }
                    if class.is_object()? {
                        return Ok(false);
                    }
                    (package, class) =
                        self.cp(package).class_ref_to_class(class.super_class_ref()?)?;
                }
                Ok(false)
            }
            (TypeInfo::Class(class), TypeInfo::Interface(_)) => {
                for index in 0..class.interface_count()? {
                    let record = class.implemented_interface(index)?;
                    let implemented = self.cp(s.0).resolve_class_ref(record.interface)?;
                    if implemented == t || self.interface_assignable(implemented, t)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            (TypeInfo::Interface(_), TypeInfo::Class(target)) => target.is_object(),
            (TypeInfo::Interface(_), TypeInfo::Interface(_)) => {
                if s == t {
                    return Ok(true);
                }
                self.interface_assignable(s, t)
            }
        }
    }

    /// Whether interface `sub` lists `sup` among its superinterfaces. Both
    /// operands must structurally be interfaces.
    pub fn interface_assignable(
        &self,
        sub: (PackageId, ClassIndex),
        sup: (PackageId, ClassIndex),
    ) -> Result<bool, Fault> {
        let sub_info = self.flash.cap(sub.0)?.class()?.interface_info(sub.1)?;
        self.flash.cap(sup.0)?.class()?.interface_info(sup.1)?;

        for index in 0..sub_info.super_interface_count()? {
            let reference = sub_info.super_interface(index)?;
            let resolved = self.cp(sub.0).resolve_class_ref(reference)?;
            self.flash.cap(resolved.0)?.class()?.interface_info(resolved.1)?;
            if resolved == sup {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Instance field words of a class: its own declared size plus every
    /// ancestor's, the root class excluded.
    pub fn instance_fields_size(
        &self,
        package: PackageId,
        class_index: ClassIndex,
    ) -> Result<u16, Fault> {
        let (mut package, mut class) = (
            package,
            self.flash.cap(package)?.class()?.class_info(class_index)?,
        );
        let mut size: u16 = 0;

        for _ in 0..WALK_LIMIT {
            if class.is_object()? {
                return Ok(size);
            }
            size = size
                .checked_add(class.declared_instance_size()? as u16)
                .ok_or(Fault::Security)?;
            (package, class) = self.cp(package).class_ref_to_class(class.super_class_ref()?)?;
        }
        Err(Fault::Security)
    }
}
