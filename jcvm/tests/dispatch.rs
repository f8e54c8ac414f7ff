//! Method-offset resolution walks over the class hierarchy.

use jcvm::util::{CapBuilder, ClassDef};
use jcvm::ClassHandler;
use jcvm_asm::Fault;
use jcvm_cap::{ClassRef, FlashMemory, VirtualMethodRef};
use jcvm_types::{ClassIndex, PackageId};

fn install(builder: &CapBuilder) -> FlashMemory {
    let mut flash = FlashMemory::new();
    flash
        .install(PackageId::new(0).unwrap(), builder.build())
        .unwrap();
    flash
}

fn vref(class_offset: u16, token: u8) -> VirtualMethodRef {
    VirtualMethodRef {
        class_ref: ClassRef::internal(ClassIndex::new(class_offset)),
        token,
    }
}

struct Fixture {
    flash: FlashMemory,
    class_a: u16,
    class_b: u16,
    foo_a: u16,
    bar_pkg: u16,
}

/// `A` declares public `foo` and package-visible `bar`; `B extends A`
/// inherits `foo` through an inherited-abstract slot.
fn fixture() -> Fixture {
    let mut builder = CapBuilder::new(&[0xA0, 0x02, 0x00, 0x01]);
    let foo_a = builder.add_method(1, 1, 0, &[0x04, 0x78]);
    let bar_pkg = builder.add_method(1, 1, 0, &[0x05, 0x78]);

    let object = builder.add_class(&ClassDef::default());
    let class_a = builder.add_class(&ClassDef {
        super_class_ref: Some(object),
        declared_instance_size: 2,
        public_table: vec![foo_a],
        package_table: vec![bar_pkg],
        ..ClassDef::default()
    });
    let class_b = builder.add_class(&ClassDef {
        super_class_ref: Some(class_a),
        declared_instance_size: 3,
        public_table: vec![0xFFFF],
        ..ClassDef::default()
    });

    Fixture {
        flash: install(&builder),
        class_a,
        class_b,
        foo_a,
        bar_pkg,
    }
}

#[test]
fn the_public_path_rejects_package_tokens() {
    let fixture = fixture();
    let handler = ClassHandler::new(&fixture.flash, PackageId::new(0).unwrap());

    assert_eq!(
        handler.public_method_offset(vref(fixture.class_a, 0x80)),
        Err(Fault::Security)
    );
}

#[test]
fn the_package_path_rejects_public_tokens() {
    let fixture = fixture();
    let handler = ClassHandler::new(&fixture.flash, PackageId::new(0).unwrap());

    assert_eq!(
        handler.package_method_offset(vref(fixture.class_a, 0x00)),
        Err(Fault::Security)
    );
}

#[test]
fn each_visibility_dispatches_through_its_own_table() {
    let fixture = fixture();
    let handler = ClassHandler::new(&fixture.flash, PackageId::new(0).unwrap());

    let (_, public) = handler.method_offset(vref(fixture.class_a, 0x00)).unwrap();
    assert_eq!(public, fixture.foo_a);

    let (_, package) = handler.method_offset(vref(fixture.class_a, 0x80)).unwrap();
    assert_eq!(package, fixture.bar_pkg);
}

#[test]
fn an_inherited_abstract_slot_chases_the_superclass() {
    let fixture = fixture();
    let handler = ClassHandler::new(&fixture.flash, PackageId::new(0).unwrap());

    let (_, offset) = handler.method_offset(vref(fixture.class_b, 0x00)).unwrap();
    assert_eq!(offset, fixture.foo_a);
}

#[test]
fn a_walk_reaching_the_root_unresolved_is_a_security_fault() {
    let mut builder = CapBuilder::new(&[0xA0, 0x02, 0x00, 0x02]);
    let foo = builder.add_method(1, 1, 0, &[0x04, 0x78]);

    let object = builder.add_class(&ClassDef::default());
    // The only table starts above the token, so the climb bottoms out.
    let class_a = builder.add_class(&ClassDef {
        super_class_ref: Some(object),
        public_base: 1,
        public_table: vec![foo],
        ..ClassDef::default()
    });

    let flash = install(&builder);
    let handler = ClassHandler::new(&flash, PackageId::new(0).unwrap());
    assert_eq!(
        handler.public_method_offset(vref(class_a, 0x00)),
        Err(Fault::Security)
    );
}

#[test]
fn instance_size_sums_the_ancestor_chain() {
    let fixture = fixture();
    let handler = ClassHandler::new(&fixture.flash, PackageId::new(0).unwrap());

    let size = handler
        .instance_fields_size(PackageId::new(0).unwrap(), ClassIndex::new(fixture.class_b))
        .unwrap();
    assert_eq!(size, 5);
}

#[test]
fn interfaces_are_assignable_through_their_superinterfaces() {
    let mut builder = CapBuilder::new(&[0xA0, 0x02, 0x00, 0x03]);
    let base = builder.add_interface(&[]);
    let derived = builder.add_interface(&[base]);

    let flash = install(&builder);
    let handler = ClassHandler::new(&flash, PackageId::new(0).unwrap());
    let package = PackageId::new(0).unwrap();

    assert!(handler
        .interface_assignable(
            (package, ClassIndex::new(derived)),
            (package, ClassIndex::new(base)),
        )
        .unwrap());
    assert!(!handler
        .interface_assignable(
            (package, ClassIndex::new(base)),
            (package, ClassIndex::new(derived)),
        )
        .unwrap());
}

#[test]
fn typed_class_resolution_rejects_the_wrong_descriptor_kind() {
    let mut builder = CapBuilder::new(&[0xA0, 0x02, 0x00, 0x04]);
    let interface = builder.add_interface(&[]);
    let object = builder.add_class(&ClassDef::default());

    let flash = install(&builder);
    let cp = jcvm::ConstantPoolHandler::new(&flash, PackageId::new(0).unwrap());

    assert!(cp
        .class_ref_to_class(ClassRef::internal(ClassIndex::new(object)))
        .is_ok());
    assert!(cp
        .class_ref_to_interface(ClassRef::internal(ClassIndex::new(interface)))
        .is_ok());
    assert_eq!(
        cp.class_ref_to_class(ClassRef::internal(ClassIndex::new(interface)))
            .map(|(package, _)| package),
        Err(Fault::Security)
    );
    assert_eq!(
        cp.class_ref_to_interface(ClassRef::internal(ClassIndex::new(object)))
            .map(|(package, _)| package),
        Err(Fault::Security)
    );
}
