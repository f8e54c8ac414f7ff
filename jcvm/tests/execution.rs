//! End-to-end bytecode execution against assembled package images.

use jcvm::util::{CapBuilder, ClassDef};
use jcvm::{Interpreter, ProgramState, ReturnValue};
use jcvm_asm::Fault;
use jcvm_cap::FlashMemory;
use jcvm_types::{AppletId, PackageId};

fn package(id: u8) -> PackageId {
    PackageId::new(id).unwrap()
}

fn install(builders: &[(u8, &CapBuilder)]) -> FlashMemory {
    let mut flash = FlashMemory::new();
    for (slot, builder) in builders {
        flash.install(package(*slot), builder.build()).unwrap();
    }
    flash
}

fn run_main(builder: &CapBuilder) -> Result<ProgramState, jcvm::InterpreterError> {
    let flash = install(&[(0, builder)]);
    let mut vm = Interpreter::new(flash);
    vm.runtime(package(0), 0, 0)
}

fn returned_short(state: ProgramState) -> i16 {
    match state.return_value() {
        ReturnValue::Short(value) => value,
        value => panic!("expected a short return, got {value:?}"),
    }
}

/// Root class plus `A.foo -> 1` and `B extends A` overriding `foo -> 2`.
fn hierarchy(builder: &mut CapBuilder) -> (u16, u16, u16) {
    let foo_a = builder.add_method(1, 1, 0, &[0x04, 0x78]); // sconst_1, sreturn
    let foo_b = builder.add_method(1, 1, 0, &[0x05, 0x78]); // sconst_2, sreturn

    let object = builder.add_class(&ClassDef::default());
    let class_a = builder.add_class(&ClassDef {
        super_class_ref: Some(object),
        public_table: vec![foo_a],
        ..ClassDef::default()
    });
    let class_b = builder.add_class(&ClassDef {
        super_class_ref: Some(class_a),
        public_table: vec![foo_b],
        ..ClassDef::default()
    });

    (object, class_a, class_b)
}

#[test]
fn static_add_returns_the_sum() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x01]);
    let main = builder.add_method(
        2,
        0,
        0,
        &[
            0x11, 0x00, 0x03, // sspush 3
            0x11, 0x00, 0x04, // sspush 4
            0x41, // sadd
            0x78, // sreturn
        ],
    );
    builder.add_export(0, &[], &[main]);

    assert_eq!(returned_short(run_main(&builder).unwrap()), 0x0007);
}

#[test]
fn virtual_dispatch_selects_the_override() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x02]);
    let (_, class_a, class_b) = hierarchy(&mut builder);

    let cp_b = builder.add_classref(class_b);
    let cp_foo = builder.add_virtual_method_ref(class_a, 0);

    let mut code = vec![0x8F]; // new B
    code.extend_from_slice(&cp_b.to_be_bytes());
    code.push(0x8B); // invokevirtual A.foo
    code.extend_from_slice(&cp_foo.to_be_bytes());
    code.push(0x78); // sreturn

    let main = builder.add_method(2, 0, 0, &code);
    builder.add_export(0, &[], &[main]);

    assert_eq!(returned_short(run_main(&builder).unwrap()), 2);
}

#[test]
fn interface_dispatch_reaches_the_implementation() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x03]);
    let m_c = builder.add_method(1, 1, 0, &[0x10, 0x2A, 0x78]); // bspush 42, sreturn

    let interface = builder.add_interface(&[]);
    let object = builder.add_class(&ClassDef::default());
    let class_c = builder.add_class(&ClassDef {
        super_class_ref: Some(object),
        public_table: vec![m_c],
        interfaces: vec![(interface, vec![0])],
        ..ClassDef::default()
    });

    let cp_c = builder.add_classref(class_c);
    let cp_i = builder.add_classref(interface);

    let mut code = vec![0x8F]; // new C
    code.extend_from_slice(&cp_c.to_be_bytes());
    code.push(0x8E); // invokeinterface
    code.push(1); // nargs
    code.extend_from_slice(&cp_i.to_be_bytes());
    code.push(0); // interface method index
    code.push(0x78); // sreturn

    let main = builder.add_method(2, 0, 0, &code);
    builder.add_export(0, &[], &[main]);

    assert_eq!(returned_short(run_main(&builder).unwrap()), 42);
}

#[test]
fn interface_dispatch_without_arguments_is_a_security_fault() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x04]);
    let m_c = builder.add_method(1, 1, 0, &[0x10, 0x2A, 0x78]);

    let interface = builder.add_interface(&[]);
    let object = builder.add_class(&ClassDef::default());
    let class_c = builder.add_class(&ClassDef {
        super_class_ref: Some(object),
        public_table: vec![m_c],
        interfaces: vec![(interface, vec![0])],
        ..ClassDef::default()
    });

    let cp_c = builder.add_classref(class_c);
    let cp_i = builder.add_classref(interface);

    let mut code = vec![0x8F];
    code.extend_from_slice(&cp_c.to_be_bytes());
    code.push(0x8E);
    code.push(0); // nargs == 0 is rejected
    code.extend_from_slice(&cp_i.to_be_bytes());
    code.push(0);
    code.push(0x78);

    let main = builder.add_method(2, 0, 0, &code);
    builder.add_export(0, &[], &[main]);

    let error = run_main(&builder).unwrap_err();
    assert_eq!(error.fault(), Some(Fault::Security));
}

#[test]
fn invoking_through_null_raises_null_pointer() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x05]);
    let (_, class_a, _) = hierarchy(&mut builder);
    let cp_foo = builder.add_virtual_method_ref(class_a, 0);

    let mut code = vec![0x01]; // aconst_null
    code.push(0x8B);
    code.extend_from_slice(&cp_foo.to_be_bytes());
    code.push(0x78);

    let main = builder.add_method(2, 0, 0, &code);
    builder.add_export(0, &[], &[main]);

    let error = run_main(&builder).unwrap_err();
    assert_eq!(error.fault(), Some(Fault::NullPointer));
}

#[test]
fn jsr_returns_through_the_saved_pc() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x06]);

    // 0: jsr +7 | 3: sspush 0x55 | 6: sreturn | 7: astore_1, ret 1
    let main = builder.add_method(
        2,
        0,
        2,
        &[
            0x71, 0x00, 0x07, // jsr -> subroutine
            0x11, 0x00, 0x55, // sspush 0x55
            0x78, // sreturn
            0x2C, // astore_1
            0x72, 0x01, // ret 1
        ],
    );
    builder.add_export(0, &[], &[main]);

    assert_eq!(returned_short(run_main(&builder).unwrap()), 0x55);
}

#[test]
fn consuming_a_saved_pc_twice_is_a_security_fault() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x07]);

    // 0: jsr +10 | 3: sconst_0 | 4: goto +6 | 6: sspush | 9: sreturn
    // 10: astore_1 | 11: ret 1
    let main = builder.add_method(
        2,
        0,
        2,
        &[
            0x71, 0x00, 0x0A, // jsr -> subroutine
            0x03, // sconst_0: forge the same returnAddress
            0x70, 0x06, // goto -> subroutine again
            0x11, 0x00, 0x55, // sspush 0x55
            0x78, // sreturn
            0x2C, // astore_1
            0x72, 0x01, // ret 1
        ],
    );
    builder.add_export(0, &[], &[main]);

    let error = run_main(&builder).unwrap_err();
    assert_eq!(error.fault(), Some(Fault::Security));
}

#[test]
fn cross_package_static_call_swaps_the_package() {
    let aid_b = [0xB0, 0x00, 0x00, 0x01];
    let mut exporter = CapBuilder::new(&aid_b);
    let bee = builder_bee(&mut exporter);
    exporter.add_export(0, &[], &[bee]);

    let mut importer = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x08]);
    let token = importer.add_import(&aid_b);
    let cp_bee = importer.add_external_static_method_ref(token, 0, 0);

    let mut code = vec![0x8D]; // invokestatic B.bee
    code.extend_from_slice(&cp_bee.to_be_bytes());
    code.push(0x78); // sreturn

    let main = importer.add_method(1, 0, 0, &code);
    importer.add_export(0, &[], &[main]);

    let flash = install(&[(0, &importer), (1, &exporter)]);
    let mut vm = Interpreter::new(flash);
    vm.install_bootstrap(AppletId::new(0), package(0), main)
        .unwrap();

    // invokestatic: the callee's package becomes current.
    assert_eq!(vm.execute().unwrap(), jcvm::ExecuteState::Proceed);
    assert_eq!(
        vm.current_context().unwrap().current_package(),
        package(1)
    );

    // sspush, then sreturn back into the caller's package.
    vm.execute().unwrap();
    vm.execute().unwrap();
    assert_eq!(
        vm.current_context().unwrap().current_package(),
        package(0)
    );

    // The caller observes the callee's value.
    match vm.execute().unwrap() {
        jcvm::ExecuteState::Returned(ReturnValue::Short(value)) => {
            assert_eq!(value as u16, 0xBEEF);
        }
        state => panic!("unexpected state {state:?}"),
    }
}

fn builder_bee(builder: &mut CapBuilder) -> u16 {
    builder.add_method(1, 0, 0, &[0x11, 0xBE, 0xEF, 0x78]) // sspush 0xBEEF, sreturn
}

#[test]
fn instance_fields_round_trip() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x09]);
    let object = builder.add_class(&ClassDef::default());
    let class_p = builder.add_class(&ClassDef {
        super_class_ref: Some(object),
        declared_instance_size: 2,
        ..ClassDef::default()
    });

    let cp_p = builder.add_classref(class_p);
    let cp_field = builder.add_instance_field_ref(class_p, 1);

    let mut code = vec![0x8F]; // new P
    code.extend_from_slice(&cp_p.to_be_bytes());
    code.extend_from_slice(&[
        0x2B, // astore_0
        0x18, // aload_0
        0x11, 0x00, 0x42, // sspush 0x42
        0x89, cp_field as u8, // putfield_s
        0x18, // aload_0
        0x85, cp_field as u8, // getfield_s
        0x78, // sreturn
    ]);

    let main = builder.add_method(3, 0, 1, &code);
    builder.add_export(0, &[], &[main]);

    assert_eq!(returned_short(run_main(&builder).unwrap()), 0x42);
}

#[test]
fn array_store_then_load_round_trips() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x0A]);

    let main = builder.add_method(
        3,
        0,
        1,
        &[
            0x06, // sconst_3
            0x90, 0x0C, // newarray short
            0x2B, // astore_0
            0x18, // aload_0
            0x04, // sconst_1
            0x11, 0x12, 0x34, // sspush 0x1234
            0x39, // sastore
            0x18, // aload_0
            0x04, // sconst_1
            0x26, // saload
            0x78, // sreturn
        ],
    );
    builder.add_export(0, &[], &[main]);

    assert_eq!(returned_short(run_main(&builder).unwrap()), 0x1234);
}

#[test]
fn negative_array_length_faults_zero_length_is_valid() {
    let mut negative = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x0B]);
    let main = negative.add_method(
        2,
        0,
        0,
        &[
            0x02, // sconst_m1
            0x90, 0x0C, // newarray short
            0x7A, // return
        ],
    );
    negative.add_export(0, &[], &[main]);
    let error = run_main(&negative).unwrap_err();
    assert_eq!(error.fault(), Some(Fault::NegativeArraySize));

    let mut zero = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x0C]);
    let main = zero.add_method(
        2,
        0,
        0,
        &[
            0x03, // sconst_0
            0x90, 0x0C, // newarray short
            0x92, // arraylength
            0x78, // sreturn
        ],
    );
    zero.add_export(0, &[], &[main]);
    assert_eq!(returned_short(run_main(&zero).unwrap()), 0);
}

#[test]
fn instanceof_and_checkcast_agree() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x0D]);
    let (_, class_a, class_b) = hierarchy(&mut builder);

    let cp_a = builder.add_classref(class_a);
    let cp_b = builder.add_classref(class_b);

    // new B; checkcast A must pass; instanceof A must answer 1.
    let mut code = vec![0x8F];
    code.extend_from_slice(&cp_b.to_be_bytes());
    code.push(0x94); // checkcast
    code.push(0x00);
    code.extend_from_slice(&cp_a.to_be_bytes());
    code.push(0x95); // instanceof
    code.push(0x00);
    code.extend_from_slice(&cp_a.to_be_bytes());
    code.push(0x78);

    let main = builder.add_method(2, 0, 0, &code);
    builder.add_export(0, &[], &[main]);
    assert_eq!(returned_short(run_main(&builder).unwrap()), 1);
}

#[test]
fn downcast_of_a_base_instance_faults() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x0E]);
    let (_, class_a, class_b) = hierarchy(&mut builder);

    let cp_a = builder.add_classref(class_a);
    let cp_b = builder.add_classref(class_b);

    let mut code = vec![0x8F];
    code.extend_from_slice(&cp_a.to_be_bytes());
    code.push(0x94); // checkcast B
    code.push(0x00);
    code.extend_from_slice(&cp_b.to_be_bytes());
    code.push(0x7A);

    let main = builder.add_method(2, 0, 0, &code);
    builder.add_export(0, &[], &[main]);

    let error = run_main(&builder).unwrap_err();
    assert_eq!(error.fault(), Some(Fault::ClassCast));
}

#[test]
fn static_fields_round_trip_and_persistent_arrays_read() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x0F]);
    builder.set_statics(
        4,
        1,
        &[(jcvm_types::ArrayKind::Short, vec![0xBE, 0xEF])],
        &[],
    );

    let cp_short = builder.add_static_field_ref(2);
    let cp_array = builder.add_static_field_ref(0);

    // Write then read the scalar, then index the persistent array; the sum
    // folds both observations into one returned word.
    let mut code = vec![
        0x11, 0x07, 0x77, // sspush 0x0777
        0x81, // putstatic_s
    ];
    code.extend_from_slice(&cp_short.to_be_bytes());
    code.push(0x7D); // getstatic_s
    code.extend_from_slice(&cp_short.to_be_bytes());
    code.push(0x7B); // getstatic_a
    code.extend_from_slice(&cp_array.to_be_bytes());
    code.extend_from_slice(&[
        0x03, // sconst_0
        0x26, // saload
        0x41, // sadd
        0x78, // sreturn
    ]);

    let main = builder.add_method(3, 0, 0, &code);
    builder.add_export(0, &[], &[main]);

    let expected = 0x0777i16.wrapping_add(0xBEEFu16 as i16);
    assert_eq!(returned_short(run_main(&builder).unwrap()), expected);
}

#[test]
fn writing_a_persistent_array_is_a_security_fault() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x10]);
    builder.set_statics(
        2,
        1,
        &[(jcvm_types::ArrayKind::Short, vec![0xBE, 0xEF])],
        &[],
    );
    let cp_array = builder.add_static_field_ref(0);

    let mut code = vec![0x7B]; // getstatic_a
    code.extend_from_slice(&cp_array.to_be_bytes());
    code.extend_from_slice(&[
        0x03, // sconst_0
        0x04, // sconst_1
        0x39, // sastore
        0x7A, // return
    ]);

    let main = builder.add_method(3, 0, 0, &code);
    builder.add_export(0, &[], &[main]);

    let error = run_main(&builder).unwrap_err();
    assert_eq!(error.fault(), Some(Fault::Security));
}

#[test]
fn stableswitch_picks_the_matching_entry() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x11]);

    // 0: sconst_2 | 1: stableswitch low=1 high=3 | 14..: arms
    let main = builder.add_method(
        2,
        0,
        0,
        &[
            0x05, // sconst_2
            0x73, // stableswitch at base 1
            0x00, 0x0D, // default -> 14
            0x00, 0x01, // low
            0x00, 0x03, // high
            0x00, 0x10, // case 1 -> 17
            0x00, 0x13, // case 2 -> 20
            0x00, 0x10, // case 3 -> 17
            0x02, 0x78, // 14: default: sconst_m1, sreturn
            0x00, // padding
            0x04, 0x78, // 17: sconst_1, sreturn
            0x00, // padding
            0x05, 0x78, // 20: sconst_2, sreturn
        ],
    );
    builder.add_export(0, &[], &[main]);

    assert_eq!(returned_short(run_main(&builder).unwrap()), 2);
}

#[test]
fn division_by_zero_is_an_arithmetic_fault() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x12]);
    let main = builder.add_method(
        2,
        0,
        0,
        &[
            0x04, // sconst_1
            0x03, // sconst_0
            0x47, // sdiv
            0x78, // sreturn
        ],
    );
    builder.add_export(0, &[], &[main]);

    let error = run_main(&builder).unwrap_err();
    assert_eq!(error.fault(), Some(Fault::Arithmetic));
}

#[test]
fn int_arithmetic_spans_two_slots() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x13]);
    let main = builder.add_method(
        4,
        0,
        0,
        &[
            0x14, 0x00, 0x01, 0x00, 0x00, // iipush 0x10000
            0x14, 0x00, 0x00, 0x00, 0x2A, // iipush 42
            0x42, // iadd
            0x5E, // i2s: low half only
            0x78, // sreturn
        ],
    );
    builder.add_export(0, &[], &[main]);

    assert_eq!(returned_short(run_main(&builder).unwrap()), 42);
}

#[test]
fn ending_the_session_wipes_the_machine() {
    let mut builder = CapBuilder::new(&[0xA0, 0x00, 0x00, 0x14]);
    let main = builder.add_method(2, 0, 0, &[0x11, 0x00, 0x07, 0x78]);
    builder.add_export(0, &[], &[main]);

    let flash = install(&[(0, &builder)]);
    let mut vm = Interpreter::new(flash);
    assert_eq!(returned_short(vm.runtime(package(0), 0, 0).unwrap()), 7);

    vm.end_session();
    assert!(vm.current_context().is_none());
    assert!(matches!(
        vm.run(),
        Err(jcvm::InterpreterError::NotInitialized)
    ));
}
