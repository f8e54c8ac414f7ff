//! Exception handler search and unwinding.

use jcvm::util::{CapBuilder, ClassDef};
use jcvm::{Interpreter, InterpreterError, ProgramState, ReturnValue};
use jcvm_asm::Fault;
use jcvm_cap::FlashMemory;
use jcvm_types::PackageId;

fn run_main(builder: &CapBuilder) -> Result<ProgramState, InterpreterError> {
    let mut flash = FlashMemory::new();
    flash
        .install(PackageId::new(0).unwrap(), builder.build())
        .unwrap();
    Interpreter::new(flash).runtime(PackageId::new(0).unwrap(), 0, 0)
}

fn returned_short(state: ProgramState) -> i16 {
    match state.return_value() {
        ReturnValue::Short(value) => value,
        value => panic!("expected a short return, got {value:?}"),
    }
}

#[test]
fn a_catch_all_handler_catches_a_runtime_fault() {
    let mut builder = CapBuilder::new(&[0xA0, 0x01, 0x00, 0x01]).with_handler_capacity(1);

    // sconst_1, sconst_0, sdiv faults; the handler answers 9.
    let main = builder.add_method(
        2,
        0,
        0,
        &[
            0x04, // sconst_1
            0x03, // sconst_0
            0x47, // sdiv
            0x78, // sreturn
            0x10, 0x09, // handler: bspush 9
            0x78, // sreturn
        ],
    );
    let code_start = main + 2;
    builder.add_handler(code_start, 4, code_start + 4, 0, true);
    builder.add_export(0, &[], &[main]);

    assert_eq!(returned_short(run_main(&builder).unwrap()), 9);
}

#[test]
fn a_thrown_object_is_caught_by_a_matching_type() {
    let mut builder = CapBuilder::new(&[0xA0, 0x01, 0x00, 0x02]).with_handler_capacity(1);

    let object = builder.add_class(&ClassDef::default());
    let class_e = builder.add_class(&ClassDef {
        super_class_ref: Some(object),
        ..ClassDef::default()
    });
    // Pool offset 0 would read as a catch-all catch_type_index.
    builder.add_classref(object);
    let cp_e = builder.add_classref(class_e);

    // new E; athrow. The typed handler pops the exception and answers 7.
    let mut code = vec![0x8F];
    code.extend_from_slice(&cp_e.to_be_bytes());
    code.extend_from_slice(&[
        0x93, // athrow
        0x7A, // return (skipped)
        0x3B, // handler: pop the exception
        0x10, 0x07, // bspush 7
        0x78, // sreturn
    ]);
    let main = builder.add_method(2, 0, 0, &code);

    let code_start = main + 2;
    builder.add_handler(code_start, 5, code_start + 5, cp_e, true);
    builder.add_export(0, &[], &[main]);

    assert_eq!(returned_short(run_main(&builder).unwrap()), 7);
}

#[test]
fn a_mismatched_catch_type_does_not_catch() {
    let mut builder = CapBuilder::new(&[0xA0, 0x01, 0x00, 0x03]).with_handler_capacity(1);

    let object = builder.add_class(&ClassDef::default());
    let class_e = builder.add_class(&ClassDef {
        super_class_ref: Some(object),
        ..ClassDef::default()
    });
    let class_other = builder.add_class(&ClassDef {
        super_class_ref: Some(object),
        ..ClassDef::default()
    });
    builder.add_classref(object);
    let cp_e = builder.add_classref(class_e);
    let cp_other = builder.add_classref(class_other);

    let mut code = vec![0x8F];
    code.extend_from_slice(&cp_e.to_be_bytes());
    code.extend_from_slice(&[
        0x93, // athrow
        0x7A, // return
        0x3B, 0x10, 0x07, 0x78, // handler for the wrong class
    ]);
    let main = builder.add_method(2, 0, 0, &code);

    let code_start = main + 2;
    builder.add_handler(code_start, 5, code_start + 5, cp_other, true);
    builder.add_export(0, &[], &[main]);

    let error = run_main(&builder).unwrap_err();
    assert!(matches!(error, InterpreterError::UncaughtException(_)));
}

#[test]
fn unwinding_crosses_frames_to_the_callers_handler() {
    let mut builder = CapBuilder::new(&[0xA0, 0x01, 0x00, 0x04]).with_handler_capacity(1);

    // The callee faults; only the caller has a covering handler.
    let callee = builder.add_method(
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
    let cp_callee = builder.add_static_method_ref(callee);

    let mut code = vec![0x8D]; // invokestatic callee
    code.extend_from_slice(&cp_callee.to_be_bytes());
    code.extend_from_slice(&[
        0x78, // sreturn (skipped)
        0x10, 0x2A, // handler: bspush 42
        0x78, // sreturn
    ]);
    let main = builder.add_method(2, 0, 0, &code);

    let code_start = main + 2;
    builder.add_handler(code_start, 4, code_start + 4, 0, true);
    builder.add_export(0, &[], &[main]);

    assert_eq!(returned_short(run_main(&builder).unwrap()), 42);
}

#[test]
fn an_uncaught_fault_surfaces_with_its_kind() {
    let mut builder = CapBuilder::new(&[0xA0, 0x01, 0x00, 0x05]);
    let main = builder.add_method(
        1,
        0,
        0,
        &[
            0x01, // aconst_null
            0x93, // athrow
        ],
    );
    builder.add_export(0, &[], &[main]);

    let error = run_main(&builder).unwrap_err();
    assert_eq!(error.fault(), Some(Fault::NullPointer));
}
