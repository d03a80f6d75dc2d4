////////////////////////////////////////////////////////////////////////////////
// This file is part of "Ad Astra", an embeddable scripting programming       //
// language platform.                                                         //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use std::rc::Rc;

use ad_astra_bridge::{
    dispatch::NativeCall,
    reflect::{ClassInfo, ExtensionMethod, ExtensionProvider},
    runtime::{NativeError, NativeResult, NativeValue, Origin, RuntimeError, ScriptValue},
    Bridge,
    BridgeConfig,
};

fn text(call: &mut NativeCall<'_>, text: String) -> NativeResult<()> {
    call.set_return(NativeValue::Text(text))
}

fn box_entry(call: &mut NativeCall<'_>) -> NativeResult<()> {
    match call.index() {
        0 => {
            let size = call.take(1).as_i64().unwrap_or_default();

            text(call, format!("static {size}"))
        }

        1 => {
            let bound = call.pointer(1).is_some();

            text(call, format!("instance self={bound}"))
        }

        2 => {
            let bound = call.pointer(1).is_some();

            text(call, format!("span self={bound}"))
        }

        3 => {
            let span = call.take(1).as_i64().unwrap_or_default();

            text(call, format!("span static {span}"))
        }

        4 => text(call, String::from("pointer")),

        5 => text(call, String::from("script")),

        6 => {
            let pointer = call.heap().alloc_value(None, 0u8);

            call.set_return(NativeValue::Pointer(Some(pointer.into())))
        }

        7 => {
            let pointer = call
                .pointer(1)
                .and_then(|identity| identity.as_opaque())
                .ok_or_else(|| NativeError::new("missing box"))?;

            drop(call.heap().free(pointer));

            Ok(())
        }

        8 => {
            let other = call.pointer(1);

            call.set_return(NativeValue::Pointer(other))
        }

        _ => Err(NativeError::new("unknown member")),
    }
}

fn box_bridge() -> (Bridge, Rc<ClassInfo>) {
    let bridge = Bridge::new(BridgeConfig::new());

    let provider = ExtensionProvider::new("BoxExt", box_entry)
        .method(ExtensionMethod::function(0, "size").param("i32").returns("String"))
        .method(ExtensionMethod::instance(1, "size").returns("String"))
        .method(ExtensionMethod::instance(2, "span").returns("String"))
        .method(ExtensionMethod::function(3, "span").param("i32").returns("String"))
        .method(ExtensionMethod::function(4, "use").param("Box*").returns("String"))
        .method(ExtensionMethod::function(5, "use").param("ScriptValue").returns("String"))
        .method(ExtensionMethod::constructor(6))
        .method(ExtensionMethod::destructor(7))
        .method(ExtensionMethod::constructor(8).param("Box*"));

    let class = bridge.register_type("Box", None, 0, Some(provider.into()));

    (bridge, class)
}

#[test]
fn test_static_overload_first() {
    let (bridge, class) = box_bridge();

    let instance = bridge.construct(Origin::nil(), &class, &[]).unwrap();

    assert_eq!(
        bridge.call_method(Origin::nil(), &instance, "size", &[]).unwrap(),
        ScriptValue::from("instance self=true"),
    );

    assert_eq!(
        bridge
            .call_static(Origin::nil(), &class, "size", &[ScriptValue::Int(3)])
            .unwrap(),
        ScriptValue::from("static 3"),
    );

    // An unbound call takes the instance from the first argument.
    assert_eq!(
        bridge
            .call_static(
                Origin::nil(),
                &class,
                "size",
                &[ScriptValue::Instance(instance.clone())],
            )
            .unwrap(),
        ScriptValue::from("instance self=true"),
    );
}

#[test]
fn test_instance_overload_first() {
    let (bridge, class) = box_bridge();

    let instance = bridge.construct(Origin::nil(), &class, &[]).unwrap();

    assert_eq!(
        bridge
            .call_static(Origin::nil(), &class, "span", &[ScriptValue::Int(3)])
            .unwrap(),
        ScriptValue::from("span static 3"),
    );

    assert_eq!(
        bridge.call_method(Origin::nil(), &instance, "span", &[]).unwrap(),
        ScriptValue::from("span self=true"),
    );

    assert!(matches!(
        bridge.call_static(Origin::nil(), &class, "span", &[ScriptValue::from("wide")]),
        Err(RuntimeError::NoMatchingOverload { .. }),
    ));

    assert_eq!(bridge.storage_depth(), 0);
}

#[test]
fn test_destroyed_argument() {
    let (bridge, class) = box_bridge();

    let instance = bridge.construct(Origin::nil(), &class, &[]).unwrap();

    assert_eq!(
        bridge
            .call_static(
                Origin::nil(),
                &class,
                "use",
                &[ScriptValue::Instance(instance.clone())],
            )
            .unwrap(),
        ScriptValue::from("pointer"),
    );

    bridge.destroy(&instance);

    match bridge.call_static(Origin::nil(), &class, "use", &[ScriptValue::Instance(instance)]) {
        Err(RuntimeError::OwnershipViolation { class, .. }) => assert_eq!(class, "Box"),
        other => panic!("unexpected result {other:?}"),
    }

    assert_eq!(bridge.storage_depth(), 0);
}

#[test]
fn test_constructor_returns_wrapped_object() {
    let (bridge, class) = box_bridge();

    let instance = bridge.construct(Origin::nil(), &class, &[]).unwrap();

    let same = bridge
        .construct(Origin::nil(), &class, &[ScriptValue::Instance(instance.clone())])
        .unwrap();

    assert!(same.ptr_eq(&instance));
    assert_eq!(bridge.wrapper_count(), 1);
    assert_eq!(bridge.heap().len(), 1);

    drop(same);
    drop(instance);

    assert_eq!(bridge.wrapper_count(), 0);
    assert_eq!(bridge.heap().len(), 0);
}
