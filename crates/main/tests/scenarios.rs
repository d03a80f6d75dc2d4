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

use std::{
    any::Any,
    cell::{Cell, RefCell},
    rc::Rc,
};

use ad_astra_bridge::{
    dispatch::{NativeCall, Receiver},
    reflect::{
        CallKind,
        ClassInfo,
        Downcast,
        ExtensionMethod,
        ExtensionProvider,
        MethodKind,
        MethodMeta,
        PropertyMeta,
        ProviderSource,
        ReflectiveDescriptor,
    },
    runtime::{
        BoxedValue,
        ManagedObject,
        ManagedRef,
        NativeError,
        NativeHeap,
        NativeIdentity,
        NativeResult,
        NativeValue,
        Origin,
        RuntimeError,
        ScriptValue,
    },
    wrapper::WrapperState,
    Bridge,
    BridgeConfig,
};

#[derive(Clone, Default, Debug, PartialEq)]
struct WidgetData {
    width: i32,
    title: String,
}

struct Fixture {
    bridge: Bridge,
    widget: Rc<ClassInfo>,
    source: ProviderSource,
    destroyed: Rc<Cell<u32>>,
}

fn with_widget<R>(call: &NativeCall<'_>, f: impl FnOnce(&mut WidgetData) -> R) -> NativeResult<R> {
    let pointer = call
        .pointer(1)
        .and_then(|identity| identity.as_opaque())
        .ok_or_else(|| NativeError::new("missing widget"))?;

    call.heap()
        .with_mut(pointer, f)
        .ok_or_else(|| NativeError::new("dead widget"))
}

fn alloc_widget(call: &mut NativeCall<'_>, data: WidgetData) -> NativeResult<()> {
    let kind = call.bridge().kinds().find("WidgetData");

    let pointer = call.heap().alloc_value(kind, data);

    call.set_return(NativeValue::Pointer(Some(pointer.into())))
}

fn fixture(config: BridgeConfig) -> Fixture {
    let bridge = Bridge::new(config);

    let data_kind = bridge.register_kind::<WidgetData>("WidgetData");

    let destroyed = Rc::new(Cell::new(0));

    let entry = {
        let destroyed = destroyed.clone();

        move |call: &mut NativeCall<'_>| -> NativeResult<()> {
            match call.index() {
                0 => {
                    let width = call.take(1).as_i64().unwrap_or_default() as i32;

                    alloc_widget(
                        call,
                        WidgetData {
                            width,
                            title: String::new(),
                        },
                    )
                }

                1 => {
                    let title = call.take(1);

                    alloc_widget(
                        call,
                        WidgetData {
                            width: 0,
                            title: title.as_str().unwrap_or_default().to_string(),
                        },
                    )
                }

                2 => {
                    let pointer = call
                        .pointer(1)
                        .and_then(|identity| identity.as_opaque())
                        .ok_or_else(|| NativeError::new("missing widget"))?;

                    drop(call.heap().free(pointer));

                    destroyed.set(destroyed.get() + 1);

                    Ok(())
                }

                3 => {
                    let width = with_widget(call, |widget| widget.width)?;

                    call.set_return(NativeValue::I32(width))
                }

                4 => {
                    let width = call.take(2).as_i64().unwrap_or_default() as i32;

                    with_widget(call, |widget| widget.width = width)
                }

                5 => {
                    let title = with_widget(call, |widget| widget.title.clone())?;

                    call.set_return(NativeValue::Text(title))
                }

                6 => alloc_widget(
                    call,
                    WidgetData {
                        width: 100,
                        title: String::from("factory"),
                    },
                ),

                7 => {
                    let this = call.pointer(1);

                    call.set_return(NativeValue::Pointer(this))
                }

                8 => {
                    let identity = call
                        .pointer(1)
                        .ok_or_else(|| NativeError::new("missing widget"))?;

                    let bridge = call.bridge().clone();

                    let instance = bridge.wrap(identity, "Widget");

                    let width = bridge
                        .call_method(Origin::nil(), &instance, "width", &[])
                        .map_err(|error| NativeError::new(error.to_string()))?;

                    let ScriptValue::Int(width) = width else {
                        return Err(NativeError::new("width is not an integer"));
                    };

                    call.set_return(NativeValue::I32(width as i32 * 2))
                }

                9 => call.set_return(NativeValue::Text(String::from("widget"))),

                10 => alloc_widget(call, WidgetData::default()),

                11 => {
                    let copy = with_widget(call, |widget| widget.clone())?;

                    call.set_return(NativeValue::Boxed(BoxedValue::new(data_kind, copy)))
                }

                12 => Err(NativeError::new("widget failure")),

                _ => Err(NativeError::new("unknown member")),
            }
        }
    };

    let provider = ExtensionProvider::new("WidgetExt", entry)
        .method(ExtensionMethod::constructor(0).param("i32"))
        .method(ExtensionMethod::constructor(1).param("String"))
        .method(ExtensionMethod::destructor(2))
        .method(ExtensionMethod::instance(3, "width").returns("i32"))
        .method(ExtensionMethod::instance(4, "resize").param("i32"))
        .method(ExtensionMethod::instance(5, "title").returns("String"))
        .method(ExtensionMethod::function(6, "create").returns("Widget*"))
        .method(ExtensionMethod::instance(7, "self").returns("Widget*"))
        .method(ExtensionMethod::instance(8, "twice").returns("i32"))
        .method(ExtensionMethod::instance(9, "type").returns("String"))
        .method(ExtensionMethod::constructor(10))
        .method(ExtensionMethod::instance(11, "copy").returns("Widget"))
        .method(ExtensionMethod::instance(12, "fail"));

    let source = ProviderSource::from(provider);

    let widget = bridge.register_type("Widget", None, 0, Some(source.clone()));

    Fixture {
        bridge,
        widget,
        source,
        destroyed,
    }
}

fn width(bridge: &Bridge, instance: &ScriptValue) -> ScriptValue {
    let instance = instance.as_instance().expect("instance expected");

    bridge
        .call_method(Origin::nil(), instance, "width", &[])
        .expect("width call failed")
}

struct Label {
    text: RefCell<String>,
    parent: Cell<bool>,
    disposed: Rc<Cell<bool>>,
}

impl ManagedObject for Label {
    fn class_name(&self) -> &str {
        "Label"
    }

    fn has_parent(&self) -> bool {
        self.parent.get()
    }

    fn dispose(&self) {
        self.disposed.set(true);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn label_entry(call: &mut NativeCall<'_>) -> NativeResult<()> {
    let receiver = call
        .receiver()
        .and_then(|identity| identity.as_managed())
        .cloned()
        .ok_or_else(|| NativeError::new("missing label"))?;

    let label = receiver
        .downcast_ref::<Label>()
        .ok_or_else(|| NativeError::new("not a label"))?;

    match (call.kind(), call.index()) {
        (CallKind::ReadProperty, 0) => {
            let text = label.text.borrow().clone();

            call.set_return(NativeValue::Text(text))
        }

        (CallKind::WriteProperty, 0) => {
            let value = call.take(1);

            *label.text.borrow_mut() = value.as_str().unwrap_or_default().to_string();

            Ok(())
        }

        (CallKind::ReadProperty, 1) => {
            let length = label.text.borrow().len() as i32;

            call.set_return(NativeValue::I32(length))
        }

        (CallKind::Invoke, 0) => {
            label.text.borrow_mut().clear();

            Ok(())
        }

        // Signal "edited": stores the text and emits the arguments as given.
        (CallKind::Invoke, 1) => {
            let text = call.take(1);
            let source = call.take(2);

            *label.text.borrow_mut() = text.as_str().unwrap_or_default().to_string();

            let sender = NativeIdentity::from(receiver.clone());

            let arguments = vec![text, source];

            let _ = call
                .bridge()
                .emit(Origin::nil(), &sender, 1, arguments)
                .map_err(|error| NativeError::new(error.to_string()))?;

            Ok(())
        }

        _ => Err(NativeError::new("unknown member")),
    }
}

fn label_bridge() -> Bridge {
    let bridge = Bridge::new(BridgeConfig::new());

    let descriptor = ReflectiveDescriptor::new("Label", label_entry)
        .property(PropertyMeta::new(0, "text", "String"))
        .property(PropertyMeta::new(1, "length", "i32").read_only())
        .method(MethodMeta::new(0, "clear"))
        .method(
            MethodMeta::new(1, "edited")
                .param("String")
                .param("Label*")
                .kind(MethodKind::Signal),
        );

    let _ = bridge.register_descriptor(Rc::new(descriptor));

    bridge
}

fn new_label(text: &str, disposed: &Rc<Cell<bool>>) -> Rc<dyn ManagedObject> {
    Rc::new(Label {
        text: RefCell::new(String::from(text)),
        parent: Cell::new(false),
        disposed: disposed.clone(),
    })
}

#[test]
fn test_widget_constructors() {
    let Fixture { bridge, widget, .. } = fixture(BridgeConfig::new());

    bridge.reset_counters();

    let by_width = bridge
        .construct(Origin::nil(), &widget, &[ScriptValue::Int(5)])
        .unwrap();

    assert_eq!(bridge.counters().strict, 1);
    assert_eq!(bridge.counters().permissive, 0);

    assert_eq!(
        bridge.call_method(Origin::nil(), &by_width, "width", &[]).unwrap(),
        ScriptValue::Int(5),
    );

    bridge.reset_counters();

    let by_title = bridge
        .construct(Origin::nil(), &widget, &[ScriptValue::from("hello")])
        .unwrap();

    // The first overload rejects the string strictly, the second accepts it.
    assert_eq!(bridge.counters().strict, 2);
    assert_eq!(bridge.counters().permissive, 0);

    assert_eq!(
        bridge.call_method(Origin::nil(), &by_title, "title", &[]).unwrap(),
        ScriptValue::from("hello"),
    );

    bridge.reset_counters();

    // Neither overload accepts a float strictly. The first permissive
    // overload truncates it.
    let by_float = bridge
        .construct(Origin::nil(), &widget, &[ScriptValue::Float(7.9)])
        .unwrap();

    let counters = bridge.counters();

    assert_eq!(counters.strict, 2);
    assert_eq!(counters.permissive, 1);

    assert_eq!(
        bridge.call_method(Origin::nil(), &by_float, "width", &[]).unwrap(),
        ScriptValue::Int(7),
    );

    let empty = bridge.construct(Origin::nil(), &widget, &[]).unwrap();

    assert_eq!(
        bridge.call_method(Origin::nil(), &empty, "width", &[]).unwrap(),
        ScriptValue::Int(0),
    );

    match bridge.construct(Origin::nil(), &widget, &[ScriptValue::List(Vec::new())]) {
        Err(RuntimeError::NoMatchingOverload { candidates, .. }) => {
            assert_eq!(candidates.len(), 3);
        }

        other => panic!("unexpected result {other:?}"),
    }

    let unknown = bridge.lookup_or_create("Unknown");

    assert!(matches!(
        bridge.construct(Origin::nil(), &unknown, &[]),
        Err(RuntimeError::NoConstructor { .. }),
    ));
}

#[test]
fn test_overload_determinism() {
    let Fixture { bridge, widget, .. } = fixture(BridgeConfig::new());

    for _ in 0..3 {
        let instance = bridge
            .construct(Origin::nil(), &widget, &[ScriptValue::Float(3.2)])
            .unwrap();

        assert_eq!(width(&bridge, &ScriptValue::Instance(instance)), ScriptValue::Int(3));
    }
}

#[test]
fn test_single_wrapper_per_object() {
    let Fixture {
        bridge,
        widget,
        destroyed,
        ..
    } = fixture(BridgeConfig::new());

    let instance = bridge
        .construct(Origin::nil(), &widget, &[ScriptValue::Int(1)])
        .unwrap();

    assert!(instance.is_owned());

    let same = bridge.call_method(Origin::nil(), &instance, "self", &[]).unwrap();

    let same = same.as_instance().unwrap().clone();

    assert!(same.ptr_eq(&instance));
    assert_eq!(bridge.wrapper_count(), 1);

    drop(instance);

    assert_eq!(destroyed.get(), 0);

    drop(same);

    assert_eq!(destroyed.get(), 1);
    assert_eq!(bridge.wrapper_count(), 0);
    assert_eq!(bridge.heap().len(), 0);
}

#[test]
fn test_opaque_ownership() {
    let Fixture {
        bridge,
        widget,
        destroyed,
        ..
    } = fixture(BridgeConfig::new());

    // A factory result is not adopted: the native side keeps it.
    let created = bridge.call_static(Origin::nil(), &widget, "create", &[]).unwrap();

    let created = created.as_instance().unwrap().clone();

    assert!(!created.is_owned());
    assert_eq!(created.class().name(), "Widget");

    drop(created);

    assert_eq!(destroyed.get(), 0);
    assert_eq!(bridge.heap().len(), 1);

    // Adopted objects are destroyed with their last handle.
    let adopted = bridge.call_static(Origin::nil(), &widget, "create", &[]).unwrap();

    let adopted = adopted.as_instance().unwrap().clone();

    bridge.pass_ownership_to_bridge(&adopted);

    drop(adopted);

    assert_eq!(destroyed.get(), 1);
    assert_eq!(bridge.heap().len(), 1);

    // Constructed objects handed over to the native side survive.
    let handed = bridge
        .construct(Origin::nil(), &widget, &[ScriptValue::Int(2)])
        .unwrap();

    bridge.pass_ownership_to_native(&handed);

    drop(handed);

    assert_eq!(destroyed.get(), 1);
    assert_eq!(bridge.heap().len(), 2);
}

#[test]
fn test_destroyed_instance_access() {
    let Fixture {
        bridge,
        widget,
        destroyed,
        ..
    } = fixture(BridgeConfig::new());

    let instance = bridge
        .construct(Origin::nil(), &widget, &[ScriptValue::Int(1)])
        .unwrap();

    bridge.destroy(&instance);

    assert_eq!(destroyed.get(), 1);
    assert_eq!(instance.state(), WrapperState::Released);
    assert!(!instance.is_alive());

    match bridge.call_method(Origin::nil(), &instance, "width", &[]) {
        Err(RuntimeError::OwnershipViolation { class, member, .. }) => {
            assert_eq!(class, "Widget");
            assert_eq!(member.unwrap().as_str(), "width");
        }

        other => panic!("unexpected result {other:?}"),
    }

    drop(instance);

    assert_eq!(destroyed.get(), 1);
}

#[test]
fn test_return_by_value() {
    let Fixture {
        bridge,
        widget,
        destroyed,
        ..
    } = fixture(BridgeConfig::new());

    let original = bridge
        .construct(Origin::nil(), &widget, &[ScriptValue::Int(9)])
        .unwrap();

    let copy = bridge.call_method(Origin::nil(), &original, "copy", &[]).unwrap();

    let copy = copy.as_instance().unwrap().clone();

    assert!(!copy.ptr_eq(&original));
    assert!(copy.is_owned());
    assert_eq!(width(&bridge, &ScriptValue::Instance(copy.clone())), ScriptValue::Int(9));

    drop(copy);
    drop(original);

    assert_eq!(destroyed.get(), 2);
    assert_eq!(bridge.heap().len(), 0);
}

#[test]
fn test_storage_symmetry() {
    let Fixture { bridge, widget, .. } = fixture(BridgeConfig::new());

    let instance = bridge
        .construct(Origin::nil(), &widget, &[ScriptValue::Int(21)])
        .unwrap();

    assert_eq!(bridge.storage_depth(), 0);

    // The native side re-enters the bridge while its own call is active.
    assert_eq!(
        bridge.call_method(Origin::nil(), &instance, "twice", &[]).unwrap(),
        ScriptValue::Int(42),
    );

    assert_eq!(bridge.storage_depth(), 0);
    assert!(bridge.storage_peak() >= 3);

    match bridge.call_method(Origin::nil(), &instance, "resize", &[ScriptValue::from("wide")]) {
        Err(RuntimeError::ArgumentConversion { index, .. }) => assert_eq!(index, 0),
        other => panic!("unexpected result {other:?}"),
    }

    assert_eq!(bridge.storage_depth(), 0);

    match bridge.call_method(Origin::nil(), &instance, "fail", &[]) {
        Err(RuntimeError::NativeFailure { cause, .. }) => {
            assert_eq!(cause.message(), "widget failure")
        }

        other => panic!("unexpected result {other:?}"),
    }

    assert_eq!(bridge.storage_depth(), 0);

    bridge
        .call_method(Origin::nil(), &instance, "resize", &[ScriptValue::Int(8)])
        .unwrap();

    assert_eq!(width(&bridge, &ScriptValue::Instance(instance)), ScriptValue::Int(8));
}

#[test]
fn test_argument_limit() {
    let mut config = BridgeConfig::new();

    config.max_arguments = 3;

    let Fixture { bridge, widget, .. } = fixture(config);

    let instance = bridge
        .construct(Origin::nil(), &widget, &[ScriptValue::Int(1)])
        .unwrap();

    let arguments = [ScriptValue::Int(1), ScriptValue::Int(2), ScriptValue::Int(3)];

    match bridge.call_method(Origin::nil(), &instance, "resize", &arguments) {
        Err(RuntimeError::TooManyArguments { limit, actual, .. }) => {
            assert_eq!((limit, actual), (2, 3));
        }

        other => panic!("unexpected result {other:?}"),
    }

    assert_eq!(bridge.storage_depth(), 0);
}

#[test]
fn test_keyword_suffix() {
    let Fixture { bridge, widget, .. } = fixture(BridgeConfig::new());

    let instance = bridge.construct(Origin::nil(), &widget, &[]).unwrap();

    assert_eq!(
        bridge.call_method(Origin::nil(), &instance, "type_", &[]).unwrap(),
        ScriptValue::from("widget"),
    );

    let mut config = BridgeConfig::new();

    config.strip_keyword_suffix = false;

    let Fixture { bridge, widget, .. } = fixture(config);

    let instance = bridge.construct(Origin::nil(), &widget, &[]).unwrap();

    assert!(matches!(
        bridge.call_method(Origin::nil(), &instance, "type_", &[]),
        Err(RuntimeError::UnknownMember { .. }),
    ));
}

#[test]
fn test_member_cache_stability() {
    let Fixture {
        bridge,
        widget,
        source,
        ..
    } = fixture(BridgeConfig::new());

    let first = bridge.resolve_member(&widget, "width");
    let cached = widget.cached_members();

    let second = bridge.resolve_member(&widget, "width");

    assert_eq!(first, second);
    assert_eq!(widget.cached_members(), cached);

    assert!(bridge.resolve_member(&widget, "missing").is_not_found());
    assert!(bridge.resolve_member(&widget, "missing").is_not_found());

    let help = bridge.help(&widget);

    // Repeated registrations change nothing.
    let _ = bridge.register_type("Widget", None, 0, Some(source.clone()));
    let _ = bridge.register_provider("Widget", source);

    assert_eq!(bridge.resolve_member(&widget, "width"), first);
    assert_eq!(bridge.help(&widget), help);

    bridge.clear_member_cache(&widget);

    assert_eq!(widget.cached_members(), 0);
}

#[test]
fn test_managed_properties() {
    let bridge = label_bridge();

    let disposed = Rc::new(Cell::new(false));
    let object = new_label("caption", &disposed);

    let label = bridge.wrap(NativeIdentity::from(ManagedRef::from(object.clone())), "Object");

    assert_eq!(label.class().name(), "Label");

    let receiver = Receiver::Instance(label.clone());

    assert_eq!(
        bridge.get_attr(Origin::nil(), &receiver, "text").unwrap(),
        ScriptValue::from("caption"),
    );

    bridge
        .set_attr(Origin::nil(), &label, "text", &ScriptValue::Int(12345))
        .unwrap();

    assert_eq!(
        bridge.get_attr(Origin::nil(), &receiver, "length").unwrap(),
        ScriptValue::Int(5),
    );

    assert!(matches!(
        bridge.set_attr(Origin::nil(), &label, "length", &ScriptValue::Int(1)),
        Err(RuntimeError::ReadOnlyProperty { .. }),
    ));

    match bridge.get_attr(Origin::nil(), &receiver, "texts") {
        Err(RuntimeError::UnknownMember { suggestions, .. }) => {
            assert!(suggestions.iter().any(|name| name.as_str() == "text"));
        }

        other => panic!("unexpected result {other:?}"),
    }

    let clear = bridge.get_attr(Origin::nil(), &receiver, "clear").unwrap();

    let ScriptValue::Method(clear) = clear else {
        panic!("bound method expected");
    };

    bridge.call_bound(&clear, Origin::nil(), &[]).unwrap();

    assert_eq!(
        bridge.get_attr(Origin::nil(), &receiver, "text").unwrap(),
        ScriptValue::from(""),
    );
}

#[test]
fn test_managed_ownership() {
    let bridge = label_bridge();

    let disposed = Rc::new(Cell::new(false));
    let object = new_label("a", &disposed);

    // Not adopted: the native side keeps the object.
    let label = bridge.wrap(NativeIdentity::from(ManagedRef::from(object.clone())), "Label");

    drop(label);

    assert!(!disposed.get());

    // Adopted: the bridge keeps the object alive and disposes it.
    let label = bridge.wrap(NativeIdentity::from(ManagedRef::from(object.clone())), "Label");

    bridge.pass_ownership_to_bridge(&label);

    drop(object);

    assert!(label.is_alive());

    drop(label);

    assert!(disposed.get());

    // Objects with a native parent are never disposed by the bridge.
    let disposed = Rc::new(Cell::new(false));
    let object = new_label("b", &disposed);

    let label = bridge.wrap(NativeIdentity::from(ManagedRef::from(object.clone())), "Label");

    bridge.pass_ownership_to_bridge(&label);

    if let Some(label) = object.as_any().downcast_ref::<Label>() {
        label.parent.set(true);
    }

    drop(label);

    assert!(!disposed.get());
}

#[test]
fn test_managed_object_gone() {
    let bridge = label_bridge();

    let disposed = Rc::new(Cell::new(false));
    let object = new_label("c", &disposed);

    let label = bridge.wrap(NativeIdentity::from(ManagedRef::from(object.clone())), "Label");

    drop(object);

    assert!(!label.is_alive());

    assert!(matches!(
        bridge.call_method(Origin::nil(), &label, "clear", &[]),
        Err(RuntimeError::OwnershipViolation { .. }),
    ));
}

enum ShapeData {
    Circle,
    Square,
}

#[test]
fn test_downcast_on_wrap() {
    let bridge = Bridge::new(BridgeConfig::new());

    let _ = bridge.register_type("Shape", None, 0, None);
    let circle = bridge.register_type("Circle", Some("Shape"), 0, None);

    bridge.register_downcast_probe(
        "Shape",
        |heap: &NativeHeap, object: &NativeIdentity| -> Option<Downcast> {
            let pointer = object.as_opaque()?;

            let is_circle = heap.with(pointer, |shape: &ShapeData| {
                matches!(shape, ShapeData::Circle)
            })?;

            match is_circle {
                true => Some(Downcast {
                    class_name: "Circle".into(),
                    identity: object.clone(),
                }),

                false => None,
            }
        },
    );

    let round = bridge.heap().alloc_value(None, ShapeData::Circle);
    let square = bridge.heap().alloc_value(None, ShapeData::Square);

    let round = bridge.wrap(round.into(), "Shape");
    let square = bridge.wrap(square.into(), "Shape");

    assert_eq!(round.class().name(), "Circle");
    assert_eq!(square.class().name(), "Shape");

    assert!(bridge.inherits(&circle, "Shape"));
}

#[test]
fn test_signal_connections() {
    let bridge = label_bridge();

    let disposed = Rc::new(Cell::new(false));
    let object = new_label("", &disposed);

    let label = bridge.wrap(NativeIdentity::from(ManagedRef::from(object.clone())), "Label");

    let received = Rc::new(RefCell::new(Vec::new()));

    {
        let received = received.clone();

        // The receiver reads the sender's property back through the bridge.
        let _ = bridge
            .connect(
                Origin::nil(),
                &label,
                "edited",
                move |bridge: &Bridge, arguments: &[ScriptValue]| {
                    let ScriptValue::Instance(sender) = &arguments[1] else {
                        return Ok(ScriptValue::None);
                    };

                    let text = bridge.get_attr(Origin::nil(), &Receiver::Instance(sender.clone()), "text")?;

                    received
                        .borrow_mut()
                        .push((arguments[0].clone(), text, sender.clone()));

                    Ok(ScriptValue::None)
                },
            )
            .unwrap();
    }

    assert!(matches!(
        bridge.connect(
            Origin::nil(),
            &label,
            "clear",
            |_: &Bridge, _: &[ScriptValue]| Ok(ScriptValue::None),
        ),
        Err(RuntimeError::NotASignal { .. }),
    ));

    bridge
        .call_method(
            Origin::nil(),
            &label,
            "edited",
            &[ScriptValue::from("fresh"), ScriptValue::Instance(label.clone())],
        )
        .unwrap();

    {
        let received = received.borrow();

        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, ScriptValue::from("fresh"));
        assert_eq!(received[0].1, ScriptValue::from("fresh"));
        assert!(received[0].2.ptr_eq(&label));
    }

    assert_eq!(bridge.storage_depth(), 0);
    assert_eq!(bridge.connection_count(), 1);

    received.borrow_mut().clear();

    // Destroying the sender drops its connections.
    bridge.destroy(&label);

    assert!(disposed.get());
    assert_eq!(bridge.connection_count(), 0);
}
