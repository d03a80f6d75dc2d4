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
    fmt::{Debug, Formatter},
    rc::Rc,
};

use compact_str::CompactString;
use log::{debug, trace};

use crate::{
    bridge::Bridge,
    convert::ConversionMode,
    dispatch::frame::{NativeCall, StorageScope, MAX_ARGS},
    reflect::{
        upcast::{apply_offset, upcast_offset},
        CallKind,
        ClassInfo,
        MemberInfo,
        PropertyInfo,
        SlotInfo,
        SlotKind,
    },
    runtime::{
        Ident,
        NativeIdentity,
        NativeValue,
        Origin,
        RuntimeError,
        RuntimeResult,
        ScriptValue,
        StorageRef,
    },
    wrapper::{DestroyStrategy, Instance},
};

/// The object a member is called on.
#[derive(Clone, Debug)]
pub enum Receiver {
    /// A wrapped native object.
    Instance(Instance),

    /// A native class. Class-level functions and constructors are called on
    /// the class. Instance methods called on the class expect the instance
    /// as the first argument.
    Class(Rc<ClassInfo>),
}

impl Receiver {
    /// The class of the receiver.
    #[inline(always)]
    pub fn class(&self) -> &Rc<ClassInfo> {
        match self {
            Self::Instance(instance) => instance.class(),
            Self::Class(class) => class,
        }
    }
}

/// A member's overload chain bound to the object it was accessed on.
///
/// The bridge returns bound methods from attribute reads of callable members.
#[derive(Clone)]
pub struct BoundMethod {
    receiver: Option<Instance>,
    class: Rc<ClassInfo>,
    slot: Rc<SlotInfo>,
}

impl Debug for BoundMethod {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("BoundMethod")
            .field("receiver", &self.receiver)
            .field("slot", &self.slot.signature())
            .finish()
    }
}

impl PartialEq for BoundMethod {
    fn eq(&self, other: &Self) -> bool {
        let same_receiver = match (&self.receiver, &other.receiver) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            (None, None) => Rc::ptr_eq(&self.class, &other.class),
            _ => false,
        };

        same_receiver && Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl BoundMethod {
    /// The instance the method was accessed on. None if the method was
    /// accessed on the class.
    #[inline(always)]
    pub fn receiver(&self) -> Option<&Instance> {
        self.receiver.as_ref()
    }

    /// The class the method was accessed on.
    #[inline(always)]
    pub fn class(&self) -> &Rc<ClassInfo> {
        &self.class
    }

    /// The head of the method's overload chain.
    #[inline(always)]
    pub fn slot(&self) -> &Rc<SlotInfo> {
        &self.slot
    }
}

// The result of a native call before its conversion to a scripting value.
struct Outcome {
    slot: Rc<SlotInfo>,
    value: Option<NativeValue>,
    place: Option<Instance>,
}

enum CallFailure {
    Argument(usize, RuntimeError),
    Call(RuntimeError),
}

impl Bridge {
    /// Calls the overload chain with the scripting arguments, and returns the
    /// result converted to a scripting value.
    ///
    /// A chain of a single overload is called directly: the number of
    /// arguments must match, and the arguments are converted permissively.
    ///
    /// For longer chains, the resolver tries every overload of matching arity
    /// in the chain order with the strict conversions first, and then again
    /// with the permissive conversions. The first overload whose arguments
    /// convert is called.
    pub fn invoke(
        &self,
        origin: Origin,
        receiver: Receiver,
        slot: &Rc<SlotInfo>,
        arguments: &[ScriptValue],
    ) -> RuntimeResult<ScriptValue> {
        let outcome = self.dispatch(origin, &receiver, slot, arguments)?;

        self.finish(origin, outcome)
    }

    /// Resolves the member of the instance's class and calls it on the
    /// instance.
    pub fn call_method(
        &self,
        origin: Origin,
        instance: &Instance,
        name: &str,
        arguments: &[ScriptValue],
    ) -> RuntimeResult<ScriptValue> {
        let slot = self.callable(origin, instance.class(), name)?;

        self.invoke(origin, Receiver::Instance(instance.clone()), &slot, arguments)
    }

    /// Resolves the member of the class and calls it on the class.
    pub fn call_static(
        &self,
        origin: Origin,
        class: &Rc<ClassInfo>,
        name: &str,
        arguments: &[ScriptValue],
    ) -> RuntimeResult<ScriptValue> {
        let slot = self.callable(origin, class, name)?;

        self.invoke(origin, Receiver::Class(class.clone()), &slot, arguments)
    }

    /// Calls a bound method.
    pub fn call_bound(
        &self,
        method: &BoundMethod,
        origin: Origin,
        arguments: &[ScriptValue],
    ) -> RuntimeResult<ScriptValue> {
        let receiver = match &method.receiver {
            Some(instance) => Receiver::Instance(instance.clone()),
            None => Receiver::Class(method.class.clone()),
        };

        self.invoke(origin, receiver, &method.slot, arguments)
    }

    /// Instantiates the native class through its constructors.
    ///
    /// The bridge owns the new object: the object is destroyed when the last
    /// handle of the returned instance is dropped, unless the ownership is
    /// passed to the native side.
    pub fn construct(
        &self,
        origin: Origin,
        class: &Rc<ClassInfo>,
        arguments: &[ScriptValue],
    ) -> RuntimeResult<Instance> {
        let Some(constructors) = self.lookup().constructors(class) else {
            return Err(RuntimeError::NoConstructor {
                access_origin: origin,
                class: CompactString::from(class.name()),
            });
        };

        self.construct_with(origin, class, &constructors, arguments)
    }

    /// Reads the member of the receiver.
    ///
    /// Properties are read through the native entry point. Callable members
    /// are returned as [bound methods](ScriptValue::Method). Enum members are
    /// returned as enum values and enum types.
    pub fn get_attr(&self, origin: Origin, receiver: &Receiver, name: &str) -> RuntimeResult<ScriptValue> {
        let class = receiver.class();

        match self.resolve_member(class, name) {
            MemberInfo::NotFound => Err(self.unknown_member(origin, class, name)),

            MemberInfo::Slot(slot) => Ok(ScriptValue::Method(BoundMethod {
                receiver: match receiver {
                    Receiver::Instance(instance) => Some(instance.clone()),
                    Receiver::Class(_) => None,
                },
                class: class.clone(),
                slot,
            })),

            MemberInfo::Property(property) => match receiver {
                Receiver::Instance(instance) => self.read_property(origin, instance, &property),

                Receiver::Class(_) => Err(RuntimeError::TypeMismatch {
                    access_origin: origin,
                    expected: CompactString::from(class.name()),
                    provided: "class",
                }),
            },

            MemberInfo::EnumValue(value) => Ok(ScriptValue::Enum(value)),

            MemberInfo::EnumWrapper(enum_type) => Ok(ScriptValue::EnumType(enum_type)),
        }
    }

    /// Writes the property of the instance.
    ///
    /// The value is converted permissively to the property's type.
    pub fn set_attr(
        &self,
        origin: Origin,
        instance: &Instance,
        name: &str,
        value: &ScriptValue,
    ) -> RuntimeResult<()> {
        let class = instance.class();

        let property = match self.resolve_member(class, name) {
            MemberInfo::NotFound => return Err(self.unknown_member(origin, class, name)),
            MemberInfo::Property(property) if property.is_writable() => property,

            _ => {
                return Err(RuntimeError::ReadOnlyProperty {
                    access_origin: origin,
                    class: CompactString::from(class.name()),
                    property: Ident::from(name),
                })
            }
        };

        let identity = self.receiver_identity(origin, instance, name)?;

        let value = self.to_native(origin, value, property.param(), ConversionMode::Permissive)?;

        let scope = StorageScope::open(self);

        let slots = [None, Some(scope.alloc(value))];

        let mut call = NativeCall::new(self, CallKind::WriteProperty, property.index(), Some(identity), &slots);

        property
            .entry()
            .meta_call(&mut call)
            .map_err(|cause| RuntimeError::NativeFailure {
                access_origin: origin,
                member: Ident::from(name),
                cause,
            })
    }

    // Calls the destructor overload on the object.
    pub(crate) fn call_destructor(&self, slot: &Rc<SlotInfo>, identity: NativeIdentity) -> RuntimeResult<()> {
        let scope = StorageScope::open(self);

        let slots = [None, Some(scope.alloc(NativeValue::Pointer(Some(identity))))];

        let mut call = NativeCall::new(self, CallKind::Invoke, slot.index(), None, &slots);

        slot.entry()
            .meta_call(&mut call)
            .map_err(|cause| RuntimeError::NativeFailure {
                access_origin: Origin::nil(),
                member: slot.name().clone(),
                cause,
            })
    }

    fn construct_with(
        &self,
        origin: Origin,
        class: &Rc<ClassInfo>,
        constructors: &Rc<SlotInfo>,
        arguments: &[ScriptValue],
    ) -> RuntimeResult<Instance> {
        let instance = Instance::unbound(class.clone(), self);

        let outcome = self.dispatch(origin, &Receiver::Class(class.clone()), constructors, arguments)?;

        let Some(NativeValue::Pointer(Some(identity))) = outcome.value else {
            return Err(RuntimeError::ConversionGap {
                access_origin: origin,
                type_name: CompactString::from(class.name()),
            });
        };

        let track_generations = self.0.config.track_opaque_generations;

        // The constructor may hand out an object the scripting side already
        // holds.
        if let Some(existing) = self.0.wrappers.find_live(&identity, track_generations) {
            return Ok(existing);
        }

        instance.bind(identity.clone(), true, DestroyStrategy::Destructor);

        self.0.wrappers.insert(identity.key(), &instance);

        trace!("'{}' object constructed", class.name());

        Ok(instance)
    }

    fn read_property(
        &self,
        origin: Origin,
        instance: &Instance,
        property: &PropertyInfo,
    ) -> RuntimeResult<ScriptValue> {
        let identity = self.receiver_identity(origin, instance, property.name())?;

        let Some(initial) = self.initial_value(property.param()) else {
            return Err(RuntimeError::ConversionGap {
                access_origin: origin,
                type_name: CompactString::from(property.param().name()),
            });
        };

        let value = {
            let scope = StorageScope::open(self);

            let result = scope.alloc(initial);

            let slots = [Some(result)];

            let mut call = NativeCall::new(self, CallKind::ReadProperty, property.index(), Some(identity), &slots);

            property
                .entry()
                .meta_call(&mut call)
                .map_err(|cause| RuntimeError::NativeFailure {
                    access_origin: origin,
                    member: Ident::from(property.name()),
                    cause,
                })?;

            scope.take(result)
        };

        self.to_script(origin, value, property.param())
    }

    fn dispatch(
        &self,
        origin: Origin,
        receiver: &Receiver,
        head: &Rc<SlotInfo>,
        arguments: &[ScriptValue],
    ) -> RuntimeResult<Outcome> {
        let limit = self.argument_limit();

        if head.is_single() {
            let (this, arguments) = self.bind_receiver(origin, receiver, head, arguments)?;

            if arguments.len() > limit {
                return Err(RuntimeError::TooManyArguments {
                    access_origin: origin,
                    limit,
                    actual: arguments.len(),
                });
            }

            if arguments.len() != head.arity() {
                return Err(RuntimeError::ArityMismatch {
                    access_origin: origin,
                    signature: head.signature(),
                    expected: head.arity(),
                    actual: arguments.len(),
                });
            }

            return self
                .call_node(origin, head, this.as_ref(), arguments, ConversionMode::Permissive)
                .map_err(|failure| match failure {
                    CallFailure::Argument(_, cause @ RuntimeError::OwnershipViolation { .. }) => cause,

                    CallFailure::Argument(index, cause) => {
                        RuntimeError::ArgumentConversion {
                            access_origin: origin,
                            signature: head.signature(),
                            index,
                            cause: Box::new(cause),
                        }
                    }

                    CallFailure::Call(error) => error,
                });
        }

        // The overloads of one chain may differ in how they take the
        // receiver, so every node binds it on its own.
        let mut excess = None;

        for mode in [ConversionMode::Strict, ConversionMode::Permissive] {
            if !mode.is_strict() {
                debug!(
                    "no strict overload of '{}' matches, trying permissive conversions",
                    head.name(),
                );
            }

            for node in head.overloads() {
                let (this, bound) = match self.bind_receiver(origin, receiver, node, arguments) {
                    Ok(binding) => binding,
                    Err(RuntimeError::ArityMismatch { .. }) => continue,
                    Err(error) if error.is_conversion_failure() => continue,
                    Err(error) => return Err(error),
                };

                if bound.len() > limit {
                    excess = Some(bound.len());
                    continue;
                }

                if node.arity() != bound.len() {
                    continue;
                }

                match self.call_node(origin, node, this.as_ref(), bound, mode) {
                    Ok(outcome) => return Ok(outcome),
                    Err(CallFailure::Argument(_, cause)) if cause.is_conversion_failure() => continue,
                    Err(CallFailure::Argument(_, cause)) => return Err(cause),
                    Err(CallFailure::Call(error)) => return Err(error),
                }
            }
        }

        if let Some(actual) = excess {
            return Err(RuntimeError::TooManyArguments {
                access_origin: origin,
                limit,
                actual,
            });
        }

        Err(RuntimeError::NoMatchingOverload {
            access_origin: origin,
            member: head.name().clone(),
            candidates: head.overloads().map(|node| node.signature()).collect(),
        })
    }

    // Returns the receiver's identity, and the arguments without the
    // receiver for the calls of instance methods on classes.
    fn bind_receiver<'a>(
        &self,
        origin: Origin,
        receiver: &Receiver,
        node: &SlotInfo,
        arguments: &'a [ScriptValue],
    ) -> RuntimeResult<(Option<NativeIdentity>, &'a [ScriptValue])> {
        if !node.kind().needs_instance() {
            return Ok((None, arguments));
        }

        match receiver {
            Receiver::Instance(instance) => {
                let identity = self.receiver_identity(origin, instance, node.name().as_str())?;

                Ok((Some(identity), arguments))
            }

            Receiver::Class(class) => {
                let Some((first, rest)) = arguments.split_first() else {
                    return Err(RuntimeError::ArityMismatch {
                        access_origin: origin,
                        signature: node.signature(),
                        expected: node.arity() + 1,
                        actual: 0,
                    });
                };

                let offset = first
                    .as_instance()
                    .and_then(|instance| {
                        upcast_offset(&self.0.classes, instance.class(), class.name())
                            .map(|offset| (instance, offset))
                    });

                let Some((instance, offset)) = offset else {
                    return Err(RuntimeError::TypeMismatch {
                        access_origin: origin,
                        expected: CompactString::from(class.name()),
                        provided: first.type_name(),
                    });
                };

                let identity = self.receiver_identity(origin, instance, node.name().as_str())?;

                Ok((Some(apply_offset(&identity, offset)), rest))
            }
        }
    }

    fn call_node(
        &self,
        origin: Origin,
        node: &Rc<SlotInfo>,
        this: Option<&NativeIdentity>,
        arguments: &[ScriptValue],
        mode: ConversionMode,
    ) -> Result<Outcome, CallFailure> {
        let this = this.map(|identity| apply_offset(identity, node.upcast_offset()));

        let scope = StorageScope::open(self);

        let mut slots = Vec::<Option<StorageRef>>::with_capacity(arguments.len() + 2);

        slots.push(None);

        if node.kind().passes_instance_as_argument() {
            if slots.len() + arguments.len() >= self.slot_capacity() {
                return Err(CallFailure::Call(RuntimeError::TooManyArguments {
                    access_origin: origin,
                    limit: self.slot_capacity() - 2,
                    actual: arguments.len(),
                }));
            }

            slots.push(Some(scope.alloc(NativeValue::Pointer(this.clone()))));
        }

        for (index, (argument, param)) in arguments.iter().zip(node.arguments()).enumerate() {
            let value = self
                .to_native(origin, argument, param, mode)
                .map_err(|error| CallFailure::Argument(index, error))?;

            slots.push(Some(scope.alloc(value)));
        }

        let (initial, place) = self.return_slot(origin, node).map_err(CallFailure::Call)?;

        slots[0] = initial.map(|value| scope.alloc(value));

        let receiver = match node.kind() {
            SlotKind::Member | SlotKind::Signal => this,
            _ => None,
        };

        trace!("calling {}", node.signature());

        let mut call = NativeCall::new(self, CallKind::Invoke, node.index(), receiver, &slots);

        node.entry()
            .meta_call(&mut call)
            .map_err(|cause| {
                CallFailure::Call(RuntimeError::NativeFailure {
                    access_origin: origin,
                    member: node.name().clone(),
                    cause,
                })
            })?;

        let value = slots[0].map(|reference| scope.take(reference));

        Ok(Outcome {
            slot: node.clone(),
            value,
            place,
        })
    }

    // Prepares the initial content of the return slot. A by-value result of
    // a class without a registered kind is constructed in advance, and the
    // native side writes into that object.
    fn return_slot(
        &self,
        origin: Origin,
        node: &SlotInfo,
    ) -> RuntimeResult<(Option<NativeValue>, Option<Instance>)> {
        let result = node.result();

        if result.is_void() {
            return Ok((None, None));
        }

        if let Some(initial) = self.initial_value(result) {
            return Ok((Some(initial), None));
        }

        if let Some(class) = self.0.classes.find(result.name()) {
            if let Some(constructor) = self.lookup().default_constructor(&class) {
                let place = self.construct_with(origin, &class, &constructor, &[])?;

                if let Some(NativeIdentity::Opaque(pointer)) = place.identity() {
                    return Ok((Some(NativeValue::Place(pointer)), Some(place)));
                }
            }
        }

        Err(RuntimeError::ConversionGap {
            access_origin: origin,
            type_name: CompactString::from(result.name()),
        })
    }

    fn finish(&self, origin: Origin, outcome: Outcome) -> RuntimeResult<ScriptValue> {
        let Outcome { slot, value, place } = outcome;

        if let Some(place) = place {
            if matches!(value, None | Some(NativeValue::Place(_)) | Some(NativeValue::Void)) {
                return Ok(ScriptValue::Instance(place));
            }
        }

        match value {
            Some(value) => self.to_script(origin, value, slot.result()),
            None => Ok(ScriptValue::None),
        }
    }

    fn callable(&self, origin: Origin, class: &Rc<ClassInfo>, name: &str) -> RuntimeResult<Rc<SlotInfo>> {
        match self.resolve_member(class, name) {
            MemberInfo::Slot(slot) => Ok(slot),
            MemberInfo::NotFound => Err(self.unknown_member(origin, class, name)),

            _ => Err(RuntimeError::NotCallable {
                access_origin: origin,
                class: CompactString::from(class.name()),
                member: Ident::from(name),
            }),
        }
    }

    pub(super) fn receiver_identity(&self, origin: Origin, instance: &Instance, member: &str) -> RuntimeResult<NativeIdentity> {
        instance
            .identity()
            .ok_or_else(|| RuntimeError::OwnershipViolation {
                access_origin: origin,
                class: CompactString::from(instance.class().name()),
                member: Some(Ident::from(member)),
            })
    }

    pub(super) fn unknown_member(&self, origin: Origin, class: &ClassInfo, name: &str) -> RuntimeError {
        let member = Ident::from(name);

        let names = self.member_names(class);

        let suggestions = member.suggest(names.iter().map(|name| name.as_str()));

        RuntimeError::UnknownMember {
            access_origin: origin,
            class: CompactString::from(class.name()),
            member,
            suggestions,
        }
    }

    // The number of slots a native call may use, the return slot included.
    #[inline(always)]
    fn slot_capacity(&self) -> usize {
        self.0.config.max_arguments.clamp(2, MAX_ARGS)
    }

    #[inline(always)]
    fn argument_limit(&self) -> usize {
        self.slot_capacity() - 1
    }
}

#[cfg(test)]
mod tests {
    use std::{any::Any, cell::Cell, rc::Rc};

    use crate::{
        dispatch::{NativeCall, Receiver},
        reflect::{ExtensionMethod, ExtensionProvider, MethodMeta, ReflectiveDescriptor},
        runtime::{ManagedObject, ManagedRef, NativeError, NativeValue, Origin, RuntimeError, ScriptValue},
        Bridge,
        BridgeConfig,
    };

    struct Label;

    impl ManagedObject for Label {
        fn class_name(&self) -> &str {
            "Label"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn label_bridge(calls: Rc<Cell<u32>>) -> Bridge {
        let bridge = Bridge::new(BridgeConfig::new());

        let entry = move |call: &mut NativeCall<'_>| {
            calls.set(calls.get() + 1);

            match call.index() {
                0 => {
                    let value = call.take(1);
                    call.set_return(NativeValue::Text(format!("i32:{}", value.as_i64().unwrap_or(-1))))
                }

                1 => {
                    let value = call.take(1);
                    call.set_return(NativeValue::Text(format!("str:{}", value.as_str().unwrap_or(""))))
                }

                2 => Err(NativeError::new("broken")),

                _ => Ok(()),
            }
        };

        let descriptor = ReflectiveDescriptor::new("Label", entry)
            .method(MethodMeta::new(0, "show").param("i32").returns("String"))
            .method(MethodMeta::new(1, "show").param("String").returns("String"))
            .method(MethodMeta::new(2, "fail").param("i32"));

        bridge.register_descriptor(Rc::new(descriptor));

        bridge
    }

    #[test]
    fn test_overload_passes() {
        let bridge = label_bridge(Rc::new(Cell::new(0)));

        let object = ManagedRef::new(Label);
        let label = bridge.wrap(object.clone().into(), "Label");

        let show = |argument: ScriptValue| {
            bridge.call_method(Origin::nil(), &label, "show", &[argument])
        };

        assert_eq!(show(ScriptValue::Int(5)).unwrap(), ScriptValue::from("i32:5"));
        assert_eq!(show(ScriptValue::from("x")).unwrap(), ScriptValue::from("str:x"));

        // No strict match: the float is truncated by the first permissive
        // overload.
        assert_eq!(show(ScriptValue::Float(2.5)).unwrap(), ScriptValue::from("i32:2"));

        match show(ScriptValue::List(Vec::new())) {
            Err(RuntimeError::NoMatchingOverload { candidates, .. }) => {
                assert_eq!(candidates.len(), 2);
            }

            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_single_overload_errors() {
        let calls = Rc::new(Cell::new(0));
        let bridge = label_bridge(calls.clone());

        let object = ManagedRef::new(Label);
        let label = bridge.wrap(object.clone().into(), "Label");

        match bridge.call_method(Origin::nil(), &label, "fail", &[]) {
            Err(RuntimeError::ArityMismatch { expected, actual, .. }) => {
                assert_eq!((expected, actual), (1, 0));
            }

            other => panic!("unexpected result {other:?}"),
        }

        match bridge.call_method(Origin::nil(), &label, "fail", &[ScriptValue::from("x")]) {
            Err(RuntimeError::ArgumentConversion { index, .. }) => assert_eq!(index, 0),
            other => panic!("unexpected result {other:?}"),
        }

        assert_eq!(calls.get(), 0);

        match bridge.call_method(Origin::nil(), &label, "fail", &[ScriptValue::Int(1)]) {
            Err(RuntimeError::NativeFailure { cause, .. }) => assert_eq!(cause.message(), "broken"),
            other => panic!("unexpected result {other:?}"),
        }

        assert_eq!(calls.get(), 1);
        assert_eq!(bridge.storage_depth(), 0);
    }

    #[test]
    fn test_unbound_extension_call() {
        let bridge = Bridge::new(BridgeConfig::new());

        let provider = ExtensionProvider::new("CounterExt", |call: &mut NativeCall<'_>| {
            let is_bound = call.pointer(1).is_some();
            call.set_return(NativeValue::Bool(is_bound))
        })
        .method(ExtensionMethod::instance(0, "isBound").returns("bool"));

        let counter = bridge.register_type("Counter", None, 0, Some(provider.into()));

        let pointer = bridge.heap().alloc_value(None, 0u32);
        let instance = bridge.wrap(pointer.into(), "Counter");

        let result = bridge
            .call_static(Origin::nil(), &counter, "isBound", &[ScriptValue::Instance(instance.clone())])
            .unwrap();

        assert_eq!(result, ScriptValue::Bool(true));

        match bridge.call_static(Origin::nil(), &counter, "isBound", &[ScriptValue::Int(1)]) {
            Err(RuntimeError::TypeMismatch { .. }) => (),
            other => panic!("unexpected result {other:?}"),
        }

        let method = bridge
            .get_attr(Origin::nil(), &Receiver::Instance(instance), "isBound")
            .unwrap();

        let ScriptValue::Method(method) = method else {
            panic!("unexpected member {method:?}");
        };

        assert_eq!(
            bridge.call_bound(&method, Origin::nil(), &[]).unwrap(),
            ScriptValue::Bool(true),
        );

        let _ = counter;
    }
}
