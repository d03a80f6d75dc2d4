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
    cell::{Cell, RefCell},
    fmt::{Debug, Display, Formatter},
    rc::Rc,
};

use ahash::AHashMap;
use compact_str::CompactString;
use log::{debug, error, trace};

use crate::{
    bridge::Bridge,
    dispatch::frame::StorageScope,
    reflect::{MemberInfo, SlotInfo, SlotKind},
    runtime::{IdentityKey, Ident, NativeIdentity, NativeValue, Origin, RuntimeError, RuntimeResult, ScriptValue},
    wrapper::Instance,
};

/// A scripting-side function that receives signal emissions.
///
/// The bridge calls the function with the emitted arguments converted to
/// scripting values. Any closure of the matching signature is a callable.
pub trait ScriptCallable {
    /// Handles one emission. The returned value is discarded.
    fn call(&self, bridge: &Bridge, arguments: &[ScriptValue]) -> RuntimeResult<ScriptValue>;
}

impl<F> ScriptCallable for F
where
    F: Fn(&Bridge, &[ScriptValue]) -> RuntimeResult<ScriptValue>,
{
    #[inline(always)]
    fn call(&self, bridge: &Bridge, arguments: &[ScriptValue]) -> RuntimeResult<ScriptValue> {
        self(bridge, arguments)
    }
}

/// A handle of one connection between a signal and a scripting callable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ConnectionId(u64);

impl Display for ConnectionId {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("#{}", self.0))
    }
}

struct Connection {
    id: ConnectionId,
    signal: Rc<SlotInfo>,
    callable: Rc<dyn ScriptCallable>,
}

// Connections grouped by the sender object.
#[derive(Default)]
pub(crate) struct SignalRegistry {
    next: Cell<u64>,
    map: RefCell<AHashMap<IdentityKey, Vec<Connection>>>,
}

impl SignalRegistry {
    fn connect(&self, key: IdentityKey, signal: Rc<SlotInfo>, callable: Rc<dyn ScriptCallable>) -> ConnectionId {
        let id = ConnectionId(self.next.get());

        self.next.set(id.0 + 1);

        self.map
            .borrow_mut()
            .entry(key)
            .or_default()
            .push(Connection { id, signal, callable });

        id
    }

    fn disconnect(&self, id: ConnectionId) -> Option<Rc<dyn ScriptCallable>> {
        let mut map = self.map.borrow_mut();

        let (key, position) = map.iter().find_map(|(key, connections)| {
            let position = connections.iter().position(|connection| connection.id == id)?;

            Some((*key, position))
        })?;

        let connections = map.get_mut(&key)?;
        let connection = connections.remove(position);

        if connections.is_empty() {
            let _ = map.remove(&key);
        }

        Some(connection.callable)
    }

    // The removed callables are returned to be dropped outside of the borrow.
    pub(crate) fn disconnect_object(&self, key: IdentityKey) -> Vec<Rc<dyn ScriptCallable>> {
        let removed = self.map.borrow_mut().remove(&key).unwrap_or_default();

        if !removed.is_empty() {
            debug!("{} signal connection(s) of a destroyed object dropped", removed.len());
        }

        removed.into_iter().map(|connection| connection.callable).collect()
    }

    fn is_connected(&self, id: ConnectionId) -> bool {
        self.map
            .borrow()
            .values()
            .any(|connections| connections.iter().any(|connection| connection.id == id))
    }

    // The connections of the sender to the signal overload with the index.
    fn receivers(&self, key: IdentityKey, index: u32) -> Vec<(ConnectionId, Rc<SlotInfo>, Rc<dyn ScriptCallable>)> {
        let map = self.map.borrow();

        let Some(connections) = map.get(&key) else {
            return Vec::new();
        };

        connections
            .iter()
            .filter_map(|connection| {
                let node = connection
                    .signal
                    .overloads()
                    .find(|node| node.kind() == SlotKind::Signal && node.index() == index)?;

                Some((connection.id, node.clone(), connection.callable.clone()))
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.map.borrow().values().map(Vec::len).sum()
    }
}

impl Debug for SignalRegistry {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SignalRegistry")
            .field("connections", &self.len())
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Connects the scripting callable to the named signal of the instance.
    ///
    /// The member must resolve to an overload chain with at least one signal
    /// overload. The connection lasts until it is disconnected, or until the
    /// bridge destroys the instance's object.
    pub fn connect(
        &self,
        origin: Origin,
        instance: &Instance,
        signal: &str,
        callable: impl ScriptCallable + 'static,
    ) -> RuntimeResult<ConnectionId> {
        let identity = self.receiver_identity(origin, instance, signal)?;
        let class = instance.class();

        let slot = match self.resolve_member(class, signal) {
            MemberInfo::Slot(slot) if slot.overloads().any(|node| node.kind() == SlotKind::Signal) => slot,
            MemberInfo::NotFound => return Err(self.unknown_member(origin, class, signal)),

            _ => {
                return Err(RuntimeError::NotASignal {
                    access_origin: origin,
                    class: CompactString::from(class.name()),
                    member: Ident::from(signal),
                })
            }
        };

        let id = self.0.signals.connect(identity.key(), slot, Rc::new(callable));

        debug!("connection {id} to '{}::{signal}' established", class.name());

        Ok(id)
    }

    /// Removes the connection. Returns false if the connection does not
    /// exist anymore.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let removed = self.0.signals.disconnect(id);

        let found = removed.is_some();

        drop(removed);

        found
    }

    /// Removes all connections of the object. Returns the number of removed
    /// connections.
    ///
    /// The native side calls this function when it destroys an object the
    /// bridge did not destroy itself.
    pub fn disconnect_object(&self, sender: &NativeIdentity) -> usize {
        self.0.signals.disconnect_object(sender.key()).len()
    }

    /// The number of established signal connections.
    #[inline(always)]
    pub fn connection_count(&self) -> usize {
        self.0.signals.len()
    }

    /// Delivers the emission of the sender's signal to the connected
    /// callables.
    ///
    /// The `index` is the descriptor index of the emitted signal overload.
    /// The arguments are converted according to the overload's parameter
    /// types once per emission, and every connected callable receives the
    /// same values. A callable that fails does not prevent the delivery to
    /// the next one: the failure is logged.
    ///
    /// Callables may re-enter the bridge, and may connect or disconnect
    /// signals. A connection removed during the emission does not receive
    /// it.
    ///
    /// Returns the number of callables that received the emission.
    pub fn emit(
        &self,
        origin: Origin,
        sender: &NativeIdentity,
        index: u32,
        arguments: Vec<NativeValue>,
    ) -> RuntimeResult<usize> {
        let receivers = self.0.signals.receivers(sender.key(), index);

        let Some((_, node, _)) = receivers.first() else {
            return Ok(0);
        };

        trace!("emitting {}", node.signature());

        let arguments = self.emission_arguments(origin, node, arguments)?;

        let mut delivered = 0;

        for (id, node, callable) in receivers {
            if !self.0.signals.is_connected(id) {
                continue;
            }

            delivered += 1;

            if let Err(error) = callable.call(self, &arguments) {
                error!("receiver of '{}' failed: {error}", node.signature());
            }
        }

        Ok(delivered)
    }

    fn emission_arguments(
        &self,
        origin: Origin,
        node: &SlotInfo,
        arguments: Vec<NativeValue>,
    ) -> RuntimeResult<Vec<ScriptValue>> {
        let scope = StorageScope::open(self);

        let slots = arguments
            .into_iter()
            .map(|value| scope.alloc(value))
            .collect::<Vec<_>>();

        let mut result = Vec::with_capacity(slots.len());

        for (slot, param) in slots.into_iter().zip(node.arguments()) {
            let value = scope.take(slot);

            result.push(self.to_script(origin, value, param)?);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::{any::Any, cell::RefCell, rc::Rc};

    use crate::{
        dispatch::NativeCall,
        reflect::{MethodKind, MethodMeta, ReflectiveDescriptor},
        runtime::{ManagedObject, ManagedRef, NativeError, NativeValue, Origin, RuntimeError, ScriptValue},
        Bridge,
        BridgeConfig,
    };

    struct Slider;

    impl ManagedObject for Slider {
        fn class_name(&self) -> &str {
            "Slider"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    // Calling "moved" emits it with the same arguments.
    fn slider_bridge() -> Bridge {
        let bridge = Bridge::new(BridgeConfig::new());

        let entry = |call: &mut NativeCall<'_>| match call.index() {
            0 => {
                let arguments = vec![call.take(1), call.take(2)];

                let Some(sender) = call.receiver().cloned() else {
                    return Err(NativeError::new("no sender"));
                };

                call.bridge()
                    .emit(Origin::nil(), &sender, 0, arguments)
                    .map(|_| ())
                    .map_err(|error| NativeError::new(error.to_string()))
            }

            _ => Ok(()),
        };

        let descriptor = ReflectiveDescriptor::new("Slider", entry)
            .method(
                MethodMeta::new(0, "moved")
                    .param("i32")
                    .param("Slider*")
                    .kind(MethodKind::Signal),
            )
            .method(MethodMeta::new(1, "reset"));

        bridge.register_descriptor(Rc::new(descriptor));

        bridge
    }

    #[test]
    fn test_emission() {
        let bridge = slider_bridge();
        let object = ManagedRef::new(Slider);
        let slider = bridge.wrap(object.clone().into(), "Slider");

        let received = Rc::new(RefCell::new(Vec::new()));

        let id = {
            let received = received.clone();

            bridge
                .connect(Origin::nil(), &slider, "moved", move |_: &Bridge, arguments: &[ScriptValue]| {
                    received.borrow_mut().push(arguments.to_vec());
                    Ok(ScriptValue::None)
                })
                .unwrap()
        };

        bridge
            .call_method(
                Origin::nil(),
                &slider,
                "moved",
                &[ScriptValue::Int(7), ScriptValue::Instance(slider.clone())],
            )
            .unwrap();

        {
            let received = received.borrow();

            assert_eq!(received.len(), 1);
            assert_eq!(received[0][0], ScriptValue::Int(7));

            match &received[0][1] {
                ScriptValue::Instance(sender) => assert!(sender.ptr_eq(&slider)),
                other => panic!("unexpected sender {other:?}"),
            }
        }

        assert_eq!(bridge.storage_depth(), 0);

        assert!(bridge.disconnect(id));
        assert!(!bridge.disconnect(id));

        bridge
            .call_method(
                Origin::nil(),
                &slider,
                "moved",
                &[ScriptValue::Int(8), ScriptValue::Instance(slider.clone())],
            )
            .unwrap();

        assert_eq!(received.borrow().len(), 1);
        assert_eq!(bridge.connection_count(), 0);
    }

    #[test]
    fn test_connect_errors() {
        let bridge = slider_bridge();
        let object = ManagedRef::new(Slider);
        let slider = bridge.wrap(object.clone().into(), "Slider");

        let ignore = |_: &Bridge, _: &[ScriptValue]| Ok(ScriptValue::None);

        assert!(matches!(
            bridge.connect(Origin::nil(), &slider, "reset", ignore),
            Err(RuntimeError::NotASignal { .. }),
        ));

        assert!(matches!(
            bridge.connect(Origin::nil(), &slider, "missing", ignore),
            Err(RuntimeError::UnknownMember { .. }),
        ));

        bridge.destroy(&slider);

        assert!(matches!(
            bridge.connect(Origin::nil(), &slider, "moved", ignore),
            Err(RuntimeError::OwnershipViolation { .. }),
        ));

        assert_eq!(bridge.connection_count(), 0);
    }

    #[test]
    fn test_failing_receiver() {
        let bridge = slider_bridge();
        let object = ManagedRef::new(Slider);
        let slider = bridge.wrap(object.clone().into(), "Slider");

        let calls = Rc::new(RefCell::new(0));

        bridge
            .connect(Origin::nil(), &slider, "moved", |_: &Bridge, _: &[ScriptValue]| {
                Err(RuntimeError::NotCallable {
                    access_origin: Origin::nil(),
                    class: "Slider".into(),
                    member: "moved".into(),
                })
            })
            .unwrap();

        {
            let calls = calls.clone();

            bridge
                .connect(Origin::nil(), &slider, "moved", move |_: &Bridge, _: &[ScriptValue]| {
                    *calls.borrow_mut() += 1;
                    Ok(ScriptValue::None)
                })
                .unwrap();
        }

        let Some(sender) = slider.identity() else {
            panic!("slider is dead");
        };

        let delivered = bridge
            .emit(Origin::nil(), &sender, 0, vec![NativeValue::I32(3), NativeValue::Pointer(None)])
            .unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(*calls.borrow(), 1);

        assert_eq!(bridge.emit(Origin::nil(), &sender, 1, Vec::new()).unwrap(), 0);
    }
}
