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
    rc::{Rc, Weak},
};

use log::{debug, error, warn};

use crate::{
    bridge::{Bridge, BridgeInner},
    reflect::{upcast::apply_offset, ClassInfo},
    runtime::{IdentityKey, ManagedObject, ManagedRef, NativeIdentity, OpaquePtr},
    wrapper::{
        ownership::{destroys_managed, destroys_opaque},
        DestroyStrategy,
        Ownership,
        WrapperState,
    },
};

enum Binding {
    None,

    Managed {
        weak: Weak<dyn ManagedObject>,
        // Present while the wrapper owns the object.
        strong: Option<Rc<dyn ManagedObject>>,
    },

    Opaque(OpaquePtr),
}

pub(crate) struct InstanceWrapper {
    class: Rc<ClassInfo>,
    binding: RefCell<Binding>,
    key: Cell<Option<IdentityKey>>,
    owned: Cell<bool>,
    strategy: Cell<DestroyStrategy>,
    state: Cell<WrapperState>,
    bridge: Weak<BridgeInner>,
}

impl Drop for InstanceWrapper {
    fn drop(&mut self) {
        self.release(false);
    }
}

impl InstanceWrapper {
    fn release(&self, forced: bool) {
        match self.state.get() {
            WrapperState::Bound => (),

            WrapperState::Unbound => {
                self.state.set(WrapperState::Released);
                return;
            }

            WrapperState::Destroying | WrapperState::Released => return,
        }

        self.state.set(WrapperState::Destroying);

        let bridge = self.bridge.upgrade().map(Bridge);
        let key = self.key.take();

        if let (Some(bridge), Some(key)) = (&bridge, key) {
            bridge.0.wrappers.remove_if(key, self as *const InstanceWrapper);
        }

        let binding = self.binding.replace(Binding::None);
        let owned = self.owned.replace(false);

        let destroyed = match binding {
            Binding::None => false,

            Binding::Managed { weak, strong } => {
                let mut destroyed = false;

                if let Some(object) = weak.upgrade() {
                    if destroys_managed(forced, owned, object.has_parent()) {
                        debug!("disposing managed '{}' object", object.class_name());
                        object.dispose();
                        destroyed = true;
                    }
                }

                drop(strong);

                destroyed
            }

            Binding::Opaque(pointer) => match &bridge {
                Some(bridge) => self.release_opaque(bridge, pointer, forced, owned),

                None => {
                    debug!(
                        "'{}' object released after the bridge shutdown",
                        self.class.name(),
                    );

                    false
                }
            },
        };

        if let (true, Some(bridge), Some(key)) = (destroyed, &bridge, key) {
            // Callbacks dropped here may hold wrappers that re-enter the bridge.
            drop(bridge.0.signals.disconnect_object(key));
        }

        self.state.set(WrapperState::Released);
    }

    fn release_opaque(&self, bridge: &Bridge, pointer: OpaquePtr, forced: bool, owned: bool) -> bool {
        let heap = &bridge.0.heap;

        if !heap.is_live(pointer) {
            return false;
        }

        let identity = NativeIdentity::Opaque(pointer);

        let destroy = destroys_opaque(forced, owned, || {
            let (probe, offset) = bridge.lookup().owner_probe(&self.class)?;

            let ownership = probe.probe(heap, &apply_offset(&identity, offset));

            if ownership == Ownership::Unknown {
                warn!(
                    "ownership of '{}' object is unknown, the object is left alive",
                    self.class.name(),
                );
            }

            Some(ownership)
        });

        if !destroy {
            return false;
        }

        if self.strategy.get() == DestroyStrategy::Destructor {
            if let Some(destructor) = bridge.lookup().destructor(&self.class) {
                if let Err(error) = bridge.call_destructor(&destructor, identity) {
                    error!("destructor of '{}' failed: {error}", self.class.name());
                }

                return true;
            }
        }

        match pointer.is_tracked() {
            // The value is dropped outside of the heap borrow.
            true => {
                drop(heap.free(pointer));
                true
            }

            false => {
                debug!(
                    "'{}' object at {:#x} has no destructor and is left alive",
                    self.class.name(),
                    pointer.address(),
                );

                false
            }
        }
    }
}

/// A scripting-side handle of a native object.
///
/// The bridge keeps at most one Instance per live native object identity:
/// wrapping the same object twice returns clones of the same Instance.
///
/// When the last clone of the Instance is dropped, the bridge releases the
/// native object. Depending on the ownership of the object, the release
/// either destroys the object or leaves it to the native side.
#[derive(Clone)]
pub struct Instance(pub(crate) Rc<InstanceWrapper>);

impl Debug for Instance {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Instance")
            .field("class", &self.0.class.name())
            .field("state", &self.0.state.get())
            .field("owned", &self.0.owned.get())
            .finish()
    }
}

impl Display for Instance {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.identity() {
            Some(NativeIdentity::Managed(object)) => formatter.write_fmt(format_args!(
                "<{} object at {:#x}>",
                self.0.class.name(),
                object.address(),
            )),

            Some(NativeIdentity::Opaque(pointer)) => formatter.write_fmt(format_args!(
                "<{} object at {:#x}>",
                self.0.class.name(),
                pointer.address(),
            )),

            None => formatter.write_fmt(format_args!("<deleted {} object>", self.0.class.name())),
        }
    }
}

impl Instance {
    pub(crate) fn unbound(class: Rc<ClassInfo>, bridge: &Bridge) -> Self {
        Self(Rc::new(InstanceWrapper {
            class,
            binding: RefCell::new(Binding::None),
            key: Cell::new(None),
            owned: Cell::new(false),
            strategy: Cell::new(DestroyStrategy::default()),
            state: Cell::new(WrapperState::Unbound),
            bridge: Rc::downgrade(&bridge.0),
        }))
    }

    // Binds an unbound wrapper to the native object. The caller registers the
    // wrapper in the identity map.
    pub(crate) fn bind(&self, identity: NativeIdentity, owned: bool, strategy: DestroyStrategy) {
        let wrapper = &self.0;

        wrapper.key.set(Some(identity.key()));
        wrapper.owned.set(owned);
        wrapper.strategy.set(strategy);

        let binding = match identity {
            NativeIdentity::Managed(object) => {
                let weak = object.downgrade();

                Binding::Managed {
                    weak,
                    strong: match owned {
                        true => Some(object.into_rc()),
                        false => None,
                    },
                }
            }

            NativeIdentity::Opaque(pointer) => Binding::Opaque(pointer),
        };

        drop(wrapper.binding.replace(binding));

        wrapper.state.set(WrapperState::Bound);
    }

    #[inline(always)]
    pub(crate) fn downgrade(&self) -> Weak<InstanceWrapper> {
        Rc::downgrade(&self.0)
    }

    #[inline(always)]
    pub(crate) fn as_ptr(&self) -> *const InstanceWrapper {
        Rc::as_ptr(&self.0)
    }

    /// The native class of the object.
    #[inline(always)]
    pub fn class(&self) -> &Rc<ClassInfo> {
        &self.0.class
    }

    /// The lifecycle stage of the wrapper.
    #[inline(always)]
    pub fn state(&self) -> WrapperState {
        self.0.state.get()
    }

    /// Returns true if the bridge is responsible for destroying the object.
    #[inline(always)]
    pub fn is_owned(&self) -> bool {
        self.0.owned.get()
    }

    /// The way the bridge destroys the object when it owns it.
    #[inline(always)]
    pub fn destroy_strategy(&self) -> DestroyStrategy {
        self.0.strategy.get()
    }

    /// Returns true if both handles are clones of the same Instance.
    #[inline(always)]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the number of handles of this Instance.
    #[inline(always)]
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Returns true if the wrapper is bound and its native object is still
    /// alive.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.identity().is_some()
    }

    /// Returns the native object of the wrapper, or None if the object has
    /// been destroyed or the wrapper is not bound.
    pub fn identity(&self) -> Option<NativeIdentity> {
        if self.0.state.get() != WrapperState::Bound {
            return None;
        }

        match &*self.0.binding.borrow() {
            Binding::None => None,

            Binding::Managed { weak, .. } => {
                weak.upgrade().map(|object| NativeIdentity::Managed(ManagedRef::from(object)))
            }

            Binding::Opaque(pointer) => {
                let bridge = self.0.bridge.upgrade()?;

                match bridge.heap.is_live(*pointer) {
                    true => Some(NativeIdentity::Opaque(*pointer)),
                    false => None,
                }
            }
        }
    }

    // Returns true if the wrapper is bound to the same allocation as the
    // identity: a dead managed object or a reused heap address makes the
    // wrapper stale.
    pub(crate) fn is_bound_to(&self, identity: &NativeIdentity, track_generations: bool) -> bool {
        match (self.identity(), identity) {
            (Some(NativeIdentity::Managed(current)), NativeIdentity::Managed(object)) => {
                current == *object
            }

            (Some(NativeIdentity::Opaque(current)), NativeIdentity::Opaque(pointer)) => {
                current.address() == pointer.address()
                    && (!track_generations || current.generation() == pointer.generation())
            }

            _ => false,
        }
    }

    pub(crate) fn set_owned(&self, owned: bool) {
        let wrapper = &self.0;

        wrapper.owned.set(owned);

        let released = match &mut *wrapper.binding.borrow_mut() {
            Binding::Managed { weak, strong } => match owned {
                true => {
                    if strong.is_none() {
                        *strong = weak.upgrade();
                    }

                    None
                }

                false => strong.take(),
            },

            _ => None,
        };

        // Dropping the last strong reference runs native code, which may
        // access this wrapper.
        drop(released);
    }

    pub(crate) fn set_strategy(&self, strategy: DestroyStrategy) {
        self.0.strategy.set(strategy);
    }

    pub(crate) fn destroy(&self) {
        self.0.release(true);
    }
}
