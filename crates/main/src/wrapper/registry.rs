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

use std::{cell::RefCell, rc::Weak};

use ahash::{AHashMap, AHashSet};
use compact_str::CompactString;
use log::{debug, trace};

use crate::{
    bridge::Bridge,
    reflect::ClassId,
    runtime::{IdentityKey, NativeIdentity},
    wrapper::{instance::InstanceWrapper, DestroyStrategy, Instance},
};

/// The identity map: native object identity to its only live wrapper.
#[derive(Default)]
pub(crate) struct WrapperRegistry {
    map: RefCell<AHashMap<IdentityKey, Weak<InstanceWrapper>>>,
}

impl WrapperRegistry {
    pub(crate) fn insert(&self, key: IdentityKey, instance: &Instance) {
        // The previous entry is stale, the caller has checked it.
        let previous = self.map.borrow_mut().insert(key, instance.downgrade());

        drop(previous);
    }

    // Returns the live wrapper of the identity, evicting a stale entry.
    pub(crate) fn find_live(&self, identity: &NativeIdentity, track_generations: bool) -> Option<Instance> {
        let key = identity.key();

        let weak = self.map.borrow().get(&key).cloned()?;

        let instance = weak.upgrade().map(Instance);

        if let Some(instance) = instance {
            if instance.is_bound_to(identity, track_generations) {
                return Some(instance);
            }

            debug!(
                "stale '{}' wrapper evicted from the identity map",
                instance.class().name(),
            );

            self.remove_if(key, instance.as_ptr());

            return None;
        }

        self.remove_if(key, weak.as_ptr());

        None
    }

    // Removes the entry only if it still refers to the specified wrapper.
    pub(crate) fn remove_if(&self, key: IdentityKey, wrapper: *const InstanceWrapper) {
        let mut map = self.map.borrow_mut();

        let matches = match map.get(&key) {
            Some(weak) => std::ptr::eq(weak.as_ptr(), wrapper),
            None => false,
        };

        if matches {
            let _ = map.remove(&key);
        }
    }

    // The number of entries whose wrappers are still referenced.
    pub(crate) fn live_count(&self) -> usize {
        self.map
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

// Guards the downcast refinement against probes that send an object back to
// a class it has already been refined from.
const MAX_DOWNCASTS: usize = 16;

impl Bridge {
    /// Returns the scripting handle of the native object.
    ///
    /// If the object already has a live wrapper, the function returns that
    /// wrapper, so the scripting side observes the same handle for the same
    /// object. Otherwise the function creates a wrapper that does not own the
    /// object.
    ///
    /// The class of a managed object is the object's own most derived class.
    /// The class of a plain object is `class_name`, refined by the downcast
    /// probes registered for it.
    pub fn wrap(&self, identity: NativeIdentity, class_name: &str) -> Instance {
        let track_generations = self.0.config.track_opaque_generations;

        if let Some(instance) = self.0.wrappers.find_live(&identity, track_generations) {
            return instance;
        }

        let (class_name, identity) = match &identity {
            NativeIdentity::Managed(object) => {
                let class_name = CompactString::from(object.class_name());

                self.0.classes.lookup_or_create(&class_name).mark_managed();

                (class_name, identity)
            }

            NativeIdentity::Opaque(_) => self.downcast(CompactString::from(class_name), identity),
        };

        let class = self.0.classes.lookup_or_create(&class_name);

        let instance = Instance::unbound(class, self);

        instance.bind(identity.clone(), false, DestroyStrategy::Destructor);

        self.0.wrappers.insert(identity.key(), &instance);

        trace!("'{}' object wrapped", class_name);

        instance
    }

    /// Returns the scripting handle of the native object, and makes the
    /// bridge responsible for destroying the object.
    pub fn wrap_owned(
        &self,
        identity: NativeIdentity,
        class_name: &str,
        strategy: DestroyStrategy,
    ) -> Instance {
        // A managed object may have no other strong references yet.
        let object = identity.as_managed().cloned();

        let instance = self.wrap(identity, class_name);

        instance.set_strategy(strategy);
        instance.set_owned(true);

        drop(object);

        instance
    }

    /// Destroys the native object of the wrapper regardless of its ownership.
    ///
    /// After this call, the wrapper is released, and accessing its members
    /// reports an [OwnershipViolation](crate::runtime::RuntimeError::OwnershipViolation).
    #[inline(always)]
    pub fn destroy(&self, instance: &Instance) {
        instance.destroy();
    }

    /// Hands the responsibility for the object over to the native side: the
    /// bridge will not destroy the object when the wrapper is released.
    #[inline(always)]
    pub fn pass_ownership_to_native(&self, instance: &Instance) {
        instance.set_owned(false);
    }

    /// Makes the bridge responsible for destroying the object when the
    /// wrapper is released.
    #[inline(always)]
    pub fn pass_ownership_to_bridge(&self, instance: &Instance) {
        instance.set_owned(true);
    }

    /// Returns the number of wrappers currently registered in the identity
    /// map.
    #[inline(always)]
    pub fn wrapper_count(&self) -> usize {
        self.0.wrappers.live_count()
    }

    fn downcast(
        &self,
        mut class_name: CompactString,
        mut identity: NativeIdentity,
    ) -> (CompactString, NativeIdentity) {
        let mut visited = AHashSet::<ClassId>::new();

        for _ in 0..MAX_DOWNCASTS {
            let Some(class) = self.0.classes.find(&class_name) else {
                break;
            };

            if !visited.insert(class.id()) {
                break;
            }

            let refined = class
                .probes()
                .iter()
                .find_map(|probe| probe.probe(&self.0.heap, &identity));

            let Some(refined) = refined else {
                break;
            };

            if refined.class_name == class_name {
                break;
            }

            trace!("'{}' object refined to '{}'", class_name, refined.class_name);

            class_name = refined.class_name;
            identity = refined.identity;
        }

        (class_name, identity)
    }
}
