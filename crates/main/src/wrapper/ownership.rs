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

use crate::runtime::{NativeHeap, NativeIdentity};

/// An answer of an [OwnershipProbe].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Ownership {
    /// Something on the native side owns the object. The bridge must not
    /// destroy it.
    OwnedExternally,

    /// Nothing on the native side owns the object. The bridge destroys it
    /// when the last wrapper goes away.
    OwnedByBridge,

    /// The probe cannot tell. The bridge leaves the object alone.
    Unknown,
}

/// A handler that tells whether a plain native object has an owner on the
/// native side.
///
/// Extension providers attach probes to classes whose objects can be adopted
/// by native containers that the bridge cannot observe. The probe of the
/// class's own providers takes precedence over the probes of the ancestors.
///
/// ```
/// use ad_astra_bridge::wrapper::{Ownership, OwnershipProbe};
/// use ad_astra_bridge::runtime::{NativeHeap, NativeIdentity};
///
/// let probe = |heap: &NativeHeap, object: &NativeIdentity| match object.as_opaque() {
///     Some(pointer) if heap.is_live(pointer) => Ownership::OwnedByBridge,
///     _ => Ownership::Unknown,
/// };
///
/// let heap = NativeHeap::new();
/// let pointer = heap.alloc_value(None, 10u32);
///
/// assert_eq!(probe.probe(&heap, &pointer.into()), Ownership::OwnedByBridge);
/// ```
pub trait OwnershipProbe {
    /// Inspects the object. The `object` pointer is adjusted to the class
    /// that declares the probe.
    fn probe(&self, heap: &NativeHeap, object: &NativeIdentity) -> Ownership;
}

impl<F> OwnershipProbe for F
where
    F: Fn(&NativeHeap, &NativeIdentity) -> Ownership,
{
    #[inline(always)]
    fn probe(&self, heap: &NativeHeap, object: &NativeIdentity) -> Ownership {
        self(heap, object)
    }
}

/// The way the bridge destroys a plain native object it owns.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum DestroyStrategy {
    /// Call the destructor of the class's extension provider, or free the
    /// heap allocation if the class has no destructor.
    #[default]
    Destructor,

    /// Free the heap allocation. Used for copies of user value kinds that
    /// the bridge made itself.
    Kind,
}

/// The lifecycle stage of an [Instance](crate::wrapper::Instance).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum WrapperState {
    /// The wrapper is created, but not yet bound to a native object (the
    /// constructor is running).
    Unbound,

    /// The wrapper refers to a native object.
    Bound,

    /// The wrapper is releasing the native object.
    Destroying,

    /// The wrapper no longer refers to a native object.
    Released,
}

// Decides whether releasing a managed object destroys it.
#[inline(always)]
pub(crate) fn destroys_managed(forced: bool, owned: bool, has_parent: bool) -> bool {
    forced || (owned && !has_parent)
}

// Decides whether releasing a plain object destroys it. The probe is
// consulted for objects the wrapper does not own.
#[inline]
pub(crate) fn destroys_opaque(forced: bool, owned: bool, probe: impl FnOnce() -> Option<Ownership>) -> bool {
    if forced || owned {
        return true;
    }

    matches!(probe(), Some(Ownership::OwnedByBridge))
}

#[cfg(test)]
mod tests {
    use crate::wrapper::{
        ownership::{destroys_managed, destroys_opaque},
        Ownership,
    };

    #[test]
    fn test_release_decisions() {
        assert!(destroys_managed(false, true, false));
        assert!(!destroys_managed(false, true, true));
        assert!(!destroys_managed(false, false, false));
        assert!(destroys_managed(true, false, true));

        assert!(destroys_opaque(false, true, || None));
        assert!(!destroys_opaque(false, false, || None));
        assert!(!destroys_opaque(false, false, || Some(Ownership::Unknown)));
        assert!(!destroys_opaque(false, false, || Some(Ownership::OwnedExternally)));
        assert!(destroys_opaque(false, false, || Some(Ownership::OwnedByBridge)));
        assert!(destroys_opaque(true, false, || Some(Ownership::OwnedExternally)));
    }
}
