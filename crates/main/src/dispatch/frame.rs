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

use std::fmt::{Debug, Formatter};

use crate::{
    bridge::Bridge,
    reflect::CallKind,
    runtime::{NativeError, NativeHeap, NativeIdentity, NativeResult, NativeValue, StoragePos, StorageRef},
};

/// The capacity of the native calling convention: the maximum number of
/// argument slots of a native call, the return slot included.
pub const MAX_ARGS: usize = 32;

/// A frame of one native call.
///
/// The dispatcher passes the frame to the native [entry point](crate::reflect::MetaCall).
/// The frame exposes the argument slots of the call: slot 0 is the return
/// slot, and the arguments start at slot 1 (or at slot 2 for the extension
/// methods that receive the instance pointer in slot 1).
///
/// The slot values live in the bridge's value storage. The native side can
/// re-enter the bridge while handling the call: nested calls allocate their
/// own slots above the slots of this frame.
pub struct NativeCall<'a> {
    bridge: &'a Bridge,
    kind: CallKind,
    index: u32,
    receiver: Option<NativeIdentity>,
    slots: &'a [Option<StorageRef>],
}

impl<'a> Debug for NativeCall<'a> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("NativeCall")
            .field("kind", &self.kind)
            .field("index", &self.index)
            .field("receiver", &self.receiver)
            .field("argc", &self.argc())
            .finish()
    }
}

impl<'a> NativeCall<'a> {
    #[inline(always)]
    pub(crate) fn new(
        bridge: &'a Bridge,
        kind: CallKind,
        index: u32,
        receiver: Option<NativeIdentity>,
        slots: &'a [Option<StorageRef>],
    ) -> Self {
        Self {
            bridge,
            kind,
            index,
            receiver,
            slots,
        }
    }

    /// The kind of the call.
    #[inline(always)]
    pub fn kind(&self) -> CallKind {
        self.kind
    }

    /// The index of the called member as declared in the member's metadata.
    #[inline(always)]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The object the reflective member is called on. None for the
    /// extension methods, class-level functions, and constructors.
    #[inline(always)]
    pub fn receiver(&self) -> Option<&NativeIdentity> {
        self.receiver.as_ref()
    }

    /// The number of slots after the return slot.
    #[inline(always)]
    pub fn argc(&self) -> usize {
        self.slots.len().saturating_sub(1)
    }

    /// Moves the value out of the slot, leaving [NativeValue::Void] in place.
    ///
    /// Returns [NativeValue::Void] if the slot does not exist.
    pub fn take(&mut self, slot: usize) -> NativeValue {
        let Some(Some(reference)) = self.slots.get(slot) else {
            return NativeValue::Void;
        };

        self.bridge.0.storage.borrow_mut().take(*reference)
    }

    /// Calls `f` with a reference to the slot value.
    ///
    /// The value storage is borrowed while `f` runs, so `f` must not call
    /// into the bridge.
    pub fn with_arg<R>(&self, slot: usize, f: impl FnOnce(&NativeValue) -> R) -> Option<R> {
        let reference = (*self.slots.get(slot)?)?;

        let storage = self.bridge.0.storage.borrow();

        Some(f(storage.get(reference)?))
    }

    /// Returns a copy of the object pointer in the slot, if the slot holds
    /// a non-null pointer.
    pub fn pointer(&self, slot: usize) -> Option<NativeIdentity> {
        self.with_arg(slot, |value| value.as_pointer().cloned()).flatten()
    }

    /// Writes the result of the call into the return slot.
    ///
    /// If the dispatcher has prepared the return slot inside a heap object
    /// (see [NativeValue::Place]), a [boxed](NativeValue::Boxed) result is
    /// moved into that object.
    pub fn set_return(&mut self, value: NativeValue) -> NativeResult<()> {
        let Some(Some(reference)) = self.slots.first() else {
            return Err(NativeError::new("the member does not return a value"));
        };

        let place = self
            .bridge
            .0
            .storage
            .borrow()
            .get(*reference)
            .and_then(|current| match current {
                NativeValue::Place(pointer) => Some(*pointer),
                _ => None,
            });

        let previous = match (place, value) {
            (Some(pointer), NativeValue::Boxed(boxed)) => {
                match self.bridge.0.heap.replace(pointer, boxed.into_inner()) {
                    Ok(previous) => {
                        drop(previous);
                        return Ok(());
                    }

                    Err(_) => return Err(NativeError::new("the return storage is gone")),
                }
            }

            (_, value) => self.bridge.0.storage.borrow_mut().replace(*reference, value),
        };

        match previous {
            Ok(previous) => {
                drop(previous);
                Ok(())
            }

            Err(_) => Err(NativeError::new("the return slot is gone")),
        }
    }

    /// The heap of plain native objects.
    #[inline(always)]
    pub fn heap(&self) -> &NativeHeap {
        &self.bridge.0.heap
    }

    /// The bridge that dispatches this call. The native side may use it to
    /// call back into the scripting side.
    #[inline(always)]
    pub fn bridge(&self) -> &Bridge {
        self.bridge
    }
}

/// Restores the value storage watermark when dropped.
///
/// Every call boundary opens a scope, so nested calls cannot leak their
/// transient values into the caller's part of the storage, on both the
/// success and the error paths.
pub(crate) struct StorageScope<'a> {
    bridge: &'a Bridge,
    position: StoragePos,
}

impl<'a> Drop for StorageScope<'a> {
    fn drop(&mut self) {
        let discarded = self.bridge.0.storage.borrow_mut().restore(self.position);

        // Discarded values may hold wrappers whose release re-enters the
        // bridge.
        drop(discarded);
    }
}

impl<'a> StorageScope<'a> {
    #[inline(always)]
    pub(crate) fn open(bridge: &'a Bridge) -> Self {
        let position = bridge.0.storage.borrow().position();

        Self { bridge, position }
    }

    #[inline(always)]
    pub(crate) fn alloc(&self, value: NativeValue) -> StorageRef {
        self.bridge.0.storage.borrow_mut().alloc(value)
    }

    #[inline(always)]
    pub(crate) fn take(&self, reference: StorageRef) -> NativeValue {
        self.bridge.0.storage.borrow_mut().take(reference)
    }
}
