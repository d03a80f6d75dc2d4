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
    cell::RefCell,
    fmt::{Debug, Formatter},
    num::NonZeroUsize,
};

use crate::runtime::{KindId, OpaquePtr};

// Heap addresses imitate aligned native addresses so that they never collide
// with small integers the scripting side may pass as pointers.
const BASE_ADDRESS: usize = 0x1000;
const ALIGNMENT: usize = 0x10;

/// A heap of plain native values addressed by [OpaquePtr] pointers.
///
/// The heap plays the role of the native allocator for objects that have no
/// liveness tracking of their own. Freed addresses are reused by subsequent
/// allocations, just like a native allocator reuses memory. Each reuse bumps
/// the address's generation number, and the pointers issued by the heap
/// remember the generation they were issued with. As a result, the bridge
/// can detect that a pointer is stale even when the address has been reused.
///
/// The heap has interior mutability. The closures passed to
/// [with](Self::with) and [with_mut](Self::with_mut) must not access the
/// same heap.
pub struct NativeHeap {
    state: RefCell<HeapState>,
}

#[derive(Default)]
struct HeapState {
    slots: Vec<HeapSlot>,
    vacant: Vec<usize>,
    live: usize,
}

struct HeapSlot {
    generation: u32,
    entry: Option<HeapEntry>,
}

struct HeapEntry {
    kind: Option<KindId>,
    value: Box<dyn Any>,
}

impl Default for NativeHeap {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for NativeHeap {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();

        formatter
            .debug_struct("NativeHeap")
            .field("live", &state.live)
            .field("capacity", &state.slots.len())
            .finish()
    }
}

impl NativeHeap {
    /// Creates an empty heap.
    #[inline(always)]
    pub fn new() -> Self {
        Self {
            state: RefCell::new(HeapState::default()),
        }
    }

    /// Moves the value into the heap and returns a tracked pointer to it.
    ///
    /// The `kind` is the value kind of the object, if the object's type is
    /// registered in the [KindRegistry](crate::runtime::KindRegistry).
    pub fn alloc(&self, kind: Option<KindId>, value: Box<dyn Any>) -> OpaquePtr {
        let mut state = self.state.borrow_mut();

        state.live += 1;

        let entry = Some(HeapEntry { kind, value });

        if let Some(index) = state.vacant.pop() {
            let slot = &mut state.slots[index];

            slot.generation = match slot.generation.wrapping_add(1) {
                0 => 1,
                next => next,
            };

            slot.entry = entry;

            return OpaquePtr::tracked(address_of(index), slot.generation);
        }

        let index = state.slots.len();

        state.slots.push(HeapSlot {
            generation: 1,
            entry,
        });

        OpaquePtr::tracked(address_of(index), 1)
    }

    /// A convenience function that boxes the value and moves it into
    /// the heap.
    #[inline(always)]
    pub fn alloc_value<T: Any>(&self, kind: Option<KindId>, value: T) -> OpaquePtr {
        self.alloc(kind, Box::new(value))
    }

    /// Returns true if the pointer refers to an object that is still
    /// allocated with the same generation.
    ///
    /// Untracked (foreign) pointers are assumed to be alive: the heap cannot
    /// say anything about them.
    pub fn is_live(&self, pointer: OpaquePtr) -> bool {
        if !pointer.is_tracked() {
            return true;
        }

        let state = self.state.borrow();

        match index_of(pointer).and_then(|index| state.slots.get(index)) {
            Some(slot) => slot.generation == pointer.generation() && slot.entry.is_some(),
            None => false,
        }
    }

    /// Returns the value kind of a live tracked object.
    pub fn kind(&self, pointer: OpaquePtr) -> Option<KindId> {
        let state = self.state.borrow();

        state.entry(pointer)?.kind
    }

    /// Calls `f` with a reference to the object if the pointer is live and
    /// the object has type `T`.
    pub fn with<T: Any, R>(&self, pointer: OpaquePtr, f: impl FnOnce(&T) -> R) -> Option<R> {
        let state = self.state.borrow();

        let value = state.entry(pointer)?.value.downcast_ref::<T>()?;

        Some(f(value))
    }

    /// Calls `f` with a mutable reference to the object if the pointer is
    /// live and the object has type `T`.
    pub fn with_mut<T: Any, R>(
        &self,
        pointer: OpaquePtr,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let mut state = self.state.borrow_mut();

        let value = state.entry_mut(pointer)?.value.downcast_mut::<T>()?;

        Some(f(value))
    }

    /// Calls `f` with the type-erased object if the pointer is live.
    pub fn with_any<R>(&self, pointer: OpaquePtr, f: impl FnOnce(&dyn Any) -> R) -> Option<R> {
        let state = self.state.borrow();

        let entry = state.entry(pointer)?;

        Some(f(entry.value.as_ref()))
    }

    /// Replaces the content of a live object, and returns the previous
    /// content.
    ///
    /// If the pointer is stale, the value is returned back as an error.
    pub fn replace(
        &self,
        pointer: OpaquePtr,
        value: Box<dyn Any>,
    ) -> Result<Box<dyn Any>, Box<dyn Any>> {
        let mut state = self.state.borrow_mut();

        match state.entry_mut(pointer) {
            Some(entry) => Ok(std::mem::replace(&mut entry.value, value)),
            None => Err(value),
        }
    }

    /// Removes the object from the heap and returns it, so the caller drops
    /// it outside of the heap borrow.
    ///
    /// Returns None if the pointer is stale or untracked.
    pub fn free(&self, pointer: OpaquePtr) -> Option<Box<dyn Any>> {
        let mut state = self.state.borrow_mut();

        let index = index_of(pointer)?;
        let slot = state.slots.get_mut(index)?;

        if slot.generation != pointer.generation() {
            return None;
        }

        let entry = slot.entry.take()?;

        state.vacant.push(index);
        state.live -= 1;

        Some(entry.value)
    }

    /// Returns the number of live objects.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.state.borrow().live
    }

    /// Returns true if the heap has no live objects.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HeapState {
    fn entry(&self, pointer: OpaquePtr) -> Option<&HeapEntry> {
        let slot = self.slots.get(index_of(pointer)?)?;

        if slot.generation != pointer.generation() {
            return None;
        }

        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, pointer: OpaquePtr) -> Option<&mut HeapEntry> {
        let slot = self.slots.get_mut(index_of(pointer)?)?;

        if slot.generation != pointer.generation() {
            return None;
        }

        slot.entry.as_mut()
    }
}

#[inline(always)]
fn address_of(index: usize) -> NonZeroUsize {
    // BASE_ADDRESS is non-zero.
    NonZeroUsize::MIN.saturating_add(BASE_ADDRESS - 1 + index * ALIGNMENT)
}

#[inline(always)]
fn index_of(pointer: OpaquePtr) -> Option<usize> {
    if !pointer.is_tracked() {
        return None;
    }

    let offset = pointer.address().get().checked_sub(BASE_ADDRESS)?;

    match offset % ALIGNMENT {
        0 => Some(offset / ALIGNMENT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::NativeHeap;

    #[test]
    fn test_heap_generations() {
        let heap = NativeHeap::new();

        let first = heap.alloc_value(None, 10i32);

        assert!(heap.is_live(first));
        assert_eq!(heap.with(first, |value: &i32| *value), Some(10));

        let freed = heap.free(first);

        assert!(freed.is_some());
        assert!(!heap.is_live(first));
        assert!(heap.free(first).is_none());

        let second = heap.alloc_value(None, String::from("reused"));

        assert_eq!(first.address(), second.address());
        assert_ne!(first.generation(), second.generation());
        assert!(heap.with(first, |_: &String| ()).is_none());
        assert_eq!(heap.with(second, |value: &String| value.len()), Some(6));
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_heap_replace() {
        let heap = NativeHeap::new();

        let pointer = heap.alloc_value(None, 1u8);

        assert!(heap.replace(pointer, Box::new(2u8)).is_ok());
        assert_eq!(heap.with(pointer, |value: &u8| *value), Some(2));

        heap.with_mut(pointer, |value: &mut u8| *value = 3);

        assert_eq!(heap.with(pointer, |value: &u8| *value), Some(3));
    }
}
