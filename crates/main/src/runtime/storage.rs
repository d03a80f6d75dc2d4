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
    mem::take,
};

use crate::runtime::NativeValue;

const INITIAL_CAPACITY: usize = 64;

/// A bump-allocated arena for the transient native values of bridge calls.
///
/// Every argument the bridge converts into a native value, and every return
/// slot the bridge prepares for a native call, is carved from this storage.
/// The values are addressed by [StorageRef] indices that remain valid while
/// the storage is not [restored](Self::restore) to a position before them.
///
/// The storage works as a stack of watermarks. A call saves the current
/// [position](Self::position) before it allocates anything, and restores it
/// when it finishes, successfully or not. Nested calls (e.g., a native
/// callback re-entering the bridge) save and restore their own positions on
/// top, so they never disturb the values of the outer call.
///
/// ```
/// use ad_astra_bridge::runtime::{NativeValue, ValueStorage};
///
/// let mut storage = ValueStorage::new();
///
/// let outer = storage.position();
/// let first = storage.alloc(NativeValue::I32(10));
///
/// let inner = storage.position();
/// let _second = storage.alloc(NativeValue::Bool(true));
///
/// let _ = storage.restore(inner);
///
/// assert_eq!(storage.get(first), Some(&NativeValue::I32(10)));
///
/// let _ = storage.restore(outer);
///
/// assert_eq!(storage.position(), outer);
/// assert_eq!(storage.get(first), None);
/// ```
pub struct ValueStorage {
    values: Vec<NativeValue>,
    peak: usize,
}

impl Default for ValueStorage {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ValueStorage {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ValueStorage")
            .field("position", &self.values.len())
            .field("peak", &self.peak)
            .finish()
    }
}

impl ValueStorage {
    /// Creates an empty storage.
    #[inline(always)]
    pub fn new() -> Self {
        Self {
            values: Vec::with_capacity(INITIAL_CAPACITY),
            peak: 0,
        }
    }

    /// Places the value on top of the storage and returns a reference to it.
    #[inline]
    pub fn alloc(&mut self, value: NativeValue) -> StorageRef {
        let index = self.values.len();

        self.values.push(value);
        self.peak = self.peak.max(self.values.len());

        StorageRef(index)
    }

    /// Returns the current watermark of the storage.
    #[inline(always)]
    pub fn position(&self) -> StoragePos {
        StoragePos(self.values.len())
    }

    /// Discards all values allocated after the `position` watermark.
    ///
    /// The discarded values are returned to the caller instead of being
    /// dropped in place. Native values may own native objects, so the caller
    /// drops them when it no longer holds any borrow of the storage.
    ///
    /// If the storage is already below the watermark, the function does
    /// nothing.
    #[must_use = "discarded values must be dropped outside of the storage borrow"]
    pub fn restore(&mut self, position: StoragePos) -> Vec<NativeValue> {
        if position.0 >= self.values.len() {
            return Vec::new();
        }

        self.values.split_off(position.0)
    }

    /// Returns a reference to the allocated value, or None if the reference
    /// points above the current watermark.
    #[inline(always)]
    pub fn get(&self, reference: StorageRef) -> Option<&NativeValue> {
        self.values.get(reference.0)
    }

    /// Returns a mutable reference to the allocated value, or None if the
    /// reference points above the current watermark.
    #[inline(always)]
    pub fn get_mut(&mut self, reference: StorageRef) -> Option<&mut NativeValue> {
        self.values.get_mut(reference.0)
    }

    /// Moves the value out of its cell, leaving [NativeValue::Void] in place.
    #[inline]
    pub fn take(&mut self, reference: StorageRef) -> NativeValue {
        match self.values.get_mut(reference.0) {
            Some(value) => take(value),
            None => NativeValue::Void,
        }
    }

    /// Writes the value into an already allocated cell and returns the
    /// previous content of the cell.
    ///
    /// Returns the value back as an error if the reference points above the
    /// current watermark.
    #[inline]
    pub fn replace(
        &mut self,
        reference: StorageRef,
        value: NativeValue,
    ) -> Result<NativeValue, NativeValue> {
        match self.values.get_mut(reference.0) {
            Some(cell) => Ok(std::mem::replace(cell, value)),
            None => Err(value),
        }
    }

    /// Returns the highest watermark the storage has ever reached.
    #[inline(always)]
    pub fn peak(&self) -> usize {
        self.peak
    }
}

/// A watermark of the [ValueStorage].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StoragePos(usize);

impl StoragePos {
    /// Returns the number of values below this watermark.
    #[inline(always)]
    pub fn depth(&self) -> usize {
        self.0
    }
}

/// A reference to a value allocated in the [ValueStorage].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StorageRef(usize);

#[cfg(test)]
mod tests {
    use crate::runtime::{NativeValue, ValueStorage};

    #[test]
    fn test_storage_watermarks() {
        let mut storage = ValueStorage::new();

        let start = storage.position();

        let a = storage.alloc(NativeValue::I32(1));
        let b = storage.alloc(NativeValue::Text(String::from("foo")));

        assert_eq!(storage.take(b), NativeValue::Text(String::from("foo")));
        assert_eq!(storage.take(b), NativeValue::Void);

        assert_eq!(
            storage.replace(a, NativeValue::I32(2)),
            Ok(NativeValue::I32(1))
        );

        let discarded = storage.restore(start);

        assert_eq!(discarded.len(), 2);
        assert_eq!(storage.position(), start);
        assert_eq!(storage.peak(), 2);
        assert!(storage.replace(a, NativeValue::Void).is_err());
        assert!(storage.restore(start).is_empty());
    }
}
