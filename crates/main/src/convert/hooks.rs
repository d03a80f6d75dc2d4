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
    rc::Rc,
};

use ahash::AHashMap;
use compact_str::CompactString;

use crate::{
    bridge::Bridge,
    convert::ConversionMode,
    runtime::{KindId, NativeValue, RuntimeResult, ScriptValue},
};

type ToScriptFn = dyn Fn(&Bridge, NativeValue) -> RuntimeResult<ScriptValue>;
type ToNativeFn = dyn Fn(&Bridge, &ScriptValue, ConversionMode) -> RuntimeResult<NativeValue>;
type CoercionFn = dyn Fn(i64) -> Option<Box<dyn Any>>;

/// A pair of conversion callbacks of a user value kind.
///
/// A custom converter takes precedence over the built-in conversion rules of
/// its kind in both directions.
#[derive(Clone)]
pub struct CustomConverter {
    to_script: Rc<ToScriptFn>,
    to_native: Rc<ToNativeFn>,
}

impl Debug for CustomConverter {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("CustomConverter")
    }
}

impl CustomConverter {
    /// Creates a converter from the two callbacks.
    #[inline]
    pub fn new(
        to_script: impl Fn(&Bridge, NativeValue) -> RuntimeResult<ScriptValue> + 'static,
        to_native: impl Fn(&Bridge, &ScriptValue, ConversionMode) -> RuntimeResult<NativeValue>
            + 'static,
    ) -> Self {
        Self {
            to_script: Rc::new(to_script),
            to_native: Rc::new(to_native),
        }
    }

    #[inline(always)]
    pub(crate) fn to_script(&self, bridge: &Bridge, value: NativeValue) -> RuntimeResult<ScriptValue> {
        (self.to_script)(bridge, value)
    }

    #[inline(always)]
    pub(crate) fn to_native(
        &self,
        bridge: &Bridge,
        value: &ScriptValue,
        mode: ConversionMode,
    ) -> RuntimeResult<NativeValue> {
        (self.to_native)(bridge, value, mode)
    }
}

/// The conversion extension points of a bridge: custom converters of user
/// value kinds and the auto-coercion table.
#[derive(Default)]
pub(crate) struct ConversionHooks {
    converters: RefCell<AHashMap<KindId, CustomConverter>>,
    coercions: RefCell<AHashMap<(KindId, CompactString), Rc<CoercionFn>>>,
}

impl ConversionHooks {
    #[inline]
    pub(crate) fn set_converter(&self, kind: KindId, converter: CustomConverter) {
        let _ = self.converters.borrow_mut().insert(kind, converter);
    }

    #[inline]
    pub(crate) fn converter(&self, kind: KindId) -> Option<CustomConverter> {
        self.converters.borrow().get(&kind).cloned()
    }

    #[inline]
    pub(crate) fn set_coercion(&self, kind: KindId, enum_name: &str, build: Rc<CoercionFn>) {
        let _ = self
            .coercions
            .borrow_mut()
            .insert((kind, CompactString::from(enum_name)), build);
    }

    // Builds a value of the kind from a tagged integer of the enum type,
    // if the table has an entry for the pair.
    pub(crate) fn coerce(&self, kind: KindId, enum_name: &str, value: i64) -> Option<Box<dyn Any>> {
        let build = self
            .coercions
            .borrow()
            .get(&(kind, CompactString::from(enum_name)))
            .cloned()?;

        build(value)
    }
}
