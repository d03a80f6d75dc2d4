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

//! Conversions between scripting values and native values.
//!
//! The entry points are [Bridge::to_native](crate::Bridge::to_native) and
//! [Bridge::to_script](crate::Bridge::to_script). User value kinds may
//! override the built-in rules with a [CustomConverter].

mod engine;
mod hooks;
mod number;

pub(crate) use crate::convert::hooks::ConversionHooks;
pub use crate::convert::hooks::CustomConverter;

/// The conversion rules the engine applies to a scripting value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum ConversionMode {
    /// Only exact kind matches, and instances of the expected class or its
    /// subclasses.
    Strict,

    /// Exact matches together with numeric widening and narrowing,
    /// truthiness, stringification, null pointers from `0`, and the
    /// registered auto-coercions.
    #[default]
    Permissive,
}

impl ConversionMode {
    #[inline(always)]
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Strict)
    }
}
