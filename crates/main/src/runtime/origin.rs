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
    fmt::{Debug, Display, Formatter},
    panic::Location,
};

/// A location of the code that initiated a bridge operation.
///
/// Every [RuntimeError](crate::runtime::RuntimeError) carries an Origin so
/// that the embedding runtime can point its users to the place where the
/// failing access happened.
///
/// The scripting runtime usually provides a [ScriptOrigin] describing the
/// script call site. When the operation is initiated by Rust code, the
/// [Origin::here] constructor captures the caller's Rust source location.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Origin {
    /// The location is unknown.
    #[default]
    Nil,

    /// A location in Rust source code.
    Rust(&'static Location<'static>),

    /// A location in script source code reported by the scripting runtime.
    Script(ScriptOrigin),
}

impl Debug for Origin {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for Origin {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nil => formatter.write_str("?"),
            Self::Rust(location) => Display::fmt(location, formatter),
            Self::Script(origin) => Display::fmt(origin, formatter),
        }
    }
}

impl From<ScriptOrigin> for Origin {
    #[inline(always)]
    fn from(value: ScriptOrigin) -> Self {
        Self::Script(value)
    }
}

impl From<&'static Location<'static>> for Origin {
    #[inline(always)]
    fn from(value: &'static Location<'static>) -> Self {
        Self::Rust(value)
    }
}

impl Origin {
    /// Returns an Origin that does not point to any source code.
    #[inline(always)]
    pub const fn nil() -> Self {
        Self::Nil
    }

    /// Returns an Origin pointing to the Rust code that called this function.
    #[inline(always)]
    #[track_caller]
    pub fn here() -> Self {
        Self::Rust(Location::caller())
    }

    /// Returns true if this Origin does not point to any source code.
    #[inline(always)]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }
}

/// A call site in script source code.
///
/// The bridge does not interpret script modules. The scripting runtime
/// identifies the module by an arbitrary numeric id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ScriptOrigin {
    /// An identifier of the script module assigned by the scripting runtime.
    pub module: u64,

    /// A one-based line number.
    pub line: u32,

    /// A one-based column number.
    pub column: u32,
}

impl Display for ScriptOrigin {
    #[inline]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!(
            "module #{} [{}:{}]",
            self.module, self.line, self.column,
        ))
    }
}
