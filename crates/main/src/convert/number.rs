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

use std::fmt::Display;

use compact_str::format_compact;

use crate::runtime::{NativeValue, Origin, RuntimeError, RuntimeResult, ValueKind};

/// A scripting number on its way to a native numeric slot.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Number {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Number {
    #[inline(always)]
    fn name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
        }
    }
}

// The cast crate reports infallible conversions as plain values, and
// fallible conversions as Results.
trait CastOutput<T> {
    fn into_result(self) -> Result<T, cast::Error>;
}

impl<T> CastOutput<T> for Result<T, cast::Error> {
    #[inline(always)]
    fn into_result(self) -> Result<T, cast::Error> {
        self
    }
}

macro_rules! impl_cast_output {
    ($($ty:ty),+) => {
        $(
            impl CastOutput<$ty> for $ty {
                #[inline(always)]
                fn into_result(self) -> Result<$ty, cast::Error> {
                    Ok(self)
                }
            }
        )+
    };
}

impl_cast_output!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

fn narrow<From, To>(value: From, from: &'static str, to: &'static str, origin: Origin) -> RuntimeResult<To>
where
    From: Display + Copy,
    To: cast::From<From>,
    <To as cast::From<From>>::Output: CastOutput<To>,
{
    <To as cast::From<From>>::cast(value)
        .into_result()
        .map_err(|cause| RuntimeError::NumberCast {
            access_origin: origin,
            from,
            to,
            cause: cause.into(),
            value: format_compact!("{value}"),
        })
}

macro_rules! narrow_number {
    ($number:expr, $origin:expr, $ty:ty, $variant:ident) => {{
        let to = ValueKind::$variant.name();

        match $number {
            Number::Int(value) => narrow::<i64, $ty>(value, "int", to, $origin),
            Number::UInt(value) => narrow::<u64, $ty>(value, "uint", to, $origin),
            Number::Float(value) => narrow::<f64, $ty>(value, "float", to, $origin),
        }
        .map(NativeValue::$variant)
    }};
}

/// Converts the number into a native value of the numeric kind with range
/// checking. Floats are truncated towards zero when converted to integers.
///
/// Returns None if the kind is not numeric.
pub(crate) fn number_to_native(
    number: Number,
    kind: ValueKind,
    origin: Origin,
) -> Option<RuntimeResult<NativeValue>> {
    Some(match kind {
        ValueKind::I8 => narrow_number!(number, origin, i8, I8),
        ValueKind::U8 => narrow_number!(number, origin, u8, U8),
        ValueKind::I16 => narrow_number!(number, origin, i16, I16),
        ValueKind::U16 => narrow_number!(number, origin, u16, U16),
        ValueKind::I32 => narrow_number!(number, origin, i32, I32),
        ValueKind::U32 => narrow_number!(number, origin, u32, U32),
        ValueKind::I64 => narrow_number!(number, origin, i64, I64),
        ValueKind::U64 => narrow_number!(number, origin, u64, U64),
        ValueKind::F32 => narrow_number!(number, origin, f32, F32),
        ValueKind::F64 => narrow_number!(number, origin, f64, F64),

        ValueKind::Char => {
            let code = match number {
                Number::Float(_) => None,
                _ => narrow_number!(number, origin, u32, U32).ok(),
            };

            match code.and_then(|code| match code {
                NativeValue::U32(code) => char::from_u32(code),
                _ => None,
            }) {
                Some(character) => Ok(NativeValue::Char(character)),

                None => Err(RuntimeError::TypeMismatch {
                    access_origin: origin,
                    expected: "char".into(),
                    provided: number.name(),
                }),
            }
        }

        _ => return None,
    })
}
