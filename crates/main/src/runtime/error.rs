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
    error::Error as StdError,
    fmt::{Debug, Display, Formatter},
    result::Result as StdResult,
};

use compact_str::CompactString;

use crate::runtime::{Ident, Origin};

/// A result of a bridge API call, which can either be a normal value or a
/// [RuntimeError].
pub type RuntimeResult<T> = StdResult<T, RuntimeError>;

/// A result of a native [entry point](crate::reflect::MetaCall) invocation.
pub type NativeResult<T> = StdResult<T, NativeError>;

/// Represents any error that may occur when the scripting side accesses
/// native objects through the bridge.
///
/// An absent member is not an error: the member lookup reports it as
/// [MemberInfo::NotFound](crate::reflect::MemberInfo::NotFound). The
/// [UnknownMember](Self::UnknownMember) variant is produced only by the APIs
/// that require the member to exist.
///
/// None of these errors are fatal. After a failed call, the bridge's caches
/// and the identity map remain consistent, and the value storage is restored
/// to its state before the call.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum RuntimeError {
    /// The script accesses a member that the native class does not have.
    UnknownMember {
        /// The place where the member was accessed.
        access_origin: Origin,

        /// The name of the native class.
        class: CompactString,

        /// The requested member name.
        member: Ident,

        /// Names of existing members that look similar to the requested one.
        suggestions: Vec<CompactString>,
    },

    /// The script calls a member that has a single overload with the wrong
    /// number of arguments.
    ArityMismatch {
        /// The place where the member was called.
        access_origin: Origin,

        /// The signature of the called member.
        signature: CompactString,

        /// The number of arguments the member expects.
        expected: usize,

        /// The number of arguments the script provided.
        actual: usize,
    },

    /// The script calls a member that has a single overload, but one of the
    /// arguments cannot be converted to the expected native parameter type.
    ArgumentConversion {
        /// The place where the member was called.
        access_origin: Origin,

        /// The signature of the called member.
        signature: CompactString,

        /// The zero-based index of the failing argument.
        index: usize,

        /// The conversion failure.
        cause: Box<RuntimeError>,
    },

    /// None of the overloads of the called member accept the provided
    /// arguments, neither under strict nor under permissive conversion.
    NoMatchingOverload {
        /// The place where the member was called.
        access_origin: Origin,

        /// The name of the called member.
        member: Ident,

        /// Signatures of all overloads in the overload chain, in the chain
        /// order.
        candidates: Vec<CompactString>,
    },

    /// The script accesses a wrapper whose native object has already been
    /// destroyed.
    OwnershipViolation {
        /// The place where the wrapper was accessed.
        access_origin: Origin,

        /// The name of the wrapper's native class.
        class: CompactString,

        /// The member being accessed, if any.
        member: Option<Ident>,
    },

    /// A value of the native type has no scripting representation, and the
    /// bridge cannot obtain storage for it.
    ConversionGap {
        /// The place where the conversion was requested.
        access_origin: Origin,

        /// The name of the native type.
        type_name: CompactString,
    },

    /// A scripting value does not match the expected native parameter type.
    TypeMismatch {
        /// The place where the conversion was requested.
        access_origin: Origin,

        /// The name of the expected native type.
        expected: CompactString,

        /// The kind of the provided scripting value.
        provided: &'static str,
    },

    /// A scripting number does not fit into the range of the native numeric
    /// type.
    NumberCast {
        /// The place where the conversion was requested.
        access_origin: Origin,

        /// The name of the source scripting numeric kind.
        from: &'static str,

        /// The name of the destination native numeric type.
        to: &'static str,

        /// The cause of the failure.
        cause: NumberCastCause,

        /// A printable representation of the source value.
        value: CompactString,
    },

    /// The native side reported an error while executing the member.
    NativeFailure {
        /// The place where the member was called.
        access_origin: Origin,

        /// The name of the called member.
        member: Ident,

        /// The error reported by the native side.
        cause: NativeError,
    },

    /// The script attempts to assign a property that has no writer.
    ReadOnlyProperty {
        /// The place where the property was assigned.
        access_origin: Origin,

        /// The name of the native class.
        class: CompactString,

        /// The name of the property.
        property: Ident,
    },

    /// The script attempts to instantiate a native class that has no
    /// registered constructors.
    NoConstructor {
        /// The place where the instantiation was requested.
        access_origin: Origin,

        /// The name of the native class.
        class: CompactString,
    },

    /// The script attempts to call a member that is not callable (e.g., an
    /// enum constant or a property).
    NotCallable {
        /// The place where the member was called.
        access_origin: Origin,

        /// The name of the native class.
        class: CompactString,

        /// The name of the member.
        member: Ident,
    },

    /// A scripting callable was connected to a member that is not a signal.
    NotASignal {
        /// The place where the connection was requested.
        access_origin: Origin,

        /// The name of the native class.
        class: CompactString,

        /// The name of the member.
        member: Ident,
    },

    /// The call requires more argument slots than the native calling
    /// convention provides.
    TooManyArguments {
        /// The place where the member was called.
        access_origin: Origin,

        /// The maximum number of arguments, the return slot excluded.
        limit: usize,

        /// The number of arguments the script provided.
        actual: usize,
    },
}

impl Display for RuntimeError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMember {
                class,
                member,
                suggestions,
                ..
            } => {
                formatter.write_fmt(format_args!("type '{class}' has no member '{member}'"))?;

                if let Some(first) = suggestions.first() {
                    formatter.write_fmt(format_args!(", did you mean '{first}'?"))?;
                }

                Ok(())
            }

            Self::ArityMismatch {
                signature,
                expected,
                actual,
                ..
            } => formatter.write_fmt(format_args!(
                "called {signature} with wrong number of arguments: expected \
                {expected}, but {actual} provided",
            )),

            Self::ArgumentConversion {
                signature,
                index,
                cause,
                ..
            } => formatter.write_fmt(format_args!(
                "called {signature} with wrong argument #{}: {cause}",
                index + 1,
            )),

            Self::NoMatchingOverload {
                member, candidates, ..
            } => {
                formatter.write_fmt(format_args!(
                    "could not find matching overload of '{member}' for given arguments, \
                    the following overloads are available:",
                ))?;

                for candidate in candidates {
                    formatter.write_fmt(format_args!("\n    {candidate}"))?;
                }

                Ok(())
            }

            Self::OwnershipViolation { class, member, .. } => match member {
                Some(member) => formatter.write_fmt(format_args!(
                    "trying to access '{member}' on a destroyed '{class}' object",
                )),

                None => {
                    formatter.write_fmt(format_args!("trying to access a destroyed '{class}' object"))
                }
            },

            Self::ConversionGap { type_name, .. } => formatter.write_fmt(format_args!(
                "native type '{type_name}' has no scripting representation",
            )),

            Self::TypeMismatch {
                expected, provided, ..
            } => formatter.write_fmt(format_args!("expected '{expected}', but {provided} provided")),

            Self::NumberCast {
                from,
                to,
                cause,
                value,
                ..
            } => {
                use NumberCastCause::*;

                match cause {
                    Infinite => formatter.write_fmt(format_args!(
                        "cannot cast infinity value of {from} type to {to}"
                    )),

                    NAN => formatter
                        .write_fmt(format_args!("cannot cast NAN value of {from} type to {to}")),

                    Overflow | Underflow => formatter
                        .write_fmt(format_args!("cannot cast {value} {from} to {to} type")),
                }
            }

            Self::NativeFailure { member, cause, .. } => {
                formatter.write_fmt(format_args!("'{member}' failed: {cause}"))
            }

            Self::ReadOnlyProperty {
                class, property, ..
            } => formatter.write_fmt(format_args!(
                "property '{property}' of '{class}' is read-only",
            )),

            Self::NoConstructor { class, .. } => formatter.write_fmt(format_args!(
                "type '{class}' has no constructors",
            )),

            Self::NotCallable { class, member, .. } => formatter.write_fmt(format_args!(
                "member '{member}' of '{class}' is not callable",
            )),

            Self::NotASignal { class, member, .. } => formatter.write_fmt(format_args!(
                "member '{member}' of '{class}' is not a signal",
            )),

            Self::TooManyArguments { limit, actual, .. } => formatter.write_fmt(format_args!(
                "too many arguments: at most {limit} supported, but {actual} provided",
            )),
        }
    }
}

impl StdError for RuntimeError {
    #[inline]
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::ArgumentConversion { cause, .. } => Some(cause.as_ref()),
            Self::NativeFailure { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

impl RuntimeError {
    /// Returns the place where the failing operation was requested.
    pub fn primary_origin(&self) -> &Origin {
        match self {
            Self::UnknownMember { access_origin, .. } => access_origin,
            Self::ArityMismatch { access_origin, .. } => access_origin,
            Self::ArgumentConversion { access_origin, .. } => access_origin,
            Self::NoMatchingOverload { access_origin, .. } => access_origin,
            Self::OwnershipViolation { access_origin, .. } => access_origin,
            Self::ConversionGap { access_origin, .. } => access_origin,
            Self::TypeMismatch { access_origin, .. } => access_origin,
            Self::NumberCast { access_origin, .. } => access_origin,
            Self::NativeFailure { access_origin, .. } => access_origin,
            Self::ReadOnlyProperty { access_origin, .. } => access_origin,
            Self::NoConstructor { access_origin, .. } => access_origin,
            Self::NotCallable { access_origin, .. } => access_origin,
            Self::NotASignal { access_origin, .. } => access_origin,
            Self::TooManyArguments { access_origin, .. } => access_origin,
        }
    }

    /// Returns true if the error is a failure to convert a scripting value
    /// into a native value.
    ///
    /// The overload resolver treats these errors as "the overload does not
    /// match" and continues with the next candidate. An access to a destroyed
    /// object is not a conversion failure: it always reaches the caller.
    #[inline(always)]
    pub fn is_conversion_failure(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. } | Self::NumberCast { .. })
    }
}

/// A type of the [RuntimeError::NumberCast] error.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NumberCastCause {
    /// The target type does not support representation of infinite numbers.
    Infinite,

    /// The target type does not support representation of NaN numbers.
    NAN,

    /// The source numeric value is too large for the range of the target type.
    Overflow,

    /// The source numeric value is too small for the range of the target type.
    Underflow,
}

impl From<cast::Error> for NumberCastCause {
    #[inline]
    fn from(value: cast::Error) -> Self {
        match value {
            cast::Error::Infinite => Self::Infinite,
            cast::Error::NaN => Self::NAN,
            cast::Error::Overflow => Self::Overflow,
            cast::Error::Underflow => Self::Underflow,
        }
    }
}

/// An error reported by the native side from inside a
/// [native call](crate::reflect::MetaCall).
#[derive(Clone, PartialEq, Eq)]
pub struct NativeError {
    message: CompactString,
}

impl Debug for NativeError {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.message, formatter)
    }
}

impl Display for NativeError {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.message, formatter)
    }
}

impl StdError for NativeError {}

impl NativeError {
    /// Creates an error with the specified description.
    #[inline(always)]
    pub fn new(message: impl Into<CompactString>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the description of this error.
    #[inline(always)]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use compact_str::CompactString;

    use crate::runtime::{NativeError, NumberCastCause, Origin, RuntimeError};

    #[test]
    fn test_error_messages() {
        let error = RuntimeError::NoMatchingOverload {
            access_origin: Origin::nil(),
            member: "setValue".into(),
            candidates: vec![
                CompactString::from("fn setValue(i32)"),
                CompactString::from("fn setValue(String)"),
            ],
        };

        assert_eq!(
            error.to_string(),
            "could not find matching overload of 'setValue' for given arguments, the \
            following overloads are available:\n    fn setValue(i32)\n    fn setValue(String)",
        );

        let error = RuntimeError::ArgumentConversion {
            access_origin: Origin::nil(),
            signature: CompactString::from("fn resize(i32)"),
            index: 0,
            cause: Box::new(RuntimeError::NumberCast {
                access_origin: Origin::nil(),
                from: "int",
                to: "i32",
                cause: NumberCastCause::from(cast::Error::Overflow),
                value: CompactString::from("5000000000"),
            }),
        };

        assert!(error.source().is_some());
        assert_eq!(
            error.to_string(),
            "called fn resize(i32) with wrong argument #1: cannot cast 5000000000 int to i32 type",
        );

        let error = RuntimeError::NativeFailure {
            access_origin: Origin::nil(),
            member: "open".into(),
            cause: NativeError::new("file not found"),
        };

        assert_eq!(error.to_string(), "'open' failed: file not found");
    }
}
