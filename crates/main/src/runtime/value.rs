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
    collections::BTreeMap,
    fmt::{Debug, Display, Formatter},
    rc::Rc,
};

use crate::{
    dispatch::BoundMethod,
    reflect::{EnumType, EnumValue},
    wrapper::Instance,
};

/// A value of the embedded scripting runtime, as the bridge sees it.
///
/// The scripting runtime converts its own values into ScriptValues before
/// calling into the bridge, and converts the results back. Cloning
/// a ScriptValue clones a reference for the reference-like variants
/// ([Instance](Self::Instance), [Object](Self::Object), etc.).
#[derive(Clone, Default)]
pub enum ScriptValue {
    /// The "no value" sentinel.
    #[default]
    None,

    /// A boolean.
    Bool(bool),

    /// A signed integer.
    Int(i64),

    /// An unsigned integer that does not fit the signed range.
    UInt(u64),

    /// A floating-point number.
    Float(f64),

    /// A text string.
    Str(String),

    /// A byte string.
    Bytes(Vec<u8>),

    /// A sequence of values.
    List(Vec<ScriptValue>),

    /// A dictionary with text keys.
    Dict(BTreeMap<String, ScriptValue>),

    /// A tagged integer of a native enum type.
    Enum(EnumValue),

    /// A native enum type.
    EnumType(Rc<EnumType>),

    /// A handle of a native object.
    Instance(Instance),

    /// A native member bound to its receiver.
    Method(BoundMethod),

    /// Any other object of the scripting runtime.
    Object(Rc<dyn Any>),
}

impl PartialEq for ScriptValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Dict(a), Self::Dict(b)) => a == b,
            (Self::Enum(a), Self::Enum(b)) => a == b,
            (Self::EnumType(a), Self::EnumType(b)) => Rc::ptr_eq(a, b),
            (Self::Instance(a), Self::Instance(b)) => a.ptr_eq(b),
            (Self::Method(a), Self::Method(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Debug for ScriptValue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => formatter.write_str("None"),
            Self::Bool(value) => Debug::fmt(value, formatter),
            Self::Int(value) => Debug::fmt(value, formatter),
            Self::UInt(value) => Debug::fmt(value, formatter),
            Self::Float(value) => Debug::fmt(value, formatter),
            Self::Str(value) => Debug::fmt(value, formatter),
            Self::Bytes(value) => formatter.write_fmt(format_args!("b{value:?}")),
            Self::List(value) => formatter.debug_list().entries(value).finish(),
            Self::Dict(value) => formatter.debug_map().entries(value).finish(),
            Self::Enum(value) => Display::fmt(value, formatter),
            Self::EnumType(value) => Display::fmt(value, formatter),
            Self::Instance(value) => Debug::fmt(value, formatter),
            Self::Method(value) => Debug::fmt(value, formatter),
            Self::Object(_) => formatter.write_str("<object>"),
        }
    }
}

/// The stringification used by permissive text conversions.
impl Display for ScriptValue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(value) => formatter.write_str(value),

            Self::Bytes(value) => formatter.write_str(&String::from_utf8_lossy(value)),

            Self::List(items) => {
                formatter.write_str("[")?;

                let mut is_first = true;

                for item in items {
                    match is_first {
                        true => is_first = false,
                        false => formatter.write_str(", ")?,
                    }

                    Debug::fmt(item, formatter)?;
                }

                formatter.write_str("]")
            }

            Self::Dict(entries) => {
                formatter.write_str("{")?;

                let mut is_first = true;

                for (key, value) in entries {
                    match is_first {
                        true => is_first = false,
                        false => formatter.write_str(", ")?,
                    }

                    formatter.write_fmt(format_args!("{key:?}: {value:?}"))?;
                }

                formatter.write_str("}")
            }

            other => Debug::fmt(other, formatter),
        }
    }
}

impl From<bool> for ScriptValue {
    #[inline(always)]
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ScriptValue {
    #[inline(always)]
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for ScriptValue {
    #[inline]
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(value) => Self::Int(value),
            Err(_) => Self::UInt(value),
        }
    }
}

impl From<f64> for ScriptValue {
    #[inline(always)]
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<'a> From<&'a str> for ScriptValue {
    #[inline(always)]
    fn from(value: &'a str) -> Self {
        Self::Str(String::from(value))
    }
}

impl From<String> for ScriptValue {
    #[inline(always)]
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Instance> for ScriptValue {
    #[inline(always)]
    fn from(value: Instance) -> Self {
        Self::Instance(value)
    }
}

impl From<EnumValue> for ScriptValue {
    #[inline(always)]
    fn from(value: EnumValue) -> Self {
        Self::Enum(value)
    }
}

impl ScriptValue {
    /// Returns true if the value is the [None](Self::None) sentinel.
    #[inline(always)]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the truthiness of the value, which the permissive boolean
    /// conversion uses.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
            Self::UInt(value) => *value != 0,
            Self::Float(value) => *value != 0.0,
            Self::Str(value) => !value.is_empty(),
            Self::Bytes(value) => !value.is_empty(),
            Self::List(value) => !value.is_empty(),
            Self::Dict(value) => !value.is_empty(),
            Self::Enum(value) => value.value() != 0,
            Self::EnumType(_) | Self::Instance(_) | Self::Method(_) | Self::Object(_) => true,
        }
    }

    /// Returns the wrapped native object if the value is an instance handle.
    #[inline(always)]
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Self::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// Returns a short name of the value's type for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) | Self::UInt(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Enum(_) => "enum",
            Self::EnumType(_) => "enum type",
            Self::Instance(_) => "instance",
            Self::Method(_) => "method",
            Self::Object(_) => "object",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::runtime::ScriptValue;

    #[test]
    fn test_script_value_basics() {
        assert_eq!(ScriptValue::from(5u64), ScriptValue::Int(5));
        assert_eq!(ScriptValue::from(u64::MAX), ScriptValue::UInt(u64::MAX));

        assert!(!ScriptValue::None.is_truthy());
        assert!(!ScriptValue::Str(String::new()).is_truthy());
        assert!(ScriptValue::Float(0.5).is_truthy());

        let list = ScriptValue::List(vec![ScriptValue::Int(1), ScriptValue::from("a")]);

        assert_eq!(list.to_string(), "[1, \"a\"]");

        let mut map = BTreeMap::new();

        let _ = map.insert(String::from("k"), ScriptValue::Bool(true));

        assert_eq!(ScriptValue::Dict(map).to_string(), "{\"k\": true}");
        assert_eq!(ScriptValue::from("text").to_string(), "text");
        assert_eq!(ScriptValue::None.to_string(), "None");
    }
}
