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
    rc::Rc,
};

use compact_str::CompactString;

use crate::reflect::EnumMeta;

/// A native enum type as the scripting side sees it.
///
/// The bridge creates EnumTypes lazily, once per class, from the enums of the
/// class's reflective descriptor and of its extension providers.
pub struct EnumType {
    scope: CompactString,
    name: CompactString,
    keys: Vec<(CompactString, i64)>,
    flags: bool,
}

impl Debug for EnumType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("EnumType")
            .field("scope", &self.scope)
            .field("name", &self.name)
            .field("keys", &self.keys)
            .field("flags", &self.flags)
            .finish()
    }
}

impl Display for EnumType {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("{}::{}", self.scope, self.name))
    }
}

impl EnumType {
    pub(crate) fn from_meta(scope: &str, meta: &EnumMeta) -> Self {
        Self {
            scope: CompactString::from(scope),
            name: CompactString::from(meta.name()),
            keys: meta.keys().to_vec(),
            flags: meta.is_flags(),
        }
    }

    /// The name of the class that declares the enum.
    #[inline(always)]
    pub fn scope(&self) -> &str {
        self.scope.as_str()
    }

    /// The name of the enum without the scope.
    #[inline(always)]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The keys of the enum in declaration order.
    #[inline(always)]
    pub fn keys(&self) -> &[(CompactString, i64)] {
        &self.keys
    }

    /// Returns true if the enum is a set of bit flags.
    #[inline(always)]
    pub fn is_flags(&self) -> bool {
        self.flags
    }

    /// Returns the numeric value of the key.
    pub fn value_of(&self, key: &str) -> Option<i64> {
        self.keys
            .iter()
            .find(|(name, _)| name.as_str() == key)
            .map(|(_, value)| *value)
    }

    /// Returns the first key with the numeric value.
    pub fn key_of(&self, value: i64) -> Option<&str> {
        self.keys
            .iter()
            .find(|(_, candidate)| *candidate == value)
            .map(|(name, _)| name.as_str())
    }

    /// Returns true if both types denote the same native enum.
    #[inline]
    pub fn same_as(&self, other: &Self) -> bool {
        self.scope == other.scope && self.name == other.name
    }
}

/// A tagged integer: a numeric value of a native enum type.
#[derive(Clone)]
pub struct EnumValue {
    enum_type: Rc<EnumType>,
    value: i64,
}

impl PartialEq for EnumValue {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.enum_type.same_as(&other.enum_type)
    }
}

impl Debug for EnumValue {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for EnumValue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.enum_type.key_of(self.value) {
            Some(key) => formatter.write_fmt(format_args!("{}.{key}", self.enum_type.scope)),
            None => formatter.write_fmt(format_args!("{}({})", self.enum_type, self.value)),
        }
    }
}

impl EnumValue {
    /// Creates a value of the enum type. The value does not have to match
    /// any key (flag combinations usually don't).
    #[inline(always)]
    pub fn new(enum_type: Rc<EnumType>, value: i64) -> Self {
        Self { enum_type, value }
    }

    /// The enum type of the value.
    #[inline(always)]
    pub fn enum_type(&self) -> &Rc<EnumType> {
        &self.enum_type
    }

    /// The numeric value.
    #[inline(always)]
    pub fn value(&self) -> i64 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::reflect::{EnumMeta, EnumType, EnumValue};

    #[test]
    fn test_enum_values() {
        let meta = EnumMeta::new("Color").key("Red", 0).key("Green", 1);
        let color = Rc::new(EnumType::from_meta("Widget", &meta));

        assert_eq!(color.to_string(), "Widget::Color");
        assert_eq!(color.value_of("Green"), Some(1));
        assert_eq!(color.key_of(0), Some("Red"));

        let green = EnumValue::new(color.clone(), 1);

        assert_eq!(green.to_string(), "Widget.Green");
        assert_eq!(EnumValue::new(color.clone(), 7).to_string(), "Widget::Color(7)");

        let twin = Rc::new(EnumType::from_meta("Widget", &meta));

        assert_eq!(green, EnumValue::new(twin, 1));
    }
}
