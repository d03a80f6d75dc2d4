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
    rc::Rc,
};

use compact_str::CompactString;

use crate::reflect::{EnumType, EnumValue, MetaCall, ParamInfo, SlotInfo};

/// A result of the member lookup.
///
/// The lookup result is cached per class and member name, including the
/// [NotFound](Self::NotFound) outcome. Repeated lookups return clones of the
/// same cached value.
#[derive(Clone, Default)]
pub enum MemberInfo {
    /// The class has no such member.
    #[default]
    NotFound,

    /// The head of the member's overload chain.
    Slot(Rc<SlotInfo>),

    /// A reflective property.
    Property(Rc<PropertyInfo>),

    /// A constant of an enum declared by the class or its extension
    /// providers.
    EnumValue(EnumValue),

    /// An enum type declared by the class or its extension providers.
    EnumWrapper(Rc<EnumType>),
}

impl Debug for MemberInfo {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => formatter.write_str("NotFound"),
            Self::Slot(slot) => formatter.debug_tuple("Slot").field(&slot.signature()).finish(),
            Self::Property(property) => formatter
                .debug_tuple("Property")
                .field(&property.name())
                .finish(),
            Self::EnumValue(value) => formatter.debug_tuple("EnumValue").field(value).finish(),
            Self::EnumWrapper(enum_type) => formatter
                .debug_tuple("EnumWrapper")
                .field(&enum_type.to_string())
                .finish(),
        }
    }
}

/// Two MemberInfos are equal if they refer to the same cached objects.
impl PartialEq for MemberInfo {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound, Self::NotFound) => true,
            (Self::Slot(a), Self::Slot(b)) => Rc::ptr_eq(a, b),
            (Self::Property(a), Self::Property(b)) => Rc::ptr_eq(a, b),
            (Self::EnumValue(a), Self::EnumValue(b)) => {
                Rc::ptr_eq(a.enum_type(), b.enum_type()) && a.value() == b.value()
            }
            (Self::EnumWrapper(a), Self::EnumWrapper(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl MemberInfo {
    /// Returns true if the member does not exist.
    #[inline(always)]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns the overload chain head if the member is callable.
    #[inline(always)]
    pub fn as_slot(&self) -> Option<&Rc<SlotInfo>> {
        match self {
            Self::Slot(slot) => Some(slot),
            _ => None,
        }
    }

    /// Returns the property if the member is a property.
    #[inline(always)]
    pub fn as_property(&self) -> Option<&Rc<PropertyInfo>> {
        match self {
            Self::Property(property) => Some(property),
            _ => None,
        }
    }

    /// Returns a short name of the member's variant for diagnostics.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::Slot(_) => "slot",
            Self::Property(_) => "property",
            Self::EnumValue(_) => "enum value",
            Self::EnumWrapper(_) => "enum type",
        }
    }
}

/// An accessor of a reflective property.
pub struct PropertyInfo {
    pub(crate) class: CompactString,
    pub(crate) name: CompactString,
    pub(crate) index: u32,
    pub(crate) param: ParamInfo,
    pub(crate) writable: bool,
    pub(crate) entry: Rc<dyn MetaCall>,
}

impl Debug for PropertyInfo {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PropertyInfo")
            .field("class", &self.class)
            .field("name", &self.name)
            .field("index", &self.index)
            .field("param", &self.param)
            .field("writable", &self.writable)
            .finish_non_exhaustive()
    }
}

impl PropertyInfo {
    /// The name of the class that declares the property.
    #[inline(always)]
    pub fn class_name(&self) -> &str {
        self.class.as_str()
    }

    /// The name of the property.
    #[inline(always)]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The property's index that the native entry point receives.
    #[inline(always)]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The type of the property.
    #[inline(always)]
    pub fn param(&self) -> &ParamInfo {
        &self.param
    }

    /// Returns true if the property has a writer.
    #[inline(always)]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// The native entry point of the declaring class.
    #[inline(always)]
    pub fn entry(&self) -> &Rc<dyn MetaCall> {
        &self.entry
    }
}
