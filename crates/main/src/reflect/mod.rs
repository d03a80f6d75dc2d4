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

//! Reflection cache.
//!
//! The bridge knows native classes through two kinds of metadata:
//!
//! - A [ReflectiveDescriptor] is the native side's own introspection table of
//!   a managed class. Descriptors form chains that mirror the class
//!   hierarchy.
//! - An [ExtensionProvider] adds methods, constructors, a destructor, and
//!   enums to a class (managed or not) without modifying the class itself.
//!
//! Both are attached to a [ClassInfo], the bridge's per-class record. The
//! member lookup combines them into a [MemberInfo], caching the outcome per
//! class and member name.

mod class;
mod descriptor;
mod enums;
pub(crate) mod lookup;
mod member;
mod param;
pub(crate) mod slot;
pub(crate) mod upcast;

pub use crate::reflect::{
    class::{ClassId, ClassInfo, ClassRegistry, Downcast, DowncastProbe, ParentLink},
    descriptor::{
        CallKind,
        EnumMeta,
        ExtensionKind,
        ExtensionMethod,
        ExtensionProvider,
        MetaCall,
        MethodKind,
        MethodMeta,
        PropertyMeta,
        ProviderSource,
        ReflectiveDescriptor,
    },
    enums::{EnumType, EnumValue},
    member::{MemberInfo, PropertyInfo},
    param::ParamInfo,
    slot::{SlotInfo, SlotKind},
};
