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

//! # Ad Astra Bridge
//!
//! A dynamic binding engine between an embedded, dynamically typed scripting
//! runtime and a statically typed native object system that exposes runtime
//! reflection metadata.
//!
//! The engine lets the scripting side call native methods, read and write
//! native properties, and hold native objects, without either side knowing
//! the other's concrete types at compile time.
//!
//! The crate consists of the following parts:
//!
//! - [Reflection Cache](reflect): a per-class registry of members built
//!   lazily from [reflective descriptors](reflect::ReflectiveDescriptor) and
//!   [extension providers](reflect::ExtensionProvider).
//! - [Overload Dispatcher](dispatch): resolves a call against an overload
//!   chain in two passes (strict, then permissive) and drives the native
//!   [entry point](reflect::MetaCall). The dispatcher also delivers signal
//!   emissions to the connected [scripting callables](dispatch::ScriptCallable).
//! - [Conversion Engine](convert): converts values between
//!   [ScriptValue](runtime::ScriptValue) and
//!   [NativeValue](runtime::NativeValue) representations.
//! - [Instance Wrappers](wrapper): keeps at most one scripting handle per
//!   native object identity and arbitrates destruction of native objects.
//! - [Value Storage](runtime::ValueStorage): a bump-allocated arena for the
//!   transient values of a call.
//!
//! All of these parts are owned by a [Bridge] context object. There are no
//! global registries: independent Bridge instances don't share any state.
//!
//! ```
//! use ad_astra_bridge::{Bridge, BridgeConfig};
//!
//! let bridge = Bridge::new(BridgeConfig::new());
//!
//! let widget = bridge.register_type("Widget", None, 0, None);
//!
//! assert_eq!(widget.name(), "Widget");
//! assert!(bridge.resolve_member(&widget, "missing").is_not_found());
//! ```
//!
//! The Bridge is a single-threaded object. The embedding scripting runtime is
//! expected to serialize all calls into it (for example, by holding its
//! global execution lock). Native code may re-enter the Bridge synchronously
//! from inside a native call.

pub mod bridge;
pub mod convert;
pub mod dispatch;
pub mod reflect;
pub mod runtime;
pub mod wrapper;

pub use crate::bridge::{Bridge, BridgeConfig, ConversionCounters};
