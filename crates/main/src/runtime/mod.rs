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

//! Core value model of the bridge.
//!
//! This module defines the two value representations the bridge converts
//! between ([ScriptValue] and [NativeValue]), the native object identities
//! ([ManagedRef] and [OpaquePtr]), the [ValueStorage] arena for transient
//! call values, the [NativeHeap] for plain native objects, the registry of
//! user value kinds, and the error types.

mod error;
mod heap;
mod ident;
mod kind;
mod native;
mod origin;
mod storage;
mod value;

pub use crate::runtime::{
    error::{NativeError, NativeResult, NumberCastCause, RuntimeError, RuntimeResult},
    heap::NativeHeap,
    ident::Ident,
    kind::{KindId, KindInfo, KindRegistry, ValueKind},
    native::{
        BoxedValue,
        IdentityKey,
        ManagedObject,
        ManagedRef,
        NativeIdentity,
        NativeValue,
        OpaquePtr,
    },
    origin::{Origin, ScriptOrigin},
    storage::{StoragePos, StorageRef, ValueStorage},
    value::ScriptValue,
};
