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

//! Instance wrappers.
//!
//! An [Instance] is the scripting-side handle of a native object. The bridge
//! maintains an identity map from native object identities to their
//! wrappers, so that a native object crossing the boundary several times is
//! always represented by the same handle.
//!
//! Whether releasing the last handle destroys the native object depends on
//! the ownership of the object:
//!
//! - An object the bridge owns is destroyed, unless it is a managed object
//!   that has acquired a parent on the native side.
//! - An object the bridge does not own is destroyed only if the
//!   [OwnershipProbe] of its class reports that nothing else owns it.
//! - [Bridge::destroy](crate::Bridge::destroy) destroys the object
//!   unconditionally.

mod instance;
mod ownership;
mod registry;

pub(crate) use crate::wrapper::registry::WrapperRegistry;
pub use crate::wrapper::{
    instance::Instance,
    ownership::{DestroyStrategy, Ownership, OwnershipProbe, WrapperState},
};
