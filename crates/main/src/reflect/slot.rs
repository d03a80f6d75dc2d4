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

use compact_str::{format_compact, CompactString};

use crate::{
    reflect::{MetaCall, ParamInfo},
    runtime::Ident,
};

/// The calling convention of an overload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SlotKind {
    /// A method of the reflective descriptor. The native entry point
    /// receives the instance as the call's receiver, and the arguments start
    /// at slot 1.
    Member,

    /// A signal of the reflective descriptor. Calling it follows the
    /// [Member](Self::Member) convention, and scripting callables can be
    /// connected to it.
    Signal,

    /// An instance method of an extension provider. The instance pointer
    /// occupies slot 1, and the arguments start at slot 2.
    InstanceExtension,

    /// A class-level function of an extension provider.
    StaticExtension,

    /// A constructor of an extension provider.
    Constructor,

    /// A destructor of an extension provider.
    Destructor,
}

impl SlotKind {
    /// Returns true if the overload needs an instance to be called on.
    #[inline(always)]
    pub fn needs_instance(&self) -> bool {
        matches!(
            self,
            Self::Member | Self::Signal | Self::InstanceExtension | Self::Destructor
        )
    }

    /// Returns true if the native entry point receives the instance in
    /// slot 1 rather than as the call's receiver.
    #[inline(always)]
    pub fn passes_instance_as_argument(&self) -> bool {
        matches!(self, Self::InstanceExtension | Self::Destructor)
    }
}

/// One concrete overload of a named native member, and a link to the next
/// overload of the same name.
///
/// The bridge builds overload chains during member lookup and never changes
/// them afterwards.
pub struct SlotInfo {
    class: CompactString,
    name: Ident,
    kind: SlotKind,
    index: u32,
    params: Vec<ParamInfo>,
    entry: Rc<dyn MetaCall>,
    upcast_offset: isize,
    next: Option<Rc<SlotInfo>>,
}

impl Debug for SlotInfo {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SlotInfo")
            .field("signature", &self.signature())
            .field("kind", &self.kind)
            .field("index", &self.index)
            .field("upcast_offset", &self.upcast_offset)
            .field("next", &self.next)
            .finish()
    }
}

impl Display for SlotInfo {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            SlotKind::Constructor => formatter.write_fmt(format_args!("{}::new", self.class))?,
            _ => formatter.write_fmt(format_args!("{}::{}", self.class, self.name))?,
        }

        formatter.write_str("(")?;

        let mut is_first = true;

        for param in self.arguments() {
            match is_first {
                true => is_first = false,
                false => formatter.write_str(", ")?,
            }

            Display::fmt(param, formatter)?;
        }

        formatter.write_str(")")?;

        if let Some(result) = self.params.first() {
            if !result.is_void() && self.kind != SlotKind::Constructor {
                formatter.write_str(" -> ")?;
                Display::fmt(result, formatter)?;
            }
        }

        Ok(())
    }
}

/// A builder of one [SlotInfo] node before it is linked into a chain.
pub(crate) struct SlotNode {
    pub(crate) class: CompactString,
    pub(crate) name: Ident,
    pub(crate) kind: SlotKind,
    pub(crate) index: u32,
    pub(crate) params: Vec<ParamInfo>,
    pub(crate) entry: Rc<dyn MetaCall>,
    pub(crate) upcast_offset: isize,
}

impl SlotInfo {
    /// Links the nodes into an overload chain in the given order and returns
    /// the chain's head.
    pub(crate) fn chain(nodes: Vec<SlotNode>) -> Option<Rc<SlotInfo>> {
        nodes.into_iter().rev().fold(None, |next, node| {
            Some(Rc::new(SlotInfo {
                class: node.class,
                name: node.name,
                kind: node.kind,
                index: node.index,
                params: node.params,
                entry: node.entry,
                upcast_offset: node.upcast_offset,
                next,
            }))
        })
    }

    /// The name of the class whose member lookup produced this overload.
    #[inline(always)]
    pub fn class_name(&self) -> &str {
        self.class.as_str()
    }

    /// The member name.
    #[inline(always)]
    pub fn name(&self) -> &Ident {
        &self.name
    }

    /// The calling convention of the overload.
    #[inline(always)]
    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    /// The number the native entry point receives in [NativeCall::index].
    ///
    /// [NativeCall::index]: crate::dispatch::NativeCall::index
    #[inline(always)]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// All parameters, the return parameter at index 0.
    #[inline(always)]
    pub fn params(&self) -> &[ParamInfo] {
        &self.params
    }

    /// The return parameter.
    #[inline(always)]
    pub fn result(&self) -> &ParamInfo {
        // Slot nodes are always built with the return parameter.
        &self.params[0]
    }

    /// The user-visible parameters, excluding the return parameter and the
    /// implicit instance parameter.
    #[inline(always)]
    pub fn arguments(&self) -> &[ParamInfo] {
        &self.params[1..]
    }

    /// The number of user-visible parameters.
    #[inline(always)]
    pub fn arity(&self) -> usize {
        self.params.len() - 1
    }

    /// The native entry point to call.
    #[inline(always)]
    pub fn entry(&self) -> &Rc<dyn MetaCall> {
        &self.entry
    }

    /// The byte offset to add to the instance pointer before passing it to
    /// this overload.
    #[inline(always)]
    pub fn upcast_offset(&self) -> isize {
        self.upcast_offset
    }

    /// The next overload of the chain.
    #[inline(always)]
    pub fn next(&self) -> Option<&Rc<SlotInfo>> {
        self.next.as_ref()
    }

    /// Returns true if this node is the only overload in its chain.
    #[inline(always)]
    pub fn is_single(&self) -> bool {
        self.next.is_none()
    }

    /// Iterates over this node and all subsequent overloads.
    #[inline]
    pub fn overloads(self: &Rc<Self>) -> impl Iterator<Item = &Rc<SlotInfo>> {
        std::iter::successors(Some(self), |slot| slot.next.as_ref())
    }

    /// A printable signature of the overload.
    #[inline(always)]
    pub fn signature(&self) -> CompactString {
        format_compact!("{self}")
    }
}
