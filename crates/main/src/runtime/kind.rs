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
    cell::RefCell,
    fmt::{Debug, Display, Formatter},
    num::NonZeroU32,
    rc::Rc,
};

use ahash::AHashMap;
use compact_str::CompactString;
use lady_deirdre::sync::Lazy;

/// A resolved kind of a native value.
///
/// The bridge knows a closed set of built-in kinds by their type names (see
/// [ValueKind::builtin]). Any other type is either a user-registered value
/// kind ([ValueKind::User]), or a type known only by name
/// ([ValueKind::Unknown]), which is usually a class of native objects that
/// the bridge handles through pointers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ValueKind {
    /// No value.
    Void,

    /// A boolean.
    Bool,

    /// An 8-bit signed integer. A pointer to this kind is a C string.
    I8,

    /// An 8-bit unsigned integer.
    U8,

    /// A 16-bit signed integer.
    I16,

    /// A 16-bit unsigned integer.
    U16,

    /// A 32-bit signed integer.
    I32,

    /// A 32-bit unsigned integer.
    U32,

    /// A 64-bit signed integer.
    I64,

    /// A 64-bit unsigned integer.
    U64,

    /// A single-precision float.
    F32,

    /// A double-precision float.
    F64,

    /// A Unicode scalar value.
    Char,

    /// A text string.
    Text,

    /// A byte array.
    Bytes,

    /// A list of text strings.
    TextList,

    /// A list of arbitrary values.
    List,

    /// A map from text keys to arbitrary values.
    Map,

    /// A generic "any value" container.
    Any,

    /// A list of pointers to objects of the same class (`List<Foo*>`).
    PointerList,

    /// A scripting value passed through as is.
    Script,

    /// A user-registered value kind.
    User(KindId),

    /// A type the bridge knows only by name.
    Unknown,
}

impl Display for ValueKind {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => formatter.write_fmt(format_args!("user kind #{}", id.get())),
            other => formatter.write_str(other.name()),
        }
    }
}

impl ValueKind {
    /// Looks up a built-in kind by the native type name.
    ///
    /// ```
    /// use ad_astra_bridge::runtime::ValueKind;
    ///
    /// assert_eq!(ValueKind::builtin("i32"), Some(ValueKind::I32));
    /// assert_eq!(ValueKind::builtin("String"), Some(ValueKind::Text));
    /// assert_eq!(ValueKind::builtin("Widget"), None);
    /// ```
    pub fn builtin(name: &str) -> Option<Self> {
        static BUILTIN: Lazy<AHashMap<&'static str, ValueKind>> = Lazy::new(|| {
            let mut table = AHashMap::new();

            for (name, kind) in [
                ("void", ValueKind::Void),
                ("()", ValueKind::Void),
                ("bool", ValueKind::Bool),
                ("i8", ValueKind::I8),
                ("c_char", ValueKind::I8),
                ("u8", ValueKind::U8),
                ("i16", ValueKind::I16),
                ("u16", ValueKind::U16),
                ("i32", ValueKind::I32),
                ("u32", ValueKind::U32),
                ("i64", ValueKind::I64),
                ("u64", ValueKind::U64),
                ("f32", ValueKind::F32),
                ("f64", ValueKind::F64),
                ("char", ValueKind::Char),
                ("String", ValueKind::Text),
                ("str", ValueKind::Text),
                ("Bytes", ValueKind::Bytes),
                ("Vec<u8>", ValueKind::Bytes),
                ("StringList", ValueKind::TextList),
                ("Vec<String>", ValueKind::TextList),
                ("List", ValueKind::List),
                ("Map", ValueKind::Map),
                ("Any", ValueKind::Any),
                ("ScriptValue", ValueKind::Script),
            ] {
                let _ = table.insert(name, kind);
            }

            table
        });

        BUILTIN.get(name).copied()
    }

    /// Returns the canonical name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Char => "char",
            Self::Text => "String",
            Self::Bytes => "Bytes",
            Self::TextList => "StringList",
            Self::List => "List",
            Self::Map => "Map",
            Self::Any => "Any",
            Self::PointerList => "List<*>",
            Self::Script => "ScriptValue",
            Self::User(_) => "user kind",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true for integer kinds of any width.
    #[inline]
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::I8
                | Self::U8
                | Self::I16
                | Self::U16
                | Self::I32
                | Self::U32
                | Self::I64
                | Self::U64
        )
    }

    /// Returns true for floating-point kinds.
    #[inline(always)]
    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

/// An identifier of a user-registered value kind.
///
/// Kind ids are positive numbers assigned by the [KindRegistry] in
/// registration order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct KindId(NonZeroU32);

impl KindId {
    /// Returns the numeric value of the id.
    #[inline(always)]
    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

type Constructor = Box<dyn Fn() -> Box<dyn Any>>;
type CopyConstructor = Box<dyn Fn(&dyn Any) -> Option<Box<dyn Any>>>;

/// Metadata of a user-registered value kind.
///
/// A kind provides generic construction of its values: a default constructor
/// and a copy constructor working on type-erased values. Destruction is the
/// value's own [Drop].
pub struct KindInfo {
    id: KindId,
    name: CompactString,
    construct: Constructor,
    copy: CopyConstructor,
}

impl Debug for KindInfo {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("KindInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl KindInfo {
    /// The id of the kind.
    #[inline(always)]
    pub fn id(&self) -> KindId {
        self.id
    }

    /// The native type name of the kind.
    #[inline(always)]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Creates a default value of the kind.
    #[inline(always)]
    pub fn construct(&self) -> Box<dyn Any> {
        (self.construct)()
    }

    /// Creates a copy of the value. Returns None if the value does not belong
    /// to this kind.
    #[inline(always)]
    pub fn copy(&self, value: &dyn Any) -> Option<Box<dyn Any>> {
        (self.copy)(value)
    }
}

/// A registry of user value kinds.
///
/// Registration is idempotent by name: registering a kind under a name that
/// is already registered returns the existing id.
#[derive(Default)]
pub struct KindRegistry {
    kinds: RefCell<Vec<Rc<KindInfo>>>,
    by_name: RefCell<AHashMap<CompactString, KindId>>,
}

impl Debug for KindRegistry {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.debug_list().entries(self.kinds.borrow().iter()).finish()
    }
}

impl KindRegistry {
    /// Creates an empty registry.
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a Rust type as a native value kind under the specified
    /// native type name.
    #[inline]
    pub fn register<T: Any + Clone + Default>(&self, name: &str) -> KindId {
        self.register_with(
            name,
            || Box::new(T::default()),
            |value| {
                value
                    .downcast_ref::<T>()
                    .map(|value| Box::new(value.clone()) as Box<dyn Any>)
            },
        )
    }

    /// Registers a native value kind with explicit generic constructors.
    pub fn register_with(
        &self,
        name: &str,
        construct: impl Fn() -> Box<dyn Any> + 'static,
        copy: impl Fn(&dyn Any) -> Option<Box<dyn Any>> + 'static,
    ) -> KindId {
        if let Some(id) = self.by_name.borrow().get(name) {
            return *id;
        }

        let mut kinds = self.kinds.borrow_mut();

        let id = KindId(NonZeroU32::MIN.saturating_add(kinds.len() as u32));

        kinds.push(Rc::new(KindInfo {
            id,
            name: CompactString::from(name),
            construct: Box::new(construct),
            copy: Box::new(copy),
        }));

        let _ = self
            .by_name
            .borrow_mut()
            .insert(CompactString::from(name), id);

        id
    }

    /// Returns the metadata of the registered kind.
    #[inline]
    pub fn get(&self, id: KindId) -> Option<Rc<KindInfo>> {
        self.kinds.borrow().get(id.get() as usize - 1).cloned()
    }

    /// Looks up a registered kind by the native type name.
    #[inline]
    pub fn find(&self, name: &str) -> Option<KindId> {
        self.by_name.borrow().get(name).copied()
    }

    /// Resolves the native type name into a built-in, user, or unknown kind.
    pub fn resolve(&self, name: &str) -> ValueKind {
        if let Some(kind) = ValueKind::builtin(name) {
            return kind;
        }

        match self.find(name) {
            Some(id) => ValueKind::User(id),
            None => ValueKind::Unknown,
        }
    }

    /// Returns the number of registered kinds.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.kinds.borrow().len()
    }

    /// Returns true if no kinds are registered.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
