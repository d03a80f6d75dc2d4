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
    fmt::{Debug, Formatter},
    num::NonZeroUsize,
    rc::{Rc, Weak},
};

use compact_str::CompactString;

use crate::runtime::{KindId, ScriptValue};

/// A reference-counted object of the native object system.
///
/// Managed objects know their runtime class, and they may belong to a parent
/// object in the native ownership graph. The bridge tracks managed objects
/// through weak references: when the native side drops the last strong
/// reference, all wrappers of the object observe that the object is gone.
pub trait ManagedObject: Any {
    /// The name of the most derived native class of this object.
    fn class_name(&self) -> &str;

    /// Returns true if the object currently belongs to a parent in the native
    /// ownership graph.
    ///
    /// The bridge never destroys objects that have a parent.
    #[inline(always)]
    fn has_parent(&self) -> bool {
        false
    }

    /// Called when the bridge destroys the object.
    ///
    /// The bridge drops its own strong reference right after this call.
    #[inline(always)]
    fn dispose(&self) {}

    /// Returns a type-erased reference to the object.
    fn as_any(&self) -> &dyn Any;
}

/// A strong reference to a [ManagedObject].
#[derive(Clone)]
pub struct ManagedRef(Rc<dyn ManagedObject>);

impl Debug for ManagedRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!(
            "{}@{:#x}",
            self.0.class_name(),
            self.address()
        ))
    }
}

impl PartialEq for ManagedRef {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for ManagedRef {}

impl From<Rc<dyn ManagedObject>> for ManagedRef {
    #[inline(always)]
    fn from(value: Rc<dyn ManagedObject>) -> Self {
        Self(value)
    }
}

impl ManagedRef {
    /// Moves the object into a new reference-counted allocation.
    #[inline(always)]
    pub fn new<T: ManagedObject>(object: T) -> Self {
        Self(Rc::new(object))
    }

    /// The address of the object, which is the object's native identity.
    #[inline(always)]
    pub fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// The name of the most derived native class of the object.
    #[inline(always)]
    pub fn class_name(&self) -> &str {
        self.0.class_name()
    }

    /// Returns the underlying object.
    #[inline(always)]
    pub fn object(&self) -> &dyn ManagedObject {
        self.0.as_ref()
    }

    /// Returns the object as a concrete Rust type if the object has this
    /// type.
    #[inline(always)]
    pub fn downcast_ref<T: ManagedObject>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Returns a weak reference to the object.
    #[inline(always)]
    pub fn downgrade(&self) -> Weak<dyn ManagedObject> {
        Rc::downgrade(&self.0)
    }

    /// Returns the inner reference-counted pointer.
    #[inline(always)]
    pub fn into_rc(self) -> Rc<dyn ManagedObject> {
        self.0
    }

    /// Returns the number of strong references to the object.
    #[inline(always)]
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

/// A pointer to a plain native value that has no liveness tracking of its
/// own.
///
/// Opaque pointers allocated by the [NativeHeap](crate::runtime::NativeHeap)
/// carry a non-zero generation number. The heap increments the generation of
/// an address whenever the address is reused, so the bridge can tell a stale
/// pointer from a pointer to a new object that occupies the same address.
///
/// Pointers created with [OpaquePtr::foreign] have generation zero and are
/// untracked: the bridge cannot detect that such an object was destroyed and
/// another one was allocated at the same address.
///
/// The offset component is the byte offset of a base class subobject within
/// the object. The bridge adjusts it when it passes the pointer to a native
/// function that expects a base class.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct OpaquePtr {
    address: NonZeroUsize,
    generation: u32,
    offset: isize,
}

impl OpaquePtr {
    /// Creates an untracked pointer to an object that the bridge's heap does
    /// not manage.
    #[inline(always)]
    pub const fn foreign(address: NonZeroUsize) -> Self {
        Self {
            address,
            generation: 0,
            offset: 0,
        }
    }

    #[inline(always)]
    pub(crate) const fn tracked(address: NonZeroUsize, generation: u32) -> Self {
        Self {
            address,
            generation,
            offset: 0,
        }
    }

    /// The address of the complete object.
    #[inline(always)]
    pub const fn address(&self) -> NonZeroUsize {
        self.address
    }

    /// The allocation generation of the address, or zero for untracked
    /// pointers.
    #[inline(always)]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// The byte offset of the subobject this pointer refers to.
    #[inline(always)]
    pub const fn offset(&self) -> isize {
        self.offset
    }

    /// Returns true if the pointer is allocated by the bridge's heap.
    #[inline(always)]
    pub const fn is_tracked(&self) -> bool {
        self.generation != 0
    }

    #[inline(always)]
    pub(crate) const fn with_offset(self, offset: isize) -> Self {
        Self {
            address: self.address,
            generation: self.generation,
            offset,
        }
    }
}

/// The identity of a native object: either a managed object or an opaque
/// pointer.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum NativeIdentity {
    /// A reference-counted managed object.
    Managed(ManagedRef),

    /// A pointer to a plain native value.
    Opaque(OpaquePtr),
}

impl From<ManagedRef> for NativeIdentity {
    #[inline(always)]
    fn from(value: ManagedRef) -> Self {
        Self::Managed(value)
    }
}

impl From<OpaquePtr> for NativeIdentity {
    #[inline(always)]
    fn from(value: OpaquePtr) -> Self {
        Self::Opaque(value)
    }
}

impl NativeIdentity {
    /// Returns the key under which the bridge's identity map stores the
    /// wrapper of this object.
    ///
    /// Base class views of the same object share the key.
    #[inline]
    pub fn key(&self) -> IdentityKey {
        match self {
            Self::Managed(object) => IdentityKey::Managed(object.address()),
            Self::Opaque(pointer) => IdentityKey::Opaque(pointer.address().get()),
        }
    }

    /// Returns the opaque pointer if this identity is an opaque pointer.
    #[inline(always)]
    pub fn as_opaque(&self) -> Option<OpaquePtr> {
        match self {
            Self::Opaque(pointer) => Some(*pointer),
            Self::Managed(_) => None,
        }
    }

    /// Returns the managed object if this identity is a managed object.
    #[inline(always)]
    pub fn as_managed(&self) -> Option<&ManagedRef> {
        match self {
            Self::Managed(object) => Some(object),
            Self::Opaque(_) => None,
        }
    }
}

/// A key of the identity map.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum IdentityKey {
    /// The address of a managed object.
    Managed(usize),

    /// The address of an opaque object.
    Opaque(usize),
}

/// A native value of a user-registered value kind.
pub struct BoxedValue {
    kind: KindId,
    value: Box<dyn Any>,
}

impl Debug for BoxedValue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_tuple("BoxedValue")
            .field(&self.kind)
            .finish()
    }
}

impl BoxedValue {
    /// Boxes the value of the specified kind.
    #[inline(always)]
    pub fn new<T: Any>(kind: KindId, value: T) -> Self {
        Self {
            kind,
            value: Box::new(value),
        }
    }

    /// Wraps an already boxed value of the specified kind.
    #[inline(always)]
    pub fn from_box(kind: KindId, value: Box<dyn Any>) -> Self {
        Self { kind, value }
    }

    /// The kind of the value.
    #[inline(always)]
    pub fn kind(&self) -> KindId {
        self.kind
    }

    /// Returns the value as a concrete Rust type if the value has this type.
    #[inline(always)]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Returns the type-erased value.
    #[inline(always)]
    pub fn as_any(&self) -> &dyn Any {
        self.value.as_ref()
    }

    /// Unwraps the type-erased box.
    #[inline(always)]
    pub fn into_inner(self) -> Box<dyn Any> {
        self.value
    }
}

/// A value in the native representation.
///
/// The bridge writes NativeValues into the argument slots of a
/// [native call](crate::reflect::MetaCall), and the native side writes its
/// result into the return slot the same way.
#[derive(Default, Debug)]
pub enum NativeValue {
    /// No value. Also the initial content of a return slot of a
    /// void-returning function.
    #[default]
    Void,

    /// A boolean.
    Bool(bool),

    /// An 8-bit signed integer (also a C character).
    I8(i8),

    /// An 8-bit unsigned integer.
    U8(u8),

    /// A 16-bit signed integer.
    I16(i16),

    /// A 16-bit unsigned integer.
    U16(u16),

    /// A 32-bit signed integer.
    I32(i32),

    /// A 32-bit unsigned integer.
    U32(u32),

    /// A 64-bit signed integer.
    I64(i64),

    /// A 64-bit unsigned integer.
    U64(u64),

    /// A single-precision float.
    F32(f32),

    /// A double-precision float.
    F64(f64),

    /// A Unicode scalar value.
    Char(char),

    /// A null-terminated C string. None stands for the null pointer.
    CString(Option<CompactString>),

    /// A text string.
    Text(String),

    /// A byte array.
    Bytes(Vec<u8>),

    /// A list of text strings.
    TextList(Vec<String>),

    /// A list of arbitrary values.
    List(Vec<NativeValue>),

    /// A map from text keys to arbitrary values.
    Map(BTreeMap<String, NativeValue>),

    /// A generic "any value" container.
    Any(Box<NativeValue>),

    /// A pointer (or a reference) to a native object. None stands for the
    /// null pointer.
    Pointer(Option<NativeIdentity>),

    /// A list of pointers to native objects of the same declared class.
    PointerList(Vec<Option<NativeIdentity>>),

    /// A scripting value passed through to the native side as is.
    Script(ScriptValue),

    /// A value of a user-registered value kind.
    Boxed(BoxedValue),

    /// A return slot located inside a heap object. The native side writes its
    /// [boxed](Self::Boxed) result into the object.
    Place(OpaquePtr),
}

impl PartialEq for NativeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Void, Self::Void) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::I8(a), Self::I8(b)) => a == b,
            (Self::U8(a), Self::U8(b)) => a == b,
            (Self::I16(a), Self::I16(b)) => a == b,
            (Self::U16(a), Self::U16(b)) => a == b,
            (Self::I32(a), Self::I32(b)) => a == b,
            (Self::U32(a), Self::U32(b)) => a == b,
            (Self::I64(a), Self::I64(b)) => a == b,
            (Self::U64(a), Self::U64(b)) => a == b,
            (Self::F32(a), Self::F32(b)) => a == b,
            (Self::F64(a), Self::F64(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::CString(a), Self::CString(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::TextList(a), Self::TextList(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Any(a), Self::Any(b)) => a == b,
            (Self::Pointer(a), Self::Pointer(b)) => a == b,
            (Self::PointerList(a), Self::PointerList(b)) => a == b,
            (Self::Script(a), Self::Script(b)) => a == b,
            (Self::Boxed(a), Self::Boxed(b)) => std::ptr::eq(a.as_any(), b.as_any()),
            (Self::Place(a), Self::Place(b)) => a == b,
            _ => false,
        }
    }
}

impl NativeValue {
    /// Returns true if the value is [Void](Self::Void).
    #[inline(always)]
    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// Returns the value as a 64-bit signed integer if the value is an
    /// integer that fits this range.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(value) => Some(*value as i64),
            Self::I8(value) => Some(*value as i64),
            Self::U8(value) => Some(*value as i64),
            Self::I16(value) => Some(*value as i64),
            Self::U16(value) => Some(*value as i64),
            Self::I32(value) => Some(*value as i64),
            Self::U32(value) => Some(*value as i64),
            Self::I64(value) => Some(*value),
            Self::U64(value) => i64::try_from(*value).ok(),
            _ => None,
        }
    }

    /// Returns the value as a double-precision float if the value is
    /// a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F32(value) => Some(*value as f64),
            Self::F64(value) => Some(*value),
            Self::U64(value) => Some(*value as f64),
            other => other.as_i64().map(|value| value as f64),
        }
    }

    /// Returns the value as a string slice if the value is textual.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            Self::CString(Some(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the pointer's identity if the value is a non-null pointer.
    #[inline]
    pub fn as_pointer(&self) -> Option<&NativeIdentity> {
        match self {
            Self::Pointer(Some(identity)) => Some(identity),
            _ => None,
        }
    }

    /// Returns a short name of the value's variant for diagnostics.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool(_) => "bool",
            Self::I8(_) => "i8",
            Self::U8(_) => "u8",
            Self::I16(_) => "i16",
            Self::U16(_) => "u16",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Char(_) => "char",
            Self::CString(_) => "c string",
            Self::Text(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::TextList(_) => "string list",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Any(_) => "any",
            Self::Pointer(_) => "pointer",
            Self::PointerList(_) => "pointer list",
            Self::Script(_) => "script value",
            Self::Boxed(_) => "boxed value",
            Self::Place(_) => "place",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{any::Any, num::NonZeroUsize};

    use crate::runtime::{
        IdentityKey,
        ManagedObject,
        ManagedRef,
        NativeIdentity,
        NativeValue,
        OpaquePtr,
    };

    struct Button;

    impl ManagedObject for Button {
        fn class_name(&self) -> &str {
            "Button"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_identity_keys() {
        let button = ManagedRef::new(Button);
        let same = button.clone();

        assert_eq!(
            NativeIdentity::from(button.clone()).key(),
            NativeIdentity::from(same).key(),
        );
        assert!(button.downcast_ref::<Button>().is_some());

        let address = NonZeroUsize::new(0x40).unwrap();
        let base = OpaquePtr::foreign(address);
        let view = base.with_offset(8);

        assert_ne!(base, view);
        assert_eq!(
            NativeIdentity::from(base).key(),
            NativeIdentity::from(view).key(),
        );
        assert_eq!(
            NativeIdentity::from(view).key(),
            IdentityKey::Opaque(0x40)
        );
        assert!(!base.is_tracked());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(NativeValue::U8(200).as_i64(), Some(200));
        assert_eq!(NativeValue::U64(u64::MAX).as_i64(), None);
        assert_eq!(NativeValue::F32(1.5).as_f64(), Some(1.5));
        assert_eq!(NativeValue::Text(String::from("a")).as_str(), Some("a"));
        assert_eq!(NativeValue::CString(None).as_str(), None);
        assert!(NativeValue::default().is_void());
    }
}
