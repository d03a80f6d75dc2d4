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

use crate::{
    dispatch::NativeCall,
    runtime::NativeResult,
    wrapper::OwnershipProbe,
};

/// The generic native entry point.
///
/// The native side implements one MetaCall per reflective descriptor (or per
/// extension provider) and dispatches by the numeric member index that
/// [NativeCall::index] reports. This is the only calling convention the
/// bridge uses, regardless of the member's signature.
///
/// The trait is implemented for closures:
///
/// ```
/// use ad_astra_bridge::{
///     dispatch::NativeCall,
///     reflect::MetaCall,
///     runtime::{NativeResult, NativeValue},
/// };
///
/// let entry = |call: &mut NativeCall<'_>| -> NativeResult<()> {
///     match call.index() {
///         0 => call.set_return(NativeValue::I32(42)),
///         _ => Ok(()),
///     }
/// };
///
/// fn accepts(_: &dyn MetaCall) {}
///
/// accepts(&entry);
/// ```
pub trait MetaCall {
    /// Executes the member identified by `call.index()` and the call kind.
    fn meta_call(&self, call: &mut NativeCall<'_>) -> NativeResult<()>;
}

impl<F> MetaCall for F
where
    F: Fn(&mut NativeCall<'_>) -> NativeResult<()>,
{
    #[inline(always)]
    fn meta_call(&self, call: &mut NativeCall<'_>) -> NativeResult<()> {
        self(call)
    }
}

/// A kind of a [native call](NativeCall).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CallKind {
    /// Invocation of a method, an extension method, a constructor, or
    /// a destructor.
    Invoke,

    /// Reading of a property. The native side writes the property value into
    /// the return slot.
    ReadProperty,

    /// Writing of a property. The new value is in the argument slot 1.
    WriteProperty,
}

/// A kind of a reflective method.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MethodKind {
    /// An ordinary invokable method.
    Method,

    /// A method that can be connected to signals.
    Slot,

    /// A signal. Calling a signal emits it.
    Signal,
}

/// A reflective method of a native class.
#[derive(Clone, Debug)]
pub struct MethodMeta {
    index: u32,
    name: CompactString,
    kind: MethodKind,
    result: CompactString,
    params: Vec<CompactString>,
}

impl MethodMeta {
    /// Creates a void method without parameters. The `index` is the number
    /// the native entry point receives when the method is called.
    #[inline]
    pub fn new(index: u32, name: &str) -> Self {
        Self {
            index,
            name: CompactString::from(name),
            kind: MethodKind::Method,
            result: CompactString::from("void"),
            params: Vec::new(),
        }
    }

    /// Appends a parameter with the specified native type name.
    #[inline]
    pub fn param(mut self, type_name: &str) -> Self {
        self.params.push(CompactString::from(type_name));
        self
    }

    /// Sets the native type name of the result.
    #[inline]
    pub fn returns(mut self, type_name: &str) -> Self {
        self.result = CompactString::from(type_name);
        self
    }

    /// Sets the kind of the method.
    #[inline(always)]
    pub fn kind(mut self, kind: MethodKind) -> Self {
        self.kind = kind;
        self
    }

    #[inline(always)]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[inline(always)]
    pub fn method_kind(&self) -> MethodKind {
        self.kind
    }

    #[inline(always)]
    pub fn result(&self) -> &str {
        self.result.as_str()
    }

    #[inline(always)]
    pub fn params(&self) -> &[CompactString] {
        &self.params
    }
}

/// A reflective property of a native class.
#[derive(Clone, Debug)]
pub struct PropertyMeta {
    index: u32,
    name: CompactString,
    type_name: CompactString,
    writable: bool,
}

impl PropertyMeta {
    /// Creates a writable property.
    #[inline]
    pub fn new(index: u32, name: &str, type_name: &str) -> Self {
        Self {
            index,
            name: CompactString::from(name),
            type_name: CompactString::from(type_name),
            writable: true,
        }
    }

    /// Marks the property as read-only.
    #[inline(always)]
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    #[inline(always)]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[inline(always)]
    pub fn type_name(&self) -> &str {
        self.type_name.as_str()
    }

    #[inline(always)]
    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

/// A native enum type declared by a class or by an extension provider.
#[derive(Clone, Debug)]
pub struct EnumMeta {
    name: CompactString,
    keys: Vec<(CompactString, i64)>,
    flags: bool,
}

impl EnumMeta {
    /// Creates an enum without keys.
    #[inline]
    pub fn new(name: &str) -> Self {
        Self {
            name: CompactString::from(name),
            keys: Vec::new(),
            flags: false,
        }
    }

    /// Appends a key.
    #[inline]
    pub fn key(mut self, name: &str, value: i64) -> Self {
        self.keys.push((CompactString::from(name), value));
        self
    }

    /// Marks the enum as a set of bit flags.
    #[inline(always)]
    pub fn flags(mut self) -> Self {
        self.flags = true;
        self
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[inline(always)]
    pub fn keys(&self) -> &[(CompactString, i64)] {
        &self.keys
    }

    #[inline(always)]
    pub fn is_flags(&self) -> bool {
        self.flags
    }
}

/// The native side's own introspection table of a managed class.
///
/// The descriptor lists properties, methods, and enums of the class. The
/// optional parent descriptor contributes the inherited members: lookups
/// walk the descriptor chain from the most derived class to the root.
pub struct ReflectiveDescriptor {
    class_name: CompactString,
    parent: Option<Rc<ReflectiveDescriptor>>,
    properties: Vec<PropertyMeta>,
    methods: Vec<MethodMeta>,
    enums: Vec<EnumMeta>,
    entry: Rc<dyn MetaCall>,
}

impl Debug for ReflectiveDescriptor {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ReflectiveDescriptor")
            .field("class_name", &self.class_name)
            .field(
                "parent",
                &self.parent.as_ref().map(|parent| parent.class_name()),
            )
            .field("properties", &self.properties)
            .field("methods", &self.methods)
            .field("enums", &self.enums)
            .finish_non_exhaustive()
    }
}

impl ReflectiveDescriptor {
    /// Creates a descriptor without members.
    #[inline]
    pub fn new(class_name: &str, entry: impl MetaCall + 'static) -> Self {
        Self {
            class_name: CompactString::from(class_name),
            parent: None,
            properties: Vec::new(),
            methods: Vec::new(),
            enums: Vec::new(),
            entry: Rc::new(entry),
        }
    }

    /// Sets the descriptor of the base class.
    #[inline(always)]
    pub fn parent(mut self, parent: Rc<ReflectiveDescriptor>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Appends a property.
    #[inline(always)]
    pub fn property(mut self, property: PropertyMeta) -> Self {
        self.properties.push(property);
        self
    }

    /// Appends a method.
    #[inline(always)]
    pub fn method(mut self, method: MethodMeta) -> Self {
        self.methods.push(method);
        self
    }

    /// Appends an enum.
    #[inline(always)]
    pub fn enumeration(mut self, enumeration: EnumMeta) -> Self {
        self.enums.push(enumeration);
        self
    }

    /// The name of the described class.
    #[inline(always)]
    pub fn class_name(&self) -> &str {
        self.class_name.as_str()
    }

    /// The descriptor of the base class.
    #[inline(always)]
    pub fn parent_descriptor(&self) -> Option<&Rc<ReflectiveDescriptor>> {
        self.parent.as_ref()
    }

    /// The properties declared by this class only.
    #[inline(always)]
    pub fn properties(&self) -> &[PropertyMeta] {
        &self.properties
    }

    /// The methods declared by this class only.
    #[inline(always)]
    pub fn methods(&self) -> &[MethodMeta] {
        &self.methods
    }

    /// The enums declared by this class only.
    #[inline(always)]
    pub fn enums(&self) -> &[EnumMeta] {
        &self.enums
    }

    /// The native entry point of the class.
    #[inline(always)]
    pub fn entry(&self) -> &Rc<dyn MetaCall> {
        &self.entry
    }

    /// Iterates over this descriptor and its ancestors, the most derived
    /// first.
    pub fn chain(self: &Rc<Self>) -> impl Iterator<Item = &Rc<ReflectiveDescriptor>> {
        std::iter::successors(Some(self), |descriptor| descriptor.parent.as_ref())
    }

    /// Finds a property by name in this descriptor or its ancestors.
    pub fn find_property(
        self: &Rc<Self>,
        name: &str,
    ) -> Option<(&Rc<ReflectiveDescriptor>, &PropertyMeta)> {
        self.chain().find_map(|descriptor| {
            descriptor
                .properties
                .iter()
                .find(|property| property.name() == name)
                .map(|property| (descriptor, property))
        })
    }
}

/// A kind of an [extension method](ExtensionMethod).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ExtensionKind {
    /// A method called on an instance. The native entry point receives the
    /// instance pointer in the argument slot 1.
    Instance,

    /// A class-level function.
    Static,

    /// A constructor. The native entry point returns a pointer to the new
    /// object.
    Constructor,

    /// A destructor. The native entry point receives the pointer to the
    /// object in the argument slot 1.
    Destructor,
}

/// A method that an [ExtensionProvider] adds to a native class.
#[derive(Clone, Debug)]
pub struct ExtensionMethod {
    index: u32,
    name: CompactString,
    kind: ExtensionKind,
    result: CompactString,
    params: Vec<CompactString>,
}

impl ExtensionMethod {
    /// Creates an instance method.
    #[inline(always)]
    pub fn instance(index: u32, name: &str) -> Self {
        Self::with_kind(index, name, ExtensionKind::Instance)
    }

    /// Creates a class-level function.
    #[inline(always)]
    pub fn function(index: u32, name: &str) -> Self {
        Self::with_kind(index, name, ExtensionKind::Static)
    }

    /// Creates a constructor.
    #[inline(always)]
    pub fn constructor(index: u32) -> Self {
        Self::with_kind(index, "new", ExtensionKind::Constructor)
    }

    /// Creates a destructor.
    #[inline(always)]
    pub fn destructor(index: u32) -> Self {
        Self::with_kind(index, "delete", ExtensionKind::Destructor)
    }

    fn with_kind(index: u32, name: &str, kind: ExtensionKind) -> Self {
        Self {
            index,
            name: CompactString::from(name),
            kind,
            result: CompactString::from("void"),
            params: Vec::new(),
        }
    }

    /// Appends a parameter with the specified native type name.
    ///
    /// The instance parameter of instance methods and destructors is implicit
    /// and must not be listed.
    #[inline]
    pub fn param(mut self, type_name: &str) -> Self {
        self.params.push(CompactString::from(type_name));
        self
    }

    /// Sets the native type name of the result. Constructors ignore it.
    #[inline]
    pub fn returns(mut self, type_name: &str) -> Self {
        self.result = CompactString::from(type_name);
        self
    }

    #[inline(always)]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[inline(always)]
    pub fn extension_kind(&self) -> ExtensionKind {
        self.kind
    }

    #[inline(always)]
    pub fn result(&self) -> &str {
        self.result.as_str()
    }

    #[inline(always)]
    pub fn params(&self) -> &[CompactString] {
        &self.params
    }
}

/// An auxiliary object that supplies methods, constructors, a destructor,
/// and enums to a native class without modifying the class itself.
pub struct ExtensionProvider {
    name: CompactString,
    methods: Vec<ExtensionMethod>,
    enums: Vec<EnumMeta>,
    owner_probe: Option<Rc<dyn OwnershipProbe>>,
    entry: Rc<dyn MetaCall>,
}

impl Debug for ExtensionProvider {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ExtensionProvider")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .field("enums", &self.enums)
            .field("owner_probe", &self.owner_probe.is_some())
            .finish_non_exhaustive()
    }
}

impl ExtensionProvider {
    /// Creates a provider without members.
    #[inline]
    pub fn new(name: &str, entry: impl MetaCall + 'static) -> Self {
        Self {
            name: CompactString::from(name),
            methods: Vec::new(),
            enums: Vec::new(),
            owner_probe: None,
            entry: Rc::new(entry),
        }
    }

    /// Appends a method.
    #[inline(always)]
    pub fn method(mut self, method: ExtensionMethod) -> Self {
        self.methods.push(method);
        self
    }

    /// Appends an enum.
    #[inline(always)]
    pub fn enumeration(mut self, enumeration: EnumMeta) -> Self {
        self.enums.push(enumeration);
        self
    }

    /// Sets the probe that tells whether an object of the extended class has
    /// an owner on the native side.
    #[inline(always)]
    pub fn owner_probe(mut self, probe: impl OwnershipProbe + 'static) -> Self {
        self.owner_probe = Some(Rc::new(probe));
        self
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[inline(always)]
    pub fn methods(&self) -> &[ExtensionMethod] {
        &self.methods
    }

    #[inline(always)]
    pub fn enums(&self) -> &[EnumMeta] {
        &self.enums
    }

    #[inline(always)]
    pub fn probe(&self) -> Option<&Rc<dyn OwnershipProbe>> {
        self.owner_probe.as_ref()
    }

    #[inline(always)]
    pub fn entry(&self) -> &Rc<dyn MetaCall> {
        &self.entry
    }
}

/// A registration of an [ExtensionProvider].
///
/// A provider can be registered ready-made, or as a factory that the bridge
/// calls when the provider is needed for the first time.
#[derive(Clone)]
pub enum ProviderSource {
    /// A ready-made provider.
    Ready(Rc<ExtensionProvider>),

    /// A factory of the provider.
    Lazy(Rc<dyn Fn() -> ExtensionProvider>),
}

impl Debug for ProviderSource {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(provider) => Debug::fmt(provider, formatter),
            Self::Lazy(_) => formatter.write_str("ProviderSource::Lazy"),
        }
    }
}

impl From<ExtensionProvider> for ProviderSource {
    #[inline(always)]
    fn from(value: ExtensionProvider) -> Self {
        Self::Ready(Rc::new(value))
    }
}

impl ProviderSource {
    /// Creates a lazily instantiated provider source.
    #[inline(always)]
    pub fn lazy(factory: impl Fn() -> ExtensionProvider + 'static) -> Self {
        Self::Lazy(Rc::new(factory))
    }

    /// Returns true if both sources refer to the same provider or the same
    /// factory.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Ready(a), Self::Ready(b)) => Rc::ptr_eq(a, b),
            (Self::Lazy(a), Self::Lazy(b)) => {
                Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{
        dispatch::NativeCall,
        reflect::{MethodMeta, PropertyMeta, ReflectiveDescriptor},
        runtime::NativeResult,
    };

    fn noop(_: &mut NativeCall<'_>) -> NativeResult<()> {
        Ok(())
    }

    #[test]
    fn test_descriptor_chain() {
        let base = Rc::new(
            ReflectiveDescriptor::new("Object", noop)
                .property(PropertyMeta::new(0, "objectName", "String"))
                .method(MethodMeta::new(0, "deleteLater")),
        );

        let derived = Rc::new(
            ReflectiveDescriptor::new("Button", noop)
                .parent(base)
                .property(PropertyMeta::new(1, "text", "String")),
        );

        let names = derived
            .chain()
            .map(|descriptor| descriptor.class_name())
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["Button", "Object"]);

        let (owner, property) = derived.find_property("objectName").unwrap();

        assert_eq!(owner.class_name(), "Object");
        assert_eq!(property.index(), 0);
        assert!(derived.find_property("missing").is_none());
    }
}
