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
    cell::{Cell, OnceCell, RefCell},
    fmt::{Debug, Display, Formatter},
    rc::Rc,
};

use ahash::AHashMap;
use compact_str::CompactString;
use log::warn;

use crate::{
    reflect::{EnumType, ExtensionProvider, MemberInfo, ProviderSource, ReflectiveDescriptor, SlotInfo},
    runtime::{NativeHeap, NativeIdentity},
};

/// An index of a [ClassInfo] in its [ClassRegistry].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ClassId(u32);

impl ClassId {
    #[inline(always)]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A link from a class to one of its base classes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ParentLink {
    /// The base class.
    pub parent: ClassId,

    /// The byte offset of the base class subobject within the derived class.
    pub offset: isize,
}

/// A result of a [DowncastProbe].
#[derive(Clone, Debug)]
pub struct Downcast {
    /// The name of the more specific class of the object.
    pub class_name: CompactString,

    /// The pointer to the object adjusted for the more specific class.
    pub identity: NativeIdentity,
}

/// A handler that discovers the most derived class of an object referred to
/// by a base class pointer.
///
/// The native side uses probes when its factories return base class
/// pointers that the reflective system cannot disambiguate statically.
pub trait DowncastProbe {
    /// Returns the more specific class of the object, or None if the probe
    /// does not recognize the object.
    fn probe(&self, heap: &NativeHeap, object: &NativeIdentity) -> Option<Downcast>;
}

impl<F> DowncastProbe for F
where
    F: Fn(&NativeHeap, &NativeIdentity) -> Option<Downcast>,
{
    #[inline(always)]
    fn probe(&self, heap: &NativeHeap, object: &NativeIdentity) -> Option<Downcast> {
        self(heap, object)
    }
}

struct ProviderSlot {
    source: ProviderSource,
    instance: OnceCell<Rc<ExtensionProvider>>,
}

/// Everything the bridge knows about one native class.
///
/// There is at most one ClassInfo per class name within a
/// [ClassRegistry]. ClassInfos are never removed from the registry, and
/// their registrations (parents, providers) only grow.
///
/// The member cache of the class is filled by the member lookup
/// (see [Bridge::resolve_member](crate::Bridge::resolve_member)).
pub struct ClassInfo {
    id: ClassId,
    name: CompactString,
    managed: Cell<bool>,
    descriptor: RefCell<Option<Rc<ReflectiveDescriptor>>>,
    parents: RefCell<Vec<ParentLink>>,
    providers: RefCell<Vec<ProviderSlot>>,
    probes: RefCell<Vec<Rc<dyn DowncastProbe>>>,
    members: RefCell<AHashMap<CompactString, MemberInfo>>,
    enum_types: RefCell<Option<Rc<[Rc<EnumType>]>>>,
    constructors: RefCell<Option<Option<Rc<SlotInfo>>>>,
}

impl Debug for ClassInfo {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ClassInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("managed", &self.managed.get())
            .field("descriptor", &self.descriptor.borrow().is_some())
            .field("parents", &self.parents.borrow())
            .field("providers", &self.providers.borrow().len())
            .field("cached_members", &self.members.borrow().len())
            .finish()
    }
}

impl Display for ClassInfo {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.name)
    }
}

impl ClassInfo {
    fn new(id: ClassId, name: &str) -> Self {
        Self {
            id,
            name: CompactString::from(name),
            managed: Cell::new(false),
            descriptor: RefCell::new(None),
            parents: RefCell::new(Vec::new()),
            providers: RefCell::new(Vec::new()),
            probes: RefCell::new(Vec::new()),
            members: RefCell::new(AHashMap::new()),
            enum_types: RefCell::new(None),
            constructors: RefCell::new(None),
        }
    }

    /// The index of the class in its registry.
    #[inline(always)]
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// The native class name.
    #[inline(always)]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns true if objects of this class are reference-counted managed
    /// objects.
    #[inline(always)]
    pub fn is_managed(&self) -> bool {
        self.managed.get()
    }

    /// Returns the reflective descriptor of the class, if the native side
    /// provided one.
    #[inline]
    pub fn descriptor(&self) -> Option<Rc<ReflectiveDescriptor>> {
        self.descriptor.borrow().clone()
    }

    /// Returns the links to the direct base classes in registration order.
    #[inline]
    pub fn parents(&self) -> Vec<ParentLink> {
        self.parents.borrow().clone()
    }

    /// Returns the extension providers of this class only, instantiating the
    /// lazily registered ones.
    pub fn providers(&self) -> Vec<Rc<ExtensionProvider>> {
        // Factories run outside of the borrow, they may register types.
        let pending = self
            .providers
            .borrow()
            .iter()
            .map(|slot| (slot.instance.get().cloned(), slot.source.clone()))
            .collect::<Vec<_>>();

        let mut result = Vec::with_capacity(pending.len());

        for (index, (instance, source)) in pending.into_iter().enumerate() {
            let provider = match instance {
                Some(provider) => provider,

                None => {
                    let provider = match source {
                        ProviderSource::Ready(provider) => provider,
                        ProviderSource::Lazy(factory) => Rc::new(factory()),
                    };

                    let providers = self.providers.borrow();

                    match providers.get(index) {
                        Some(slot) => slot.instance.get_or_init(|| provider).clone(),
                        None => provider,
                    }
                }
            };

            result.push(provider);
        }

        result
    }

    /// Returns the downcast probes registered for this class.
    #[inline]
    pub fn probes(&self) -> Vec<Rc<dyn DowncastProbe>> {
        self.probes.borrow().clone()
    }

    #[inline(always)]
    pub(crate) fn mark_managed(&self) {
        self.managed.set(true);
    }

    pub(crate) fn set_descriptor(&self, descriptor: Rc<ReflectiveDescriptor>) -> bool {
        let mut current = self.descriptor.borrow_mut();

        if let Some(current) = current.as_ref() {
            if Rc::ptr_eq(current, &descriptor) {
                return false;
            }
        }

        *current = Some(descriptor);

        true
    }

    // A class links to each base class once. The first registered offset
    // stays in effect.
    pub(crate) fn add_parent(&self, link: ParentLink) -> bool {
        let mut parents = self.parents.borrow_mut();

        if let Some(known) = parents.iter().find(|known| known.parent == link.parent) {
            if known.offset != link.offset {
                warn!(
                    "'{}' base class is already registered with offset {}, offset {} ignored",
                    self.name, known.offset, link.offset,
                );
            }

            return false;
        }

        parents.push(link);

        true
    }

    pub(crate) fn add_provider(&self, source: ProviderSource) -> bool {
        let mut providers = self.providers.borrow_mut();

        if providers.iter().any(|slot| slot.source.same_as(&source)) {
            return false;
        }

        providers.push(ProviderSlot {
            source,
            instance: OnceCell::new(),
        });

        true
    }

    #[inline]
    pub(crate) fn add_probe(&self, probe: Rc<dyn DowncastProbe>) {
        self.probes.borrow_mut().push(probe);
    }

    #[inline]
    pub(crate) fn cached_member(&self, name: &str) -> Option<MemberInfo> {
        self.members.borrow().get(name).cloned()
    }

    #[inline]
    pub(crate) fn cache_member(&self, name: &str, member: MemberInfo) {
        let _ = self
            .members
            .borrow_mut()
            .insert(CompactString::from(name), member);
    }

    /// Returns the number of cached lookup results, including the cached
    /// misses.
    #[inline(always)]
    pub fn cached_members(&self) -> usize {
        self.members.borrow().len()
    }

    #[inline]
    pub(crate) fn cached_enum_types(&self) -> Option<Rc<[Rc<EnumType>]>> {
        self.enum_types.borrow().clone()
    }

    #[inline]
    pub(crate) fn cache_enum_types(&self, enum_types: Rc<[Rc<EnumType>]>) {
        *self.enum_types.borrow_mut() = Some(enum_types);
    }

    #[inline]
    pub(crate) fn cached_constructors(&self) -> Option<Option<Rc<SlotInfo>>> {
        self.constructors.borrow().clone()
    }

    #[inline]
    pub(crate) fn cache_constructors(&self, constructors: Option<Rc<SlotInfo>>) {
        *self.constructors.borrow_mut() = Some(constructors);
    }

    /// Drops all cached lookup results of this class.
    pub(crate) fn clear_cache(&self) {
        self.members.borrow_mut().clear();
        *self.enum_types.borrow_mut() = None;
        *self.constructors.borrow_mut() = None;
    }
}

/// A registry of all native classes known to a bridge.
///
/// ```
/// use ad_astra_bridge::reflect::ClassRegistry;
///
/// let registry = ClassRegistry::new();
///
/// let widget = registry.lookup_or_create("Widget");
///
/// assert_eq!(registry.lookup_or_create("Widget").id(), widget.id());
/// assert_eq!(registry.len(), 1);
/// ```
#[derive(Default)]
pub struct ClassRegistry {
    classes: RefCell<Vec<Rc<ClassInfo>>>,
    by_name: RefCell<AHashMap<CompactString, ClassId>>,
}

impl Debug for ClassRegistry {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_list()
            .entries(self.classes.borrow().iter().map(|class| class.name.clone()))
            .finish()
    }
}

impl ClassRegistry {
    /// Creates an empty registry.
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the class with the specified name, creating an empty entry if
    /// the class is unknown.
    pub fn lookup_or_create(&self, name: &str) -> Rc<ClassInfo> {
        if let Some(class) = self.find(name) {
            return class;
        }

        let mut classes = self.classes.borrow_mut();

        let id = ClassId(classes.len() as u32);
        let class = Rc::new(ClassInfo::new(id, name));

        classes.push(class.clone());

        let _ = self
            .by_name
            .borrow_mut()
            .insert(CompactString::from(name), id);

        class
    }

    /// Returns the class with the specified name if the class is known.
    #[inline]
    pub fn find(&self, name: &str) -> Option<Rc<ClassInfo>> {
        let id = *self.by_name.borrow().get(name)?;

        self.get(id)
    }

    /// Returns the class by its id.
    #[inline]
    pub fn get(&self, id: ClassId) -> Option<Rc<ClassInfo>> {
        self.classes.borrow().get(id.index()).cloned()
    }

    /// Returns all known classes in registration order.
    #[inline]
    pub fn classes(&self) -> Vec<Rc<ClassInfo>> {
        self.classes.borrow().clone()
    }

    /// Returns the number of known classes.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.classes.borrow().len()
    }

    /// Returns true if no classes are known.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        rc::Rc,
    };

    use crate::{
        dispatch::NativeCall,
        reflect::{ClassRegistry, ExtensionProvider, ParentLink, ProviderSource},
        runtime::NativeResult,
    };

    fn noop(_: &mut NativeCall<'_>) -> NativeResult<()> {
        Ok(())
    }

    #[test]
    fn test_idempotent_links() {
        let registry = ClassRegistry::new();

        let base = registry.lookup_or_create("Base");
        let derived = registry.lookup_or_create("Derived");

        let link = ParentLink {
            parent: base.id(),
            offset: 16,
        };

        assert!(derived.add_parent(link));
        assert!(!derived.add_parent(link));
        assert_eq!(derived.parents().len(), 1);

        assert!(!derived.add_parent(ParentLink {
            parent: base.id(),
            offset: 32,
        }));

        assert_eq!(derived.parents(), vec![link]);

        let provider = ProviderSource::from(ExtensionProvider::new("DerivedExt", noop));

        assert!(derived.add_provider(provider.clone()));
        assert!(!derived.add_provider(provider));
        assert_eq!(derived.providers().len(), 1);
    }

    #[test]
    fn test_lazy_provider() {
        let registry = ClassRegistry::new();
        let class = registry.lookup_or_create("Widget");

        let created = Rc::new(Cell::new(0));

        let counter = created.clone();

        let _ = class.add_provider(ProviderSource::lazy(move || {
            counter.set(counter.get() + 1);
            ExtensionProvider::new("WidgetExt", noop)
        }));

        assert_eq!(created.get(), 0);

        let first = class.providers();
        let second = class.providers();

        assert_eq!(created.get(), 1);
        assert!(Rc::ptr_eq(&first[0], &second[0]));
    }
}
