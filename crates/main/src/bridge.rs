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
    cell::{Cell, RefCell},
    fmt::{Debug, Formatter},
    rc::Rc,
};

use compact_str::{format_compact, CompactString};
use log::debug;

use crate::{
    convert::{ConversionHooks, ConversionMode, CustomConverter},
    dispatch::{SignalRegistry, MAX_ARGS},
    reflect::{
        lookup::MemberLookup,
        upcast::upcast_offset,
        ClassInfo,
        ClassRegistry,
        DowncastProbe,
        MemberInfo,
        ParamInfo,
        ParentLink,
        ProviderSource,
        ReflectiveDescriptor,
    },
    runtime::{
        KindId,
        KindRegistry,
        NativeHeap,
        NativeValue,
        RuntimeResult,
        ScriptValue,
        ValueStorage,
    },
    wrapper::WrapperRegistry,
};

/// A general configuration object of the [Bridge].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[non_exhaustive]
pub struct BridgeConfig {
    /// If set to true, a member name that ends with an underscore and has no
    /// match is looked up again without the underscore. This lets the
    /// scripting side reach native members whose names are keywords of the
    /// scripting language (`delete_` resolves to `delete`).
    ///
    /// The default value is true.
    pub strip_keyword_suffix: bool,

    /// If set to true, the permissive conversion accepts the integer `0` as
    /// the null pointer.
    ///
    /// The default value is true.
    pub zero_as_null: bool,

    /// The number of argument slots of a native call, the return slot
    /// included. Values above [MAX_ARGS] are clamped to MAX_ARGS.
    ///
    /// The default value is MAX_ARGS.
    pub max_arguments: usize,

    /// If set to true, wrappers of the objects allocated in the
    /// [NativeHeap] compare the allocation generation of the pointer in
    /// addition to the address. A wrapper whose object has been freed then
    /// never aliases a new object allocated at the same address.
    ///
    /// The default value is true.
    pub track_opaque_generations: bool,
}

impl Default for BridgeConfig {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeConfig {
    /// The default constructor for this configuration object.
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            strip_keyword_suffix: true,
            zero_as_null: true,
            max_arguments: MAX_ARGS,
            track_opaque_generations: true,
        }
    }
}

/// The numbers of scripting-to-native conversion attempts by mode.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct ConversionCounters {
    /// The number of strict conversion attempts.
    pub strict: usize,

    /// The number of permissive conversion attempts.
    pub permissive: usize,
}

/// The binding engine context.
///
/// The Bridge owns the class registry with its member caches, the registry
/// of user value kinds, the conversion hooks, the identity map of instance
/// wrappers, the value storage of native calls, and the heap of plain native
/// objects.
///
/// The object is a cheap-to-clone shared reference. Instance wrappers refer
/// back to the Bridge weakly: the wrappers that outlive the Bridge release
/// their objects without calling the native destructors.
#[derive(Clone)]
pub struct Bridge(pub(crate) Rc<BridgeInner>);

pub(crate) struct BridgeInner {
    pub(crate) config: BridgeConfig,
    pub(crate) classes: ClassRegistry,
    pub(crate) kinds: KindRegistry,
    pub(crate) hooks: ConversionHooks,
    pub(crate) wrappers: WrapperRegistry,
    pub(crate) storage: RefCell<ValueStorage>,
    pub(crate) heap: NativeHeap,
    pub(crate) signals: SignalRegistry,
    pub(crate) counters: Cell<ConversionCounters>,
}

impl Debug for Bridge {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Bridge")
            .field("config", &self.0.config)
            .field("classes", &self.0.classes.len())
            .field("kinds", &self.0.kinds.len())
            .field("wrappers", &self.wrapper_count())
            .field("heap", &self.0.heap.len())
            .field("connections", &self.connection_count())
            .finish_non_exhaustive()
    }
}

impl Default for Bridge {
    #[inline(always)]
    fn default() -> Self {
        Self::new(BridgeConfig::new())
    }
}

impl Bridge {
    /// Creates a Bridge without registered classes.
    pub fn new(config: BridgeConfig) -> Self {
        Self(Rc::new(BridgeInner {
            config,
            classes: ClassRegistry::new(),
            kinds: KindRegistry::new(),
            hooks: ConversionHooks::default(),
            wrappers: WrapperRegistry::default(),
            storage: RefCell::new(ValueStorage::new()),
            heap: NativeHeap::new(),
            signals: SignalRegistry::default(),
            counters: Cell::new(ConversionCounters::default()),
        }))
    }

    /// The configuration the Bridge was created with.
    #[inline(always)]
    pub fn config(&self) -> &BridgeConfig {
        &self.0.config
    }

    /// Registers a native class.
    ///
    /// The function links the class to its `parent` class with the byte
    /// offset of the parent subobject, and adds the extension `provider` to
    /// the class. Repeated registrations of the same links have no effect.
    ///
    /// Returns the class's metadata object.
    pub fn register_type(
        &self,
        name: &str,
        parent: Option<&str>,
        upcast_offset: isize,
        provider: Option<ProviderSource>,
    ) -> Rc<ClassInfo> {
        let class = self.0.classes.lookup_or_create(name);

        let mut changed = false;

        if let Some(parent) = parent {
            let parent = self.0.classes.lookup_or_create(parent);

            changed |= class.add_parent(ParentLink {
                parent: parent.id(),
                offset: upcast_offset,
            });
        }

        if let Some(provider) = provider {
            changed |= class.add_provider(provider);
        }

        if changed {
            self.invalidate(&class);
        }

        class
    }

    /// Registers the reflective descriptor of a managed class, together with
    /// the descriptors of its base classes.
    pub fn register_descriptor(&self, descriptor: Rc<ReflectiveDescriptor>) -> Rc<ClassInfo> {
        let class = self.0.classes.lookup_or_create(descriptor.class_name());

        class.mark_managed();

        let mut changed = class.set_descriptor(descriptor.clone());

        if let Some(parent) = descriptor.parent_descriptor() {
            let parent = self.register_descriptor(parent.clone());

            changed |= class.add_parent(ParentLink {
                parent: parent.id(),
                offset: 0,
            });
        }

        if changed {
            self.invalidate(&class);
        }

        class
    }

    /// Adds an extension provider to the class.
    pub fn register_provider(&self, class_name: &str, provider: ProviderSource) -> Rc<ClassInfo> {
        self.register_type(class_name, None, 0, Some(provider))
    }

    /// Registers a Rust type as a native value kind.
    ///
    /// The parameters of this type name are converted by value: the bridge
    /// copies the object out of the scripting instance, and moves the
    /// returned values into the heap.
    pub fn register_kind<T: Any + Clone + Default>(&self, name: &str) -> KindId {
        let known = self.0.kinds.find(name);

        let kind = self.0.kinds.register::<T>(name);

        if known.is_none() {
            self.invalidate_all();
        }

        kind
    }

    /// Overrides the conversions of the value kind in both directions.
    pub fn register_custom_converter(
        &self,
        kind: KindId,
        to_script: impl Fn(&Bridge, NativeValue) -> RuntimeResult<ScriptValue> + 'static,
        to_native: impl Fn(&Bridge, &ScriptValue, ConversionMode) -> RuntimeResult<NativeValue>
            + 'static,
    ) {
        self.0
            .hooks
            .set_converter(kind, CustomConverter::new(to_script, to_native));
    }

    /// Lets the permissive conversion build values of the kind from the
    /// values of the enum type.
    ///
    /// The `enum_name` is the scoped name of the enum type (`Scope::Name`).
    pub fn register_auto_coercion<T: Any>(
        &self,
        kind: KindId,
        enum_name: &str,
        build: impl Fn(i64) -> Option<T> + 'static,
    ) {
        self.0.hooks.set_coercion(
            kind,
            enum_name,
            Rc::new(move |value| build(value).map(|value| Box::new(value) as Box<dyn Any>)),
        );
    }

    /// Adds a downcast probe to the class.
    ///
    /// When the bridge wraps a plain native object under this class, it asks
    /// the probes for a more specific class of the object.
    pub fn register_downcast_probe(&self, class_name: &str, probe: impl DowncastProbe + 'static) {
        self.0
            .classes
            .lookup_or_create(class_name)
            .add_probe(Rc::new(probe));
    }

    /// Returns the class by name, if the class is known to the bridge.
    #[inline(always)]
    pub fn class(&self, name: &str) -> Option<Rc<ClassInfo>> {
        self.0.classes.find(name)
    }

    /// Returns the class by name, creating an empty class if the name is
    /// unknown.
    #[inline(always)]
    pub fn lookup_or_create(&self, name: &str) -> Rc<ClassInfo> {
        self.0.classes.lookup_or_create(name)
    }

    /// Finds the member of the class by name.
    ///
    /// The outcome is cached per class and name, including the
    /// [NotFound](MemberInfo::NotFound) outcome.
    #[inline(always)]
    pub fn resolve_member(&self, class: &Rc<ClassInfo>, name: &str) -> MemberInfo {
        self.lookup().member(class, name)
    }

    /// Drops the cached members of the class.
    pub fn clear_member_cache(&self, class: &ClassInfo) {
        debug!("member cache of '{}' cleared", class.name());

        class.clear_cache();
    }

    /// Parses the native type name in the context of the class. Enum names
    /// resolve against the class's own enums and scoped enum names.
    #[inline(always)]
    pub fn param(&self, class: &ClassInfo, type_name: &str) -> ParamInfo {
        self.lookup().param(class, type_name)
    }

    /// Returns true if the class is the named class, or inherits from it
    /// through the registered parent links.
    #[inline]
    pub fn inherits(&self, class: &ClassInfo, name: &str) -> bool {
        class.name() == name || upcast_offset(&self.0.classes, class, name).is_some()
    }

    /// Returns all member names the class resolves, sorted.
    #[inline(always)]
    pub fn member_names(&self, class: &ClassInfo) -> Vec<CompactString> {
        self.lookup().member_names(class)
    }

    /// Renders the signatures of the class's constructors, callable members,
    /// and properties.
    pub fn help(&self, class: &Rc<ClassInfo>) -> Vec<CompactString> {
        let mut lines = Vec::new();

        if let Some(constructors) = self.lookup().constructors(class) {
            lines.extend(constructors.overloads().map(|slot| slot.signature()));
        }

        for name in self.member_names(class) {
            match self.resolve_member(class, &name) {
                MemberInfo::Slot(slot) => {
                    lines.extend(slot.overloads().map(|slot| slot.signature()));
                }

                MemberInfo::Property(property) => {
                    let access = match property.is_writable() {
                        true => "",
                        false => " (read-only)",
                    };

                    lines.push(format_compact!(
                        "{}::{}: {}{access}",
                        class.name(),
                        property.name(),
                        property.param(),
                    ));
                }

                _ => (),
            }
        }

        lines
    }

    /// The heap of plain native objects.
    #[inline(always)]
    pub fn heap(&self) -> &NativeHeap {
        &self.0.heap
    }

    /// The registry of native value kinds.
    #[inline(always)]
    pub fn kinds(&self) -> &KindRegistry {
        &self.0.kinds
    }

    /// The number of values currently allocated in the value storage.
    ///
    /// Outside of native calls, the depth is always zero.
    #[inline(always)]
    pub fn storage_depth(&self) -> usize {
        self.0.storage.borrow().position().depth()
    }

    /// The largest number of values the value storage has held at once.
    #[inline(always)]
    pub fn storage_peak(&self) -> usize {
        self.0.storage.borrow().peak()
    }

    /// The conversion attempts made so far.
    #[inline(always)]
    pub fn counters(&self) -> ConversionCounters {
        self.0.counters.get()
    }

    /// Resets the conversion counters to zero.
    #[inline(always)]
    pub fn reset_counters(&self) {
        self.0.counters.set(ConversionCounters::default());
    }

    #[inline(always)]
    pub(crate) fn lookup(&self) -> MemberLookup<'_> {
        MemberLookup {
            classes: &self.0.classes,
            kinds: &self.0.kinds,
            strip_keyword_suffix: self.0.config.strip_keyword_suffix,
        }
    }

    #[inline]
    pub(crate) fn count_conversion(&self, mode: ConversionMode) {
        let mut counters = self.0.counters.get();

        match mode {
            ConversionMode::Strict => counters.strict += 1,
            ConversionMode::Permissive => counters.permissive += 1,
        }

        self.0.counters.set(counters);
    }

    // Cached lookups of the derived classes may include the members of the
    // changed class.
    fn invalidate(&self, class: &ClassInfo) {
        if class.cached_members() > 0 {
            debug!("registration of '{}' changed, member caches cleared", class.name());
        }

        self.invalidate_all();
    }

    fn invalidate_all(&self) {
        for class in self.0.classes.classes() {
            class.clear_cache();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{
        dispatch::NativeCall,
        reflect::{ExtensionMethod, ExtensionProvider, MethodMeta, PropertyMeta, ReflectiveDescriptor},
        runtime::NativeResult,
        Bridge,
        BridgeConfig,
    };

    fn noop(_: &mut NativeCall<'_>) -> NativeResult<()> {
        Ok(())
    }

    #[test]
    fn test_config_defaults() {
        let config = BridgeConfig::default();

        assert!(config.strip_keyword_suffix);
        assert!(config.zero_as_null);
        assert!(config.track_opaque_generations);
        assert_eq!(config.max_arguments, 32);
    }

    #[test]
    fn test_registration_queries() {
        let bridge = Bridge::new(BridgeConfig::new());

        let object = Rc::new(
            ReflectiveDescriptor::new("Object", noop)
                .property(PropertyMeta::new(0, "objectName", "String"))
                .method(MethodMeta::new(0, "deleteLater")),
        );

        let widget = Rc::new(
            ReflectiveDescriptor::new("Widget", noop)
                .parent(object)
                .property(PropertyMeta::new(1, "width", "i32").read_only()),
        );

        let widget = bridge.register_descriptor(widget);

        let provider = ExtensionProvider::new("WidgetExt", noop)
            .method(ExtensionMethod::constructor(0))
            .method(ExtensionMethod::instance(1, "grab").returns("bool"));

        let _ = bridge.register_provider("Widget", provider.into());

        assert!(widget.is_managed());
        assert!(bridge.inherits(&widget, "Object"));
        assert!(bridge.inherits(&widget, "Widget"));
        assert!(!bridge.inherits(&widget, "Button"));

        assert_eq!(
            bridge.member_names(&widget),
            vec!["deleteLater", "grab", "objectName", "width"],
        );

        assert_eq!(
            bridge.help(&widget),
            vec![
                "Widget::new()",
                "Widget::deleteLater()",
                "Widget::grab() -> bool",
                "Widget::objectName: String",
                "Widget::width: i32 (read-only)",
            ],
        );
    }

    #[test]
    fn test_registration_invalidates_cache() {
        let bridge = Bridge::new(BridgeConfig::new());

        let base = bridge.register_type("Base", None, 0, None);
        let derived = bridge.register_type("Derived", Some("Base"), 0, None);

        assert!(bridge.resolve_member(&derived, "ping").is_not_found());
        assert_eq!(derived.cached_members(), 1);

        let provider = ExtensionProvider::new("BaseExt", noop)
            .method(ExtensionMethod::instance(0, "ping"));

        let _ = bridge.register_provider("Base", provider.into());

        assert_eq!(derived.cached_members(), 0);
        assert!(bridge.resolve_member(&derived, "ping").as_slot().is_some());
        assert!(bridge.resolve_member(&base, "ping").as_slot().is_some());
    }
}
