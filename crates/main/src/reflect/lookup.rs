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

use std::{collections::BTreeSet, rc::Rc};

use compact_str::CompactString;
use log::{trace, warn};

use crate::{
    reflect::{
        slot::SlotNode,
        upcast::ancestors,
        ClassInfo,
        ClassRegistry,
        EnumType,
        EnumValue,
        ExtensionKind,
        MemberInfo,
        MethodKind,
        ParamInfo,
        PropertyInfo,
        SlotInfo,
        SlotKind,
    },
    runtime::{Ident, KindRegistry},
    wrapper::OwnershipProbe,
};

/// The member lookup algorithm over a class registry.
///
/// The lookup consults the class's member cache first. On a miss, it searches
/// the class's metadata in the following order, and caches the outcome
/// (including the NotFound outcome) under the requested name:
///
///  1. Properties of the reflective descriptor chain.
///  2. Methods of the reflective descriptor chain together with the instance
///     and class-level methods of the class's own extension providers. If any
///     are found, the extension methods of the ancestors with the same name
///     are appended as the lower priority overloads.
///  3. Enum constants and enum types of the class.
///  4. The same name without the keyword suffix (`delete_` -> `delete`).
///  5. Extension methods, enum constants, and enum types of the ancestors,
///     the nearest ancestors first.
pub(crate) struct MemberLookup<'a> {
    pub(crate) classes: &'a ClassRegistry,
    pub(crate) kinds: &'a KindRegistry,
    pub(crate) strip_keyword_suffix: bool,
}

impl<'a> MemberLookup<'a> {
    pub(crate) fn member(&self, class: &Rc<ClassInfo>, name: &str) -> MemberInfo {
        if let Some(member) = class.cached_member(name) {
            return member;
        }

        let member = self.search(class, name);

        trace!(
            "member '{}' of '{}' cached as {}",
            name,
            class.name(),
            member.variant_name(),
        );

        class.cache_member(name, member.clone());

        member
    }

    fn search(&self, class: &Rc<ClassInfo>, name: &str) -> MemberInfo {
        let descriptor = class.descriptor();

        if let Some(descriptor) = &descriptor {
            if let Some((owner, property)) = descriptor.find_property(name) {
                return MemberInfo::Property(Rc::new(PropertyInfo {
                    class: CompactString::from(owner.class_name()),
                    name: CompactString::from(property.name()),
                    index: property.index(),
                    param: self.param(class, property.type_name()),
                    writable: property.is_writable(),
                    entry: owner.entry().clone(),
                }));
            }
        }

        let mut nodes = Vec::new();

        if let Some(descriptor) = &descriptor {
            for owner in descriptor.chain() {
                for method in owner.methods() {
                    if method.name() != name {
                        continue;
                    }

                    let mut params = Vec::with_capacity(method.params().len() + 1);

                    params.push(self.param(class, method.result()));
                    params.extend(method.params().iter().map(|param| self.param(class, param)));

                    nodes.push(SlotNode {
                        class: CompactString::from(class.name()),
                        name: Ident::from(name),
                        kind: match method.method_kind() {
                            MethodKind::Signal => SlotKind::Signal,
                            _ => SlotKind::Member,
                        },
                        index: method.index(),
                        params,
                        entry: owner.entry().clone(),
                        upcast_offset: 0,
                    });
                }
            }
        }

        self.collect_extensions(class, class, 0, name, &mut nodes);

        let ancestors = ancestors(self.classes, class);

        if !nodes.is_empty() {
            for (ancestor, offset) in &ancestors {
                self.collect_extensions(class, ancestor, *offset, name, &mut nodes);
            }

            return chain_member(nodes);
        }

        if let Some(member) = self.enum_member(class, name) {
            return member;
        }

        if self.strip_keyword_suffix {
            if let Some(stripped) = Ident::from(name).strip_keyword_suffix() {
                let member = self.member(class, stripped);

                if !member.is_not_found() {
                    return member;
                }
            }
        }

        for (ancestor, offset) in &ancestors {
            self.collect_extensions(class, ancestor, *offset, name, &mut nodes);
        }

        if !nodes.is_empty() {
            return chain_member(nodes);
        }

        for (ancestor, _) in &ancestors {
            if let Some(member) = self.enum_member(ancestor, name) {
                return member;
            }
        }

        MemberInfo::NotFound
    }

    // Instance and class-level methods of the `provided` class's own
    // providers, as seen from the `class` lookup.
    fn collect_extensions(
        &self,
        class: &ClassInfo,
        provided: &ClassInfo,
        offset: isize,
        name: &str,
        nodes: &mut Vec<SlotNode>,
    ) {
        for provider in provided.providers() {
            for method in provider.methods() {
                if method.name() != name {
                    continue;
                }

                let kind = match method.extension_kind() {
                    ExtensionKind::Instance => SlotKind::InstanceExtension,
                    ExtensionKind::Static => SlotKind::StaticExtension,
                    _ => continue,
                };

                let mut params = Vec::with_capacity(method.params().len() + 1);

                params.push(self.param(provided, method.result()));
                params.extend(
                    method
                        .params()
                        .iter()
                        .map(|param| self.param(provided, param)),
                );

                nodes.push(SlotNode {
                    class: CompactString::from(class.name()),
                    name: Ident::from(name),
                    kind,
                    index: method.index(),
                    params,
                    entry: provider.entry().clone(),
                    upcast_offset: offset,
                });
            }
        }
    }

    fn enum_member(&self, class: &ClassInfo, name: &str) -> Option<MemberInfo> {
        let enum_types = self.enum_types(class);

        for enum_type in enum_types.iter() {
            if let Some(value) = enum_type.value_of(name) {
                return Some(MemberInfo::EnumValue(EnumValue::new(
                    enum_type.clone(),
                    value,
                )));
            }
        }

        enum_types
            .iter()
            .find(|enum_type| enum_type.name() == name)
            .map(|enum_type| MemberInfo::EnumWrapper(enum_type.clone()))
    }

    /// The enum types declared by the class's descriptor chain followed by
    /// the enum types of the class's own providers.
    pub(crate) fn enum_types(&self, class: &ClassInfo) -> Rc<[Rc<EnumType>]> {
        if let Some(enum_types) = class.cached_enum_types() {
            return enum_types;
        }

        let mut result = Vec::new();

        if let Some(descriptor) = class.descriptor() {
            for owner in descriptor.chain() {
                for meta in owner.enums() {
                    result.push(Rc::new(EnumType::from_meta(owner.class_name(), meta)));
                }
            }
        }

        for provider in class.providers() {
            for meta in provider.enums() {
                result.push(Rc::new(EnumType::from_meta(class.name(), meta)));
            }
        }

        let result = Rc::<[Rc<EnumType>]>::from(result);

        trace!(
            "{} enum type(s) of '{}' cached",
            result.len(),
            class.name()
        );

        class.cache_enum_types(result.clone());

        result
    }

    fn find_enum_type(&self, class: &ClassInfo, name: &str) -> Option<Rc<EnumType>> {
        let own = self
            .enum_types(class)
            .iter()
            .find(|enum_type| enum_type.name() == name)
            .cloned();

        if own.is_some() {
            return own;
        }

        ancestors(self.classes, class)
            .into_iter()
            .find_map(|(ancestor, _)| {
                self.enum_types(&ancestor)
                    .iter()
                    .find(|enum_type| enum_type.name() == name)
                    .cloned()
            })
    }

    /// Parses the native type name of a member declared by the `class`, and
    /// resolves the enum type of the parameter if the type is an enum.
    pub(crate) fn param(&self, class: &ClassInfo, type_name: &str) -> ParamInfo {
        let mut param = ParamInfo::parse(type_name, self.kinds);

        if !param.may_be_enum() {
            return param;
        }

        let enum_type = match param.scoped_name() {
            Some((scope, name)) => {
                let enum_type = self
                    .classes
                    .find(scope)
                    .and_then(|scope| self.find_enum_type(&scope, name));

                if enum_type.is_none() {
                    warn!(
                        "enum type '{}' of a '{}' member is not registered",
                        param.name(),
                        class.name(),
                    );
                }

                enum_type
            }

            None => self.find_enum_type(class, param.name()),
        };

        if let Some(enum_type) = enum_type {
            param.set_enum_type(enum_type);
        }

        param
    }

    /// The overload chain of the class's constructors, or None if the class's
    /// own providers declare no constructors.
    pub(crate) fn constructors(&self, class: &ClassInfo) -> Option<Rc<SlotInfo>> {
        if let Some(constructors) = class.cached_constructors() {
            return constructors;
        }

        let mut nodes = Vec::new();

        for provider in class.providers() {
            for method in provider.methods() {
                if method.extension_kind() != ExtensionKind::Constructor {
                    continue;
                }

                let mut params = Vec::with_capacity(method.params().len() + 1);

                params.push(ParamInfo::pointer_to(class.name()));
                params.extend(method.params().iter().map(|param| self.param(class, param)));

                nodes.push(SlotNode {
                    class: CompactString::from(class.name()),
                    name: Ident::from(method.name()),
                    kind: SlotKind::Constructor,
                    index: method.index(),
                    params,
                    entry: provider.entry().clone(),
                    upcast_offset: 0,
                });
            }
        }

        let constructors = SlotInfo::chain(nodes);

        trace!(
            "{} constructor(s) of '{}' cached",
            constructors
                .as_ref()
                .map(|head| head.overloads().count())
                .unwrap_or_default(),
            class.name(),
        );

        class.cache_constructors(constructors.clone());

        constructors
    }

    /// The constructor without parameters, if the class has one.
    pub(crate) fn default_constructor(&self, class: &ClassInfo) -> Option<Rc<SlotInfo>> {
        let head = self.constructors(class)?;

        let result = head.overloads().find(|slot| slot.arity() == 0).cloned();

        result
    }

    /// The first destructor declared by the class's own providers.
    pub(crate) fn destructor(&self, class: &ClassInfo) -> Option<Rc<SlotInfo>> {
        for provider in class.providers() {
            let Some(method) = provider
                .methods()
                .iter()
                .find(|method| method.extension_kind() == ExtensionKind::Destructor)
            else {
                continue;
            };

            return SlotInfo::chain(vec![SlotNode {
                class: CompactString::from(class.name()),
                name: Ident::from(method.name()),
                kind: SlotKind::Destructor,
                index: method.index(),
                params: vec![ParamInfo::void()],
                entry: provider.entry().clone(),
                upcast_offset: 0,
            }]);
        }

        None
    }

    /// The ownership probe of the class's own providers, or of the nearest
    /// ancestor's providers together with the ancestor's offset.
    pub(crate) fn owner_probe(&self, class: &ClassInfo) -> Option<(Rc<dyn OwnershipProbe>, isize)> {
        let own = class
            .providers()
            .iter()
            .find_map(|provider| provider.probe().cloned());

        if let Some(probe) = own {
            return Some((probe, 0));
        }

        ancestors(self.classes, class)
            .into_iter()
            .find_map(|(ancestor, offset)| {
                ancestor
                    .providers()
                    .iter()
                    .find_map(|provider| provider.probe().cloned())
                    .map(|probe| (probe, offset))
            })
    }

    /// All names the member lookup of the class can resolve, sorted.
    pub(crate) fn member_names(&self, class: &ClassInfo) -> Vec<CompactString> {
        let mut names = BTreeSet::new();

        if let Some(descriptor) = class.descriptor() {
            for owner in descriptor.chain() {
                for property in owner.properties() {
                    let _ = names.insert(CompactString::from(property.name()));
                }

                for method in owner.methods() {
                    let _ = names.insert(CompactString::from(method.name()));
                }
            }
        }

        let mut classes = vec![(class.providers(), self.enum_types(class))];

        for (ancestor, _) in ancestors(self.classes, class) {
            classes.push((ancestor.providers(), self.enum_types(&ancestor)));
        }

        for (providers, enum_types) in classes {
            for provider in providers {
                for method in provider.methods() {
                    if matches!(
                        method.extension_kind(),
                        ExtensionKind::Instance | ExtensionKind::Static
                    ) {
                        let _ = names.insert(CompactString::from(method.name()));
                    }
                }
            }

            for enum_type in enum_types.iter() {
                let _ = names.insert(CompactString::from(enum_type.name()));

                for (key, _) in enum_type.keys() {
                    let _ = names.insert(key.clone());
                }
            }
        }

        names.into_iter().collect()
    }
}

#[inline]
fn chain_member(nodes: Vec<SlotNode>) -> MemberInfo {
    match SlotInfo::chain(nodes) {
        Some(head) => MemberInfo::Slot(head),
        None => MemberInfo::NotFound,
    }
}
