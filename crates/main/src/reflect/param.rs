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

use compact_str::CompactString;

use crate::{
    reflect::EnumType,
    runtime::{KindRegistry, ValueKind},
};

const POINTER_LIST_PREFIX: &str = "List<";

/// A semantic descriptor of one argument or return slot of a native member.
///
/// ParamInfo is parsed from a native type name:
///
/// ```
/// use ad_astra_bridge::{reflect::ParamInfo, runtime::{KindRegistry, ValueKind}};
///
/// let kinds = KindRegistry::new();
///
/// let param = ParamInfo::parse("const Widget*", &kinds);
///
/// assert_eq!(param.name(), "Widget");
/// assert_eq!(param.pointer_count(), 1);
/// assert!(param.is_const());
/// assert_eq!(param.kind(), ValueKind::Unknown);
///
/// let param = ParamInfo::parse("List<Widget*>", &kinds);
///
/// assert_eq!(param.kind(), ValueKind::PointerList);
/// assert_eq!(param.element(), Some("Widget"));
/// ```
#[derive(Clone)]
pub struct ParamInfo {
    name: CompactString,
    kind: ValueKind,
    pointer_count: u8,
    is_const: bool,
    is_reference: bool,
    element: Option<CompactString>,
    enum_type: Option<Rc<EnumType>>,
}

impl Debug for ParamInfo {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for ParamInfo {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_const {
            formatter.write_str("const ")?;
        }

        match &self.enum_type {
            Some(enum_type) => Display::fmt(enum_type, formatter)?,
            None => formatter.write_str(&self.name)?,
        }

        for _ in 0..self.pointer_count {
            formatter.write_str("*")?;
        }

        if self.is_reference {
            formatter.write_str("&")?;
        }

        Ok(())
    }
}

impl ParamInfo {
    /// Parses the native type name.
    ///
    /// The parser recognizes a leading `const` qualifier, trailing pointer
    /// stars, a trailing reference ampersand, and the `List<T*>` list of
    /// pointers.
    pub fn parse(type_name: &str, kinds: &KindRegistry) -> Self {
        let mut rest = type_name.trim();

        let mut is_const = false;

        if let Some(stripped) = rest.strip_prefix("const ") {
            is_const = true;
            rest = stripped.trim_start();
        }

        if let Some(stripped) = rest.strip_suffix(" const") {
            is_const = true;
            rest = stripped.trim_end();
        }

        let mut is_reference = false;

        if let Some(stripped) = rest.strip_suffix('&') {
            is_reference = true;
            rest = stripped.trim_end();
        }

        let mut pointer_count = 0u8;

        while let Some(stripped) = rest.strip_suffix('*') {
            pointer_count = pointer_count.saturating_add(1);
            rest = stripped.trim_end();
        }

        let name = CompactString::from(rest);

        if pointer_count == 0 {
            if let Some(element) = pointer_list_element(rest) {
                return Self {
                    name,
                    kind: ValueKind::PointerList,
                    pointer_count,
                    is_const,
                    is_reference,
                    element: Some(CompactString::from(element)),
                    enum_type: None,
                };
            }
        }

        Self {
            kind: kinds.resolve(rest),
            name,
            pointer_count,
            is_const,
            is_reference,
            element: None,
            enum_type: None,
        }
    }

    /// Creates a pointer parameter to the native class.
    #[inline]
    pub fn pointer_to(class_name: &str) -> Self {
        Self {
            name: CompactString::from(class_name),
            kind: ValueKind::Unknown,
            pointer_count: 1,
            is_const: false,
            is_reference: false,
            element: None,
            enum_type: None,
        }
    }

    /// Creates a void parameter.
    #[inline]
    pub fn void() -> Self {
        Self {
            name: CompactString::from("void"),
            kind: ValueKind::Void,
            pointer_count: 0,
            is_const: false,
            is_reference: false,
            element: None,
            enum_type: None,
        }
    }

    /// The base type name without qualifiers.
    #[inline(always)]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The resolved value kind of the base type.
    #[inline(always)]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// The number of pointer indirections.
    #[inline(always)]
    pub fn pointer_count(&self) -> u8 {
        self.pointer_count
    }

    #[inline(always)]
    pub fn is_const(&self) -> bool {
        self.is_const
    }

    #[inline(always)]
    pub fn is_reference(&self) -> bool {
        self.is_reference
    }

    /// Returns true if the parameter is a void value (not a void pointer).
    #[inline(always)]
    pub fn is_void(&self) -> bool {
        self.kind == ValueKind::Void && self.pointer_count == 0
    }

    /// Returns true if the parameter is a null-terminated C string.
    #[inline(always)]
    pub fn is_c_string(&self) -> bool {
        self.kind == ValueKind::I8 && self.pointer_count == 1
    }

    /// The element class name of a `List<T*>` parameter.
    #[inline(always)]
    pub fn element(&self) -> Option<&str> {
        self.element.as_deref()
    }

    /// The enum type of the parameter if the parameter is an enum value.
    #[inline(always)]
    pub fn enum_type(&self) -> Option<&Rc<EnumType>> {
        self.enum_type.as_ref()
    }

    /// Returns the enum-qualified name (`Scope::Enum`) split into the scope
    /// and the enum name, if the base type name has this form.
    pub fn scoped_name(&self) -> Option<(&str, &str)> {
        let (scope, name) = self.name.as_str().rsplit_once("::")?;

        match scope.is_empty() || name.is_empty() {
            true => None,
            false => Some((scope, name)),
        }
    }

    /// Returns true if the base type is a candidate for an enum type: the
    /// type is not a built-in or registered value kind and is not used
    /// through a pointer.
    #[inline(always)]
    pub fn may_be_enum(&self) -> bool {
        self.kind == ValueKind::Unknown && self.pointer_count == 0
    }

    #[inline(always)]
    pub(crate) fn set_enum_type(&mut self, enum_type: Rc<EnumType>) {
        self.enum_type = Some(enum_type);
    }
}

fn pointer_list_element(name: &str) -> Option<&str> {
    let inner = name.strip_prefix(POINTER_LIST_PREFIX)?.strip_suffix('>')?;

    let element = inner.trim().strip_suffix('*')?.trim_end();

    match element.is_empty() || element.ends_with('*') {
        true => None,
        false => Some(element),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        reflect::ParamInfo,
        runtime::{KindRegistry, ValueKind},
    };

    #[test]
    fn test_param_parsing() {
        let kinds = KindRegistry::new();

        let param = ParamInfo::parse("const String&", &kinds);

        assert_eq!(param.kind(), ValueKind::Text);
        assert!(param.is_const());
        assert!(param.is_reference());
        assert_eq!(param.pointer_count(), 0);
        assert_eq!(param.to_string(), "const String&");

        let param = ParamInfo::parse("c_char *", &kinds);

        assert!(param.is_c_string());

        let param = ParamInfo::parse("Widget**", &kinds);

        assert_eq!(param.pointer_count(), 2);
        assert_eq!(param.name(), "Widget");

        let param = ParamInfo::parse("void", &kinds);

        assert!(param.is_void());

        let param = ParamInfo::parse("Widget::Color", &kinds);

        assert!(param.may_be_enum());
        assert_eq!(param.scoped_name(), Some(("Widget", "Color")));

        let param = ParamInfo::parse("List<Widget>", &kinds);

        assert_eq!(param.kind(), ValueKind::Unknown);
        assert_eq!(param.element(), None);
    }
}
