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

use std::{collections::BTreeMap, rc::Rc};

use compact_str::CompactString;
use log::error;

use crate::{
    bridge::Bridge,
    convert::{
        number::{number_to_native, Number},
        ConversionMode,
    },
    reflect::{
        upcast::{apply_offset, upcast_offset},
        EnumType,
        EnumValue,
        ParamInfo,
    },
    runtime::{
        BoxedValue,
        KindId,
        NativeIdentity,
        NativeValue,
        Origin,
        RuntimeError,
        RuntimeResult,
        ScriptValue,
        ValueKind,
    },
    wrapper::{DestroyStrategy, Instance},
};

// The class name of objects behind untyped pointers.
const VOID_CLASS: &str = "void";

impl Bridge {
    /// Converts a scripting value into a native value of the parameter's
    /// type.
    ///
    /// In the [strict](ConversionMode::Strict) mode, only exact kind matches
    /// and instances of the parameter's class (or of its subclasses) are
    /// accepted. The [permissive](ConversionMode::Permissive) mode
    /// additionally allows numeric widening and narrowing, truthiness,
    /// stringification, `0` as the null pointer, and the auto-coercions from
    /// enum values.
    ///
    /// Failures are reported as [TypeMismatch](RuntimeError::TypeMismatch),
    /// [NumberCast](RuntimeError::NumberCast), or
    /// [OwnershipViolation](RuntimeError::OwnershipViolation) errors.
    pub fn to_native(
        &self,
        origin: Origin,
        value: &ScriptValue,
        param: &ParamInfo,
        mode: ConversionMode,
    ) -> RuntimeResult<NativeValue> {
        self.count_conversion(mode);

        let strict = mode.is_strict();

        if let ValueKind::User(kind) = param.kind() {
            if param.pointer_count() == 0 {
                if let Some(converter) = self.0.hooks.converter(kind) {
                    return converter.to_native(self, value, mode);
                }
            }
        }

        if let Some(enum_type) = param.enum_type() {
            return enum_to_native(origin, value, param, enum_type, strict);
        }

        match param.kind() {
            ValueKind::PointerList => return self.pointer_list_to_native(origin, value, param),
            ValueKind::Script => {
                if let ScriptValue::Instance(instance) = value {
                    if !instance.is_alive() {
                        return Err(RuntimeError::OwnershipViolation {
                            access_origin: origin,
                            class: CompactString::from(instance.class().name()),
                            member: None,
                        });
                    }
                }

                return Ok(NativeValue::Script(value.clone()));
            }

            _ => (),
        }

        if param.is_c_string() {
            return match value {
                ScriptValue::Str(string) => Ok(NativeValue::CString(Some(CompactString::from(string.as_str())))),
                ScriptValue::None => Ok(NativeValue::CString(None)),

                ScriptValue::Int(_)
                | ScriptValue::UInt(_)
                | ScriptValue::Float(_)
                | ScriptValue::Bool(_)
                    if !strict =>
                {
                    Ok(NativeValue::CString(Some(CompactString::from(value.to_string()))))
                }

                _ => Err(mismatch(origin, param, value)),
            };
        }

        match param.pointer_count() {
            0 => (),
            1 => return self.pointer_to_native(origin, value, param, strict),
            _ => return Err(mismatch(origin, param, value)),
        }

        let kind = param.kind();

        match kind {
            ValueKind::Bool => match value {
                ScriptValue::Bool(value) => Ok(NativeValue::Bool(*value)),
                _ if !strict && is_scalar(value) => Ok(NativeValue::Bool(value.is_truthy())),
                _ => Err(mismatch(origin, param, value)),
            },

            ValueKind::Char => match value {
                ScriptValue::Str(string) if string.chars().count() == 1 => {
                    match string.chars().next() {
                        Some(character) => Ok(NativeValue::Char(character)),
                        None => Err(mismatch(origin, param, value)),
                    }
                }

                ScriptValue::Int(code) if !strict => number_or_mismatch(origin, param, value, Number::Int(*code)),
                ScriptValue::UInt(code) if !strict => number_or_mismatch(origin, param, value, Number::UInt(*code)),
                _ => Err(mismatch(origin, param, value)),
            },

            kind if kind.is_integer() => {
                let number = match value {
                    ScriptValue::Int(value) => Number::Int(*value),
                    ScriptValue::UInt(value) => Number::UInt(*value),
                    ScriptValue::Float(value) if !strict => Number::Float(*value),
                    ScriptValue::Bool(value) if !strict => Number::Int(*value as i64),
                    ScriptValue::Enum(value) if !strict => Number::Int(value.value()),
                    _ => return Err(mismatch(origin, param, value)),
                };

                number_or_mismatch(origin, param, value, number)
            }

            kind if kind.is_float() => {
                let number = match value {
                    ScriptValue::Float(value) => Number::Float(*value),
                    ScriptValue::Int(value) if !strict => Number::Int(*value),
                    ScriptValue::UInt(value) if !strict => Number::UInt(*value),
                    ScriptValue::Bool(value) if !strict => Number::Int(*value as i64),
                    ScriptValue::Enum(value) if !strict => Number::Int(value.value()),
                    _ => return Err(mismatch(origin, param, value)),
                };

                number_or_mismatch(origin, param, value, number)
            }

            ValueKind::Text => match value {
                ScriptValue::Str(string) => Ok(NativeValue::Text(string.clone())),
                _ if !strict && is_scalar(value) => Ok(NativeValue::Text(value.to_string())),
                _ => Err(mismatch(origin, param, value)),
            },

            ValueKind::Bytes => match value {
                ScriptValue::Bytes(bytes) => Ok(NativeValue::Bytes(bytes.clone())),
                ScriptValue::Str(string) if !strict => Ok(NativeValue::Bytes(string.as_bytes().to_vec())),
                _ => Err(mismatch(origin, param, value)),
            },

            ValueKind::TextList => {
                let ScriptValue::List(items) = value else {
                    return Err(mismatch(origin, param, value));
                };

                let mut strings = Vec::with_capacity(items.len());

                for item in items {
                    match item {
                        ScriptValue::Str(string) => strings.push(string.clone()),
                        _ if !strict && is_scalar(item) => strings.push(item.to_string()),
                        _ => return Err(mismatch(origin, param, value)),
                    }
                }

                Ok(NativeValue::TextList(strings))
            }

            ValueKind::List => match value {
                ScriptValue::List(items) => {
                    let mut list = Vec::with_capacity(items.len());

                    for item in items {
                        list.push(self.variant_to_native(origin, item)?);
                    }

                    Ok(NativeValue::List(list))
                }

                _ => Err(mismatch(origin, param, value)),
            },

            ValueKind::Map => match value {
                ScriptValue::Dict(entries) => {
                    let mut map = BTreeMap::new();

                    for (key, item) in entries {
                        let _ = map.insert(key.clone(), self.variant_to_native(origin, item)?);
                    }

                    Ok(NativeValue::Map(map))
                }

                _ => Err(mismatch(origin, param, value)),
            },

            ValueKind::Any => Ok(NativeValue::Any(Box::new(self.variant_to_native(origin, value)?))),

            ValueKind::User(kind) => self.object_to_native(origin, value, param, Some(kind), strict),

            ValueKind::Unknown => self.object_to_native(origin, value, param, None, strict),

            _ => Err(mismatch(origin, param, value)),
        }
    }

    /// Converts a native value produced for the parameter into a scripting
    /// value.
    pub fn to_script(&self, origin: Origin, value: NativeValue, param: &ParamInfo) -> RuntimeResult<ScriptValue> {
        if let Some(enum_type) = param.enum_type() {
            return match value.as_i64() {
                Some(number) => Ok(ScriptValue::Enum(EnumValue::new(enum_type.clone(), number))),

                None => Err(RuntimeError::ConversionGap {
                    access_origin: origin,
                    type_name: CompactString::from(param.name()),
                }),
            };
        }

        if param.is_void() {
            return Ok(ScriptValue::None);
        }

        if param.is_c_string() {
            return Ok(match value {
                NativeValue::CString(Some(string)) => ScriptValue::Str(string.into()),
                NativeValue::Text(string) => ScriptValue::Str(string),
                _ => ScriptValue::None,
            });
        }

        if let (ValueKind::PointerList, NativeValue::PointerList(pointers)) = (param.kind(), &value) {
            let class = param.element().unwrap_or(VOID_CLASS);

            return Ok(ScriptValue::List(
                pointers
                    .iter()
                    .map(|pointer| match pointer {
                        Some(identity) => ScriptValue::Instance(self.wrap(identity.clone(), class)),
                        None => ScriptValue::None,
                    })
                    .collect(),
            ));
        }

        if let ValueKind::User(kind) = param.kind() {
            if param.pointer_count() == 0 {
                if let Some(converter) = self.0.hooks.converter(kind) {
                    return converter.to_script(self, value);
                }
            }
        }

        match value {
            NativeValue::Pointer(Some(identity)) => {
                let class = match param.pointer_count() > 0 || param.kind() == ValueKind::Unknown {
                    true => param.name(),
                    false => VOID_CLASS,
                };

                Ok(ScriptValue::Instance(self.wrap(identity, class)))
            }

            NativeValue::Pointer(None) => Ok(ScriptValue::None),

            NativeValue::Boxed(boxed) => Ok(self.boxed_to_script(boxed)),

            NativeValue::Void => match param.kind() {
                // The native side left the slot intact: the result is the
                // default value of the kind.
                ValueKind::User(kind) if param.pointer_count() == 0 => Ok(self.default_to_script(kind)),
                _ => Ok(ScriptValue::None),
            },

            other => Ok(self.variant_to_script(other)),
        }
    }

    /// Returns the initial content of a return slot of the parameter's type,
    /// or None if the bridge has no storage for the type.
    pub(crate) fn initial_value(&self, param: &ParamInfo) -> Option<NativeValue> {
        if param.enum_type().is_some() {
            return Some(NativeValue::I64(0));
        }

        if param.is_c_string() {
            return Some(NativeValue::CString(None));
        }

        if param.pointer_count() > 0 {
            return Some(NativeValue::Pointer(None));
        }

        Some(match param.kind() {
            ValueKind::Void => NativeValue::Void,
            ValueKind::Bool => NativeValue::Bool(false),
            ValueKind::I8 => NativeValue::I8(0),
            ValueKind::U8 => NativeValue::U8(0),
            ValueKind::I16 => NativeValue::I16(0),
            ValueKind::U16 => NativeValue::U16(0),
            ValueKind::I32 => NativeValue::I32(0),
            ValueKind::U32 => NativeValue::U32(0),
            ValueKind::I64 => NativeValue::I64(0),
            ValueKind::U64 => NativeValue::U64(0),
            ValueKind::F32 => NativeValue::F32(0.0),
            ValueKind::F64 => NativeValue::F64(0.0),
            ValueKind::Char => NativeValue::Char('\0'),
            ValueKind::Text => NativeValue::Text(String::new()),
            ValueKind::Bytes => NativeValue::Bytes(Vec::new()),
            ValueKind::TextList => NativeValue::TextList(Vec::new()),
            ValueKind::List => NativeValue::List(Vec::new()),
            ValueKind::Map => NativeValue::Map(BTreeMap::new()),
            ValueKind::Any => NativeValue::Any(Box::new(NativeValue::Void)),
            ValueKind::PointerList => NativeValue::PointerList(Vec::new()),
            ValueKind::Script => NativeValue::Script(ScriptValue::None),
            ValueKind::User(_) => NativeValue::Void,
            ValueKind::Unknown => return None,
        })
    }

    fn pointer_to_native(
        &self,
        origin: Origin,
        value: &ScriptValue,
        param: &ParamInfo,
        strict: bool,
    ) -> RuntimeResult<NativeValue> {
        match value {
            ScriptValue::Instance(instance) => {
                let identity = self.instance_to_identity(origin, instance, param)?;

                Ok(NativeValue::Pointer(Some(identity)))
            }

            ScriptValue::None => Ok(NativeValue::Pointer(None)),

            ScriptValue::Int(0) if !strict && self.0.config.zero_as_null => Ok(NativeValue::Pointer(None)),

            _ => Err(mismatch(origin, param, value)),
        }
    }

    fn pointer_list_to_native(
        &self,
        origin: Origin,
        value: &ScriptValue,
        param: &ParamInfo,
    ) -> RuntimeResult<NativeValue> {
        let ScriptValue::List(items) = value else {
            return Err(mismatch(origin, param, value));
        };

        let element = ParamInfo::pointer_to(param.element().unwrap_or(VOID_CLASS));

        let mut pointers = Vec::with_capacity(items.len());

        for item in items {
            match item {
                ScriptValue::Instance(instance) => {
                    pointers.push(Some(self.instance_to_identity(origin, instance, &element)?));
                }

                ScriptValue::None => pointers.push(None),

                _ => return Err(mismatch(origin, param, value)),
            }
        }

        Ok(NativeValue::PointerList(pointers))
    }

    fn object_to_native(
        &self,
        origin: Origin,
        value: &ScriptValue,
        param: &ParamInfo,
        kind: Option<KindId>,
        strict: bool,
    ) -> RuntimeResult<NativeValue> {
        match (value, kind) {
            (ScriptValue::Instance(instance), _) => {
                let identity = self.instance_to_identity(origin, instance, param)?;

                let (Some(kind), false, NativeIdentity::Opaque(pointer)) =
                    (kind, param.is_reference(), &identity)
                else {
                    return Ok(NativeValue::Pointer(Some(identity)));
                };

                let info = self.0.kinds.get(kind);

                let copy = info.and_then(|info| {
                    self.0
                        .heap
                        .with_any(*pointer, |object| info.copy(object))
                        .flatten()
                });

                match copy {
                    Some(copy) => Ok(NativeValue::Boxed(BoxedValue::from_box(kind, copy))),
                    None => Ok(NativeValue::Pointer(Some(identity))),
                }
            }

            (ScriptValue::Enum(enum_value), Some(kind)) if !strict => {
                let enum_name = enum_value.enum_type().to_string();

                match self.0.hooks.coerce(kind, &enum_name, enum_value.value()) {
                    Some(built) => Ok(NativeValue::Boxed(BoxedValue::from_box(kind, built))),
                    None => Err(mismatch(origin, param, value)),
                }
            }

            _ => Err(mismatch(origin, param, value)),
        }
    }

    // Returns the identity of the instance adjusted to the parameter's class.
    fn instance_to_identity(
        &self,
        origin: Origin,
        instance: &Instance,
        param: &ParamInfo,
    ) -> RuntimeResult<NativeIdentity> {
        let Some(identity) = instance.identity() else {
            return Err(RuntimeError::OwnershipViolation {
                access_origin: origin,
                class: CompactString::from(instance.class().name()),
                member: None,
            });
        };

        if param.kind() == ValueKind::Void || param.name() == VOID_CLASS {
            return Ok(identity);
        }

        match upcast_offset(&self.0.classes, instance.class(), param.name()) {
            Some(offset) => Ok(apply_offset(&identity, offset)),

            None => Err(RuntimeError::TypeMismatch {
                access_origin: origin,
                expected: CompactString::from(param.name()),
                provided: "instance of another class",
            }),
        }
    }

    fn variant_to_native(&self, origin: Origin, value: &ScriptValue) -> RuntimeResult<NativeValue> {
        Ok(match value {
            ScriptValue::None => NativeValue::Void,
            ScriptValue::Bool(value) => NativeValue::Bool(*value),
            ScriptValue::Int(value) => NativeValue::I64(*value),
            ScriptValue::UInt(value) => NativeValue::U64(*value),
            ScriptValue::Float(value) => NativeValue::F64(*value),
            ScriptValue::Str(value) => NativeValue::Text(value.clone()),
            ScriptValue::Bytes(value) => NativeValue::Bytes(value.clone()),

            ScriptValue::List(items) => {
                let mut list = Vec::with_capacity(items.len());

                for item in items {
                    list.push(self.variant_to_native(origin, item)?);
                }

                NativeValue::List(list)
            }

            ScriptValue::Dict(entries) => {
                let mut map = BTreeMap::new();

                for (key, item) in entries {
                    let _ = map.insert(key.clone(), self.variant_to_native(origin, item)?);
                }

                NativeValue::Map(map)
            }

            ScriptValue::Enum(value) => NativeValue::I64(value.value()),

            ScriptValue::Instance(instance) => match instance.identity() {
                Some(identity) => NativeValue::Pointer(Some(identity)),

                None => {
                    return Err(RuntimeError::OwnershipViolation {
                        access_origin: origin,
                        class: CompactString::from(instance.class().name()),
                        member: None,
                    })
                }
            },

            other => NativeValue::Script(other.clone()),
        })
    }

    fn variant_to_script(&self, value: NativeValue) -> ScriptValue {
        match value {
            NativeValue::Void | NativeValue::Place(_) => ScriptValue::None,
            NativeValue::Bool(value) => ScriptValue::Bool(value),
            NativeValue::I8(value) => ScriptValue::Int(value as i64),
            NativeValue::U8(value) => ScriptValue::Int(value as i64),
            NativeValue::I16(value) => ScriptValue::Int(value as i64),
            NativeValue::U16(value) => ScriptValue::Int(value as i64),
            NativeValue::I32(value) => ScriptValue::Int(value as i64),
            NativeValue::U32(value) => ScriptValue::Int(value as i64),
            NativeValue::I64(value) => ScriptValue::Int(value),
            NativeValue::U64(value) => ScriptValue::from(value),
            NativeValue::F32(value) => ScriptValue::Float(value as f64),
            NativeValue::F64(value) => ScriptValue::Float(value),
            NativeValue::Char(value) => ScriptValue::Str(value.to_string()),
            NativeValue::CString(Some(value)) => ScriptValue::Str(value.into()),
            NativeValue::CString(None) => ScriptValue::None,
            NativeValue::Text(value) => ScriptValue::Str(value),
            NativeValue::Bytes(value) => ScriptValue::Bytes(value),

            NativeValue::TextList(value) => {
                ScriptValue::List(value.into_iter().map(ScriptValue::Str).collect())
            }

            NativeValue::List(value) => ScriptValue::List(
                value
                    .into_iter()
                    .map(|item| self.variant_to_script(item))
                    .collect(),
            ),

            NativeValue::Map(value) => ScriptValue::Dict(
                value
                    .into_iter()
                    .map(|(key, item)| (key, self.variant_to_script(item)))
                    .collect(),
            ),

            NativeValue::Any(value) => self.variant_to_script(*value),

            NativeValue::Pointer(Some(identity)) => {
                ScriptValue::Instance(self.wrap(identity, VOID_CLASS))
            }

            NativeValue::Pointer(None) => ScriptValue::None,

            NativeValue::PointerList(pointers) => ScriptValue::List(
                pointers
                    .into_iter()
                    .map(|pointer| match pointer {
                        Some(identity) => ScriptValue::Instance(self.wrap(identity, VOID_CLASS)),
                        None => ScriptValue::None,
                    })
                    .collect(),
            ),

            NativeValue::Script(value) => value,

            NativeValue::Boxed(boxed) => self.boxed_to_script(boxed),
        }
    }

    // Moves the value into the heap and wraps it as an owned instance.
    fn boxed_to_script(&self, boxed: BoxedValue) -> ScriptValue {
        let kind = boxed.kind();

        let Some(info) = self.0.kinds.get(kind) else {
            error!("native value of unregistered kind #{} is dropped", kind.get());
            return ScriptValue::None;
        };

        let pointer = self.0.heap.alloc(Some(kind), boxed.into_inner());

        ScriptValue::Instance(self.wrap_owned(
            NativeIdentity::Opaque(pointer),
            info.name(),
            DestroyStrategy::Kind,
        ))
    }

    fn default_to_script(&self, kind: KindId) -> ScriptValue {
        let Some(info) = self.0.kinds.get(kind) else {
            error!("native value of unregistered kind #{} is dropped", kind.get());
            return ScriptValue::None;
        };

        self.boxed_to_script(BoxedValue::from_box(kind, info.construct()))
    }
}

fn enum_to_native(
    origin: Origin,
    value: &ScriptValue,
    param: &ParamInfo,
    enum_type: &Rc<EnumType>,
    strict: bool,
) -> RuntimeResult<NativeValue> {
    match value {
        ScriptValue::Enum(value) if value.enum_type().same_as(enum_type) => {
            Ok(NativeValue::I64(value.value()))
        }

        ScriptValue::Int(value) if !strict => Ok(NativeValue::I64(*value)),

        ScriptValue::UInt(value) if !strict => match i64::try_from(*value) {
            Ok(value) => Ok(NativeValue::I64(value)),
            Err(_) => Err(mismatch(origin, param, &ScriptValue::UInt(*value))),
        },

        ScriptValue::Bool(value) if !strict => Ok(NativeValue::I64(*value as i64)),

        _ => Err(mismatch(origin, param, value)),
    }
}

fn number_or_mismatch(
    origin: Origin,
    param: &ParamInfo,
    value: &ScriptValue,
    number: Number,
) -> RuntimeResult<NativeValue> {
    match number_to_native(number, param.kind(), origin) {
        Some(result) => result,
        None => Err(mismatch(origin, param, value)),
    }
}

#[inline(always)]
fn is_scalar(value: &ScriptValue) -> bool {
    matches!(
        value,
        ScriptValue::Bool(_)
            | ScriptValue::Int(_)
            | ScriptValue::UInt(_)
            | ScriptValue::Float(_)
            | ScriptValue::Str(_)
            | ScriptValue::Enum(_)
    )
}

#[inline]
fn mismatch(origin: Origin, param: &ParamInfo, value: &ScriptValue) -> RuntimeError {
    RuntimeError::TypeMismatch {
        access_origin: origin,
        expected: CompactString::from(param.to_string()),
        provided: value.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use compact_str::CompactString;

    use crate::{
        convert::ConversionMode,
        dispatch::NativeCall,
        reflect::{EnumMeta, ExtensionProvider, ParamInfo},
        runtime::{NativeResult, NativeValue, Origin, RuntimeError, ScriptValue},
        wrapper::DestroyStrategy,
        Bridge,
        BridgeConfig,
    };

    #[derive(Clone, Default, PartialEq, Debug)]
    struct Point {
        x: i32,
        y: i32,
    }

    fn noop(_: &mut NativeCall<'_>) -> NativeResult<()> {
        Ok(())
    }

    fn builtin_values() -> Vec<(&'static str, NativeValue)> {
        let mut map = BTreeMap::new();

        let _ = map.insert(String::from("flag"), NativeValue::Bool(true));
        let _ = map.insert(String::from("name"), NativeValue::Text(String::from("box")));

        vec![
            ("i8", NativeValue::I8(i8::MIN)),
            ("i8", NativeValue::I8(i8::MAX)),
            ("u8", NativeValue::U8(u8::MIN)),
            ("u8", NativeValue::U8(u8::MAX)),
            ("i16", NativeValue::I16(i16::MIN)),
            ("i16", NativeValue::I16(i16::MAX)),
            ("u16", NativeValue::U16(u16::MIN)),
            ("u16", NativeValue::U16(u16::MAX)),
            ("i32", NativeValue::I32(i32::MIN)),
            ("i32", NativeValue::I32(i32::MAX)),
            ("u32", NativeValue::U32(u32::MIN)),
            ("u32", NativeValue::U32(u32::MAX)),
            ("i64", NativeValue::I64(i64::MIN)),
            ("i64", NativeValue::I64(i64::MAX)),
            ("u64", NativeValue::U64(u64::MIN)),
            ("u64", NativeValue::U64(u64::MAX)),
            ("f32", NativeValue::F32(-1.25)),
            ("f32", NativeValue::F32(0.5)),
            ("f64", NativeValue::F64(f64::MIN)),
            ("f64", NativeValue::F64(f64::MAX)),
            ("bool", NativeValue::Bool(true)),
            ("bool", NativeValue::Bool(false)),
            ("char", NativeValue::Char('ж')),
            ("String", NativeValue::Text(String::new())),
            ("String", NativeValue::Text(String::from("text"))),
            ("Bytes", NativeValue::Bytes(Vec::new())),
            ("Bytes", NativeValue::Bytes(vec![0, 255])),
            ("StringList", NativeValue::TextList(Vec::new())),
            ("StringList", NativeValue::TextList(vec![String::from("a"), String::new()])),
            ("List", NativeValue::List(Vec::new())),
            (
                "List",
                NativeValue::List(vec![NativeValue::I64(1), NativeValue::Text(String::from("a"))]),
            ),
            ("Map", NativeValue::Map(BTreeMap::new())),
            ("Map", NativeValue::Map(map)),
            ("const c_char*", NativeValue::CString(None)),
            ("const c_char*", NativeValue::CString(Some(CompactString::new("")))),
        ]
    }

    #[test]
    fn test_builtin_round_trip() {
        let bridge = Bridge::new(BridgeConfig::new());
        let origin = Origin::nil();

        for ((type_name, value), (_, expected)) in builtin_values().into_iter().zip(builtin_values()) {
            let param = ParamInfo::parse(type_name, bridge.kinds());

            let script = bridge.to_script(origin, value, &param).unwrap();

            let native = bridge
                .to_native(origin, &script, &param, ConversionMode::Strict)
                .unwrap();

            assert_eq!(native, expected, "{type_name} through {script:?}");

            let again = bridge.to_script(origin, native, &param).unwrap();

            assert_eq!(again, script, "{type_name}");
        }

        assert_eq!(bridge.storage_depth(), 0);
    }

    #[test]
    fn test_scalar_modes() {
        let bridge = Bridge::new(BridgeConfig::new());
        let origin = Origin::nil();

        let int = ParamInfo::parse("i32", bridge.kinds());
        let boolean = ParamInfo::parse("bool", bridge.kinds());
        let text = ParamInfo::parse("String", bridge.kinds());

        let strict = ConversionMode::Strict;
        let permissive = ConversionMode::Permissive;

        assert!(matches!(
            bridge.to_native(origin, &ScriptValue::Float(2.9), &int, strict),
            Err(RuntimeError::TypeMismatch { .. }),
        ));

        assert_eq!(
            bridge
                .to_native(origin, &ScriptValue::Float(2.9), &int, permissive)
                .unwrap(),
            NativeValue::I32(2),
        );

        assert!(bridge
            .to_native(origin, &ScriptValue::Int(1), &boolean, strict)
            .is_err());

        assert_eq!(
            bridge
                .to_native(origin, &ScriptValue::Int(1), &boolean, permissive)
                .unwrap(),
            NativeValue::Bool(true),
        );

        assert_eq!(
            bridge
                .to_native(origin, &ScriptValue::Int(5), &text, permissive)
                .unwrap(),
            NativeValue::Text(String::from("5")),
        );

        let counters = bridge.counters();

        assert_eq!(counters.strict, 2);
        assert_eq!(counters.permissive, 3);

        bridge.reset_counters();

        assert_eq!(bridge.counters().strict, 0);
    }

    #[test]
    fn test_text_list_rejects_string() {
        let bridge = Bridge::new(BridgeConfig::new());
        let origin = Origin::nil();

        let list = ParamInfo::parse("StringList", bridge.kinds());

        assert!(bridge
            .to_native(origin, &ScriptValue::from("abc"), &list, ConversionMode::Strict)
            .is_err());

        assert_eq!(
            bridge
                .to_native(
                    origin,
                    &ScriptValue::List(vec![ScriptValue::from("a"), ScriptValue::from("b")]),
                    &list,
                    ConversionMode::Strict,
                )
                .unwrap(),
            NativeValue::TextList(vec![String::from("a"), String::from("b")]),
        );

        assert_eq!(
            bridge
                .to_script(
                    origin,
                    NativeValue::U64(u64::MAX),
                    &ParamInfo::parse("u64", bridge.kinds()),
                )
                .unwrap(),
            ScriptValue::UInt(u64::MAX),
        );
    }

    #[test]
    fn test_pointer_upcast() {
        let bridge = Bridge::new(BridgeConfig::new());
        let origin = Origin::nil();

        let _ = bridge.register_type("Base", None, 0, None);
        let _ = bridge.register_type("Derived", Some("Base"), 16, None);

        let pointer = bridge.heap().alloc_value(None, 0u64);
        let derived = bridge.wrap(pointer.into(), "Derived");

        let base = ParamInfo::parse("Base*", bridge.kinds());

        let NativeValue::Pointer(Some(identity)) = bridge
            .to_native(
                origin,
                &ScriptValue::Instance(derived.clone()),
                &base,
                ConversionMode::Strict,
            )
            .unwrap()
        else {
            panic!("pointer expected");
        };

        assert_eq!(identity.as_opaque().unwrap().offset(), 16);

        let other = ParamInfo::parse("Unrelated*", bridge.kinds());

        assert!(bridge
            .to_native(
                origin,
                &ScriptValue::Instance(derived),
                &other,
                ConversionMode::Permissive,
            )
            .is_err());

        assert_eq!(
            bridge
                .to_native(origin, &ScriptValue::Int(0), &base, ConversionMode::Permissive)
                .unwrap(),
            NativeValue::Pointer(None),
        );

        assert!(bridge
            .to_native(origin, &ScriptValue::Int(0), &base, ConversionMode::Strict)
            .is_err());
    }

    #[test]
    fn test_zero_as_null_disabled() {
        let mut config = BridgeConfig::new();

        config.zero_as_null = false;

        let bridge = Bridge::new(config);

        let param = ParamInfo::parse("Base*", bridge.kinds());

        assert!(bridge
            .to_native(
                Origin::nil(),
                &ScriptValue::Int(0),
                &param,
                ConversionMode::Permissive,
            )
            .is_err());
    }

    #[test]
    fn test_enum_params() {
        let bridge = Bridge::new(BridgeConfig::new());
        let origin = Origin::nil();

        let provider = ExtensionProvider::new("FrameExt", noop)
            .enumeration(EnumMeta::new("Shape").key("Box", 1).key("Panel", 2));

        let frame = bridge.register_type("Frame", None, 0, Some(provider.into()));

        let shape = bridge.param(&frame, "Frame::Shape");

        assert_eq!(shape.to_string(), "Frame::Shape");

        let panel = bridge
            .get_attr(origin, &crate::dispatch::Receiver::Class(frame.clone()), "Panel")
            .unwrap();

        assert_eq!(
            bridge
                .to_native(origin, &panel, &shape, ConversionMode::Strict)
                .unwrap(),
            NativeValue::I64(2),
        );

        assert!(bridge
            .to_native(origin, &ScriptValue::Int(2), &shape, ConversionMode::Strict)
            .is_err());

        assert_eq!(
            bridge
                .to_native(origin, &ScriptValue::Int(2), &shape, ConversionMode::Permissive)
                .unwrap(),
            NativeValue::I64(2),
        );

        assert_eq!(
            bridge.to_script(origin, NativeValue::I32(1), &shape).unwrap().to_string(),
            "Frame.Box",
        );
    }

    #[test]
    fn test_value_kinds() {
        let bridge = Bridge::new(BridgeConfig::new());
        let origin = Origin::nil();

        let kind = bridge.register_kind::<Point>("Point");

        let param = ParamInfo::parse("Point", bridge.kinds());

        let instance = match bridge
            .to_script(
                origin,
                NativeValue::Boxed(crate::runtime::BoxedValue::new(kind, Point { x: 1, y: 2 })),
                &param,
            )
            .unwrap()
        {
            ScriptValue::Instance(instance) => instance,
            other => panic!("unexpected value {other:?}"),
        };

        assert!(instance.is_owned());
        assert_eq!(instance.destroy_strategy(), DestroyStrategy::Kind);
        assert_eq!(bridge.heap().len(), 1);

        let NativeValue::Boxed(copy) = bridge
            .to_native(
                origin,
                &ScriptValue::Instance(instance.clone()),
                &param,
                ConversionMode::Strict,
            )
            .unwrap()
        else {
            panic!("boxed value expected");
        };

        assert_eq!(copy.downcast_ref::<Point>(), Some(&Point { x: 1, y: 2 }));

        drop(instance);

        assert_eq!(bridge.heap().len(), 0);
    }

    #[test]
    fn test_auto_coercion() {
        let bridge = Bridge::new(BridgeConfig::new());
        let origin = Origin::nil();

        let provider = ExtensionProvider::new("PenExt", noop)
            .enumeration(EnumMeta::new("Style").key("Dashed", 3));

        let pen = bridge.register_type("Pen", None, 0, Some(provider.into()));

        let kind = bridge.register_kind::<Point>("Point");

        bridge.register_auto_coercion(kind, "Pen::Style", |value| {
            Some(Point {
                x: value as i32,
                y: 0,
            })
        });

        let dashed = bridge
            .get_attr(origin, &crate::dispatch::Receiver::Class(pen), "Dashed")
            .unwrap();

        let param = ParamInfo::parse("Point", bridge.kinds());

        assert!(bridge
            .to_native(origin, &dashed, &param, ConversionMode::Strict)
            .is_err());

        let NativeValue::Boxed(point) = bridge
            .to_native(origin, &dashed, &param, ConversionMode::Permissive)
            .unwrap()
        else {
            panic!("boxed value expected");
        };

        assert_eq!(point.downcast_ref::<Point>(), Some(&Point { x: 3, y: 0 }));
    }

    #[test]
    fn test_custom_converter() {
        let bridge = Bridge::new(BridgeConfig::new());
        let origin = Origin::nil();

        let kind = bridge.register_kind::<Point>("Point");

        bridge.register_custom_converter(
            kind,
            |_, value| {
                let NativeValue::Boxed(boxed) = value else {
                    return Ok(ScriptValue::None);
                };

                let point = boxed.downcast_ref::<Point>().cloned().unwrap_or_default();

                Ok(ScriptValue::List(vec![
                    ScriptValue::Int(point.x as i64),
                    ScriptValue::Int(point.y as i64),
                ]))
            },
            move |_, value, _| match value {
                ScriptValue::List(items) if items.len() == 2 => {
                    Ok(NativeValue::Boxed(crate::runtime::BoxedValue::new(
                        kind,
                        Point {
                            x: items[0].to_string().parse().unwrap_or_default(),
                            y: items[1].to_string().parse().unwrap_or_default(),
                        },
                    )))
                }

                _ => Err(RuntimeError::TypeMismatch {
                    access_origin: Origin::nil(),
                    expected: "Point".into(),
                    provided: value.type_name(),
                }),
            },
        );

        let param = ParamInfo::parse("Point", bridge.kinds());

        let script = bridge
            .to_script(
                origin,
                NativeValue::Boxed(crate::runtime::BoxedValue::new(kind, Point { x: 4, y: 5 })),
                &param,
            )
            .unwrap();

        assert_eq!(
            script,
            ScriptValue::List(vec![ScriptValue::Int(4), ScriptValue::Int(5)]),
        );

        let NativeValue::Boxed(point) = bridge
            .to_native(origin, &script, &param, ConversionMode::Strict)
            .unwrap()
        else {
            panic!("boxed value expected");
        };

        assert_eq!(point.downcast_ref::<Point>(), Some(&Point { x: 4, y: 5 }));
        assert_eq!(bridge.heap().len(), 0);
    }
}
