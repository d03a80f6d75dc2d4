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

//! Base class offsets.
//!
//! Multiple inheritance places base class subobjects at different offsets
//! within the derived object. The bridge records the offset of every parent
//! link at registration time, and this module is the only place that does
//! arithmetic with these offsets.

use std::rc::Rc;

use ahash::AHashSet;

use crate::{
    reflect::{ClassId, ClassInfo, ClassRegistry},
    runtime::NativeIdentity,
};

// Protects the traversal from cyclic parent registrations.
const MAX_DEPTH: usize = 64;

/// Returns the accumulated offset of the `target` base class within the
/// `class`, or None if `class` does not inherit from `target`.
///
/// The search is depth-first in parent registration order; the first path
/// found wins.
pub(crate) fn upcast_offset(classes: &ClassRegistry, class: &ClassInfo, target: &str) -> Option<isize> {
    search(classes, class, target, 0)
}

fn search(classes: &ClassRegistry, class: &ClassInfo, target: &str, depth: usize) -> Option<isize> {
    if class.name() == target {
        return Some(0);
    }

    if depth >= MAX_DEPTH {
        return None;
    }

    for link in class.parents() {
        let Some(parent) = classes.get(link.parent) else {
            continue;
        };

        if let Some(offset) = search(classes, &parent, target, depth + 1) {
            return Some(link.offset + offset);
        }
    }

    None
}

/// Lists all ancestors of the class together with their accumulated offsets,
/// the nearest ancestors first. Each ancestor is listed once, with the offset
/// of the first path that reaches it.
pub(crate) fn ancestors(classes: &ClassRegistry, class: &ClassInfo) -> Vec<(Rc<ClassInfo>, isize)> {
    let mut visited = AHashSet::<ClassId>::new();
    let mut result = Vec::new();
    let mut front = vec![(class.id(), 0isize)];

    let _ = visited.insert(class.id());

    for _ in 0..MAX_DEPTH {
        if front.is_empty() {
            break;
        }

        let mut next = Vec::new();

        for (id, offset) in front {
            let Some(current) = classes.get(id) else {
                continue;
            };

            for link in current.parents() {
                if !visited.insert(link.parent) {
                    continue;
                }

                let Some(parent) = classes.get(link.parent) else {
                    continue;
                };

                let parent_offset = offset + link.offset;

                next.push((link.parent, parent_offset));
                result.push((parent, parent_offset));
            }
        }

        front = next;
    }

    result
}

/// Adjusts the object pointer by the offset of a base class subobject.
///
/// Managed objects are always addressed as complete objects, so only opaque
/// pointers are adjusted.
pub(crate) fn apply_offset(identity: &NativeIdentity, offset: isize) -> NativeIdentity {
    match identity {
        NativeIdentity::Opaque(pointer) if offset != 0 => {
            NativeIdentity::Opaque(pointer.with_offset(pointer.offset() + offset))
        }

        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use crate::{
        reflect::{
            upcast::{ancestors, apply_offset, upcast_offset},
            ClassRegistry,
            ParentLink,
        },
        runtime::{NativeIdentity, OpaquePtr},
    };

    #[test]
    fn test_multiple_inheritance_offsets() {
        let classes = ClassRegistry::new();

        let object = classes.lookup_or_create("Object");
        let paint = classes.lookup_or_create("PaintDevice");
        let widget = classes.lookup_or_create("Widget");
        let button = classes.lookup_or_create("Button");

        let _ = widget.add_parent(ParentLink {
            parent: object.id(),
            offset: 0,
        });

        let _ = widget.add_parent(ParentLink {
            parent: paint.id(),
            offset: 16,
        });

        let _ = button.add_parent(ParentLink {
            parent: widget.id(),
            offset: 8,
        });

        assert_eq!(upcast_offset(&classes, &button, "Button"), Some(0));
        assert_eq!(upcast_offset(&classes, &button, "Object"), Some(8));
        assert_eq!(upcast_offset(&classes, &button, "PaintDevice"), Some(24));
        assert_eq!(upcast_offset(&classes, &widget, "Button"), None);

        let names = ancestors(&classes, &button)
            .into_iter()
            .map(|(class, offset)| (class.name().to_string(), offset))
            .collect::<Vec<_>>();

        assert_eq!(
            names,
            vec![
                (String::from("Widget"), 8),
                (String::from("Object"), 8),
                (String::from("PaintDevice"), 24),
            ],
        );

        let pointer = OpaquePtr::foreign(NonZeroUsize::new(0x100).unwrap());
        let upcast = apply_offset(&NativeIdentity::Opaque(pointer), 24);

        assert_eq!(upcast.as_opaque().map(|pointer| pointer.offset()), Some(24));
        assert_eq!(upcast.key(), NativeIdentity::Opaque(pointer).key());
    }

    #[test]
    fn test_cyclic_parents() {
        let classes = ClassRegistry::new();

        let a = classes.lookup_or_create("A");
        let b = classes.lookup_or_create("B");

        let _ = a.add_parent(ParentLink {
            parent: b.id(),
            offset: 0,
        });

        let _ = b.add_parent(ParentLink {
            parent: a.id(),
            offset: 0,
        });

        assert_eq!(upcast_offset(&classes, &a, "C"), None);
        assert_eq!(ancestors(&classes, &a).len(), 1);
    }
}
