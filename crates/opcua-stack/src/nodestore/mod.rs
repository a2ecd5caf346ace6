// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Address space.

mod node;
pub mod ns0;
mod store;

pub use node::{
    access_level, attribute_id, DataSource, MethodAttrs, MethodCallback, Node, NodeBody,
    Reference, VariableAttrs, VariableValue, VALUE_RANK_SCALAR,
};
pub use store::NodeStore;

use crate::types::{NodeId, Variant};

/// `true` when `ty` equals `base` or reaches it through inverse HasSubtype edges.
pub fn is_subtype_of(store: &NodeStore, ty: &NodeId, base: &NodeId) -> bool {
    let mut current = ty.clone();
    // Bounded walk; a cycle in a badly built model must not hang the caller.
    for _ in 0..64 {
        if &current == base {
            return true;
        }
        let Some(node) = store.get(&current) else {
            return false;
        };
        match node
            .references
            .iter()
            .find(|r| !r.is_forward && r.reference_type_id == ns0::id::HAS_SUBTYPE)
        {
            Some(parent) => current = parent.target_id.clone(),
            None => return false,
        }
    }
    false
}

/// `ty` plus every subtype below it.
pub fn subtypes_of(store: &NodeStore, ty: &NodeId) -> Vec<NodeId> {
    let mut out = vec![ty.clone()];
    let mut index = 0;
    while index < out.len() {
        if let Some(node) = store.get(&out[index]) {
            for r in &node.references {
                if r.is_forward
                    && r.reference_type_id == ns0::id::HAS_SUBTYPE
                    && !out.contains(&r.target_id)
                {
                    out.push(r.target_id.clone());
                }
            }
        }
        index += 1;
    }
    out
}

/// Whether `value` may be written to a variable whose DataType is `expected`.
///
/// Empty values are always accepted. The abstract Number, Integer and
/// UInteger types accept the matching builtins; anything else must be the
/// same type or a subtype.
pub fn value_matches_data_type(store: &NodeStore, expected: &NodeId, value: &Variant) -> bool {
    if value.is_empty() || expected.is_null() || *expected == ns0::id::BASE_DATA_TYPE {
        return true;
    }
    let (Some(actual), Some(kind)) = (value.data_type_id(), value.builtin_type()) else {
        return false;
    };
    if &actual == expected {
        return true;
    }
    if *expected == ns0::id::NUMBER {
        kind.is_number()
    } else if *expected == ns0::id::INTEGER {
        kind.is_signed_integer()
    } else if *expected == ns0::id::UINTEGER {
        kind.is_unsigned_integer()
    } else {
        is_subtype_of(store, &actual, expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::types::{BuiltinType, DateTime};

    #[test]
    fn test_subtype_walks() {
        let store = NodeStore::new();
        ns0::populate(&store, &ServerConfig::default(), DateTime::now()).unwrap();
        assert!(is_subtype_of(&store, &ns0::id::HAS_COMPONENT, &ns0::id::HIERARCHICAL_REFERENCES));
        assert!(!is_subtype_of(
            &store,
            &ns0::id::HAS_TYPE_DEFINITION,
            &ns0::id::HIERARCHICAL_REFERENCES
        ));
        assert!(is_subtype_of(
            &store,
            &BuiltinType::Byte.data_type_id(),
            &ns0::id::NUMBER
        ));

        let hierarchical = subtypes_of(&store, &ns0::id::HIERARCHICAL_REFERENCES);
        assert!(hierarchical.contains(&ns0::id::ORGANIZES));
        assert!(hierarchical.contains(&ns0::id::HAS_PROPERTY));
        assert!(!hierarchical.contains(&ns0::id::HAS_TYPE_DEFINITION));
    }

    #[test]
    fn test_value_type_compatibility() {
        let store = NodeStore::new();
        ns0::populate(&store, &ServerConfig::default(), DateTime::now()).unwrap();
        let int32 = BuiltinType::Int32.data_type_id();
        assert!(value_matches_data_type(&store, &int32, &Variant::Int32(5)));
        assert!(!value_matches_data_type(&store, &int32, &Variant::Double(5.0)));
        assert!(value_matches_data_type(&store, &ns0::id::NUMBER, &Variant::Double(5.0)));
        assert!(!value_matches_data_type(&store, &ns0::id::UINTEGER, &Variant::Int16(1)));
        assert!(value_matches_data_type(&store, &ns0::id::BASE_DATA_TYPE, &Variant::from("x")));
        assert!(value_matches_data_type(&store, &int32, &Variant::Empty));
    }
}
