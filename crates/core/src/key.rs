//! Key encoding between property names and store attributes
//!
//! A property named `first_name` holding a string on a vertex is stored under
//! the attribute `:first$name.string.vertex`. Encoding the value type into the
//! ident lets one property name carry different types on different elements,
//! while every attribute keeps a single declared type.
//!
//! Idents under `:graph` and `:db` belong to the graph meta model and the store
//! itself; they never decode to a property name.

use crate::error::{Error, Result};
use crate::types::{ElementKind, Ident};
use crate::value::ValueType;

/// External id of every vertex and edge (uuid, unique identity)
pub const ELEMENT_ID: &str = ":graph.element/id";
/// Vertex label (string)
pub const VERTEX_LABEL: &str = ":graph.vertex/label";
/// Edge label (string)
pub const EDGE_LABEL: &str = ":graph.edge/label";
/// Edge tail (ref to vertex)
pub const EDGE_OUT_VERTEX: &str = ":graph.edge/outVertex";
/// Edge head (ref to vertex)
pub const EDGE_IN_VERTEX: &str = ":graph.edge/inVertex";

/// Label attribute for an element kind
pub fn label_attribute(kind: ElementKind) -> Ident {
    match kind {
        ElementKind::Vertex => Ident::new(VERTEX_LABEL),
        ElementKind::Edge => Ident::new(EDGE_LABEL),
    }
}

/// Whether an ident lies in the reserved namespace
///
/// Reserved idents are namespaced (`:graph.element/id`, `:db/ident`,
/// `:db.type/long`); encoded property keys never contain `/`.
pub fn is_reserved(ident: &str) -> bool {
    (ident.starts_with(":graph") || ident.starts_with(":db")) && ident.contains('/')
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Check a property key: non-empty, alphanumeric plus `_` and `-`
///
/// # Errors
///
/// Returns `Error::IllegalPropertyKey` otherwise.
pub fn validate_property_key(key: &str) -> Result<()> {
    if key.is_empty() || !key.chars().all(is_name_char) {
        return Err(Error::IllegalPropertyKey(key.to_string()));
    }
    Ok(())
}

/// Check a label: non-empty, alphanumeric plus `_` and `-`
///
/// # Errors
///
/// Returns `Error::IllegalLabel` otherwise.
pub fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() || !label.chars().all(is_name_char) {
        return Err(Error::IllegalLabel(label.to_string()));
    }
    Ok(())
}

/// Encode a property name into its attribute ident
///
/// The caller validates `name` first; encoding is only injective over valid
/// names since they never contain `$` or `.`.
///
/// # Example
///
/// ```
/// use factgraph_core::key::encode;
/// use factgraph_core::{ElementKind, ValueType};
///
/// let ident = encode("first_name", ValueType::String, ElementKind::Vertex);
/// assert_eq!(ident.as_str(), ":first$name.string.vertex");
/// ```
pub fn encode(name: &str, value_type: ValueType, kind: ElementKind) -> Ident {
    Ident::new(format!(
        ":{}.{}.{}",
        name.replace('_', "$"),
        value_type.suffix(),
        kind.as_str()
    ))
}

/// Split an encoded ident into property name, value type and element kind
///
/// Returns `None` for reserved idents and anything not produced by [`encode`].
pub fn parse(ident: &Ident) -> Option<(String, ValueType, ElementKind)> {
    let s = ident.as_str();
    if is_reserved(s) {
        return None;
    }
    let body = s.strip_prefix(':')?;
    let mut parts = body.split('.');
    let name = parts.next()?;
    let value_type = ValueType::from_suffix(parts.next()?)?;
    let kind = match parts.next()? {
        "vertex" => ElementKind::Vertex,
        "edge" => ElementKind::Edge,
        _ => return None,
    };
    if parts.next().is_some() || name.is_empty() {
        return None;
    }
    Some((name.replace('$', "_"), value_type, kind))
}

/// Recover the property name from an encoded ident
pub fn decode(ident: &Ident) -> Option<String> {
    parse(ident).map(|(name, _, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_shape() {
        assert_eq!(
            encode("age", ValueType::Long, ElementKind::Vertex).as_str(),
            ":age.long.vertex"
        );
        assert_eq!(
            encode("weight", ValueType::Double, ElementKind::Edge).as_str(),
            ":weight.double.edge"
        );
        assert_eq!(
            encode("_version", ValueType::Long, ElementKind::Vertex).as_str(),
            ":$version.long.vertex"
        );
    }

    #[test]
    fn test_decode_recovers_underscores() {
        let ident = encode("first_name", ValueType::String, ElementKind::Vertex);
        assert_eq!(decode(&ident).as_deref(), Some("first_name"));
    }

    #[test]
    fn test_decode_reserved_is_none() {
        for reserved in [ELEMENT_ID, VERTEX_LABEL, EDGE_LABEL, EDGE_IN_VERTEX, EDGE_OUT_VERTEX] {
            assert_eq!(decode(&Ident::new(reserved)), None, "{}", reserved);
        }
        assert_eq!(decode(&Ident::new(":db/ident")), None);
        assert_eq!(decode(&Ident::new(":db.type/string")), None);
    }

    #[test]
    fn test_decode_rejects_foreign_idents() {
        assert_eq!(decode(&Ident::new("name")), None);
        assert_eq!(decode(&Ident::new(":name")), None);
        assert_eq!(decode(&Ident::new(":name.keyword.vertex")), None);
        assert_eq!(decode(&Ident::new(":name.string.node")), None);
        assert_eq!(decode(&Ident::new(":name.string.vertex.extra")), None);
    }

    #[test]
    fn test_names_resembling_reserved_prefixes_still_decode() {
        let ident = encode("graph", ValueType::String, ElementKind::Vertex);
        assert_eq!(decode(&ident).as_deref(), Some("graph"));
        let ident = encode("db", ValueType::Long, ElementKind::Edge);
        assert_eq!(decode(&ident).as_deref(), Some("db"));
    }

    #[test]
    fn test_same_name_different_types_are_distinct() {
        let a = encode("age", ValueType::Long, ElementKind::Vertex);
        let b = encode("age", ValueType::String, ElementKind::Vertex);
        let c = encode("age", ValueType::Long, ElementKind::Edge);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_validate_property_key() {
        assert!(validate_property_key("name").is_ok());
        assert!(validate_property_key("first_name").is_ok());
        assert!(validate_property_key("x-ray").is_ok());
        assert!(validate_property_key("_version").is_ok());
        assert!(matches!(
            validate_property_key(""),
            Err(Error::IllegalPropertyKey(_))
        ));
        assert!(validate_property_key("a b").is_err());
        assert!(validate_property_key("a.b").is_err());
        assert!(validate_property_key(":graph.element/id").is_err());
    }

    #[test]
    fn test_validate_label() {
        assert!(validate_label("person").is_ok());
        assert!(validate_label("created_by").is_ok());
        assert!(matches!(validate_label("a/b"), Err(Error::IllegalLabel(_))));
        assert!(validate_label("").is_err());
    }

    fn kind_strategy() -> impl Strategy<Value = ElementKind> {
        prop_oneof![Just(ElementKind::Vertex), Just(ElementKind::Edge)]
    }

    fn type_strategy() -> impl Strategy<Value = ValueType> {
        (0..ValueType::ALL.len()).prop_map(|i| ValueType::ALL[i])
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            name in "[A-Za-z0-9_-]{1,24}",
            value_type in type_strategy(),
            kind in kind_strategy(),
        ) {
            let ident = encode(&name, value_type, kind);
            prop_assert!(!is_reserved(ident.as_str()));
            prop_assert_eq!(parse(&ident), Some((name, value_type, kind)));
        }

        #[test]
        fn prop_encode_is_injective(
            a in "[A-Za-z0-9_-]{1,12}",
            b in "[A-Za-z0-9_-]{1,12}",
            ta in type_strategy(),
            tb in type_strategy(),
        ) {
            let ea = encode(&a, ta, ElementKind::Vertex);
            let eb = encode(&b, tb, ElementKind::Vertex);
            prop_assert_eq!(ea == eb, a == b && ta == tb);
        }
    }
}
