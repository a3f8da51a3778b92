//! Handles to remote UNO objects and the glue that encodes their calls.

use bytes::{Bytes, BytesMut};

use crate::error::{Result, UrpError};
use crate::interface::MethodDef;
use crate::marshal;
use crate::protocol::LruCache;
use crate::types::{Type, TypeClass, UnoValue};

/// A remote object as seen through one of its interfaces.
///
/// Cheap to clone; all traffic goes through the owning `UrpConnection`.
#[derive(Debug, Clone)]
pub struct UnoProxy {
    pub oid: String,
    pub interface_type: Type,
}

impl UnoProxy {
    pub fn new(oid: impl Into<String>, interface_type: Type) -> Self {
        Self {
            oid: oid.into(),
            interface_type,
        }
    }

    /// Same object, viewed through another interface.
    pub fn retyped(&self, interface_type: Type) -> Self {
        Self::new(self.oid.clone(), interface_type)
    }
}

/// Encode call arguments, sharing the writer's OID cache for interface refs.
pub fn serialize_params(
    method: &MethodDef,
    args: &[UnoValue],
    oid_cache: &mut LruCache<String>,
) -> Result<BytesMut> {
    if args.len() != method.params.len() {
        return Err(UrpError::Protocol(format!(
            "{} takes {} arguments, got {}",
            method.name,
            method.params.len(),
            args.len()
        )));
    }

    let mut buf = BytesMut::with_capacity(256);
    for (arg, param) in args.iter().zip(method.params) {
        marshal::write_value_cached(&mut buf, arg, &param.to_type(), Some(&mut *oid_cache));
    }
    Ok(buf)
}

/// Decode a reply body according to the method's return type.
pub fn deserialize_return(
    method: &MethodDef,
    mut body: Bytes,
    oid_cache: &mut [Option<String>; 256],
) -> Result<UnoValue> {
    if method.return_type.class == TypeClass::Void {
        return Ok(UnoValue::Void);
    }
    marshal::read_value_cached(&mut body, &method.return_type, oid_cache)
}

/// Pull a non-null OID out of an interface return, bare or wrapped in an `Any`.
pub fn extract_oid_from_return(value: &UnoValue) -> Option<String> {
    match value {
        UnoValue::Interface(oid) if !oid.is_empty() => Some(oid.clone()),
        UnoValue::Any(any) => extract_oid_from_return(&any.value),
        _ => None,
    }
}

/// Interpret a `queryInterface` reply: a void `Any` means "not supported".
pub fn extract_query_interface_result(
    value: UnoValue,
    requested_type: Type,
) -> Result<Option<UnoProxy>> {
    match value {
        UnoValue::Any(any) if any.type_desc.class == TypeClass::Void => Ok(None),
        UnoValue::Any(any) => match any.value {
            UnoValue::Interface(oid) if !oid.is_empty() => {
                Ok(Some(UnoProxy::new(oid, requested_type)))
            }
            _ => Ok(None),
        },
        other => Err(UrpError::Protocol(format!(
            "queryInterface returned {other:?} instead of an any"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface;
    use crate::types::type_names;

    #[test]
    fn arity_mismatch_is_rejected() {
        let method = interface::store_to_url();
        let mut cache = LruCache::new();
        let err = serialize_params(&method, &[UnoValue::String("file:///x".into())], &mut cache)
            .unwrap_err();
        assert!(err.to_string().contains("storeToURL takes 2 arguments"));
    }

    #[test]
    fn query_interface_void_means_unsupported() {
        let void = UnoValue::any(Type::void(), UnoValue::Void);
        let result =
            extract_query_interface_result(void, Type::interface(type_names::X_STORABLE)).unwrap();
        assert!(result.is_none());

        let hit = UnoValue::any(
            Type::interface(type_names::X_STORABLE),
            UnoValue::Interface("doc-1".into()),
        );
        let proxy =
            extract_query_interface_result(hit, Type::interface(type_names::X_STORABLE))
                .unwrap()
                .unwrap();
        assert_eq!(proxy.oid, "doc-1");
        assert_eq!(proxy.interface_type.name, type_names::X_STORABLE);
    }
}
