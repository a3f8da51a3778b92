//! Binary encoding of UNO values.
//!
//! Integers are big-endian. Lengths use the "compressed number" form: one byte
//! below 0xFF, otherwise 0xFF followed by a u32. Strings are UTF-8 with a
//! compressed length prefix.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, UrpError};
use crate::protocol::LruCache;
use crate::types::{type_names, Any, Type, TypeClass, UnoException, UnoValue};

/// Cache index meaning "not cached".
pub const NO_CACHE: u16 = 0xFFFF;

pub fn write_compressed(buf: &mut BytesMut, value: u32) {
    if value < 0xFF {
        buf.put_u8(value as u8);
    } else {
        buf.put_u8(0xFF);
        buf.put_u32(value);
    }
}

pub fn read_compressed(buf: &mut Bytes) -> Result<u32> {
    ensure_remaining(buf, 1, "compressed number")?;
    let first = buf.get_u8();
    if first < 0xFF {
        return Ok(first as u32);
    }
    ensure_remaining(buf, 4, "extended compressed number")?;
    Ok(buf.get_u32())
}

pub fn write_string(buf: &mut BytesMut, s: &str) {
    write_compressed(buf, s.len() as u32);
    buf.put_slice(s.as_bytes());
}

pub fn read_string(buf: &mut Bytes) -> Result<String> {
    let len = read_compressed(buf)? as usize;
    ensure_remaining(buf, len, "string")?;
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec())
        .map_err(|e| UrpError::Marshal(format!("invalid UTF-8 in string: {e}")))
}

/// Write a type descriptor.
///
/// Simple types are one byte. Complex types add a cache index and, when `new`
/// is set (high bit of the first byte), the type name.
pub fn write_type(buf: &mut BytesMut, ty: &Type, cache_index: u16, new: bool) {
    let tc = ty.class as u8;
    if ty.class.is_simple() {
        buf.put_u8(tc);
    } else if new {
        buf.put_u8(tc | 0x80);
        buf.put_u16(cache_index);
        write_string(buf, &ty.name);
    } else {
        buf.put_u8(tc);
        buf.put_u16(cache_index);
    }
}

/// Read a type descriptor as `(type, cache_index, is_new)`.
///
/// A cached complex type comes back with an empty name; resolving it against
/// the type cache is the caller's job.
pub fn read_type(buf: &mut Bytes) -> Result<(Type, u16, bool)> {
    ensure_remaining(buf, 1, "type")?;
    let byte = buf.get_u8();
    let class = TypeClass::from_byte(byte).ok_or(UrpError::UnknownTypeClass(byte & 0x7F))?;

    if class.is_simple() {
        let ty = Type {
            class,
            name: String::new(),
        };
        return Ok((ty, NO_CACHE, false));
    }

    ensure_remaining(buf, 2, "type cache index")?;
    let cache_index = buf.get_u16();
    let is_new = byte & 0x80 != 0;
    let name = if is_new { read_string(buf)? } else { String::new() };
    Ok((Type { class, name }, cache_index, is_new))
}

/// Write a value without interface OID caching.
pub fn write_value(buf: &mut BytesMut, value: &UnoValue, ty: &Type) {
    write_value_cached(buf, value, ty, None);
}

/// Write a value, optionally sharing the header OID cache for interface refs.
pub fn write_value_cached(
    buf: &mut BytesMut,
    value: &UnoValue,
    ty: &Type,
    oid_cache: Option<&mut LruCache<String>>,
) {
    match value {
        UnoValue::Void => {}
        UnoValue::Bool(b) => buf.put_u8(u8::from(*b)),
        UnoValue::Byte(b) => buf.put_u8(*b),
        UnoValue::Short(n) => buf.put_i16(*n),
        UnoValue::UnsignedShort(n) => buf.put_u16(*n),
        UnoValue::Long(n) => buf.put_i32(*n),
        UnoValue::UnsignedLong(n) => buf.put_u32(*n),
        UnoValue::Hyper(n) => buf.put_i64(*n),
        UnoValue::UnsignedHyper(n) => buf.put_u64(*n),
        UnoValue::Float(f) => buf.put_f32(*f),
        UnoValue::Double(d) => buf.put_f64(*d),
        UnoValue::Char(c) => buf.put_u16(*c),
        UnoValue::String(s) => write_string(buf, s),
        UnoValue::Type(t) => write_type(buf, t, NO_CACHE, true),
        UnoValue::Any(a) => {
            write_type(buf, &a.type_desc, NO_CACHE, true);
            if a.type_desc.class != TypeClass::Void {
                write_value_cached(buf, &a.value, &a.type_desc, oid_cache);
            }
        }
        UnoValue::Enum(n) => buf.put_i32(*n),
        UnoValue::Struct(members) => {
            for member in members {
                write_value(buf, member, &member.infer_type());
            }
        }
        UnoValue::Exception(exc) => {
            write_string(buf, &exc.message);
            // null Context
            write_string(buf, "");
            buf.put_u16(NO_CACHE);
        }
        UnoValue::Sequence(items) => {
            write_compressed(buf, items.len() as u32);
            let elem_name = ty.name.strip_prefix("[]").unwrap_or("");
            if elem_name == "byte" {
                for item in items {
                    if let UnoValue::Byte(b) = item {
                        buf.put_u8(*b);
                    }
                }
            } else {
                let elem_type = Type {
                    class: guess_type_class(elem_name),
                    name: elem_name.to_string(),
                };
                for item in items {
                    write_value(buf, item, &elem_type);
                }
            }
        }
        UnoValue::Interface(oid) => match oid_cache {
            Some(cache) if !oid.is_empty() => {
                let (index, is_new) = cache.insert_or_get(oid.clone());
                write_string(buf, if is_new { oid } else { "" });
                buf.put_u16(index);
            }
            _ => {
                write_string(buf, oid);
                buf.put_u16(NO_CACHE);
            }
        },
    }
}

/// Read a value of type `ty` with a throwaway OID cache.
pub fn read_value(buf: &mut Bytes, ty: &Type) -> Result<UnoValue> {
    read_value_cached(buf, ty, &mut [const { None }; 256])
}

/// Read a value of type `ty`, resolving interface refs through `oid_cache`
/// (the same table the message headers use).
pub fn read_value_cached(
    buf: &mut Bytes,
    ty: &Type,
    oid_cache: &mut [Option<String>; 256],
) -> Result<UnoValue> {
    Ok(match ty.class {
        TypeClass::Void => UnoValue::Void,
        TypeClass::Boolean => {
            ensure_remaining(buf, 1, "boolean")?;
            UnoValue::Bool(buf.get_u8() != 0)
        }
        TypeClass::Byte => {
            ensure_remaining(buf, 1, "byte")?;
            UnoValue::Byte(buf.get_u8())
        }
        TypeClass::Short => {
            ensure_remaining(buf, 2, "short")?;
            UnoValue::Short(buf.get_i16())
        }
        TypeClass::UnsignedShort => {
            ensure_remaining(buf, 2, "unsigned short")?;
            UnoValue::UnsignedShort(buf.get_u16())
        }
        TypeClass::Long => {
            ensure_remaining(buf, 4, "long")?;
            UnoValue::Long(buf.get_i32())
        }
        TypeClass::UnsignedLong => {
            ensure_remaining(buf, 4, "unsigned long")?;
            UnoValue::UnsignedLong(buf.get_u32())
        }
        TypeClass::Hyper => {
            ensure_remaining(buf, 8, "hyper")?;
            UnoValue::Hyper(buf.get_i64())
        }
        TypeClass::UnsignedHyper => {
            ensure_remaining(buf, 8, "unsigned hyper")?;
            UnoValue::UnsignedHyper(buf.get_u64())
        }
        TypeClass::Float => {
            ensure_remaining(buf, 4, "float")?;
            UnoValue::Float(buf.get_f32())
        }
        TypeClass::Double => {
            ensure_remaining(buf, 8, "double")?;
            UnoValue::Double(buf.get_f64())
        }
        TypeClass::Char => {
            ensure_remaining(buf, 2, "char")?;
            UnoValue::Char(buf.get_u16())
        }
        TypeClass::String => UnoValue::String(read_string(buf)?),
        TypeClass::Type => UnoValue::Type(read_type(buf)?.0),
        TypeClass::Any => {
            let (inner, _, _) = read_type(buf)?;
            let value = if inner.class == TypeClass::Void {
                UnoValue::Void
            } else {
                read_value_cached(buf, &inner, oid_cache)?
            };
            UnoValue::any(inner, value)
        }
        TypeClass::Enum => {
            ensure_remaining(buf, 4, "enum")?;
            UnoValue::Enum(buf.get_i32())
        }
        TypeClass::Struct => read_known_struct(buf, &ty.name, oid_cache)?,
        TypeClass::Exception => {
            let message = read_string(buf)?;
            let context = read_string(buf)?;
            ensure_remaining(buf, 2, "exception context cache index")?;
            let cache_index = buf.get_u16();
            if !context.is_empty() && cache_index != NO_CACHE {
                *cache_slot(oid_cache, cache_index, "OID")? = Some(context);
            }
            // Derived exceptions append members after the base ones; nothing
            // after an exception is read, so they are left in the buffer.
            UnoValue::Exception(UnoException {
                type_name: ty.name.clone(),
                message,
            })
        }
        TypeClass::Sequence => {
            let count = read_compressed(buf)? as usize;
            let elem_name = ty.name.strip_prefix("[]").unwrap_or("");
            if elem_name == "byte" {
                ensure_remaining(buf, count, "byte sequence")?;
                let bytes = buf.copy_to_bytes(count);
                UnoValue::Sequence(bytes.iter().map(|b| UnoValue::Byte(*b)).collect())
            } else {
                let elem_type = Type {
                    class: guess_type_class(elem_name),
                    name: elem_name.to_string(),
                };
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    items.push(read_value_cached(buf, &elem_type, oid_cache)?);
                }
                UnoValue::Sequence(items)
            }
        }
        TypeClass::Interface => {
            let oid = read_string(buf)?;
            ensure_remaining(buf, 2, "interface cache index")?;
            let cache_index = buf.get_u16();
            let resolved = if oid.is_empty() && cache_index != NO_CACHE {
                cache_slot(oid_cache, cache_index, "OID")?.clone().unwrap_or_default()
            } else {
                if !oid.is_empty() && cache_index != NO_CACHE {
                    *cache_slot(oid_cache, cache_index, "OID")? = Some(oid.clone());
                }
                oid
            };
            UnoValue::Interface(resolved)
        }
    })
}

/// Slot `index` of a reader-side cache; wire indices past the end are errors.
pub(crate) fn cache_slot<'a, T>(
    cache: &'a mut [Option<T>],
    index: u16,
    what: &str,
) -> Result<&'a mut Option<T>> {
    let len = cache.len();
    cache
        .get_mut(usize::from(index))
        .ok_or_else(|| UrpError::Cache(format!("{what} cache index {index} out of range ({len})")))
}

fn ensure_remaining(buf: &Bytes, needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(UrpError::Marshal(format!(
            "unexpected end of data reading {what}: need {needed} bytes, have {}",
            buf.remaining()
        )));
    }
    Ok(())
}

/// Type class for a UNO type name, as found in sequence element names.
pub fn guess_type_class(name: &str) -> TypeClass {
    match name {
        "" | "void" => TypeClass::Void,
        "boolean" => TypeClass::Boolean,
        "byte" => TypeClass::Byte,
        "short" => TypeClass::Short,
        "unsigned short" => TypeClass::UnsignedShort,
        "long" => TypeClass::Long,
        "unsigned long" => TypeClass::UnsignedLong,
        "hyper" => TypeClass::Hyper,
        "unsigned hyper" => TypeClass::UnsignedHyper,
        "float" => TypeClass::Float,
        "double" => TypeClass::Double,
        "char" => TypeClass::Char,
        "string" => TypeClass::String,
        "type" => TypeClass::Type,
        "any" => TypeClass::Any,
        n if n.starts_with("[]") => TypeClass::Sequence,
        // Interface names follow the ".Xfoo" convention.
        n if n.contains(".X") => TypeClass::Interface,
        n if n.contains('.') => TypeClass::Struct,
        _ => TypeClass::Interface,
    }
}

/// Decode the structs this client can receive.
fn read_known_struct(
    buf: &mut Bytes,
    name: &str,
    oid_cache: &mut [Option<String>; 256],
) -> Result<UnoValue> {
    match name {
        type_names::PROPERTY_VALUE => {
            // Name, Handle, Value, State
            let prop_name = read_string(buf)?;
            ensure_remaining(buf, 4, "PropertyValue.Handle")?;
            let handle = buf.get_i32();
            let value = read_value_cached(buf, &Type::any(), oid_cache)?;
            ensure_remaining(buf, 4, "PropertyValue.State")?;
            let state = buf.get_i32();
            Ok(UnoValue::Struct(vec![
                UnoValue::String(prop_name),
                UnoValue::Long(handle),
                value,
                UnoValue::Enum(state),
            ]))
        }
        type_names::PROTOCOL_PROPERTY => {
            let prop_name = read_string(buf)?;
            let value = read_value_cached(buf, &Type::any(), oid_cache)?;
            Ok(UnoValue::Struct(vec![UnoValue::String(prop_name), value]))
        }
        _ => Err(UrpError::Marshal(format!("unknown struct type: {name}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn property(name: &str, value: UnoValue) -> UnoValue {
        UnoValue::Struct(vec![
            UnoValue::String(name.into()),
            UnoValue::Long(0),
            value,
            UnoValue::Enum(0),
        ])
    }

    #[test]
    fn compressed_numbers_switch_to_five_bytes_at_0xff() {
        let mut buf = BytesMut::new();
        write_compressed(&mut buf, 254);
        write_compressed(&mut buf, 255);
        assert_eq!(buf.as_ref(), &[254, 0xFF, 0, 0, 0, 255]);

        let mut bytes = buf.freeze();
        assert_eq!(read_compressed(&mut bytes).unwrap(), 254);
        assert_eq!(read_compressed(&mut bytes).unwrap(), 255);
    }

    #[test]
    fn strings_are_utf8_with_length_prefix() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "Übersicht");
        assert_eq!(buf[0] as usize, "Übersicht".len());

        let mut bytes = buf.freeze();
        assert_eq!(read_string(&mut bytes).unwrap(), "Übersicht");
    }

    #[test]
    fn truncated_string_is_a_marshal_error() {
        let mut bytes = Bytes::from_static(&[5, b'a', b'b']);
        assert!(matches!(read_string(&mut bytes), Err(UrpError::Marshal(_))));
    }

    #[test]
    fn new_complex_type_carries_its_name() {
        let ty = Type::interface(type_names::X_STORABLE);
        let mut buf = BytesMut::new();
        write_type(&mut buf, &ty, 7, true);
        assert_eq!(buf[0], TypeClass::Interface as u8 | 0x80);

        let mut bytes = buf.freeze();
        let (read, index, is_new) = read_type(&mut bytes).unwrap();
        assert_eq!(read, ty);
        assert_eq!(index, 7);
        assert!(is_new);
    }

    #[test]
    fn cached_interface_is_written_as_empty_oid() {
        let mut cache = LruCache::new();
        let mut buf = BytesMut::new();
        let doc = UnoValue::Interface("doc-42".into());
        write_value_cached(&mut buf, &doc, &Type::interface(""), Some(&mut cache));
        let first_len = buf.len();
        write_value_cached(&mut buf, &doc, &Type::interface(""), Some(&mut cache));
        assert_eq!(buf.len() - first_len, 3);

        let mut oids = [const { None }; 256];
        let mut bytes = buf.freeze();
        let ty = Type::interface("");
        assert_eq!(read_value_cached(&mut bytes, &ty, &mut oids).unwrap(), doc);
        assert_eq!(read_value_cached(&mut bytes, &ty, &mut oids).unwrap(), doc);
    }

    #[test]
    fn filter_data_nested_in_media_descriptor() {
        // FilterData is itself a PropertyValue sequence wrapped in an Any.
        let filter_data = UnoValue::Sequence(vec![
            property(
                "PermissionPassword",
                UnoValue::any(Type::string(), UnoValue::String("pass".into())),
            ),
            property(
                "RestrictPermissions",
                UnoValue::any(Type::boolean(), UnoValue::Bool(true)),
            ),
            property("Printing", UnoValue::any(Type::long(), UnoValue::Long(0))),
        ]);
        let descriptor = UnoValue::Sequence(vec![
            property(
                "FilterName",
                UnoValue::any(Type::string(), UnoValue::String("calc_pdf_Export".into())),
            ),
            property(
                "FilterData",
                UnoValue::any(Type::sequence(type_names::PROPERTY_VALUE), filter_data),
            ),
        ]);

        let ty = Type::sequence(type_names::PROPERTY_VALUE);
        let mut buf = BytesMut::new();
        write_value(&mut buf, &descriptor, &ty);

        let mut bytes = buf.freeze();
        assert_eq!(read_value(&mut bytes, &ty).unwrap(), descriptor);
        assert!(bytes.is_empty());
    }

    #[test]
    fn interface_cache_index_past_the_end_is_rejected() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "doc-7");
        buf.put_u16(300);
        let mut oids = [const { None }; 256];
        let err = read_value_cached(&mut buf.freeze(), &Type::interface(""), &mut oids).unwrap_err();
        assert!(matches!(err, UrpError::Cache(_)), "{err}");
    }
}
