//! URP message headers and the per-direction caches.
//!
//! Each side keeps 256-entry caches for types, OIDs and thread ids, plus a
//! "last used" slot for each. A request whose type, OID and TID all match the
//! last ones can be sent with a one- or two-byte short header.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, UrpError};
use crate::marshal::{self, NO_CACHE};
use crate::types::Type;

const FLAG_LONGHEADER: u8 = 0x80;
const FLAG_REQUEST: u8 = 0x40;
const FLAG_NEWTYPE: u8 = 0x20;
const FLAG_NEWOID: u8 = 0x10;
const FLAG_NEWTID: u8 = 0x08;
const FLAG_FUNCTIONID16: u8 = 0x04;
const FLAG_MOREFLAGS: u8 = 0x01;

// Reply header
const FLAG_EXCEPTION: u8 = 0x20;

// Second flags byte
const FLAG_MUSTREPLY: u8 = 0x80;
const FLAG_SYNCHRONOUS: u8 = 0x40;

/// OID the bridges use for protocol-properties negotiation.
pub const OID_PROTOCOL_PROPERTIES: &str = "UrpProtocolProperties";

/// TID the bridges use for protocol-properties negotiation.
pub const TID_PROTOCOL_PROPERTIES: &[u8] = b".UrpProtocolPropertiesTid";

pub const FN_RELEASE: u16 = 2;
pub const FN_REQUEST_CHANGE: u16 = 4;
pub const FN_COMMIT_CHANGE: u16 = 5;

#[derive(Debug, Clone)]
pub struct UrpRequest {
    pub function_id: u16,
    pub type_name: Type,
    pub oid: String,
    pub tid: Vec<u8>,
    pub must_reply: bool,
    pub synchronous: bool,
    /// Encoded in-parameters.
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct UrpReply {
    pub tid: Vec<u8>,
    pub is_exception: bool,
    /// Encoded return value, or an `Any` holding the exception.
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub enum UrpMessage {
    Request(UrpRequest),
    Reply(UrpReply),
}

/// Caches filled by the peer's writer, used to decode what it sends.
pub struct ReaderState {
    pub type_cache: [Option<Type>; 256],
    pub oid_cache: [Option<String>; 256],
    pub tid_cache: [Option<Vec<u8>>; 256],
    pub last_type: Option<Type>,
    pub last_oid: Option<String>,
    pub last_tid: Option<Vec<u8>>,
}

impl Default for ReaderState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderState {
    pub fn new() -> Self {
        Self {
            type_cache: std::array::from_fn(|_| None),
            oid_cache: std::array::from_fn(|_| None),
            tid_cache: std::array::from_fn(|_| None),
            last_type: None,
            last_oid: None,
            last_tid: None,
        }
    }

    pub fn decode_message(&mut self, data: Bytes) -> Result<UrpMessage> {
        let Some(&first) = data.first() else {
            return Err(UrpError::Protocol("empty message".into()));
        };

        if first & FLAG_LONGHEADER == 0 {
            self.decode_short_request(data)
        } else if first & FLAG_REQUEST != 0 {
            self.decode_long_request(data)
        } else {
            self.decode_reply(data)
        }
    }

    fn decode_short_request(&mut self, mut data: Bytes) -> Result<UrpMessage> {
        let first = data.get_u8();
        let function_id = if first & 0x40 != 0 {
            if !data.has_remaining() {
                return Err(UrpError::Protocol(
                    "short request: missing low function id byte".into(),
                ));
            }
            (((first & 0x3F) as u16) << 8) | data.get_u8() as u16
        } else {
            (first & 0x3F) as u16
        };

        Ok(UrpMessage::Request(UrpRequest {
            function_id,
            type_name: Self::last(&self.last_type, "type")?,
            oid: Self::last(&self.last_oid, "OID")?,
            tid: Self::last(&self.last_tid, "TID")?,
            must_reply: true,
            synchronous: true,
            body: data,
        }))
    }

    fn decode_long_request(&mut self, mut data: Bytes) -> Result<UrpMessage> {
        let flags = data.get_u8();
        let (mut must_reply, mut synchronous) = (true, true);

        if flags & FLAG_MOREFLAGS != 0 {
            ensure(&data, 1, "long request: missing second flags byte")?;
            let flags2 = data.get_u8();
            must_reply = flags2 & FLAG_MUSTREPLY != 0;
            synchronous = flags2 & FLAG_SYNCHRONOUS != 0;
        }

        let function_id = if flags & FLAG_FUNCTIONID16 != 0 {
            ensure(&data, 2, "long request: missing function id")?;
            data.get_u16()
        } else {
            ensure(&data, 1, "long request: missing function id")?;
            data.get_u8() as u16
        };

        let type_name = if flags & FLAG_NEWTYPE != 0 {
            let (ty, index, is_new) = marshal::read_type(&mut data)?;
            let resolved = match (is_new, index) {
                (true, NO_CACHE) => ty,
                (true, index) => {
                    *marshal::cache_slot(&mut self.type_cache, index, "type")? = Some(ty.clone());
                    ty
                }
                (false, NO_CACHE) => ty,
                (false, index) => marshal::cache_slot(&mut self.type_cache, index, "type")?
                    .clone()
                    .ok_or_else(|| UrpError::Cache(format!("type cache miss at index {index}")))?,
            };
            self.last_type = Some(resolved.clone());
            resolved
        } else {
            Self::last(&self.last_type, "type")?
        };

        let oid = if flags & FLAG_NEWOID != 0 {
            let oid = marshal::read_string(&mut data)?;
            ensure(&data, 2, "long request: missing OID cache index")?;
            let index = data.get_u16();
            let resolved = if oid.is_empty() && index != NO_CACHE {
                marshal::cache_slot(&mut self.oid_cache, index, "OID")?
                    .clone()
                    .ok_or_else(|| UrpError::Cache(format!("OID cache miss at index {index}")))?
            } else {
                if !oid.is_empty() && index != NO_CACHE {
                    *marshal::cache_slot(&mut self.oid_cache, index, "OID")? = Some(oid.clone());
                }
                oid
            };
            self.last_oid = Some(resolved.clone());
            resolved
        } else {
            Self::last(&self.last_oid, "OID")?
        };

        let tid = if flags & FLAG_NEWTID != 0 {
            self.read_tid(&mut data)?
        } else {
            Self::last(&self.last_tid, "TID")?
        };

        Ok(UrpMessage::Request(UrpRequest {
            function_id,
            type_name,
            oid,
            tid,
            must_reply,
            synchronous,
            body: data,
        }))
    }

    fn decode_reply(&mut self, mut data: Bytes) -> Result<UrpMessage> {
        let flags = data.get_u8();
        let tid = if flags & FLAG_NEWTID != 0 {
            self.read_tid(&mut data)?
        } else {
            Self::last(&self.last_tid, "TID")?
        };

        Ok(UrpMessage::Reply(UrpReply {
            tid,
            is_exception: flags & FLAG_EXCEPTION != 0,
            body: data,
        }))
    }

    fn read_tid(&mut self, data: &mut Bytes) -> Result<Vec<u8>> {
        let len = marshal::read_compressed(data)? as usize;
        ensure(data, len, "TID: not enough bytes")?;
        let tid = data.copy_to_bytes(len).to_vec();
        ensure(data, 2, "TID: missing cache index")?;
        let index = data.get_u16();

        let resolved = if tid.is_empty() && index != NO_CACHE {
            marshal::cache_slot(&mut self.tid_cache, index, "TID")?
                .clone()
                .ok_or_else(|| UrpError::Cache(format!("TID cache miss at index {index}")))?
        } else {
            if !tid.is_empty() && index != NO_CACHE {
                *marshal::cache_slot(&mut self.tid_cache, index, "TID")? = Some(tid.clone());
            }
            tid
        };
        self.last_tid = Some(resolved.clone());
        Ok(resolved)
    }

    fn last<T: Clone>(slot: &Option<T>, what: &str) -> Result<T> {
        slot.clone()
            .ok_or_else(|| UrpError::Protocol(format!("header reuses {what} but none was sent")))
    }
}

fn ensure(data: &Bytes, needed: usize, message: &str) -> Result<()> {
    if data.remaining() < needed {
        return Err(UrpError::Protocol(message.into()));
    }
    Ok(())
}

/// Our mirror of what the peer has cached from us.
pub struct WriterState {
    pub type_cache: LruCache<Type>,
    pub oid_cache: LruCache<String>,
    pub tid_cache: LruCache<Vec<u8>>,
    pub last_type: Option<Type>,
    pub last_oid: Option<String>,
    pub last_tid: Option<Vec<u8>>,
}

impl Default for WriterState {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterState {
    pub fn new() -> Self {
        Self {
            type_cache: LruCache::new(),
            oid_cache: LruCache::new(),
            tid_cache: LruCache::new(),
            last_type: None,
            last_oid: None,
            last_tid: None,
        }
    }

    pub fn encode_request(
        &mut self,
        function_id: u16,
        type_name: &Type,
        oid: &str,
        tid: &[u8],
        must_reply: bool,
        body: &[u8],
    ) -> BytesMut {
        let mut buf = BytesMut::with_capacity(64 + body.len());

        let new_type = self.last_type.as_ref() != Some(type_name);
        let new_oid = self.last_oid.as_deref() != Some(oid);
        let new_tid = self.last_tid.as_deref() != Some(tid);

        if !new_type && !new_oid && !new_tid && must_reply {
            if function_id < 0x40 {
                buf.put_u8(function_id as u8);
                buf.put_slice(body);
                return buf;
            }
            if function_id < 0x4000 {
                buf.put_u8(((function_id >> 8) as u8) | 0x40);
                buf.put_u8((function_id & 0xFF) as u8);
                buf.put_slice(body);
                return buf;
            }
        }

        let func16 = function_id > 0xFF;
        let mut flags = FLAG_LONGHEADER | FLAG_REQUEST;
        if new_type {
            flags |= FLAG_NEWTYPE;
        }
        if new_oid {
            flags |= FLAG_NEWOID;
        }
        if new_tid {
            flags |= FLAG_NEWTID;
        }
        if func16 {
            flags |= FLAG_FUNCTIONID16;
        }
        // Without MOREFLAGS the peer assumes a synchronous call that wants a reply.
        if !must_reply {
            flags |= FLAG_MOREFLAGS;
        }
        buf.put_u8(flags);
        if !must_reply {
            buf.put_u8(0);
        }

        if func16 {
            buf.put_u16(function_id);
        } else {
            buf.put_u8(function_id as u8);
        }

        if new_type {
            if type_name.class.is_simple() {
                marshal::write_type(&mut buf, type_name, NO_CACHE, false);
            } else {
                let (index, is_new) = self.type_cache.insert_or_get(type_name.clone());
                marshal::write_type(&mut buf, type_name, index, is_new);
            }
            self.last_type = Some(type_name.clone());
        }

        if new_oid {
            let (index, is_new) = self.oid_cache.insert_or_get(oid.to_string());
            marshal::write_string(&mut buf, if is_new { oid } else { "" });
            buf.put_u16(index);
            self.last_oid = Some(oid.to_string());
        }

        if new_tid {
            self.write_tid(&mut buf, tid);
        }

        buf.put_slice(body);
        buf
    }

    pub fn encode_reply(&mut self, tid: &[u8], is_exception: bool, body: &[u8]) -> BytesMut {
        let mut buf = BytesMut::with_capacity(16 + body.len());
        let new_tid = self.last_tid.as_deref() != Some(tid);

        let mut flags = FLAG_LONGHEADER;
        if is_exception {
            flags |= FLAG_EXCEPTION;
        }
        if new_tid {
            flags |= FLAG_NEWTID;
        }
        buf.put_u8(flags);

        if new_tid {
            self.write_tid(&mut buf, tid);
        }
        buf.put_slice(body);
        buf
    }

    fn write_tid(&mut self, buf: &mut BytesMut, tid: &[u8]) {
        let (index, is_new) = self.tid_cache.insert_or_get(tid.to_vec());
        if is_new {
            marshal::write_compressed(buf, tid.len() as u32);
            buf.put_slice(tid);
        } else {
            marshal::write_compressed(buf, 0);
        }
        buf.put_u16(index);
        self.last_tid = Some(tid.to_vec());
    }
}

/// 256 slots with round-robin eviction, mirroring the peer's reader cache.
pub struct LruCache<T: Clone + PartialEq> {
    entries: [Option<T>; 256],
    next_index: u16,
}

impl<T: Clone + PartialEq> Default for LruCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq> LruCache<T> {
    pub fn new() -> Self {
        Self {
            entries: std::array::from_fn(|_| None),
            next_index: 0,
        }
    }

    /// Returns `(index, true)` for a newly inserted value, `(index, false)` on a hit.
    pub fn insert_or_get(&mut self, value: T) -> (u16, bool) {
        if let Some(i) = self
            .entries
            .iter()
            .position(|entry| entry.as_ref() == Some(&value))
        {
            return (i as u16, false);
        }

        let index = self.next_index;
        self.entries[index as usize] = Some(value);
        self.next_index = (self.next_index + 1) % 256;
        (index, true)
    }
}
