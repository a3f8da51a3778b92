//! A URP session with one office process.
//!
//! `UrpConnection` owns the socket and both cache directions. It negotiates
//! protocol properties on connect, then offers synchronous-style method calls
//! on remote objects and the bootstrap that reaches the `Desktop`.

use bytes::{BufMut, BytesMut};
use tokio::net::TcpStream;

use crate::error::{Result, UrpError};
use crate::interface::{self, MethodDef};
use crate::marshal::{self, NO_CACHE};
use crate::protocol::{
    self, ReaderState, UrpMessage, WriterState, FN_COMMIT_CHANGE, FN_REQUEST_CHANGE,
    OID_PROTOCOL_PROPERTIES, TID_PROTOCOL_PROPERTIES,
};
use crate::proxy::{self, UnoProxy};
use crate::transport::Transport;
use crate::types::{type_names, Type, UnoValue};

/// Well-known name the office exports its component context under.
pub const INITIAL_OBJECT: &str = "StarOffice.ComponentContext";

/// Root objects obtained by [`UrpConnection::bootstrap`].
#[derive(Debug, Clone)]
pub struct OfficeRoots {
    pub context: UnoProxy,
    pub service_manager: UnoProxy,
    /// The `Desktop`, typed as `XComponentLoader`.
    pub desktop: UnoProxy,
}

pub struct UrpConnection {
    transport: Transport,
    reader: ReaderState,
    writer: WriterState,
    next_tid: u64,
    /// Set once both sides agreed on CurrentContext; every call then carries
    /// a (null) current-context reference ahead of its arguments.
    current_context: bool,
}

impl UrpConnection {
    /// Connect to `host:port` and negotiate protocol properties.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr).await.map_err(|e| {
            UrpError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to connect to office at {addr}: {e}"),
            ))
        })?;
        stream.set_nodelay(true)?;
        tracing::debug!("Connected to office at {addr}");

        let mut conn = Self {
            transport: Transport::new(stream),
            reader: ReaderState::new(),
            writer: WriterState::new(),
            next_tid: 1,
            current_context: false,
        };
        conn.negotiate_protocol().await?;
        Ok(conn)
    }

    fn fresh_tid(&mut self) -> Vec<u8> {
        let n = self.next_tid;
        self.next_tid += 1;
        format!("sheets-pdf-tid-{n}").into_bytes()
    }

    /// Protocol-properties handshake.
    ///
    /// Both sides may send `requestChange` with a random number; the larger
    /// number wins and the winner sends `commitChange`. Any exception from
    /// the peer just means it does not negotiate, which is fine.
    async fn negotiate_protocol(&mut self) -> Result<()> {
        let ours: i32 = rand::random();
        let tid = TID_PROTOCOL_PROPERTIES.to_vec();
        let proto_type = Type::interface(type_names::X_PROTOCOL_PROPERTIES);
        tracing::debug!("Sending requestChange({ours})");

        let mut body = BytesMut::new();
        marshal::write_value(&mut body, &UnoValue::Long(ours), &Type::long());
        let msg = self.writer.encode_request(
            FN_REQUEST_CHANGE,
            &proto_type,
            OID_PROTOCOL_PROPERTIES,
            &tid,
            true,
            &body,
        );
        self.transport.send_message(&msg).await?;

        loop {
            let data = self.transport.recv_message().await?;
            match self.reader.decode_message(data)? {
                UrpMessage::Reply(reply) => {
                    if reply.is_exception {
                        tracing::debug!("Peer rejected requestChange; staying in plain mode");
                        return Ok(());
                    }
                    let mut body = reply.body;
                    let verdict = if body.len() >= 4 {
                        marshal::read_value(&mut body, &Type::long())?
                    } else {
                        UnoValue::Long(1)
                    };
                    match verdict {
                        UnoValue::Long(1) => {
                            self.send_commit_change(&tid, &proto_type).await?;
                            self.current_context = true;
                        }
                        UnoValue::Long(0) => {
                            self.wait_for_commit_change().await?;
                            self.current_context = true;
                        }
                        other => {
                            tracing::debug!("requestChange returned {other:?}; staying in plain mode");
                        }
                    }
                    return Ok(());
                }
                UrpMessage::Request(req) if req.function_id == FN_REQUEST_CHANGE => {
                    let mut body = req.body;
                    let theirs = match marshal::read_value(&mut body, &Type::long()) {
                        Ok(UnoValue::Long(n)) => n,
                        _ => 0,
                    };
                    let answer: i32 = match ours.cmp(&theirs) {
                        std::cmp::Ordering::Greater => 0,
                        std::cmp::Ordering::Less => 1,
                        std::cmp::Ordering::Equal => -1,
                    };
                    tracing::debug!("requestChange collision: ours={ours} theirs={theirs}");

                    let mut reply_body = BytesMut::new();
                    marshal::write_value(&mut reply_body, &UnoValue::Long(answer), &Type::long());
                    let reply = self.writer.encode_reply(&req.tid, false, &reply_body);
                    self.transport.send_message(&reply).await?;

                    if answer == 1 {
                        self.wait_for_commit_change().await?;
                        self.current_context = true;
                        return Ok(());
                    }
                }
                UrpMessage::Request(req) if req.function_id == FN_COMMIT_CHANGE => {
                    let reply = self.writer.encode_reply(&req.tid, false, &[]);
                    self.transport.send_message(&reply).await?;
                    self.current_context = true;
                    return Ok(());
                }
                UrpMessage::Request(req) => {
                    tracing::trace!("Ignoring request fn={} during negotiation", req.function_id);
                }
            }
        }
    }

    async fn send_commit_change(&mut self, tid: &[u8], proto_type: &Type) -> Result<()> {
        // [ ProtocolProperty { Name: "CurrentContext", Value: void } ]
        let mut body = BytesMut::new();
        marshal::write_compressed(&mut body, 1);
        marshal::write_string(&mut body, "CurrentContext");
        marshal::write_type(&mut body, &Type::void(), NO_CACHE, false);

        let msg = self.writer.encode_request(
            FN_COMMIT_CHANGE,
            proto_type,
            OID_PROTOCOL_PROPERTIES,
            tid,
            true,
            &body,
        );
        self.transport.send_message(&msg).await?;

        let data = self.transport.recv_message().await?;
        match self.reader.decode_message(data)? {
            UrpMessage::Reply(reply) if reply.is_exception => {
                tracing::warn!("Peer raised an exception on commitChange");
            }
            UrpMessage::Reply(_) => {}
            UrpMessage::Request(_) => {
                tracing::warn!("Expected a reply to commitChange, got a request");
            }
        }
        Ok(())
    }

    async fn wait_for_commit_change(&mut self) -> Result<()> {
        loop {
            let data = self.transport.recv_message().await?;
            if let UrpMessage::Request(req) = self.reader.decode_message(data)? {
                if req.function_id == FN_COMMIT_CHANGE {
                    let reply = self.writer.encode_reply(&req.tid, false, &[]);
                    self.transport.send_message(&reply).await?;
                    return Ok(());
                }
            }
        }
    }

    /// Invoke `method` on `target` and wait for its reply.
    ///
    /// Replies are assumed to arrive in call order. Incoming `release` calls
    /// are dropped and other incoming requests get a void reply, since this
    /// client exports no objects.
    pub async fn call(
        &mut self,
        target: &UnoProxy,
        method: &MethodDef,
        args: &[UnoValue],
    ) -> Result<UnoValue> {
        let params = proxy::serialize_params(method, args, &mut self.writer.oid_cache)?;
        let tid = self.fresh_tid();

        let mut body = BytesMut::with_capacity(params.len() + 3);
        if self.current_context && !method.one_way {
            marshal::write_string(&mut body, "");
            body.put_u16(NO_CACHE);
        }
        body.extend_from_slice(&params);

        let msg = self.writer.encode_request(
            method.index,
            &target.interface_type,
            &target.oid,
            &tid,
            !method.one_way,
            &body,
        );
        tracing::trace!("-> {}() on {}", method.name, target.oid);
        self.transport.send_message(&msg).await?;

        if method.one_way {
            return Ok(UnoValue::Void);
        }

        loop {
            let data = self.transport.recv_message().await?;
            match self.reader.decode_message(data)? {
                UrpMessage::Reply(reply) if reply.is_exception => {
                    return Err(self.remote_exception(reply.body));
                }
                UrpMessage::Reply(reply) => {
                    let value =
                        proxy::deserialize_return(method, reply.body, &mut self.reader.oid_cache)?;
                    tracing::trace!("<- {}() = {value:?}", method.name);
                    return Ok(value);
                }
                UrpMessage::Request(req) if req.function_id == protocol::FN_RELEASE => {
                    tracing::trace!("Ignoring release of {}", req.oid);
                }
                UrpMessage::Request(req) => {
                    if req.must_reply {
                        let reply = self.writer.encode_reply(&req.tid, false, &[]);
                        self.transport.send_message(&reply).await?;
                    }
                }
            }
        }
    }

    fn remote_exception(&mut self, mut body: bytes::Bytes) -> UrpError {
        if body.is_empty() {
            return UrpError::RemoteException {
                type_name: String::new(),
                message: "(empty exception)".into(),
            };
        }
        match marshal::read_value_cached(&mut body, &Type::any(), &mut self.reader.oid_cache) {
            Ok(UnoValue::Any(any)) => match any.value {
                UnoValue::Exception(exc) => UrpError::RemoteException {
                    type_name: exc.type_name,
                    message: exc.message,
                },
                other => UrpError::RemoteException {
                    type_name: any.type_desc.name,
                    message: format!("{other:?}"),
                },
            },
            Ok(other) => UrpError::RemoteException {
                type_name: String::new(),
                message: format!("{other:?}"),
            },
            Err(e) => e,
        }
    }

    /// `queryInterface`, always sent through `XInterface`.
    pub async fn query_interface(
        &mut self,
        target: &UnoProxy,
        wanted: Type,
    ) -> Result<Option<UnoProxy>> {
        let base = target.retyped(Type::interface(type_names::X_INTERFACE));
        let result = self
            .call(&base, &interface::query_interface(), &[UnoValue::Type(wanted.clone())])
            .await?;
        proxy::extract_query_interface_result(result, wanted)
    }

    /// Like [`query_interface`](Self::query_interface) but an unsupported
    /// interface is an error.
    pub async fn require_interface(&mut self, target: &UnoProxy, type_name: &str) -> Result<UnoProxy> {
        self.query_interface(target, Type::interface(type_name))
            .await?
            .ok_or_else(|| {
                UrpError::Protocol(format!("object {} does not implement {type_name}", target.oid))
            })
    }

    /// Resolve the component context, its service manager and the `Desktop`.
    pub async fn bootstrap(&mut self) -> Result<OfficeRoots> {
        let initial = UnoProxy::new(INITIAL_OBJECT, Type::interface(type_names::X_INTERFACE));
        let context_type = Type::interface(type_names::X_COMPONENT_CONTEXT);
        let context = self
            .query_interface(&initial, context_type.clone())
            .await?
            .unwrap_or_else(|| initial.retyped(context_type));
        tracing::debug!("Component context: {}", context.oid);

        let sm = self.call(&context, &interface::get_service_manager(), &[]).await?;
        let sm_oid = proxy::extract_oid_from_return(&sm)
            .ok_or_else(|| UrpError::Protocol("getServiceManager returned null".into()))?;
        let service_manager =
            UnoProxy::new(sm_oid, Type::interface(type_names::X_MULTI_COMPONENT_FACTORY));

        let created = self
            .call(
                &service_manager,
                &interface::create_instance_with_context(),
                &[
                    UnoValue::String(type_names::SERVICE_DESKTOP.to_string()),
                    UnoValue::Interface(context.oid.clone()),
                ],
            )
            .await?;
        let desktop_oid = proxy::extract_oid_from_return(&created).ok_or_else(|| {
            UrpError::Protocol("createInstanceWithContext(Desktop) returned null".into())
        })?;
        let loader_type = Type::interface(type_names::X_COMPONENT_LOADER);
        let raw = UnoProxy::new(desktop_oid, loader_type.clone());
        let desktop = self.query_interface(&raw, loader_type).await?.unwrap_or(raw);
        tracing::debug!("Desktop: {}", desktop.oid);

        Ok(OfficeRoots {
            context,
            service_manager,
            desktop,
        })
    }

    /// Close the socket's write half.
    pub async fn close(mut self) -> Result<()> {
        self.transport.shutdown().await
    }
}
