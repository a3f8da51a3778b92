//! Minimal UNO Remote Protocol (URP) client for LibreOffice.
//!
//! A headless LibreOffice started with
//!
//! ```text
//! soffice --headless --accept="socket,host=127.0.0.1,port=8100;urp;StarOffice.ComponentContext"
//! ```
//!
//! exposes its component context over a TCP socket. This crate speaks just
//! enough URP to drive document conversion through that socket: bootstrap the
//! `Desktop`, load a document, store it through an export filter, close it and
//! terminate the office.
//!
//! # Layers
//!
//! - [`transport`]: block framing over TCP
//! - [`marshal`]: binary encoding of UNO values
//! - [`protocol`]: request/reply headers and the 256-entry caches
//! - [`connection`]: negotiation, method calls, bootstrap
//!
//! # Example
//!
//! ```rust,no_run
//! use libreoffice_urp::UrpConnection;
//!
//! # async fn example() -> libreoffice_urp::Result<()> {
//! let mut conn = UrpConnection::connect("127.0.0.1", 8100).await?;
//! let office = conn.bootstrap().await?;
//! println!("desktop: {}", office.desktop.oid);
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod interface;
pub mod marshal;
pub mod protocol;
pub mod proxy;
pub mod transport;
pub mod types;

pub use connection::{OfficeRoots, UrpConnection};
pub use error::{Result, UrpError};
pub use proxy::UnoProxy;
pub use types::{Any, Type, TypeClass, UnoValue};
