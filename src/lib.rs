//! Cursor-style bindings for the TDengine client library.
//!
//! This crate wraps the natively installed TDengine client (`libtaos`) in a
//! connection/cursor API. The client library is loaded dynamically at
//! runtime, so the crate builds and its unit tests run on hosts without a
//! TDengine installation.
//!
//! # Features
//!
//! - Synchronous and async statement execution with block-wise row fetching
//! - Prepared statements with compile-time lifecycle checking
//! - Schemaless ingestion (InfluxDB line, OpenTSDB telnet and JSON)
//! - Continuous-query subscriptions with resumable progress
//!
//! # Quick Start
//!
//! ```ignore
//! use taos_cursor::{ConnectConfig, Executed, TaosConnection};
//!
//! let conn = TaosConnection::connect(&ConnectConfig {
//!     host: "localhost".into(),
//!     database: Some("power".into()),
//!     ..Default::default()
//! })?;
//!
//! let mut cursor = conn.cursor();
//! if let Executed::ResultSet = cursor.execute("select ts, current from meters")? {
//!     for row in cursor.fetch_all()? {
//!         println!("{row:?}");
//!     }
//! }
//! # Ok::<(), taos_cursor::TaosError>(())
//! ```
//!
//! # Module Structure
//!
//! - [`connection`]: connection establishment and lifetime
//! - [`cursor`]: statement execution and result retrieval
//! - [`stmt`] / [`bind`]: prepared statements and parameter buffers
//! - [`subscription`]: continuous-query subscriptions
//! - [`types`]: field metadata, cell values, block decoding
//! - [`error`]: the crate-wide error type

pub mod bind;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod stmt;
pub mod subscription;
pub mod types;

mod api;
mod library;
mod sys;

pub use bind::{BindArray, BindValue, MultiBind};
pub use connection::{ConnectConfig, TaosConnection};
pub use cursor::{Executed, SchemalessPrecision, SchemalessProtocol, TaosCursor};
pub use error::{Result, TaosError};
pub use library::client_available;
pub use stmt::{states, Stmt};
pub use subscription::{ConsumedRows, SubscribeConfig, Subscription};
pub use types::{Field, Precision, Ty, Value};
