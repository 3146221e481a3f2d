//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → dispatcher.rs (accept loop, session resolution, request task)
//!     → request.rs (request ID, parameter parsing)
//!     → [routing layer produces a ResponsePacket]
//!     → response.rs (redirect or content response)
//!     → Send to client, close connection
//! ```

pub mod dispatcher;
pub mod packet;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::{Dispatcher, RequestFailure};
pub use packet::{ResponsePacket, ServerError};
pub use request::{Params, RawRequest, RequestId, X_REQUEST_ID};
pub use server::{HttpServer, Hooks, OnError, OnRequest, ServeError, ServerBuilder, ServerState};
