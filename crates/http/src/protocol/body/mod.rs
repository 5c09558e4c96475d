//! HTTP request body handling implementation.
//!
//! [`ReqBody`] implements `http_body::Body` by streaming directly from the
//! connection's `FramedRead`, via a pointer-sized handle so the generic
//! reader type never leaks into the public body type. See `req_body`'s own
//! docs for the ownership handoff between a request's `ReqBody` and the
//! `ReqBodyState` the connection uses to reclaim the reader once the handler
//! is done with it.

mod req_body;

pub use req_body::ReqBody;

