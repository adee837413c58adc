//! Async frontend for the `resolvcache` mDNS responder, built on `async-io`.

pub mod responder;
