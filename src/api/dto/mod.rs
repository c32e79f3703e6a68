//! Data Transfer Objects for REST request/response serialization.
//!
//! Objects themselves travel as [`ResourceObject`](crate::domain::ResourceObject)
//! JSON; the types here cover query strings and list envelopes.

pub mod object_dto;

pub use object_dto::*;
