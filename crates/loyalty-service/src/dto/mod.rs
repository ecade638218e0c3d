//! Data Transfer Objects
//!
//! Request DTOs are deserialized from camelCase JSON and validated with
//! `validator`; response DTOs serialize back to camelCase.

pub mod mappers;
pub mod requests;
pub mod responses;

pub use requests::*;
pub use responses::*;
