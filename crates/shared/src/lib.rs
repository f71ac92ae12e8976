//! Wire and domain types shared between the chat client crates.

pub mod domain;
pub mod error;
pub mod protocol;
