//! Request handlers module

pub mod import;
