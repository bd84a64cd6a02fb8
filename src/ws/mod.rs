//! Persistent-connection surface: gateway, wire protocol and socket handler

pub mod gateway;
pub mod handler;
pub mod protocol;
