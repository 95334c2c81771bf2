//! Front ends for unwrapped-core: the HTTP API and terminal rendering.

pub mod api;
pub mod render;
