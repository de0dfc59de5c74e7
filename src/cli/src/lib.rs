//! imgstore CLI - load, list and tag images in a local image store.

pub mod commands;
pub mod output;
