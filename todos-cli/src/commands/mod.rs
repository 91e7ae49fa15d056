//! CLI command implementations.

pub mod init;
pub mod lists;
pub mod share;
pub mod status;
pub mod todos;
