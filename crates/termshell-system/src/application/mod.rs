//! Application services for the system context.

pub mod service;
