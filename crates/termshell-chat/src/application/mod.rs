//! Application layer for the chat context: model, view and controller.

pub mod controller;
pub mod model;
pub mod view;
