//! API handlers
//!
//! Author: hephaex@gmail.com

pub mod account;
pub mod auth;
pub mod health;
