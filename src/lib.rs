// src/lib.rs

//! Forum snapshot acquisition library.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
