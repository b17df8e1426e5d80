// Library exports for OpticRep
// This allows testing of internal modules

pub mod commands;
pub mod config;
pub mod models;
pub mod services;
pub mod storage;
