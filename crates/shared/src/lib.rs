pub mod abstract_trait;
pub mod codec;
pub mod config;
pub mod database;
pub mod domain;
pub mod errors;
pub mod generator;
pub mod kafka;
pub mod repository;
pub mod retry;
pub mod service;
pub mod worker;
