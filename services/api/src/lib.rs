pub mod adapters;
pub mod config;
pub mod error;
pub mod sweep_task;
pub mod web;
