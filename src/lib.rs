pub mod config;
pub mod controller;
pub mod db;
pub mod gateway;
pub mod ipc;
pub mod render;
pub mod store;
pub mod validate;
