pub mod cli;
pub mod collector;
pub mod config;
pub mod invoker;
pub mod record;
pub mod service;
pub mod sink;
pub mod source;
pub mod storage;
pub mod telemetry;
pub mod timeseries;
pub mod transform;
pub mod web;
