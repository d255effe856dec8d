// anggar-daemon library entry point.

pub mod ai;
pub mod catalog;
pub mod config;
pub mod pricing;
pub mod rpc;
pub mod runtime;
pub mod session;
pub mod startup;
pub mod store;
