// Library for tests to access modules

pub mod aggregator;
pub mod config;
pub mod hub;
pub mod models;
pub mod ordering;
pub mod prober;
pub mod registry;
pub mod routes;
pub mod scheduler;
pub mod version;
