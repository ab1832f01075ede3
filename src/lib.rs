//! `bestbets_engine`: best-bets scoring service library.
//!
//! See each module's own doc comment for its slice of the contract (C1-C13
//! in the design notes). `pipeline` is the one module that ties every other
//! module together into the `best-bets(sport, date?)` request flow.

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod config;
pub mod contract;
pub mod errors;
pub mod integrations;
pub mod learning;
pub mod models;
pub mod normalize;
pub mod persistence;
pub mod pipeline;
pub mod prefetch;
pub mod scheduler;
pub mod selection;
pub mod signals;
pub mod telemetry;
pub mod time_authority;
