//! Library side of the farepass bus-fare system.
//!
//! The client half scans bus QR codes, posts them to the fare server and
//! shows the outcome as a transient banner. Everything that would touch a
//! browser document goes through the [`page::Page`] port so the pipeline
//! can run against an in-memory page. The server half keeps the accounts
//! and fares in a [`ledger::Ledger`] behind an axum router.
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod form;
pub mod ledger;
pub mod notify;
pub mod page;
pub mod request;
pub mod response;
pub mod routes;
pub mod scanner;
pub mod state;
pub mod submit;
