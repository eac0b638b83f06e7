//! Album birthdays: find the albums in a listening library whose release
//! anniversary falls on a given day, ranked by how much they were played.

pub mod birthdays;
pub mod config;
pub mod consolidate;
pub mod error;
pub mod ingest;
pub mod matching;
pub mod models;
pub mod progress;
pub mod ranking;
pub mod release_date;
pub mod safety;
