//! Book price lookup: fetches one search-results page for an ISBN and
//! extracts the new and used offers listed on it.

pub mod archiver;
pub mod config;
pub mod fetcher;
pub mod isbn;
pub mod models;
pub mod parser;
pub mod report;
pub mod tokenizer;
