//! tenderacquire - procurement tender document acquisition.
//!
//! Fetches every document category linked from a tender, classifies and
//! stores the files (unpacking archives), scrapes inline content into the
//! tender row, and hands stored documents to downstream analysis.

pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod scrapers;
pub mod services;
pub mod storage;
pub mod utils;
