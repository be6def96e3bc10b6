//! Bookshelf application library
//!
//! Resource modules mounted by the bookshelf framework crates.

pub mod modules;
