//! Configuration parsing for the dispatcher

pub mod launch;
