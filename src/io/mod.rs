//! File formats for plans and models.

pub mod export;
