//! Rendering of briefings, insights and proposals.

pub mod generator;

pub use generator::*;
