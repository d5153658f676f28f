//! Supporting services around the core pipeline

pub mod io;
