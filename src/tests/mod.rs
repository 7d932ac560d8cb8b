pub mod common;
pub mod compat;
pub mod lockfile;
pub mod solver;
