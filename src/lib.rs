pub mod cli;
pub mod colors;
pub mod compat;
pub mod environment;
pub mod error;
pub mod fsutil;
pub mod lockfile;
pub mod pep;
pub mod resolver;
pub mod solver;
pub mod wheel;
#[cfg(test)]
pub mod tests;
