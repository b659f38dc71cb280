pub mod cli;
pub mod consts;
pub mod database;
pub mod error;
pub mod filter;
pub mod keepassxc;
pub mod pipeline;
pub mod util;
pub mod xml;

pub use error::KptagError;
