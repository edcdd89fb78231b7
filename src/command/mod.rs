//! Client subcommands
//!
//! - `ask`: run one command session and print the agent's answer
//! - `status`: print a snapshot of every light

mod ask;
mod status;

pub use ask::ask;
pub use status::status;
