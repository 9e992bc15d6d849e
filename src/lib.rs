pub mod artifact;
pub mod config;
pub mod diff;
pub mod encode;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod schema;
pub mod source;

pub use encode::decode;

#[cfg(test)]
mod tests;
