pub mod solve;
pub mod strategies;
