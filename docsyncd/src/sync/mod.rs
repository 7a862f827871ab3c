pub mod controller;
pub mod engine;
pub mod gate;
pub mod scheduler;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;
