pub mod client;
pub mod consumer;
pub mod producer;

#[cfg(test)]
pub(crate) mod testing;
