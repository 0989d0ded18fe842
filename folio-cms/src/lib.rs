pub mod client;
pub mod detail;
pub mod listing;
pub mod record;

#[cfg(test)]
pub(crate) mod testing;
