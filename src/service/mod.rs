pub mod clock;
pub mod lock_guard;
pub mod scorer;
pub mod standings;
pub mod submission;
pub mod synthesizer;

#[cfg(test)]
pub(crate) mod test_support;
