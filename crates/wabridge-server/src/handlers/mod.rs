//! HTTP handlers

pub mod send;
pub mod session;
pub mod status;

#[cfg(test)]
pub(crate) mod test_support;
