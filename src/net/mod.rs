//! Bind-address resolution and connection admission.

pub mod interfaces;
pub mod ip_filter;
pub mod resolve;
