//! Detection strategies. Each file judges one class of evidence; the pure
//! judge functions are public so they can be tested without a server.

pub mod access;
pub mod credentials;
pub mod csrf;
pub mod differential;
pub mod dom;
pub mod redirect;
pub mod reflection;
pub mod signature;
pub mod timing;
pub mod upload;
