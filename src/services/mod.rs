pub mod auth;
pub mod collections;
pub mod init;
pub mod lifecycle;
pub mod provisioning;
pub mod quota;
pub mod sharing;
pub mod validation;
pub mod verification;
