pub mod init;
pub mod results;
pub mod take;
pub mod validate;
