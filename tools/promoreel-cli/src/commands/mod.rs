pub mod check;
pub mod compose;
pub mod init;
pub mod layout;
pub mod plan;
pub mod validate;
