pub mod avatar;
pub mod password;
pub mod permission;
pub mod token;

pub use permission::Permission;
pub use token::{TokenCodec, TokenPurpose};
