pub mod authenticate;
pub mod protect;

pub use authenticate::AuthenticateHook;
pub use protect::ProtectHook;
