//! Database models, one file per table family.

pub mod account;
pub mod collection;
pub mod settings;
pub mod share;
pub mod subscription;

pub use self::account::*;
pub use self::collection::*;
pub use self::settings::*;
pub use self::share::*;
pub use self::subscription::*;
