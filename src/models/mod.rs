pub mod feed;
pub mod help_q;
pub mod location;
pub mod notification;
pub mod remote_event;
pub mod tag;
pub mod user;

pub use feed::*;
pub use help_q::*;
pub use location::*;
pub use notification::*;
pub use remote_event::*;
pub use tag::*;
pub use user::*;
