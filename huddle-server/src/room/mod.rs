mod connection;
mod directory;
mod room;
mod room_command;
mod room_manager;

pub use connection::*;
pub use directory::*;
pub use room::*;
pub use room_command::*;
pub use room_manager::*;
