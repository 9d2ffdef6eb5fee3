pub mod bus;
pub mod db;
pub mod directory;
pub mod favorites;
pub mod http;
pub mod interactions;
pub mod mpv;
pub mod notify;
pub mod player;
pub mod suggest;
