pub mod camera;
pub mod config;
pub mod hand;
pub mod logging;
pub mod pipeline;
pub mod protocol;
pub mod server;
