pub mod app;
pub mod camera;
pub mod config;
pub mod display;
pub mod explorer;
pub mod graph;
pub mod layout;
pub mod lens;
pub mod physics;
pub mod store;
pub mod util;
pub mod worker;

pub use explorer::Explorer;
