pub mod handlers;
pub mod imports;
pub mod middleware;
pub mod routes;
pub mod videos;
pub mod vod;

pub use routes::create_router;
