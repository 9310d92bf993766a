pub mod dto;
pub mod error;
pub mod handlers;
pub mod params;
pub mod routes;
