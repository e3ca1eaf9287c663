pub mod dto;
pub mod relay;
pub mod routes;
