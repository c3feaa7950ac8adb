pub mod app;
pub mod audit;
pub mod auth;
pub mod polls;
pub mod utils;

pub mod schema {
    pub mod api;
    pub mod db;
}

pub mod api {
    pub mod db;
    pub mod endpoints;
}
