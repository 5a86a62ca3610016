pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod grant;
pub mod middleware;
pub mod oauth;
pub mod routes;
pub mod spam_prevention;
pub mod state;
pub mod token;
