pub mod audit;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod domain;
pub mod dto;
pub mod entity;
pub mod error;
pub mod media;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod response;
pub mod routes;
pub mod services;
pub mod startup;
pub mod state;
