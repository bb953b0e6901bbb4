//! medconsult - backend for a multi-role medical consultancy
//!
//! Clients open assignment requests that consultants price and complete,
//! researchers publish papers through a review queue, and management runs
//! the public site content (hero images, team, partners) from dashboards.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
