pub mod agent;
pub mod aggregate;
pub mod errors;
pub mod fragments;
pub mod models;
pub mod ordering;
pub mod pipeline;
