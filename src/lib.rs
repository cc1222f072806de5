pub mod bellman;
pub mod config;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod line;
pub mod model;
pub mod mrp;
pub mod policy;
pub mod portfolio;
pub mod production;
pub mod random;
pub mod regime;
pub mod report;
pub mod robot;
pub mod stock;
pub mod trajectory;
