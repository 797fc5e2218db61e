#![allow(dead_code)]

pub mod builders;
pub mod db;

pub use builders::{rules, ModelBuilder};
pub use db::TestDb;
