//! Integration tests over synthetic documents

mod fixtures;
mod integration;
mod unit;
