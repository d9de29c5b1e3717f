#![allow(dead_code)]

pub mod helpers;
pub mod mocks;
pub mod strategies;

pub use helpers::*;
pub use mocks::*;
