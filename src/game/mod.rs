//! Lane-runner simulation, independent of any terminal or renderer.
//!
//! The player runs in one of three lanes while obstacles and coins approach
//! along z. `Game::tick` advances one frame; rendering only reads state.

pub mod entity;
pub mod input;
pub mod world;

pub use input::Action;
pub use world::{Game, Phase};
