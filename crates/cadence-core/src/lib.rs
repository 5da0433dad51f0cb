//! Cadence core: habits, their completion history, and the streak engine.
//!
//! The [`service::HabitService`] façade is the entry point used by the web
//! and CLI front ends. Everything below it is synchronous, pure logic over a
//! [`model::Habit`] except the [`storage`] layer.

pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod model;
pub mod patterns;
pub mod service;
pub mod state;
pub mod storage;
pub mod streak;
