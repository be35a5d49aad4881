// src/models/mod.rs

pub mod attempt;
pub mod away_log;
pub mod issue;
pub mod question;
