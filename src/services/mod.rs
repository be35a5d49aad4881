// src/services/mod.rs

pub mod answer_key;
pub mod exam;
pub mod integrity;
pub mod question_bank;
pub mod scoring;
pub mod variants;
