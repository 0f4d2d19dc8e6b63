mod client;
mod config;
mod controller;
mod gemini;
mod prepare;

pub use client::{AnalysisClient, AnalysisError, ANALYSIS_FAILED_MESSAGE};
pub use config::{GeminiConfig, DEFAULT_GEMINI_API_BASE, DEFAULT_MODEL};
pub use controller::{SessionController, Settled};
pub use gemini::{GeminiClient, ASSUMED_MEDIA_TYPE, CLOTHING_SEARCH_PROMPT};
pub use prepare::prepare_image;
