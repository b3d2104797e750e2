//! Shared utility functions for caseforge.
//!
//! This module provides common utilities used across multiple modules,
//! including JSON extraction from LLM responses.

pub mod json_extraction;

pub use json_extraction::{
    find_matching_brace, try_extract_json_from_response, JsonExtractionResult,
};
