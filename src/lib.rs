//! docfields - structured field extraction from OCR block graphs.
//!
//! A document is sent to an analysis service, the returned blocks are
//! normalized into a `BlockGraph`, and a per-document-type extractor maps
//! them to canonical fields (W-2 boxes, bank statement balances and
//! transactions). `ProcessingPipeline` runs the whole thing with a single
//! fallback step when the service rejects an adapter or feature.

pub mod analyzer;
pub mod blocks;
pub mod cli;
pub mod confidence;
pub mod config;
pub mod document;
pub mod extract;
pub mod pipeline;

pub use blocks::{Block, BlockGraph, BlockType};
pub use document::DocumentType;
pub use extract::ExtractedFields;
pub use pipeline::{PipelineFailure, PipelineResult, ProcessingPipeline, ServiceBinding};
