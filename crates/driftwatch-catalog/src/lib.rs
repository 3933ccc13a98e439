//! # Driftwatch Catalog
//!
//! Clusters tool calls and tool results found in producer logs by where
//! and how they were rendered.
//!
//! ```text
//! record ──┬── structured extractor (per family) ──┐
//!          └── text candidates ── brace scanner ───┴─> ToolBlock
//!                                                        │
//!             (family, shape, normalized tool, direction) -> ToolEventGroup
//!                                       shape signature  -> ShapeStats
//! ```

pub mod braces;
pub mod catalog;
pub mod error;
pub mod fragment;
pub mod normalize;
pub mod producers;
pub mod render;
pub mod scan;
pub mod text;

pub use braces::{extract_balanced_braces, extract_raw_items, split_json_array_items};
pub use catalog::{
    BoundedList, Catalog, CatalogBuilder, CatalogLimits, CatalogSummary, Example, GroupKey,
    ShapeStats, ToolBlock, ToolEventGroup,
};
pub use error::CatalogError;
pub use fragment::{ParsedPayload, ToolFragment};
pub use normalize::{
    Direction, infer_direction, normalize_field_name, normalize_token, normalize_tool_name,
};
pub use producers::{StructuredExtractor, structured_extractor};
pub use render::render_markdown;
pub use scan::{
    CatalogRequest, DiscoveryRoots, build_catalog, collect_sources, discover_family,
    discover_fixture_files, droid_looks_like_stream_json, infer_fixture_family,
    opencode_part_files, scan_family, scan_sources,
};
pub use text::{TextToolBlock, extract_text_tool_blocks, text_candidates};
