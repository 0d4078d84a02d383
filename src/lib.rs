//! `pgnsift`: a streaming PGN processing pipeline.
//!
//! Reads large multi-game PGN archives and runs them through a
//! configurable pipeline of filters (validation, ECO tagging,
//! deduplication, CQL queries, material/ply bounds) before writing the
//! surviving games back out, optionally split across several files.
//!
//! Leaves-first module order: [`chess`] (board model and move-legal
//! engine) underlies [`pgn`] (parser), which underlies [`eco`], [`dedup`]
//! and [`cql`], which underlie [`filter`] (the pipeline itself), which is
//! driven by [`worker`] and written out by [`output`].

// TODO: Gradually move most of warnings to deny.
#![warn(missing_docs, variant_size_differences)]
// Rustc lints.
#![warn(
    absolute_paths_not_starting_with_crate,
    keyword_idents,
    macro_use_extern_crate,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_import_braces,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]
// Rustdoc lints.
#![warn(
    rustdoc::missing_doc_code_examples,
    rustdoc::private_doc_tests,
    rustdoc::missing_crate_level_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::invalid_codeblock_attributes,
    rustdoc::invalid_html_tags,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::bare_urls
)]
// Clippy lints.
#![warn(
    clippy::correctness,
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
// Performance is extremely important.
#![deny(clippy::perf)]

pub mod chess;
pub mod config;
pub mod cql;
pub mod dedup;
pub mod eco;
pub mod error;
pub mod filter;
pub mod output;
pub mod pgn;
pub mod replay;
pub mod worker;

pub use config::PipelineConfig;
pub use error::PipelineError;
