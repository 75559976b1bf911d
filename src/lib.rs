//! # Budget Harness
//!
//! Retrieval and rule-enforced generation of construction budget components.
//!
//! Budget Harness indexes a collection of historical priced components with a
//! bag-of-words vector index, ranks them against free-text task descriptions
//! with quality-aware filtering, and drafts new components through a single
//! completion call whose output is forced through a deterministic pricing
//! rule pipeline.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌────────────┐
//! │ Components │──▶│ Vector index│──▶│   Search   │
//! │   (JSON)   │   │ + cache     │   │ + quality  │
//! └────────────┘   └─────────────┘   └─────┬──────┘
//!                                          │ context
//!                                          ▼
//!                  ┌─────────────┐   ┌────────────┐
//!                  │ Rule engine │◀──│ Completion │
//!                  │  (7 passes) │   │  (1 call)  │
//!                  └──────┬──────┘   └────────────┘
//!                         ▼
//!                  GeneratedComponent ──▶ export
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! budget index rebuild
//! budget search "demolition of wall tiles"
//! budget summary "bathroom tiles"
//! budget generate "big bag waste pickup" --output out/pickup.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed index, scoring, and generation errors |
//! | [`knowledge_base`] | Loading the historical collection |
//! | [`embedding`] | Vocabulary, L1 vectors, cosine similarity |
//! | [`index`] | Vector index and on-disk cache |
//! | [`quality`] | Pricing-reliability score |
//! | [`search`] | Ranked, filtered search and summaries |
//! | [`prompt`] | Drafting prompt and rule sheet |
//! | [`llm`] | Completion providers |
//! | [`rules`] | Rule-enforcement pipeline |
//! | [`generate`] | Retrieval-augmented generation |
//! | [`service`] | Process-scoped service with index rebuild |
//! | [`stats`] | Collection statistics |
//! | [`export`] | JSON export of generated components |

pub mod config;
pub mod embedding;
pub mod error;
pub mod export;
pub mod generate;
pub mod index;
pub mod knowledge_base;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod quality;
pub mod rules;
pub mod search;
pub mod service;
pub mod stats;
