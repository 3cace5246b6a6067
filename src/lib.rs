//! # Medgate
//!
//! A token-authenticated gateway that routes natural-language medical
//! questions to the right backend: a SQL query agent over the patient
//! database, a semantic index built from a technical PDF, and a semantic
//! index built from a dietary-guidance web page.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌─────────────────────────┐
//! │  Client   │──▶│  Gateway  │──▶│       Query router       │
//! │ (bearer)  │   │ (axum)    │   └──┬─────────┬─────────┬──┘
//! └──────────┘   └───────────┘      ▼         ▼         ▼
//!                               ┌────────┐ ┌────────┐ ┌────────┐
//!                               │  SQL   │ │  tech  │ │  diet  │
//!                               │ agent  │ │ index  │ │ index  │
//!                               └────────┘ └────────┘ └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! medgate init                            # create the auth database
//! medgate user add alice --password pw    # provision an operator account
//! MEDGATE_TOKEN_SECRET=... medgate serve  # build indexes, start serving
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`token`] | Bearer token issuance and validation |
//! | [`credentials`] | Credential store adapter (argon2 hashes) |
//! | [`chunk`] | Overlapping-window text chunking |
//! | [`loader`] | PDF and web page content extraction |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generate`] | Chat-completion generation abstraction |
//! | [`index`] | Semantic indexes and the startup builder |
//! | [`retrieval`] | Nearest-chunk retrieval plus synthesis |
//! | [`sql_agent`] | NL-to-SQL agent over the patient database |
//! | [`router`] | Keyword routing across backends |
//! | [`server`] | HTTP API gateway |
//! | [`db`] | Database connections |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod credentials;
pub mod db;
pub mod embedding;
pub mod generate;
pub mod index;
pub mod loader;
pub mod migrate;
pub mod models;
pub mod retrieval;
pub mod router;
pub mod server;
pub mod sql_agent;
pub mod token;
