//! # brAIn shim
//!
//! Runs the brAIn knowledge service in a container next to a notes vault.
//!
//! The service itself (chat UI, ingestion pipeline, model calls) lives in a
//! separately maintained image. This crate only starts and stops that
//! container, waits for its web interface to come up, and keeps the one
//! credential it needs.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────┐
//! │   CLI    │──▶│ Orchestrator │──▶│  runtime    │──▶ docker rm/stop/run
//! │ (brain)  │   │  (lifecycle) │   └─────────────┘
//! └──────────┘   │              │   ┌─────────────┐
//!                │              │──▶│ retry+probe │──▶ GET :9000
//!                └──────────────┘   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! brain settings set-api-key sk-...   # store the OpenAI key
//! brain doctor                        # check docker and key
//! brain ingest --vault ~/notes        # index the vault once
//! brain open --vault ~/notes          # start chat, print its URL
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`settings`] | Persisted API key |
//! | [`runtime`] | Container CLI invocations |
//! | [`probe`] | HTTP reachability check |
//! | [`retry`] | Retry policy and loop |
//! | [`lifecycle`] | Interactive and ingest flows |
//! | [`preflight`] | Load-time checks |
//! | [`report`] | Event and notice output |
//! | [`commands`] | CLI entry points |

pub mod commands;
pub mod config;
pub mod lifecycle;
pub mod preflight;
pub mod probe;
pub mod report;
pub mod retry;
pub mod runtime;
pub mod settings;
