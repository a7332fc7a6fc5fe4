//! # Moin Architecture
//!
//! Moin is a **command-line client for MoinMoin wikis**, built as a library with a
//! thin binary on top. The library knows how to store server credentials and how
//! to talk XML-RPC to a wiki; the binary only parses arguments, prompts, and prints.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (cli/, wired by main.rs)                         │
//! │  - Parses arguments, prompts, formats output                │
//! │  - The ONLY place that knows about stdout/stderr/exit codes │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Client Layer (client.rs, auth.rs)                          │
//! │  - Wiki operations: read, write, list, search, history      │
//! │  - Credential lookup through the Config Store               │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                              │
//!                 ▼                              ▼
//! ┌───────────────────────────────┐ ┌───────────────────────────┐
//! │  RPC Layer (rpc/)             │ │  Config (config.rs,       │
//! │  - Transport trait            │ │          model.rs)        │
//! │  - HttpTransport (production) │ │  - ~/.moin/config.toml    │
//! │  - ScriptedTransport (tests)  │ │  - validation, atomic save│
//! └───────────────────────────────┘ └───────────────────────────┘
//! ```
//!
//! ## No I/O Assumptions in the Library
//!
//! Library code takes plain arguments and returns [`error::Result`]. It never
//! prints, never exits, and never reads the terminal; the config file and the
//! network are reached only through [`config::ConfigStore`] and
//! [`rpc::Transport`], both of which are passed in.
//!
//! ## Testing Strategy
//!
//! 1. **Model / Config** (`model.rs`, `config.rs`): unit tests over TOML text and
//!    temporary directories.
//! 2. **Client** (`client.rs`, `auth.rs`): unit tests against
//!    `rpc::memory::ScriptedTransport`, asserting both results and the exact
//!    calls sent.
//! 3. **CLI** (`tests/`): end-to-end runs of the binary against a local stub
//!    XML-RPC server.
//!
//! ## Module Overview
//!
//! - [`model`]: Config data types and their validation
//! - [`config`]: Loading, saving and resolving the config file
//! - [`rpc`]: XML-RPC values, codec and transports
//! - [`client`]: Wiki operations
//! - [`auth`]: Token acquisition and credential storage
//! - [`logging`]: `tracing` subscriber setup
//! - [`error`]: Error types
//! - `cli`: Argument parsing, prompting and rendering for the binary (not part of the lib API)

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod rpc;
