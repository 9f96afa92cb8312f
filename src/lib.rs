//! Envlock - a versioned vault of encrypted per-project dotenv secrets.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── ports/            # Capability seams + production adapters
//! │   ├── mod           # Encrypter, Git, FileSystem, Clock traits
//! │   ├── age           # age-based Encrypter implementation
//! │   ├── git           # git CLI adapter
//! │   └── fs            # OS filesystem adapter
//! └── core/             # Core library components
//!     ├── dotenv        # value-mode dotenv parse/render
//!     ├── document      # format-preserving dotenv document model
//!     ├── config        # vault config (recipients, version)
//!     ├── index         # plaintext metadata index
//!     ├── store         # on-disk layout + atomic persistence
//!     ├── secrets       # secret CRUD, import/export/apply merge engine
//!     ├── files         # encrypted binary blobs with content metadata
//!     ├── keys          # recipient management + rotation
//!     ├── listing       # read-only index projections
//!     ├── doctor        # health checks
//!     ├── init          # vault creation
//!     ├── sync          # git pull/push wrappers
//!     └── guard         # plaintext output-path guardrails
//! ```
//!
//! # Features
//!
//! - Age-based encryption with multiple recipients per vault
//! - Lossless dotenv document editing (comments, blank lines, export prefixes)
//! - Three-way import merge with pluggable conflict resolution
//! - Crash-safe persistence via atomic renames
//! - Plaintext metadata index for listing without decryption
//! - Guardrails against leaking plaintext into version control

pub mod core;
pub mod error;
pub mod ports;
