//! OTA Content Delivery Client
//!
//! Fetches and caches localized content ("strings") published to a Crowdin
//! distribution. The client resolves the distribution manifest, fetches
//! per-file, per-language translation payloads (JSON or raw text), and
//! merges JSON payloads across files into flat string maps.
//!
//! Both the manifest and the (file, language) translation slots are cached;
//! concurrent callers racing on the same slot share a single in-flight
//! request.
//!
//! # Example
//!
//! ```rust,no_run
//! use ota_client::{ClientOptions, OtaClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = OtaClient::new("e2a5a4af75f23cf3c4b5b84kxjz", ClientOptions::default())?;
//!
//!     // Merged strings of all JSON files, for the client's default locale
//!     let strings = client.strings_by_locale(None, None).await?;
//!
//!     // One value by nested key path, for an explicit language
//!     let title = client
//!         .string_by_key(&["menu", "title"], None, Some("fr"))
//!         .await?;
//!     println!("{:?} {:?}", strings, title);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module provides an in-process distribution server with
//! per-endpoint request counters:
//!
//! ```rust,ignore
//! use ota_client::testing::MockDistribution;
//! use ota_client::ClientOptions;
//!
//! let server = MockDistribution::new(1700000000)
//!     .json("en", "/main.json", serde_json::json!({"hello": "Hello"}))
//!     .serve("hash", ClientOptions::default())
//!     .await?;
//! let strings = server.client.strings_by_locale(None, Some("en")).await?;
//! assert_eq!(server.manifest_requests(), 1);
//! ```

mod client;
mod error;
mod merge;
pub mod testing;
mod types;

pub use client::{OtaClient, BASE_URL, DEFAULT_LOCALE, VERSION};
pub use error::{OtaError, Result};
pub use types::{ClientOptions, FileTranslation, LanguageInfo, Manifest, TranslationContent};
