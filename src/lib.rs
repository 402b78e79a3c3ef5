//! # Customers-Choice: Sticky A/B Variant Assignment
//!
//! Customers-Choice places a user into one of several weighted buckets per
//! named experiment ("variant") and keeps that answer stable.
//!
//! ## Design Principles
//!
//! - **Sticky**: the first draw inside a variant's time window sticks until
//!   reset, reconfiguration without preservation, or a forced override
//! - **Never fails at the call site**: unknown or inactive variants answer
//!   bucket 1, the control group
//! - **Merge, don't replace**: configuration documents update individual
//!   variants and keep running assignments unless told otherwise
//! - **Conditional refresh**: remote sources are asked with stored
//!   `ETag`/`Last-Modified` validators, so unchanged documents cost nothing
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use customers_choice::kv::MemoryKvStore;
//! use customers_choice::{CustomersChoice, Lifetime};
//!
//! # #[tokio::main]
//! # async fn main() -> customers_choice::Result<()> {
//! let choice = CustomersChoice::builder()
//!     .kv_store(Arc::new(MemoryKvStore::new()))
//!     .build()?;
//!
//! choice.configure_from_str(
//!     r#"{"variants":[{"name":"checkout","spreading":[70,30]}]}"#,
//! )?;
//! choice.set_lifetime(Lifetime::Persistent).await?;
//!
//! match choice.get_variant("checkout") {
//!     1 => { /* classic checkout */ }
//!     _ => { /* one-page checkout */ }
//! }
//! choice.reaches_goal("checkout");
//! choice.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod admin;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod kv;
pub mod logger;
pub mod persistence;
pub mod registry;
pub mod reporter;
pub mod selector;
pub mod variant;

pub use engine::{CustomersChoice, CustomersChoiceBuilder, RefreshOutcome};
pub use error::{Error, Result};
pub use variant::{Lifetime, Variant, VariantBuilder, DEFAULT_BUCKET, UNASSIGNED};
