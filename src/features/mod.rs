//! Feature layer: raw match context in, model columns out.
//!
//! ```text
//!  form fields / CSV row
//!        │
//!        ▼
//!   ┌───────────┐
//!   │ RawRecord │  loosely-typed text per input column
//!   └───────────┘
//!        │  FeatureEncoder::encode / encode_batch
//!        ▼
//!   ┌───────────────┐
//!   │ EncodedRecord │  Month, Year, mapped categoricals, derived SENA
//!   └───────────────┘
//!        │  EncodedRecord::features(variant)
//!        ▼
//!   Vec<FeatureValue> in the fitted column order
//! ```
pub mod encoder;
pub mod models;
pub mod schema;

pub use encoder::FeatureEncoder;
pub use models::{EncodedRecord, FeatureValue, RawRecord};
pub use schema::ModelVariant;
