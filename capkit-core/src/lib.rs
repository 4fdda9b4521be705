//! Capkit core library: workspace identities, module payloads, document shaping.
//!
//! Public API surface:
//! - [`types`]: newtypes, document paths, profile
//! - [`modules`]: the nine module payload types and their static defaults
//! - [`document`]: sanitize / wrap / unwrap / merge for store documents
//! - [`error`]: [`CoreError`]

pub mod document;
pub mod error;
pub mod modules;
pub mod types;

pub use document::{Document, MergeStrategy, Shape};
pub use error::CoreError;
pub use modules::{
    Canvas, Copywriting, Economics, Grow, MarketResearch, Mindset, ModuleData, Persona, Personas,
    ProductDesign, Sales,
};
pub use types::{AuthUser, DocumentPath, ModuleName, UserId, UserProfile};
