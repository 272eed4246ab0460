//! srvconf-core: layered server configuration resolution
//!
//! This crate resolves the two things an application server derives from its
//! configuration directory: the set of enabled features, merged across
//! `<include>` documents and `configDropins`, and the values behind every
//! `${variable}` reference, drawn from seven ordered property sources.
//!
//! # Example
//!
//! ```rust,no_run
//! use srvconf_core::{FeatureResolver, PropertyStore, ServerLayout, StoreOptions};
//!
//! let layout = ServerLayout::infer("/opt/wlp/usr/servers/defaultServer");
//! let store = PropertyStore::build(layout.clone(), &StoreOptions::default())?;
//!
//! let resolution = FeatureResolver::new()
//!     .with_properties(&store)
//!     .resolve_layout(&layout)?;
//! println!("{:?}", resolution.features);
//! println!("{}", store.resolve("port=${http.port}").text);
//! # Ok::<(), srvconf_core::Error>(())
//! ```

pub mod diagnostic;
pub mod document;
pub mod error;
pub mod features;
pub mod include;
pub mod interpolation;
pub mod layout;
pub mod properties_file;
pub mod store;
pub mod substitution;

mod variables;
mod walk;

pub use diagnostic::{Diagnostic, Diagnostics, ResourceKind};
pub use document::{ConfigDocument, Element, ParserOptions};
pub use error::{Error, ErrorKind, Result};
pub use features::{FeatureResolution, FeatureResolver, FeatureSet};
pub use include::OnConflict;
pub use layout::ServerLayout;
pub use store::{PropertyStore, StoreOptions, Tier};
pub use substitution::{Substitution, EXPANSION_BUDGET};
