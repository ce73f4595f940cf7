//! Island rendering and revival
//!
//! This module provides access to reinhardt-islands-pages.
//!
//! ## Architecture
//!
//! - **Registry**: stable island ids for exported components
//! - **Serialization**: props to a payload, sharing reactive state by reference
//! - **SSR**: anchor comments around islands plus one payload block per page
//! - **Revival**: decoding the payload and mounting islands on the client

// Re-export all reinhardt-islands-pages functionality
pub use reinhardt_islands_pages::*;
