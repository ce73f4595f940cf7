//! # Reinhardt Islands
//!
//! Server-rendered pages with selectively revived interactive islands.
//!
//! Most of a page is static HTML. Components registered as islands are
//! rendered on the server together with their props, and the client revives
//! exactly those components. Reactive state passed to several islands stays
//! one shared object after revival.
//!
//! ## Feature Flags
//!
//! - `pages` (default) - island registry, page renderer and client revival
//!
//! ## Modules
//!
//! - [`reactive`]: `Signal` and `Effect`
//! - [`pages`]: islands (requires `pages`)
//!
//! ## Example
//!
//! ```rust
//! # #[cfg(feature = "pages")]
//! # {
//! use reinhardt_islands::pages::{ElementView, IntoView, IslandRegistry, PageRenderer, Prop, Props, View};
//!
//! fn greeting(props: &Props) -> View {
//!     let name = props.get("name").and_then(Prop::as_str).unwrap_or("world").to_string();
//!     ElementView::new("p").child(format!("Hello, {}!", name)).into_view()
//! }
//!
//! let registry = IslandRegistry::new();
//! let id = registry.register("islands/greeting.rs", "default", greeting).unwrap();
//! assert_eq!(id.as_str(), "greeting");
//!
//! let renderer = PageRenderer::new(&registry);
//! let page = block_on(renderer.render(View::island(id, Props::new().with("name", "Ada")))).unwrap();
//! assert!(page.html.contains("<p>Hello, Ada!</p>"));
//! # fn block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! # }
//! ```

#![warn(missing_docs)]

#[cfg(feature = "pages")]
pub mod pages;
pub mod reactive;

#[cfg(feature = "pages")]
pub use reinhardt_islands_pages::{
	IslandError, IslandOptions, IslandRegistry, IslandResult, PageRenderer, Props, View,
	revive_document,
};
pub use reinhardt_reactive::{Effect, Signal};
