//! Component system for islands.
//!
//! - [`View`] / [`ElementView`]: the view tree a component renders
//! - [`Island`] / [`ComponentRef`]: components that can be revived on the client

mod island;
mod view;

pub use island::{ComponentRef, Island};
pub use view::{ElementView, IntoView, IslandView, View, ViewEventHandler, is_void_element};
