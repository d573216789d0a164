//! Theme catalog and keypad navigation

pub mod catalog;
pub mod navigator;

pub use catalog::{Theme, ThemeCatalog};
pub use navigator::{ActiveTheme, MenuAction, MenuNavigator};
