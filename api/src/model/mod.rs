//! Models sent over the wire.

pub use bb_core::models::{BrandingProfile, SavedSetting, UserSettings};

mod_use::mod_use![error, dto];
