//! Typed HTTP client of the settings api.

mod_use::mod_use![error, non_blocking];
