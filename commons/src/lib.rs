//! Shared code for the runtime buildpacks in this repository.
//!
//! Contains the pieces every buildpack needs and that are not part of libcnb.rs itself: build log
//! output, external command execution, HTTP fetching, tarball extraction, version constraint
//! resolution and version-keyed layer caching.

pub mod command;
pub mod error;
pub mod http;
pub mod layer;
pub mod log;
pub mod nodejs;
pub mod runtime;
pub mod tar;
pub mod version;

