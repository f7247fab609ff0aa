//! Persistence for projects and their session logs.
//!  - [entities] holds the value types shared with the engine and the ui.
//!  - [project_store::ProjectStore] is the seam the engine talks to, realized by
//!    [project_store::SqliteStore] over a single SQLite file.

pub mod entities;
pub mod project_store;
