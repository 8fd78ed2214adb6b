pub mod completions;
pub mod derive;
pub mod layout;
pub mod show;
pub mod timeline;
