pub mod cli;
pub mod format;
pub mod layout;
pub mod linker;
pub mod module;
pub mod resolver;
pub mod writer;

pub use linker::{link, link_cloned, run, LinkError, LinkedImage};
pub use module::ObjectModule;
