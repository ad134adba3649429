//! Host platform plumbing: locating native tools and running them with a
//! deadline and bounded output capture.

pub use command::{Captured, Command, DEFAULT_MAX_OUTPUT, DEFAULT_TIMEOUT, ProcessRunner, SystemRunner};
pub use error::{Error, Result};
pub use resolver::{
    EnvOverride, KnownLocations, ResolverChain, SEVEN_ZIP_NAMES, SearchPath, ToolResolver, executable_name, is_usable,
};

mod command;
mod error;
mod resolver;
