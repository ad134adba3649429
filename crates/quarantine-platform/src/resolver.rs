//! Native tool discovery.
//!
//! A [`ToolResolver`] maps a list of candidate executable names to an
//! absolute path. Resolvers are chained in order of precedence by
//! [`ResolverChain`]; the first usable match wins. Nothing is cached: the
//! environment is consulted again on every lookup.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Executable names of 7-Zip-class tools, most capable first.
pub const SEVEN_ZIP_NAMES: &[&str] = &["7z", "7zz", "7za"];

pub trait ToolResolver: Send + Sync {
    fn resolve(&self, candidates: &[&str]) -> Option<PathBuf>;

    /// Short label used in diagnostics.
    fn label(&self) -> &'static str;
}

/// Explicit configuration override: an environment variable naming the binary.
#[derive(Clone, Debug)]
pub struct EnvOverride {
    var: String,
}

impl EnvOverride {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str { &self.var }
}

impl ToolResolver for EnvOverride {
    fn resolve(&self, _candidates: &[&str]) -> Option<PathBuf> {
        let value = env::var_os(&self.var).filter(|v| !v.is_empty())?;
        let path = PathBuf::from(value);
        if is_usable(&path) {
            Some(path)
        } else {
            warn!(var = %self.var, path = %path.display(), "configured tool override is not an executable file");
            None
        }
    }

    fn label(&self) -> &'static str { "env-override" }
}

/// Lookup through the `PATH` environment variable.
#[derive(Clone, Copy, Debug, Default)]
pub struct SearchPath;

impl ToolResolver for SearchPath {
    fn resolve(&self, candidates: &[&str]) -> Option<PathBuf> {
        candidates
            .iter()
            .find_map(|name| which::which(name).ok())
            .filter(|path| is_usable(path))
    }

    fn label(&self) -> &'static str { "path" }
}

/// A fixed list of directories searched for each candidate name.
#[derive(Clone, Debug)]
pub struct KnownLocations {
    label: &'static str,
    dirs: Vec<PathBuf>,
}

impl KnownLocations {
    pub fn new(label: &'static str, dirs: Vec<PathBuf>) -> Self {
        Self { label, dirs }
    }

    /// Install locations specific to the host operating system.
    pub fn for_current_os() -> Self {
        if cfg!(target_os = "windows") {
            Self::windows()
        } else if cfg!(target_os = "macos") {
            Self::macos()
        } else {
            Self::linux()
        }
    }

    /// - `%ProgramFiles%\7-Zip`, `%ProgramFiles(x86)%\7-Zip`, `%ProgramW6432%\7-Zip`
    /// - `C:\Program Files\7-Zip`, `C:\Program Files (x86)\7-Zip`
    pub fn windows() -> Self {
        let mut dirs: Vec<PathBuf> = ["ProgramFiles", "ProgramFiles(x86)", "ProgramW6432"]
            .iter()
            .filter_map(|var| env::var_os(var))
            .map(|base| PathBuf::from(base).join("7-Zip"))
            .collect();
        dirs.push(PathBuf::from(r"C:\Program Files\7-Zip"));
        dirs.push(PathBuf::from(r"C:\Program Files (x86)\7-Zip"));
        dedup_in_order(&mut dirs);
        Self::new("windows-install", dirs)
    }

    /// Homebrew (Apple silicon and Intel) and MacPorts prefixes.
    pub fn macos() -> Self {
        Self::new(
            "macos-install",
            ["/opt/homebrew/bin", "/usr/local/bin", "/opt/local/bin"]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
        )
    }

    /// p7zip's private libexec directory and snap.
    pub fn linux() -> Self {
        Self::new(
            "linux-install",
            ["/usr/lib/p7zip", "/usr/libexec/p7zip", "/snap/bin"]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
        )
    }

    /// Conventional Unix binary directories, searched after `PATH`.
    pub fn unix_common() -> Self {
        Self::new(
            "unix-common",
            ["/usr/bin", "/usr/local/bin", "/bin", "/opt/bin", "/usr/sbin"]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
        )
    }

    pub fn dirs(&self) -> &[PathBuf] { &self.dirs }
}

impl ToolResolver for KnownLocations {
    fn resolve(&self, candidates: &[&str]) -> Option<PathBuf> {
        self.dirs.iter().find_map(|dir| {
            candidates
                .iter()
                .map(|name| dir.join(executable_name(name)))
                .find(|path| is_usable(path))
        })
    }

    fn label(&self) -> &'static str { self.label }
}

/// Ordered list of resolvers; the first usable match wins.
#[derive(Default)]
pub struct ResolverChain {
    resolvers: Vec<Box<dyn ToolResolver>>,
}

impl ResolverChain {
    pub fn new() -> Self { Self::default() }

    /// Override variable, per-OS install locations, `PATH`, common Unix paths.
    pub fn standard(override_var: impl Into<String>) -> Self {
        let mut chain = Self::new()
            .with(EnvOverride::new(override_var))
            .with(KnownLocations::for_current_os())
            .with(SearchPath);
        if cfg!(unix) {
            chain = chain.with(KnownLocations::unix_common());
        }
        chain
    }

    pub fn with(mut self, resolver: impl ToolResolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    pub fn len(&self) -> usize { self.resolvers.len() }

    pub fn is_empty(&self) -> bool { self.resolvers.is_empty() }

    pub fn labels(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.label()).collect()
    }

    pub fn resolve(&self, candidates: &[&str]) -> Option<PathBuf> {
        self.resolvers.iter().find_map(|resolver| {
            let found = resolver.resolve(candidates)?;
            debug!(resolver = resolver.label(), path = %found.display(), "resolved native tool");
            Some(found)
        })
    }
}

impl ToolResolver for ResolverChain {
    fn resolve(&self, candidates: &[&str]) -> Option<PathBuf> { ResolverChain::resolve(self, candidates) }

    fn label(&self) -> &'static str { "chain" }
}

/// `name` with the platform executable suffix appended.
pub fn executable_name(name: &str) -> OsString {
    let mut file = OsString::from(name);
    file.push(env::consts::EXE_SUFFIX);
    file
}

/// An existing regular file that, on Unix, has an execute bit set.
pub fn is_usable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

fn dedup_in_order(dirs: &mut Vec<PathBuf>) {
    let mut seen = Vec::new();
    dirs.retain(|d| {
        if seen.contains(d) {
            false
        } else {
            seen.push(d.clone());
            true
        }
    });
}
