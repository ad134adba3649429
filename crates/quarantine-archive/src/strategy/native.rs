use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

use quarantine_platform::{Command, Error as PlatformError, ProcessRunner, ResolverChain, SEVEN_ZIP_NAMES, SystemRunner, ToolResolver};

use super::listing::parse_slt;
use super::{AttemptContext, Strategy};
use crate::classify;
use crate::data::{ExtractedFile, NativeToolOptions, StrategyKind};
use crate::error::{INSTALL_ADVICE, StrategyError, StrategyResult};
use crate::materialize::adopt_tree;

const OUTPUT_PREFIX: &str = "native-";

/// Last resort: a 7-Zip-class executable run as a subprocess.
///
/// The tool is looked up again on every attempt. Its listing of the archive
/// is checked against the limits first, so an archive that declares too much
/// is refused before anything is extracted. Extraction goes into a fresh
/// subdirectory of the staging directory, whose contents are then checked
/// against the same limits and containment rules as in-process decoding.
/// Sizes the archive misdeclares are only caught by that second check.
pub struct NativeToolDecoder {
    resolver: Arc<dyn ToolResolver>,
    runner: Arc<dyn ProcessRunner>,
    options: NativeToolOptions,
}

impl NativeToolDecoder {
    pub fn new(resolver: Arc<dyn ToolResolver>, runner: Arc<dyn ProcessRunner>, options: NativeToolOptions) -> Self {
        Self {
            resolver,
            runner,
            options,
        }
    }

    /// Standard resolver chain and real subprocesses.
    pub fn system(options: NativeToolOptions) -> Self {
        let resolver = Arc::new(ResolverChain::standard(options.override_env.clone()));
        Self::new(resolver, Arc::new(SystemRunner), options)
    }

    fn list_command(&self, tool: &Path, archive: &Path, password: Option<&str>) -> Command {
        Command::new(tool)
            .args(["l", "-slt", "-bd"])
            .arg(password_arg(password))
            .arg("--")
            .arg(archive)
            .env("LC_ALL", "C")
            .timeout(self.options.timeout)
            .max_output(self.options.max_listing_bytes)
    }

    fn extract_command(&self, tool: &Path, archive: &Path, password: Option<&str>, out_dir: &Path) -> Command {
        let mut out_arg = OsString::from("-o");
        out_arg.push(out_dir);

        Command::new(tool)
            .args(["x", "-y", "-bd", "-bso0", "-bsp0"])
            .arg(password_arg(password))
            .arg(out_arg)
            .arg("--")
            .arg(archive)
            .env("LC_ALL", "C")
            .timeout(self.options.timeout)
            .max_output(self.options.max_output_bytes)
    }

    /// Refuse archives whose listing already exceeds the limits.
    fn check_listing(
        &self,
        tool: &Path,
        archive: &Path,
        password: Option<&str>,
        ctx: &AttemptContext<'_>,
    ) -> StrategyResult<()> {
        let captured = self
            .runner
            .run(self.list_command(tool, archive, password))
            .map_err(runner_error)?;
        if let Some(error) = classify::tool_outcome(captured.code, &captured.diagnostics(), password.is_some()) {
            return Err(error);
        }
        if captured.truncated {
            return Err(StrategyError::limit(format!(
                "archive listing exceeds {} bytes",
                self.options.max_listing_bytes
            )));
        }

        let listing = String::from_utf8_lossy(&captured.stdout);
        let mut budget = ctx.budget();
        for entry in parse_slt(&listing).into_iter().filter(|entry| !entry.is_dir) {
            budget.admit(&entry.path, entry.size)?;
            budget.commit(&entry.path, entry.size)?;
        }
        Ok(())
    }
}

/// `-p<password>` as one argument; empty when absent so the tool never prompts.
fn password_arg(password: Option<&str>) -> OsString {
    let mut arg = OsString::from("-p");
    arg.push(password.unwrap_or_default());
    arg
}

fn runner_error(e: PlatformError) -> StrategyError {
    match e {
        PlatformError::Spawn { .. } => StrategyError::ToolUnavailable(format!("{e}; {INSTALL_ADVICE}")),
        PlatformError::TimedOut { .. } | PlatformError::Wait { .. } => StrategyError::other(e.to_string()),
    }
}

impl Strategy for NativeToolDecoder {
    fn kind(&self) -> StrategyKind { StrategyKind::NativeTool }

    fn attempt(
        &self,
        archive: &Path,
        password: Option<&str>,
        staging: &Path,
        ctx: &AttemptContext<'_>,
    ) -> StrategyResult<Vec<ExtractedFile>> {
        let Some(tool) = self.resolver.resolve(SEVEN_ZIP_NAMES) else {
            return Err(StrategyError::ToolUnavailable(INSTALL_ADVICE.to_string()));
        };
        ctx.observer.tool_resolved(&tool);

        self.check_listing(&tool, archive, password, ctx)?;

        let out_dir = quarantine_fs::create_unique_dir(staging, OUTPUT_PREFIX)?;
        let command = self.extract_command(&tool, archive, password, &out_dir);
        let captured = self.runner.run(command).map_err(runner_error)?;

        if let Some(error) = classify::tool_outcome(captured.code, &captured.diagnostics(), password.is_some()) {
            return Err(error);
        }

        adopt_tree(&out_dir, ctx.budget(), ctx.observer)
    }
}
