//! The patch engine: binding rewriting, shim synthesis, and their orchestration.
//!
//! A patch operation is strictly linear and single-pass: parse the input module,
//! rewrite external bindings (fatal if none match), synthesize each shim target
//! independently, rename the module identity to the module being replaced, and
//! serialize to the output path. Each shim target's failure is isolated; only the
//! binding rewrite can abort the whole operation.
//!
//! # Examples
//!
//! ```rust,no_run
//! use shimworks::patch::Patcher;
//! use std::path::Path;
//!
//! # fn example() -> shimworks::Result<()> {
//! let mut patcher = Patcher::new();
//! patcher.initialize();
//! let report = patcher.patch(
//!     Path::new("Facepunch.Steamworks.Win64.smod"),
//!     "Facepunch.Steamworks.Win64",
//!     Path::new("patchwork.smod"),
//! )?;
//! println!("rewrote {} bindings", report.bindings_rewritten);
//! patcher.finish();
//! # Ok(())
//! # }
//! ```

mod context;
pub mod imports;
pub mod resolver;
pub mod shims;

pub use context::PatchContext;
pub use imports::BindingRedirect;
pub use shims::{ComposeTarget, DefaultArg, ShimTarget};

use std::path::Path;

use tracing::{error, info, warn};

use crate::metadata::Module;
use crate::Result;

/// File name of the replacement native library preloaded beside the running program.
pub const REPLACEMENT_NATIVE_LIBRARY: &str = "steam_api64_v161.dll";

/// Everything one patch operation is going to do: one binding redirect plus the
/// fixed shim target lists.
///
/// The constants baked into the built-in plan (alias set, default argument values,
/// close message) are fixed policy, not configuration.
#[derive(Debug, Clone)]
pub struct PatchPlan {
    /// The external-binding redirect applied across the whole type tree
    pub redirect: BindingRedirect,
    /// Trailing-defaults shim targets, each independently skippable
    pub shims: Vec<ShimTarget>,
    /// Composition shim targets, each independently skippable
    pub compositions: Vec<ComposeTarget>,
}

impl PatchPlan {
    /// The built-in plan for patching a Facepunch.Steamworks wrapper module against
    /// the v161 Steam API.
    #[must_use]
    pub fn steamworks() -> PatchPlan {
        PatchPlan {
            redirect: BindingRedirect::new(
                &["steam_api64", "steam_api64.dll"],
                "steam_api64_v161",
            ),
            shims: shims::steam_shims(),
            compositions: shims::steam_compositions(),
        }
    }
}

impl Default for PatchPlan {
    fn default() -> Self {
        PatchPlan::steamworks()
    }
}

/// One shim target that did not apply, with the reason it was skipped.
#[derive(Debug)]
pub struct ShimSkip {
    /// `Type::Method` form of the target
    pub target: String,
    /// Why the target was skipped
    pub reason: String,
}

/// Outcome of a successful patch operation.
///
/// Per-target skips live here, on the success channel; only the fatal binding-rewrite
/// condition surfaces as an error, so callers cannot mistake one for the other.
#[derive(Debug, Default)]
pub struct PatchReport {
    /// How many external bindings were retargeted
    pub bindings_rewritten: usize,
    /// `Type::Method` names of the shims that were added
    pub shims_added: Vec<String>,
    /// Targets that were skipped, with reasons
    pub shims_skipped: Vec<ShimSkip>,
}

/// Orchestrates a patch operation and owns its lifecycle hooks.
pub struct Patcher {
    plan: PatchPlan,
    context: PatchContext,
}

impl Patcher {
    /// Create a patcher with the built-in Steamworks plan.
    #[must_use]
    pub fn new() -> Patcher {
        Patcher::with_plan(PatchPlan::steamworks())
    }

    /// Create a patcher with an explicit plan.
    #[must_use]
    pub fn with_plan(plan: PatchPlan) -> Patcher {
        Patcher {
            plan,
            context: PatchContext::new(),
        }
    }

    /// Preload the replacement native library from beside the running program.
    ///
    /// Failure is logged and otherwise ignored: preloading and module patching are
    /// independent concerns, and a missing library must not block the patch. The
    /// loaded handle is intentionally leaked so the library stays resident for the
    /// lifetime of the process.
    pub fn initialize(&self) {
        match preload_native_library() {
            Ok(path) => info!(path = %path.display(), "replacement native library loaded"),
            Err(err) => error!(
                library = REPLACEMENT_NATIVE_LIBRARY,
                %err,
                "failed to preload replacement native library; continuing without it"
            ),
        }
    }

    /// Run the patch: parse `input`, apply the plan, rename the module identity to
    /// `replaced_name`, and write the result to `output`.
    ///
    /// The input stays open in the patcher's context until [`Patcher::finish`] (or
    /// drop), on success and on the abort path alike.
    ///
    /// # Errors
    /// Returns [`crate::Error::NoBindingsMatched`] when the binding rewrite matches
    /// nothing (the caller should fall back to the unpatched module), and container
    /// or I/O errors from parsing and serialization. Per-shim-target misses are not
    /// errors; they are reported in the returned [`PatchReport`].
    pub fn patch(
        &mut self,
        input: &Path,
        replaced_name: &str,
        output: &Path,
    ) -> Result<PatchReport> {
        info!(input = %input.display(), "patching module");

        let data = self.context.open(input)?;
        let mut module = Module::from_bytes(data)?;

        let mut report = PatchReport {
            bindings_rewritten: self.plan.redirect.apply(&mut module)?,
            ..PatchReport::default()
        };

        for target in &self.plan.shims {
            match shims::synthesize(&mut module, target) {
                Ok(()) => report.shims_added.push(target.describe()),
                Err(err) => {
                    warn!(target = target.describe(), %err, "skipping shim target");
                    report.shims_skipped.push(ShimSkip {
                        target: target.describe(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        for target in &self.plan.compositions {
            match shims::synthesize_compose(&mut module, target) {
                Ok(()) => report.shims_added.push(target.describe()),
                Err(err) => {
                    warn!(target = target.describe(), %err, "skipping composition target");
                    report.shims_skipped.push(ShimSkip {
                        target: target.describe(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        // Callers reference the module by the identity of the one it replaces
        module.name = replaced_name.to_string();
        module.write_to_file(output)?;

        info!(
            output = %output.display(),
            bindings = report.bindings_rewritten,
            shims = report.shims_added.len(),
            skipped = report.shims_skipped.len(),
            "module patched"
        );
        Ok(report)
    }

    /// Release the held input stream. Safe to call any number of times, on every
    /// exit path.
    pub fn finish(&mut self) {
        self.context.finish();
    }
}

impl Default for Patcher {
    fn default() -> Self {
        Patcher::new()
    }
}

fn preload_native_library() -> Result<std::path::PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));
    let path = dir.join(REPLACEMENT_NATIVE_LIBRARY);

    // Safety: the library is loaded for its side effect of becoming resident; no
    // symbols are called through it from here.
    let library = unsafe { libloading::Library::new(&path)? };
    std::mem::forget(library);
    Ok(path)
}
