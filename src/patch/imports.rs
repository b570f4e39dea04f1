//! Retargeting of external bindings to a replacement native library.

use tracing::{error, info};

use crate::metadata::{Module, TypeDef};
use crate::{Error, Result};

/// Rewrites every external binding whose library name matches a recognized alias.
///
/// Alias comparison is case-insensitive; the set is small and fixed, covering the
/// textual forms under which the same logical library appears (bare name and name
/// with file extension). A binding already pointing at the target is left unchanged
/// and not counted, which makes the rewrite idempotent per method.
#[derive(Debug, Clone)]
pub struct BindingRedirect {
    aliases: Vec<String>,
    target: String,
}

impl BindingRedirect {
    /// Create a redirect from `aliases` to `target`.
    pub fn new(aliases: &[&str], target: &str) -> BindingRedirect {
        BindingRedirect {
            aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
            target: target.to_string(),
        }
    }

    /// The replacement library name.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Rewrite all matching bindings in `module`, returning how many were rewritten.
    ///
    /// The traversal is depth-first over every top-level type and every type nested
    /// inside it, visiting each method exactly once; it never stops at the first
    /// match.
    ///
    /// # Errors
    /// Returns [`Error::NoBindingsMatched`] if no binding matched any alias. That is
    /// the fatal condition: a module without the expected bindings has diverged from
    /// the layout every later patch step assumes, so the whole operation must abort
    /// and the caller falls back to the unpatched module.
    pub fn apply(&self, module: &mut Module) -> Result<usize> {
        let mut count = 0;
        for ty in &mut module.types {
            self.rewrite_type(ty, &mut count);
        }

        if count == 0 {
            let scanned: usize = module
                .types
                .iter()
                .map(TypeDef::method_count_recursive)
                .sum();
            error!(
                target_library = self.target,
                methods_scanned = scanned,
                "no external bindings matched a recognized alias; aborting patch"
            );
            return Err(Error::NoBindingsMatched);
        }

        info!(
            rewritten = count,
            target_library = self.target,
            "retargeted external bindings"
        );
        Ok(count)
    }

    fn rewrite_type(&self, ty: &mut TypeDef, count: &mut usize) {
        for method in &mut ty.methods {
            if let Some(info) = method.pinvoke_info_mut() {
                if self.matches(&info.module) {
                    info.module = self.target.clone();
                    *count += 1;
                }
            }
        }
        for nested in &mut ty.nested {
            self.rewrite_type(nested, count);
        }
    }

    fn matches(&self, library: &str) -> bool {
        self.aliases
            .iter()
            .any(|alias| alias.eq_ignore_ascii_case(library))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Method, PInvokeInfo};

    fn bound_method(library: &str, entry: &str) -> Method {
        Method::pinvoke(
            entry,
            "System.Boolean",
            Vec::new(),
            PInvokeInfo::new(library, entry),
        )
    }

    fn redirect() -> BindingRedirect {
        BindingRedirect::new(&["steam_api64", "steam_api64.dll"], "steam_api64_v161")
    }

    #[test]
    fn rewrites_across_nested_types() {
        let mut leaf = TypeDef::new("", "Inner");
        leaf.methods
            .push(bound_method("STEAM_API64.DLL", "SteamAPI_RunCallbacks"));

        let mut mid = TypeDef::new("", "Native");
        mid.methods
            .push(bound_method("steam_api64", "SteamAPI_Init"));
        mid.methods.push(bound_method("kernel32", "GetTickCount"));
        mid.nested.push(leaf);

        let mut top = TypeDef::new("Steamworks", "SteamClient");
        top.nested.push(mid);

        let mut module = Module::new("Facepunch.Steamworks");
        module.types.push(top);

        let count = redirect().apply(&mut module).unwrap();
        assert_eq!(count, 2);

        let native = crate::patch::resolver::find_type(&module, "Steamworks.SteamClient/Native")
            .unwrap();
        assert_eq!(
            native.methods[0].pinvoke_info().unwrap().module,
            "steam_api64_v161"
        );
        // Unrelated bindings stay untouched
        assert_eq!(native.methods[1].pinvoke_info().unwrap().module, "kernel32");
        assert_eq!(
            native.nested[0].methods[0].pinvoke_info().unwrap().module,
            "steam_api64_v161"
        );
    }

    #[test]
    fn zero_matches_is_fatal() {
        let mut ty = TypeDef::new("Steamworks", "SteamClient");
        ty.methods.push(bound_method("kernel32", "GetTickCount"));

        let mut module = Module::new("Facepunch.Steamworks");
        module.types.push(ty);

        assert!(matches!(
            redirect().apply(&mut module),
            Err(Error::NoBindingsMatched)
        ));
        // Nothing was mutated on the abort path
        assert_eq!(
            module.types[0].methods[0].pinvoke_info().unwrap().module,
            "kernel32"
        );
    }

    #[test]
    fn second_pass_rewrites_nothing_new() {
        let mut ty = TypeDef::new("", "Native");
        ty.methods.push(bound_method("steam_api64", "SteamAPI_Init"));

        let mut module = Module::new("Facepunch.Steamworks");
        module.types.push(ty);

        let redirect = redirect();
        assert_eq!(redirect.apply(&mut module).unwrap(), 1);
        let after_first = module.clone();

        // A binding already at the target is not an alias match; the second pass
        // finds nothing left to rewrite and reports the fatal condition while
        // leaving the bindings exactly as they were.
        assert!(matches!(
            redirect.apply(&mut module),
            Err(Error::NoBindingsMatched)
        ));
        assert_eq!(module, after_first);
    }
}
