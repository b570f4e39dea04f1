//! Name- and signature-based symbol resolution.
//!
//! Lookups return `Option` rather than erroring: a miss is an ordinary value the
//! caller branches on. The binding rewriter treats total failure as fatal while the
//! shim synthesizer skips the one affected target; neither decision belongs here.

use crate::metadata::{Method, Module, TypeDef, TypeName};

/// Find a type by fully-qualified name anywhere in the module's type tree.
///
/// Top-level types are addressed as `Namespace.Name`; nested types append `/Name`
/// per nesting level (`Steamworks.ConnectionManager/BufferManager`).
#[must_use]
pub fn find_type<'a>(module: &'a Module, full_name: &str) -> Option<&'a TypeDef> {
    module
        .types
        .iter()
        .find_map(|ty| search(ty, &ty.full_name(), full_name))
}

/// Mutable variant of [`find_type`].
pub fn find_type_mut<'a>(module: &'a mut Module, full_name: &str) -> Option<&'a mut TypeDef> {
    module
        .types
        .iter_mut()
        .find_map(|ty| search_mut(ty, &ty.full_name(), full_name))
}

/// Find a method on `ty` by name and exact ordered parameter-type signature.
///
/// The signature, not the name alone, disambiguates overloads; among methods sharing
/// the name, the first whose full signature matches is returned.
#[must_use]
pub fn find_method<'a>(ty: &'a TypeDef, name: &str, signature: &[TypeName]) -> Option<&'a Method> {
    ty.methods.iter().find(|method| {
        method.name == name
            && method.params.len() == signature.len()
            && method
                .params
                .iter()
                .zip(signature)
                .all(|(param, wanted)| &param.param_type == wanted)
    })
}

fn search<'a>(ty: &'a TypeDef, path: &str, wanted: &str) -> Option<&'a TypeDef> {
    if path == wanted {
        return Some(ty);
    }
    ty.nested
        .iter()
        .find_map(|nested| search(nested, &format!("{path}/{}", nested.name), wanted))
}

fn search_mut<'a>(ty: &'a mut TypeDef, path: &str, wanted: &str) -> Option<&'a mut TypeDef> {
    if path == wanted {
        return Some(ty);
    }
    let path = path.to_string();
    ty.nested
        .iter_mut()
        .find_map(|nested| {
            let nested_path = format!("{path}/{}", nested.name);
            search_mut(nested, &nested_path, wanted)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Method, MethodAttributes, MethodBody, Parameter, PInvokeInfo};

    fn sample_module() -> Module {
        let mut inner = TypeDef::new("", "Native");
        inner.methods.push(Method::pinvoke(
            "SteamAPI_Init",
            "System.Boolean",
            Vec::new(),
            PInvokeInfo::new("steam_api64", "SteamAPI_Init"),
        ));

        let mut outer = TypeDef::new("Steamworks", "SteamClient");
        outer.nested.push(inner);
        outer.methods.push(Method::cil(
            "Shutdown",
            MethodAttributes::PUBLIC | MethodAttributes::STATIC,
            TypeName::void(),
            Vec::new(),
            MethodBody {
                max_stack: 0,
                instructions: vec![crate::assembly::Instruction::Ret],
            },
        ));

        let mut module = Module::new("Facepunch.Steamworks");
        module.types.push(outer);
        module
    }

    #[test]
    fn finds_top_level_type() {
        let module = sample_module();
        let ty = find_type(&module, "Steamworks.SteamClient").unwrap();
        assert_eq!(ty.name, "SteamClient");
    }

    #[test]
    fn finds_nested_type_by_slash_path() {
        let module = sample_module();
        let ty = find_type(&module, "Steamworks.SteamClient/Native").unwrap();
        assert_eq!(ty.name, "Native");
    }

    #[test]
    fn missing_type_is_none() {
        let module = sample_module();
        assert!(find_type(&module, "Steamworks.SteamServer").is_none());
    }

    #[test]
    fn overloads_are_disambiguated_by_signature() {
        let mut ty = TypeDef::new("Steamworks", "ConnectionManager");
        let body = || MethodBody {
            max_stack: 0,
            instructions: vec![crate::assembly::Instruction::Ret],
        };
        ty.methods.push(Method::cil(
            "Receive",
            MethodAttributes::PUBLIC,
            TypeName::void(),
            vec![Parameter::new("bufferSize", "System.Int32")],
            body(),
        ));
        ty.methods.push(Method::cil(
            "Receive",
            MethodAttributes::PUBLIC,
            TypeName::void(),
            vec![
                Parameter::new("bufferSize", "System.Int32"),
                Parameter::new("receiveToEnd", "System.Boolean"),
            ],
            body(),
        ));

        let two_arg = [
            TypeName::from("System.Int32"),
            TypeName::from("System.Boolean"),
        ];
        let found = find_method(&ty, "Receive", &two_arg).unwrap();
        assert_eq!(found.params.len(), 2);

        // Same name, wrong signature
        let wrong = [TypeName::from("System.UInt32")];
        assert!(find_method(&ty, "Receive", &wrong).is_none());
    }
}
