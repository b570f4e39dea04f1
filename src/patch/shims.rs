//! Synthesis of signature-adapting shim methods.
//!
//! Each target names an original method by type, name, and exact signature. The
//! synthesized sibling keeps the original's name (so it participates in overload
//! selection by arity at call sites) and a leading subset of its parameters; the
//! omitted trailing parameters are supplied inside the body as fixed constants. A
//! second shape composes two originals: a zero-argument convenience method that calls
//! a provider and feeds its result to the consumer.
//!
//! Every target resolves independently; a missing type or method skips that one
//! target and never aborts the run.

use tracing::info;

use crate::assembly::{InstructionAssembler, MethodRef};
use crate::metadata::{Method, MethodAttributes, MethodBody, Module, Parameter, TypeName};
use crate::patch::resolver;
use crate::{Error, Result};

/// Message text supplied for the omitted debug-string parameter of the close shim.
pub const CLOSE_MESSAGE: &str = "Closing connection";

/// A literal pushed in place of an omitted trailing parameter.
#[derive(Debug, Clone, Copy)]
pub enum DefaultArg {
    /// A 32-bit integer constant (also used for booleans: 0 = false, 1 = true)
    I4(i32),
    /// A constant narrowed to an unsigned 16-bit integer after the push
    U2(u16),
    /// A string literal
    Str(&'static str),
}

/// One trailing-defaults shim target.
#[derive(Debug, Clone)]
pub struct ShimTarget {
    /// Fully-qualified name of the type owning the original method
    pub type_name: &'static str,
    /// Name of the original method; the shim reuses it
    pub method_name: &'static str,
    /// Exact ordered parameter-type signature of the original
    pub signature: &'static [&'static str],
    /// How many leading parameters the shim keeps on its caller-facing surface
    pub kept_params: usize,
    /// Constants supplied for the omitted trailing parameters, in order
    pub defaults: &'static [DefaultArg],
    /// Whether the original's return value is discarded and the shim returns void
    pub discard_result: bool,
}

impl ShimTarget {
    /// `Type::Method` form for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{}::{}", self.type_name, self.method_name)
    }
}

/// A composition shim target: `method_name()` becomes `consumer(provider())`.
#[derive(Debug, Clone)]
pub struct ComposeTarget {
    /// Fully-qualified name of the type owning the consumer (and receiving the shim)
    pub type_name: &'static str,
    /// Name of the consumer method; the shim reuses it
    pub method_name: &'static str,
    /// Exact signature of the consumer (its one parameter is the provider's result)
    pub signature: &'static [&'static str],
    /// Fully-qualified name of the type owning the provider
    pub provider_type: &'static str,
    /// Name of the zero-argument provider method
    pub provider_method: &'static str,
}

impl ComposeTarget {
    /// `Type::Method` form for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{}::{}", self.type_name, self.method_name)
    }
}

/// The fixed trailing-defaults targets for patching a Facepunch.Steamworks module.
pub(crate) fn steam_shims() -> Vec<ShimTarget> {
    vec![
        // 3-argument send adapted to a 2-argument surface; the lane index becomes
        // a fixed u16 zero.
        ShimTarget {
            type_name: "Steamworks.Data.Connection",
            method_name: "SendMessage",
            signature: &[
                "System.Byte[]",
                "Steamworks.Data.SendType",
                "System.UInt16",
            ],
            kept_params: 2,
            defaults: &[DefaultArg::U2(0)],
            discard_result: false,
        },
        // 2-argument receive loops adapted to 1-argument void surfaces; the
        // receive-to-end flag becomes a fixed false and the count is discarded.
        ShimTarget {
            type_name: "Steamworks.ConnectionManager",
            method_name: "Receive",
            signature: &["System.Int32", "System.Boolean"],
            kept_params: 1,
            defaults: &[DefaultArg::I4(0)],
            discard_result: true,
        },
        ShimTarget {
            type_name: "Steamworks.SocketManager",
            method_name: "Receive",
            signature: &["System.Int32", "System.Boolean"],
            kept_params: 1,
            defaults: &[DefaultArg::I4(0)],
            discard_result: true,
        },
        // 3-argument close adapted to a 0-argument surface with fixed reason code
        // and message.
        ShimTarget {
            type_name: "Steamworks.ConnectionManager",
            method_name: "Close",
            signature: &["System.Boolean", "System.Int32", "System.String"],
            kept_params: 0,
            defaults: &[
                DefaultArg::I4(0),
                DefaultArg::I4(0),
                DefaultArg::Str(CLOSE_MESSAGE),
            ],
            discard_result: false,
        },
    ]
}

/// The fixed composition target: a zero-argument ticket-issuing convenience method.
pub(crate) fn steam_compositions() -> Vec<ComposeTarget> {
    vec![ComposeTarget {
        type_name: "Steamworks.SteamUser",
        method_name: "GetAuthSessionTicket",
        signature: &["Steamworks.SteamId"],
        provider_type: "Steamworks.SteamClient",
        provider_method: "get_SteamId",
    }]
}

/// Synthesize one trailing-defaults shim and append it to its owning type.
///
/// # Errors
/// Returns [`Error::TypeNotFound`] or [`Error::MethodNotFound`] when the target does
/// not resolve; both are per-target conditions the orchestrator skips on.
pub(crate) fn synthesize(module: &mut Module, target: &ShimTarget) -> Result<()> {
    let signature: Vec<TypeName> = target.signature.iter().map(|s| TypeName::from(*s)).collect();

    let ty = resolver::find_type(module, target.type_name)
        .ok_or_else(|| Error::TypeNotFound(target.type_name.to_string()))?;
    let original = resolver::find_method(ty, target.method_name, &signature)
        .ok_or_else(|| Error::MethodNotFound(target.describe()))?;

    debug_assert!(target.kept_params + target.defaults.len() == signature.len());

    let is_static = original.is_static();
    let original_return = original.return_type.clone();
    let kept: Vec<Parameter> = original.params[..target.kept_params].to_vec();
    let call_target = MethodRef {
        declaring_type: TypeName::from(target.type_name),
        name: target.method_name.to_string(),
        params: signature,
        return_type: original_return.clone(),
        is_static,
    };

    let mut asm = InstructionAssembler::new();
    let receiver = usize::from(!is_static);
    if !is_static {
        asm.ldarg(0)?;
    }
    for index in 0..target.kept_params {
        asm.ldarg((receiver + index) as u16)?;
    }
    for default in target.defaults {
        match default {
            DefaultArg::I4(value) => {
                asm.ldc_i4(*value)?;
            }
            DefaultArg::U2(value) => {
                asm.ldc_i4(i32::from(*value))?.conv_u2()?;
            }
            DefaultArg::Str(value) => {
                asm.ldstr(value)?;
            }
        }
    }
    let original_returns = call_target.returns_value();
    asm.call(call_target)?;
    let return_type = if target.discard_result {
        if original_returns {
            asm.pop()?;
        }
        TypeName::void()
    } else {
        original_return
    };
    asm.ret()?;
    let (instructions, max_stack) = asm.finish();

    let mut flags = MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG;
    if is_static {
        flags |= MethodAttributes::STATIC;
    }
    let shim = Method::cil(
        target.method_name,
        flags,
        return_type,
        kept,
        MethodBody {
            max_stack,
            instructions,
        },
    );

    let ty = resolver::find_type_mut(module, target.type_name)
        .ok_or_else(|| Error::TypeNotFound(target.type_name.to_string()))?;
    ty.methods.push(shim);

    info!(
        type_name = target.type_name,
        method = target.method_name,
        max_stack,
        "synthesized shim method"
    );
    Ok(())
}

/// Synthesize one composition shim and append it to its owning type.
///
/// Both originals must be static; the shim carries no receiver to thread through.
///
/// # Errors
/// As [`synthesize`]; additionally [`Error::MethodNotFound`] if either original is
/// an instance method.
pub(crate) fn synthesize_compose(module: &mut Module, target: &ComposeTarget) -> Result<()> {
    let signature: Vec<TypeName> = target.signature.iter().map(|s| TypeName::from(*s)).collect();

    let provider_ty = resolver::find_type(module, target.provider_type)
        .ok_or_else(|| Error::TypeNotFound(target.provider_type.to_string()))?;
    let provider = resolver::find_method(provider_ty, target.provider_method, &[])
        .ok_or_else(|| {
            Error::MethodNotFound(format!(
                "{}::{}",
                target.provider_type, target.provider_method
            ))
        })?;

    let consumer_ty = resolver::find_type(module, target.type_name)
        .ok_or_else(|| Error::TypeNotFound(target.type_name.to_string()))?;
    let consumer = resolver::find_method(consumer_ty, target.method_name, &signature)
        .ok_or_else(|| Error::MethodNotFound(target.describe()))?;

    if !provider.is_static() || !consumer.is_static() {
        return Err(Error::MethodNotFound(format!(
            "{} (composition requires static originals)",
            target.describe()
        )));
    }

    let provider_ref = MethodRef {
        declaring_type: TypeName::from(target.provider_type),
        name: target.provider_method.to_string(),
        params: Vec::new(),
        return_type: provider.return_type.clone(),
        is_static: true,
    };
    let consumer_ref = MethodRef {
        declaring_type: TypeName::from(target.type_name),
        name: target.method_name.to_string(),
        params: signature,
        return_type: consumer.return_type.clone(),
        is_static: true,
    };
    let return_type = consumer.return_type.clone();

    let mut asm = InstructionAssembler::new();
    asm.call(provider_ref)?.call(consumer_ref)?.ret()?;
    let (instructions, max_stack) = asm.finish();

    let shim = Method::cil(
        target.method_name,
        MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG | MethodAttributes::STATIC,
        return_type,
        Vec::new(),
        MethodBody {
            max_stack,
            instructions,
        },
    );

    let ty = resolver::find_type_mut(module, target.type_name)
        .ok_or_else(|| Error::TypeNotFound(target.type_name.to_string()))?;
    ty.methods.push(shim);

    info!(
        type_name = target.type_name,
        method = target.method_name,
        provider = target.provider_method,
        "synthesized composition shim"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::Instruction;
    use crate::metadata::TypeDef;
    use crate::patch::resolver::{find_method, find_type};

    fn connection_module() -> Module {
        let mut connection = TypeDef::new("Steamworks.Data", "Connection");
        connection.methods.push(Method::cil(
            "SendMessage",
            MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG,
            "Steamworks.Data.Result",
            vec![
                Parameter::new("data", "System.Byte[]"),
                Parameter::new("sendType", "Steamworks.Data.SendType"),
                Parameter::new("laneIndex", "System.UInt16"),
            ],
            MethodBody {
                max_stack: 1,
                instructions: vec![Instruction::LdcI4(1), Instruction::Ret],
            },
        ));

        let mut module = Module::new("Facepunch.Steamworks");
        module.types.push(connection);
        module
    }

    #[test]
    fn send_message_shim_shape() {
        let mut module = connection_module();
        let target = &steam_shims()[0];
        synthesize(&mut module, target).unwrap();

        let connection = find_type(&module, "Steamworks.Data.Connection").unwrap();
        assert_eq!(connection.methods.len(), 2);

        let two_arg = [
            TypeName::from("System.Byte[]"),
            TypeName::from("Steamworks.Data.SendType"),
        ];
        let shim = find_method(connection, "SendMessage", &two_arg).unwrap();
        assert_eq!(shim.params.len(), 2);
        assert_eq!(shim.return_type.as_str(), "Steamworks.Data.Result");
        assert!(!shim.is_static());

        let body = shim.cil_body().unwrap();
        // receiver + both kept args + pushed constant simultaneously live
        assert_eq!(body.max_stack, 4);
        assert_eq!(body.instructions[0], Instruction::Ldarg(0));
        assert_eq!(body.instructions[1], Instruction::Ldarg(1));
        assert_eq!(body.instructions[2], Instruction::Ldarg(2));
        assert_eq!(body.instructions[3], Instruction::LdcI4(0));
        assert_eq!(body.instructions[4], Instruction::ConvU2);
        assert!(matches!(&body.instructions[5], Instruction::Call(t)
            if t.name == "SendMessage" && t.params.len() == 3 && !t.is_static));
        assert_eq!(body.instructions[6], Instruction::Ret);
    }

    #[test]
    fn close_shim_pushes_fixed_reason_and_message() {
        let mut close_ty = TypeDef::new("Steamworks", "ConnectionManager");
        close_ty.methods.push(Method::cil(
            "Close",
            MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG,
            TypeName::void(),
            vec![
                Parameter::new("linger", "System.Boolean"),
                Parameter::new("reasonCode", "System.Int32"),
                Parameter::new("debugString", "System.String"),
            ],
            MethodBody {
                max_stack: 0,
                instructions: vec![Instruction::Ret],
            },
        ));

        let mut module = Module::new("Facepunch.Steamworks");
        module.types.push(close_ty);

        let target = steam_shims()
            .into_iter()
            .find(|t| t.method_name == "Close")
            .unwrap();
        synthesize(&mut module, &target).unwrap();

        let ty = find_type(&module, "Steamworks.ConnectionManager").unwrap();
        let shim = find_method(ty, "Close", &[]).unwrap();
        assert!(shim.return_type.is_void());

        let body = shim.cil_body().unwrap();
        assert_eq!(body.max_stack, 4);
        assert_eq!(body.instructions[0], Instruction::Ldarg(0));
        assert_eq!(body.instructions[1], Instruction::LdcI4(0));
        assert_eq!(body.instructions[2], Instruction::LdcI4(0));
        assert_eq!(
            body.instructions[3],
            Instruction::Ldstr(CLOSE_MESSAGE.to_string())
        );
        assert!(matches!(&body.instructions[4], Instruction::Call(t) if t.name == "Close"));
        assert_eq!(body.instructions[5], Instruction::Ret);
    }

    #[test]
    fn receive_shim_discards_result() {
        let mut manager = TypeDef::new("Steamworks", "ConnectionManager");
        manager.methods.push(Method::cil(
            "Receive",
            MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG,
            "System.Int32",
            vec![
                Parameter::new("bufferSize", "System.Int32"),
                Parameter::new("receiveToEnd", "System.Boolean"),
            ],
            MethodBody {
                max_stack: 1,
                instructions: vec![Instruction::LdcI4(0), Instruction::Ret],
            },
        ));

        let mut module = Module::new("Facepunch.Steamworks");
        module.types.push(manager);

        let target = steam_shims()
            .into_iter()
            .find(|t| t.type_name == "Steamworks.ConnectionManager" && t.method_name == "Receive")
            .unwrap();
        synthesize(&mut module, &target).unwrap();

        let ty = find_type(&module, "Steamworks.ConnectionManager").unwrap();
        let one_arg = [TypeName::from("System.Int32")];
        let shim = find_method(ty, "Receive", &one_arg).unwrap();
        assert!(shim.return_type.is_void());

        let body = shim.cil_body().unwrap();
        let tail = &body.instructions[body.instructions.len() - 2..];
        assert_eq!(tail, &[Instruction::Pop, Instruction::Ret]);
    }

    #[test]
    fn composition_calls_provider_then_consumer() {
        let mut client = TypeDef::new("Steamworks", "SteamClient");
        client.methods.push(Method::cil(
            "get_SteamId",
            MethodAttributes::PUBLIC | MethodAttributes::STATIC | MethodAttributes::SPECIAL_NAME,
            "Steamworks.SteamId",
            Vec::new(),
            MethodBody {
                max_stack: 1,
                instructions: vec![Instruction::LdcI4(0), Instruction::Ret],
            },
        ));

        let mut user = TypeDef::new("Steamworks", "SteamUser");
        user.methods.push(Method::cil(
            "GetAuthSessionTicket",
            MethodAttributes::PUBLIC | MethodAttributes::STATIC,
            "Steamworks.AuthTicket",
            vec![Parameter::new("steamId", "Steamworks.SteamId")],
            MethodBody {
                max_stack: 1,
                instructions: vec![Instruction::LdcI4(0), Instruction::Ret],
            },
        ));

        let mut module = Module::new("Facepunch.Steamworks");
        module.types.push(client);
        module.types.push(user);

        synthesize_compose(&mut module, &steam_compositions()[0]).unwrap();

        let user = find_type(&module, "Steamworks.SteamUser").unwrap();
        let shim = find_method(user, "GetAuthSessionTicket", &[]).unwrap();
        assert!(shim.is_static());
        assert_eq!(shim.return_type.as_str(), "Steamworks.AuthTicket");

        let body = shim.cil_body().unwrap();
        assert_eq!(body.max_stack, 1);
        assert!(matches!(&body.instructions[0], Instruction::Call(t) if t.name == "get_SteamId"));
        assert!(
            matches!(&body.instructions[1], Instruction::Call(t) if t.name == "GetAuthSessionTicket")
        );
        assert_eq!(body.instructions[2], Instruction::Ret);
    }

    #[test]
    fn missing_type_skips_without_mutation() {
        let mut module = Module::new("Facepunch.Steamworks");
        let target = &steam_shims()[0];

        assert!(matches!(
            synthesize(&mut module, target),
            Err(Error::TypeNotFound(name)) if name == "Steamworks.Data.Connection"
        ));
        assert!(module.types.is_empty());
    }

    #[test]
    fn wrong_signature_skips() {
        let mut connection = TypeDef::new("Steamworks.Data", "Connection");
        // Same name, different trailing parameter type
        connection.methods.push(Method::cil(
            "SendMessage",
            MethodAttributes::PUBLIC,
            "Steamworks.Data.Result",
            vec![
                Parameter::new("data", "System.Byte[]"),
                Parameter::new("sendType", "Steamworks.Data.SendType"),
                Parameter::new("laneIndex", "System.UInt32"),
            ],
            MethodBody {
                max_stack: 1,
                instructions: vec![Instruction::LdcI4(1), Instruction::Ret],
            },
        ));

        let mut module = Module::new("Facepunch.Steamworks");
        module.types.push(connection);

        assert!(matches!(
            synthesize(&mut module, &steam_shims()[0]),
            Err(Error::MethodNotFound(_))
        ));
        // Nothing appended on the skip path
        assert_eq!(module.types[0].methods.len(), 1);
    }
}
