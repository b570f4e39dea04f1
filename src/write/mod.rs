//! Serialization of the in-memory model back to the container format.
//!
//! Writing is validating: before any byte is emitted, every instruction-sequence body
//! is simulated so that a call referencing a method that does not exist in the module,
//! an understated max-stack, or an unbalanced return is reported as an error instead
//! of being baked into a silently-broken output. The layout mirrors
//! [`crate::file::parser`] exactly.

use crate::assembly::{simulate_stack, Instruction, MethodRef};
use crate::file::io::{write_le, write_string, write_utf16};
use crate::file::parser::{BODY_CIL, BODY_PINVOKE, MAGIC, VERSION};
use crate::metadata::{Method, MethodBody, MethodBodyKind, Module, PInvokeInfo, TypeDef};
use crate::patch::resolver;
use crate::{Error, Result};

/// Parameter counts are stored in a single byte; anything beyond this cannot be encoded.
const MAX_PARAMS: usize = u8::MAX as usize;

/// Serialize `module` to container bytes, validating every instruction-sequence body.
///
/// # Errors
/// Returns [`Error::UnresolvedCallTarget`] for a call whose declaring type exists in
/// the module but holds no method with the referenced signature,
/// [`Error::TooManyParameters`] for a method or call target whose parameter list
/// exceeds the one-byte count field, [`Error::InvalidMaxStack`] for an understated
/// declared max-stack, and the simulation errors of
/// [`crate::assembly::simulate_stack`].
pub(crate) fn to_bytes(module: &Module) -> Result<Vec<u8>> {
    validate(module)?;

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    write_le(&mut out, VERSION);
    write_string(&mut out, &module.name);
    out.extend_from_slice(&module.mvid.to_bytes());

    write_le(&mut out, module.types.len() as u32);
    for ty in &module.types {
        write_type(&mut out, ty);
    }

    Ok(out)
}

fn validate(module: &Module) -> Result<()> {
    for ty in &module.types {
        validate_type(module, ty)?;
    }
    Ok(())
}

fn validate_type(module: &Module, ty: &TypeDef) -> Result<()> {
    for method in &ty.methods {
        if method.params.len() > MAX_PARAMS {
            return Err(Error::TooManyParameters {
                name: method.name.clone(),
                count: method.params.len(),
            });
        }
        if let MethodBodyKind::Cil(body) = &method.body {
            validate_body(module, method, body)?;
        }
    }
    for nested in &ty.nested {
        validate_type(module, nested)?;
    }
    Ok(())
}

fn validate_body(module: &Module, method: &Method, body: &MethodBody) -> Result<()> {
    let required = simulate_stack(&body.instructions, !method.return_type.is_void())?;
    if required > body.max_stack {
        return Err(Error::InvalidMaxStack {
            declared: body.max_stack,
            required,
        });
    }

    for instruction in &body.instructions {
        if let Instruction::Call(target) = instruction {
            if target.params.len() > MAX_PARAMS {
                return Err(Error::TooManyParameters {
                    name: target.to_string(),
                    count: target.params.len(),
                });
            }
            validate_call_target(module, target)?;
        }
    }

    Ok(())
}

fn validate_call_target(module: &Module, target: &MethodRef) -> Result<()> {
    // Targets in other modules cannot be checked here; only in-module references are
    let Some(ty) = resolver::find_type(module, target.declaring_type.as_str()) else {
        return Ok(());
    };

    match resolver::find_method(ty, &target.name, &target.params) {
        Some(_) => Ok(()),
        None => Err(Error::UnresolvedCallTarget(target.to_string())),
    }
}

fn write_type(out: &mut Vec<u8>, ty: &TypeDef) {
    write_string(out, &ty.namespace);
    write_string(out, &ty.name);
    write_le(out, ty.flags.bits());

    write_le(out, ty.methods.len() as u32);
    for method in &ty.methods {
        write_method(out, method);
    }

    write_le(out, ty.nested.len() as u32);
    for nested in &ty.nested {
        write_type(out, nested);
    }
}

fn write_method(out: &mut Vec<u8>, method: &Method) {
    write_string(out, &method.name);
    write_le(out, method.flags.bits());
    write_string(out, method.return_type.as_str());

    write_le(out, method.params.len() as u8);
    for param in &method.params {
        write_string(out, &param.name);
        write_string(out, param.param_type.as_str());
    }

    match &method.body {
        MethodBodyKind::PInvoke(info) => {
            write_le(out, BODY_PINVOKE);
            write_pinvoke(out, info);
        }
        MethodBodyKind::Cil(body) => {
            write_le(out, BODY_CIL);
            write_body(out, body);
        }
    }
}

fn write_pinvoke(out: &mut Vec<u8>, info: &PInvokeInfo) {
    write_string(out, &info.module);
    write_string(out, &info.entry_point);
    write_le(out, (info.flags & 0xFFFF) as u16);
}

fn write_body(out: &mut Vec<u8>, body: &MethodBody) {
    write_le(out, body.max_stack);
    write_le(out, body.instructions.len() as u32);
    for instruction in &body.instructions {
        write_instruction(out, instruction);
    }
}

fn write_instruction(out: &mut Vec<u8>, instruction: &Instruction) {
    write_le(out, instruction.opcode() as u8);
    match instruction {
        Instruction::Ldarg(index) => write_le(out, *index),
        Instruction::LdcI4(value) => write_le(out, *value),
        Instruction::Ldstr(value) => write_utf16(out, value),
        Instruction::Call(target) => write_method_ref(out, target),
        Instruction::Nop | Instruction::ConvU2 | Instruction::Pop | Instruction::Ret => {}
    }
}

fn write_method_ref(out: &mut Vec<u8>, target: &MethodRef) {
    write_string(out, target.declaring_type.as_str());
    write_string(out, &target.name);
    write_le(out, u8::from(target.is_static));

    write_le(out, target.params.len() as u8);
    for param in &target.params {
        write_string(out, param.as_str());
    }

    write_string(out, target.return_type.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MethodAttributes, Parameter, TypeName};

    fn module_with_body(max_stack: u16, instructions: Vec<Instruction>) -> Module {
        let mut ty = TypeDef::new("Steamworks", "SteamClient");
        ty.methods.push(Method::cil(
            "Init",
            MethodAttributes::PUBLIC | MethodAttributes::STATIC,
            TypeName::void(),
            vec![Parameter::new("appId", "System.UInt32")],
            MethodBody {
                max_stack,
                instructions,
            },
        ));

        let mut module = Module::new("Facepunch.Steamworks");
        module.types.push(ty);
        module
    }

    #[test]
    fn understated_max_stack_is_rejected() {
        let module = module_with_body(
            1,
            vec![
                Instruction::LdcI4(1),
                Instruction::LdcI4(2),
                Instruction::Pop,
                Instruction::Pop,
                Instruction::Ret,
            ],
        );

        assert!(matches!(
            to_bytes(&module),
            Err(Error::InvalidMaxStack {
                declared: 1,
                required: 2
            })
        ));
    }

    #[test]
    fn dangling_in_module_call_is_rejected() {
        let missing = MethodRef {
            declaring_type: TypeName::from("Steamworks.SteamClient"),
            name: "DoesNotExist".to_string(),
            params: Vec::new(),
            return_type: TypeName::void(),
            is_static: true,
        };
        let module = module_with_body(0, vec![Instruction::Call(missing), Instruction::Ret]);

        assert!(matches!(
            to_bytes(&module),
            Err(Error::UnresolvedCallTarget(_))
        ));
    }

    #[test]
    fn oversized_parameter_list_is_rejected() {
        let params: Vec<Parameter> = (0..300)
            .map(|i| Parameter::new(format!("arg{i}"), "System.Int32"))
            .collect();
        let mut ty = TypeDef::new("Steamworks", "SteamClient");
        ty.methods.push(Method::cil(
            "Init",
            MethodAttributes::PUBLIC | MethodAttributes::STATIC,
            TypeName::void(),
            params,
            MethodBody {
                max_stack: 0,
                instructions: vec![Instruction::Ret],
            },
        ));
        let mut module = Module::new("Facepunch.Steamworks");
        module.types.push(ty);

        // The one-byte count field would wrap; serialization must refuse instead
        assert!(matches!(
            to_bytes(&module),
            Err(Error::TooManyParameters { count: 300, .. })
        ));
    }

    #[test]
    fn oversized_call_target_signature_is_rejected() {
        let wide = MethodRef {
            declaring_type: TypeName::from("System.Runtime.Internals"),
            name: "Dispatch".to_string(),
            params: (0..300).map(|_| TypeName::from("System.Int32")).collect(),
            return_type: TypeName::void(),
            is_static: true,
        };
        let mut instructions: Vec<Instruction> =
            (0..300).map(|_| Instruction::LdcI4(0)).collect();
        instructions.push(Instruction::Call(wide));
        instructions.push(Instruction::Ret);

        let module = module_with_body(300, instructions);
        assert!(matches!(
            to_bytes(&module),
            Err(Error::TooManyParameters { count: 300, .. })
        ));
    }

    #[test]
    fn cross_module_call_is_allowed() {
        let external = MethodRef {
            declaring_type: TypeName::from("System.Console"),
            name: "WriteLine".to_string(),
            params: vec![TypeName::from("System.String")],
            return_type: TypeName::void(),
            is_static: true,
        };
        let module = module_with_body(
            1,
            vec![
                Instruction::Ldstr("hello".to_string()),
                Instruction::Call(external),
                Instruction::Ret,
            ],
        );

        assert!(to_bytes(&module).is_ok());
    }
}
