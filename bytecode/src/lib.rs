mod builder;
mod decoder;
mod instruction;
mod op;

pub use builder::{BytecodeBuilder, Label};
pub use decoder::{BytecodeDecoder, DecodeError, decode_at};
pub use instruction::Instruction;
pub use op::{HAVE_ARGUMENT, Op, opcode_name};

/// Render a bytecode string one instruction per line.
///
/// Decoding stops at the first malformed instruction, which is rendered as
/// an error line.
pub fn disassemble(bytes: &[u8]) -> String {
    let mut out = String::new();
    for item in BytecodeDecoder::new(bytes) {
        match item {
            Ok(instr) => out.push_str(&instr.to_string()),
            Err(err) => out.push_str(&format!("error: {err}")),
        }
        out.push('\n');
    }
    out
}
