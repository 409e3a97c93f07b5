use heap::HeapError;
use object::Tag;

use crate::error::ErrorKind;
use crate::interpreter::Why;
use crate::primitives::NativeContext;
use crate::value::Value;

/// `print(s)`: write the string's bytes and a newline.
///
/// Only string cells are accepted. The result is [`Value::None`].
pub fn print(ctx: &mut NativeContext<'_>, args: &[Value], rets: &mut Vec<Value>) -> Why {
    let handle = match args.first() {
        Some(Value::Cell(handle)) => *handle,
        Some(other) => {
            return ctx.raise(ErrorKind::NativeFailure {
                name: "print",
                reason: format!("expected a str, got {other}"),
            });
        }
        None => {
            return ctx.raise(ErrorKind::NativeFailure {
                name: "print",
                reason: "missing argument".to_string(),
            });
        }
    };

    let text = match ctx.heap.str(handle) {
        Ok(text) => text,
        Err(err @ HeapError::TypeMismatch { .. }) => {
            log::debug!("print: {} is not a {}", handle, Tag::Str);
            return ctx.raise(err);
        }
        Err(err) => return ctx.raise(err),
    };

    let written = ctx
        .out
        .write_all(text.as_bytes())
        .and_then(|()| ctx.out.write_all(b"\n"));
    if let Err(err) = written {
        return ctx.raise(ErrorKind::NativeFailure {
            name: "print",
            reason: err.to_string(),
        });
    }

    rets.push(Value::None);
    Why::Not
}
