pub mod config;
pub mod dump;
pub mod error;
pub mod frame;
pub mod interpreter;
pub mod primitives;
pub mod value;

pub use config::{MAX_FRAMES, UnboundNamePolicy, VmConfig};
pub use dump::dump_heap;
pub use error::{Arity, ErrorKind, RuntimeError, StackKind};
pub use frame::{Block, BlockKind, Frame};
pub use interpreter::{Completion, Vm, Why};
pub use primitives::{NativeContext, NativeDesc, NativeFn, NativeRegistry, default_natives};
pub use value::{NativeId, Value};
