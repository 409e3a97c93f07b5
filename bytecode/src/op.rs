macro_rules! opcodes {
    ($($variant:ident = $value:literal => $name:literal,)*) => {
        /// Bytecode opcodes, numbered as in CPython 2.7.
        ///
        /// Opcodes at or above [`HAVE_ARGUMENT`] are followed by a 16-bit
        /// little-endian operand; all others are a single byte.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Op {
            $($variant = $value,)*
        }

        impl Op {
            /// Every opcode, in numeric order.
            pub const ALL: &'static [Op] = &[$(Op::$variant,)*];

            /// Name as printed in disassembly.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Op::$variant => $name,)*
                }
            }
        }

        impl TryFrom<u8> for Op {
            type Error = u8;

            fn try_from(byte: u8) -> Result<Self, u8> {
                match byte {
                    $($value => Ok(Op::$variant),)*
                    other => Err(other),
                }
            }
        }
    };
}

/// First opcode that carries an operand.
pub const HAVE_ARGUMENT: u8 = 90;

opcodes! {
    StopCode = 0 => "STOP_CODE",
    PopTop = 1 => "POP_TOP",
    RotTwo = 2 => "ROT_TWO",
    RotThree = 3 => "ROT_THREE",
    DupTop = 4 => "DUP_TOP",
    RotFour = 5 => "ROT_FOUR",
    Nop = 9 => "NOP",
    UnaryPositive = 10 => "UNARY_POSITIVE",
    UnaryNegative = 11 => "UNARY_NEGATIVE",
    UnaryNot = 12 => "UNARY_NOT",
    UnaryConvert = 13 => "UNARY_CONVERT",
    UnaryInvert = 15 => "UNARY_INVERT",
    BinaryPower = 19 => "BINARY_POWER",
    BinaryMultiply = 20 => "BINARY_MULTIPLY",
    BinaryDivide = 21 => "BINARY_DIVIDE",
    BinaryModulo = 22 => "BINARY_MODULO",
    BinaryAdd = 23 => "BINARY_ADD",
    BinarySubtract = 24 => "BINARY_SUBTRACT",
    BinarySubscr = 25 => "BINARY_SUBSCR",
    BinaryFloorDivide = 26 => "BINARY_FLOOR_DIVIDE",
    BinaryTrueDivide = 27 => "BINARY_TRUE_DIVIDE",
    InplaceFloorDivide = 28 => "INPLACE_FLOOR_DIVIDE",
    InplaceTrueDivide = 29 => "INPLACE_TRUE_DIVIDE",
    Slice0 = 30 => "SLICE+0",
    Slice1 = 31 => "SLICE+1",
    Slice2 = 32 => "SLICE+2",
    Slice3 = 33 => "SLICE+3",
    StoreSlice0 = 40 => "STORE_SLICE+0",
    StoreSlice1 = 41 => "STORE_SLICE+1",
    StoreSlice2 = 42 => "STORE_SLICE+2",
    StoreSlice3 = 43 => "STORE_SLICE+3",
    DeleteSlice0 = 50 => "DELETE_SLICE+0",
    DeleteSlice1 = 51 => "DELETE_SLICE+1",
    DeleteSlice2 = 52 => "DELETE_SLICE+2",
    DeleteSlice3 = 53 => "DELETE_SLICE+3",
    StoreMap = 54 => "STORE_MAP",
    InplaceAdd = 55 => "INPLACE_ADD",
    InplaceSubtract = 56 => "INPLACE_SUBTRACT",
    InplaceMultiply = 57 => "INPLACE_MULTIPLY",
    InplaceDivide = 58 => "INPLACE_DIVIDE",
    InplaceModulo = 59 => "INPLACE_MODULO",
    StoreSubscr = 60 => "STORE_SUBSCR",
    DeleteSubscr = 61 => "DELETE_SUBSCR",
    BinaryLshift = 62 => "BINARY_LSHIFT",
    BinaryRshift = 63 => "BINARY_RSHIFT",
    BinaryAnd = 64 => "BINARY_AND",
    BinaryXor = 65 => "BINARY_XOR",
    BinaryOr = 66 => "BINARY_OR",
    InplacePower = 67 => "INPLACE_POWER",
    GetIter = 68 => "GET_ITER",
    PrintExpr = 70 => "PRINT_EXPR",
    PrintItem = 71 => "PRINT_ITEM",
    PrintNewline = 72 => "PRINT_NEWLINE",
    PrintItemTo = 73 => "PRINT_ITEM_TO",
    PrintNewlineTo = 74 => "PRINT_NEWLINE_TO",
    InplaceLshift = 75 => "INPLACE_LSHIFT",
    InplaceRshift = 76 => "INPLACE_RSHIFT",
    InplaceAnd = 77 => "INPLACE_AND",
    InplaceXor = 78 => "INPLACE_XOR",
    InplaceOr = 79 => "INPLACE_OR",
    BreakLoop = 80 => "BREAK_LOOP",
    WithCleanup = 81 => "WITH_CLEANUP",
    LoadLocals = 82 => "LOAD_LOCALS",
    ReturnValue = 83 => "RETURN_VALUE",
    ImportStar = 84 => "IMPORT_STAR",
    ExecStmt = 85 => "EXEC_STMT",
    YieldValue = 86 => "YIELD_VALUE",
    PopBlock = 87 => "POP_BLOCK",
    EndFinally = 88 => "END_FINALLY",
    BuildClass = 89 => "BUILD_CLASS",
    StoreName = 90 => "STORE_NAME",
    DeleteName = 91 => "DELETE_NAME",
    UnpackSequence = 92 => "UNPACK_SEQUENCE",
    ForIter = 93 => "FOR_ITER",
    ListAppend = 94 => "LIST_APPEND",
    StoreAttr = 95 => "STORE_ATTR",
    DeleteAttr = 96 => "DELETE_ATTR",
    StoreGlobal = 97 => "STORE_GLOBAL",
    DeleteGlobal = 98 => "DELETE_GLOBAL",
    DupTopx = 99 => "DUP_TOPX",
    LoadConst = 100 => "LOAD_CONST",
    LoadName = 101 => "LOAD_NAME",
    BuildTuple = 102 => "BUILD_TUPLE",
    BuildList = 103 => "BUILD_LIST",
    BuildSet = 104 => "BUILD_SET",
    BuildMap = 105 => "BUILD_MAP",
    LoadAttr = 106 => "LOAD_ATTR",
    CompareOp = 107 => "COMPARE_OP",
    ImportName = 108 => "IMPORT_NAME",
    ImportFrom = 109 => "IMPORT_FROM",
    JumpForward = 110 => "JUMP_FORWARD",
    JumpIfFalseOrPop = 111 => "JUMP_IF_FALSE_OR_POP",
    JumpIfTrueOrPop = 112 => "JUMP_IF_TRUE_OR_POP",
    JumpAbsolute = 113 => "JUMP_ABSOLUTE",
    PopJumpIfFalse = 114 => "POP_JUMP_IF_FALSE",
    PopJumpIfTrue = 115 => "POP_JUMP_IF_TRUE",
    LoadGlobal = 116 => "LOAD_GLOBAL",
    ContinueLoop = 119 => "CONTINUE_LOOP",
    SetupLoop = 120 => "SETUP_LOOP",
    SetupExcept = 121 => "SETUP_EXCEPT",
    SetupFinally = 122 => "SETUP_FINALLY",
    LoadFast = 124 => "LOAD_FAST",
    StoreFast = 125 => "STORE_FAST",
    DeleteFast = 126 => "DELETE_FAST",
    RaiseVarargs = 130 => "RAISE_VARARGS",
    CallFunction = 131 => "CALL_FUNCTION",
    MakeFunction = 132 => "MAKE_FUNCTION",
    BuildSlice = 133 => "BUILD_SLICE",
    MakeClosure = 134 => "MAKE_CLOSURE",
    LoadClosure = 135 => "LOAD_CLOSURE",
    LoadDeref = 136 => "LOAD_DEREF",
    StoreDeref = 137 => "STORE_DEREF",
    CallFunctionVar = 140 => "CALL_FUNCTION_VAR",
    CallFunctionKw = 141 => "CALL_FUNCTION_KW",
    CallFunctionVarKw = 142 => "CALL_FUNCTION_VAR_KW",
    SetupWith = 143 => "SETUP_WITH",
    ExtendedArg = 145 => "EXTENDED_ARG",
    SetAdd = 146 => "SET_ADD",
    MapAdd = 147 => "MAP_ADD",
}

impl Op {
    /// Whether this opcode is followed by a 16-bit operand.
    #[inline(always)]
    pub const fn has_arg(self) -> bool {
        self as u8 >= HAVE_ARGUMENT
    }
}

/// Name of a raw opcode byte, `"<n>"`-style for unassigned values.
pub fn opcode_name(byte: u8) -> String {
    match Op::try_from(byte) {
        Ok(op) => op.name().to_string(),
        Err(byte) => format!("<{byte}>"),
    }
}
