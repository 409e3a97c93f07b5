/// Value kind stored in the first two bytes of every cell.
///
/// Tags are negative by convention so they can never be confused with a
/// cell index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum Tag {
    None = -1,
    Bool = -2,
    Int = -3,
    Float = -4,
    Str = -5,
    Tuple = -6,
    Code = -7,
}

impl Tag {
    pub const COUNT: usize = 7;

    #[inline(always)]
    pub const fn raw(self) -> i16 {
        self as i16
    }

    /// Short lowercase name used in diagnostics.
    pub const fn debug_name(self) -> &'static str {
        match self {
            Tag::None => "None",
            Tag::Bool => "bool",
            Tag::Int => "int",
            Tag::Float => "float",
            Tag::Str => "str",
            Tag::Tuple => "tuple",
            Tag::Code => "code",
        }
    }
}

impl TryFrom<i16> for Tag {
    type Error = i16;

    fn try_from(raw: i16) -> Result<Self, i16> {
        match raw {
            -1 => Ok(Tag::None),
            -2 => Ok(Tag::Bool),
            -3 => Ok(Tag::Int),
            -4 => Ok(Tag::Float),
            -5 => Ok(Tag::Str),
            -6 => Ok(Tag::Tuple),
            -7 => Ok(Tag::Code),
            other => Err(other),
        }
    }
}

/// Debug name for a raw tag, including ones no [`Tag`] variant covers.
pub fn tag_debug_name(raw: i16) -> &'static str {
    Tag::try_from(raw).map(Tag::debug_name).unwrap_or("?")
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.debug_name())
    }
}
