//! UNO type system as it appears on the URP wire.

use std::fmt;

/// UNO type class. Discriminants are the wire encoding (low 7 bits of a type byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeClass {
    Void = 0,
    Char = 1,
    Boolean = 2,
    Byte = 3,
    Short = 4,
    UnsignedShort = 5,
    Long = 6,
    UnsignedLong = 7,
    Hyper = 8,
    UnsignedHyper = 9,
    Float = 10,
    Double = 11,
    String = 12,
    Type = 13,
    Any = 14,
    Enum = 15,
    Struct = 17,
    Exception = 19,
    Sequence = 20,
    Interface = 22,
}

impl TypeClass {
    pub fn from_byte(b: u8) -> Option<TypeClass> {
        Some(match b & 0x7F {
            0 => TypeClass::Void,
            1 => TypeClass::Char,
            2 => TypeClass::Boolean,
            3 => TypeClass::Byte,
            4 => TypeClass::Short,
            5 => TypeClass::UnsignedShort,
            6 => TypeClass::Long,
            7 => TypeClass::UnsignedLong,
            8 => TypeClass::Hyper,
            9 => TypeClass::UnsignedHyper,
            10 => TypeClass::Float,
            11 => TypeClass::Double,
            12 => TypeClass::String,
            13 => TypeClass::Type,
            14 => TypeClass::Any,
            15 => TypeClass::Enum,
            17 => TypeClass::Struct,
            19 => TypeClass::Exception,
            20 => TypeClass::Sequence,
            22 => TypeClass::Interface,
            _ => return None,
        })
    }

    /// Simple types are encoded as a bare type-class byte, without a name.
    pub fn is_simple(self) -> bool {
        (self as u8) <= TypeClass::Any as u8
    }
}

/// A type class plus, for complex types, the fully-qualified UNO type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    pub class: TypeClass,
    pub name: String,
}

impl Type {
    fn simple(class: TypeClass) -> Self {
        Self {
            class,
            name: String::new(),
        }
    }

    fn named(class: TypeClass, name: impl Into<String>) -> Self {
        Self {
            class,
            name: name.into(),
        }
    }

    pub fn void() -> Self {
        Self::simple(TypeClass::Void)
    }

    pub fn boolean() -> Self {
        Self::simple(TypeClass::Boolean)
    }

    pub fn short() -> Self {
        Self::simple(TypeClass::Short)
    }

    pub fn long() -> Self {
        Self::simple(TypeClass::Long)
    }

    pub fn hyper() -> Self {
        Self::simple(TypeClass::Hyper)
    }

    pub fn double() -> Self {
        Self::simple(TypeClass::Double)
    }

    pub fn string() -> Self {
        Self::simple(TypeClass::String)
    }

    pub fn any() -> Self {
        Self::simple(TypeClass::Any)
    }

    pub fn r#type() -> Self {
        Self::simple(TypeClass::Type)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::named(TypeClass::Interface, name)
    }

    pub fn r#enum(name: impl Into<String>) -> Self {
        Self::named(TypeClass::Enum, name)
    }

    pub fn r#struct(name: impl Into<String>) -> Self {
        Self::named(TypeClass::Struct, name)
    }

    pub fn exception(name: impl Into<String>) -> Self {
        Self::named(TypeClass::Exception, name)
    }

    pub fn sequence(element_type_name: &str) -> Self {
        Self::named(TypeClass::Sequence, format!("[]{element_type_name}"))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{:?}", self.class)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// A value that can travel over URP.
#[derive(Debug, Clone, PartialEq)]
pub enum UnoValue {
    Void,
    Bool(bool),
    Byte(u8),
    Short(i16),
    UnsignedShort(u16),
    Long(i32),
    UnsignedLong(u32),
    Hyper(i64),
    UnsignedHyper(u64),
    Float(f32),
    Double(f64),
    Char(u16),
    String(String),
    Type(Type),
    Any(Box<Any>),
    Enum(i32),
    /// Struct members in declaration order.
    Struct(Vec<UnoValue>),
    Exception(UnoException),
    Sequence(Vec<UnoValue>),
    /// Interface reference by OID; empty means null.
    Interface(String),
}

impl UnoValue {
    /// Wrap `value` in an `Any` tagged with `type_desc`.
    pub fn any(type_desc: Type, value: UnoValue) -> Self {
        UnoValue::Any(Box::new(Any { type_desc, value }))
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            UnoValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            UnoValue::Bool(b) => Some(*b),
            UnoValue::Any(a) => a.value.as_bool(),
            _ => None,
        }
    }

    /// Wire type implied by the variant alone.
    ///
    /// Struct members carry no type tags, so the marshaler needs this to
    /// write them. Names of complex types are left empty; the type class is
    /// all the value encoder looks at.
    pub fn infer_type(&self) -> Type {
        match self {
            UnoValue::Void => Type::void(),
            UnoValue::Bool(_) => Type::boolean(),
            UnoValue::Byte(_) => Type::simple(TypeClass::Byte),
            UnoValue::Short(_) => Type::short(),
            UnoValue::UnsignedShort(_) => Type::simple(TypeClass::UnsignedShort),
            UnoValue::Long(_) => Type::long(),
            UnoValue::UnsignedLong(_) => Type::simple(TypeClass::UnsignedLong),
            UnoValue::Hyper(_) => Type::hyper(),
            UnoValue::UnsignedHyper(_) => Type::simple(TypeClass::UnsignedHyper),
            UnoValue::Float(_) => Type::simple(TypeClass::Float),
            UnoValue::Double(_) => Type::double(),
            UnoValue::Char(_) => Type::simple(TypeClass::Char),
            UnoValue::String(_) => Type::string(),
            UnoValue::Type(_) => Type::r#type(),
            UnoValue::Any(_) => Type::any(),
            UnoValue::Enum(_) => Type::r#enum(""),
            UnoValue::Struct(_) => Type::r#struct(""),
            UnoValue::Exception(_) => Type::exception(""),
            UnoValue::Sequence(_) => Type::sequence(""),
            UnoValue::Interface(_) => Type::interface(""),
        }
    }
}

/// A value together with its type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Any {
    pub type_desc: Type,
    pub value: UnoValue,
}

/// A UNO exception; only the message member is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct UnoException {
    pub type_name: String,
    pub message: String,
}

pub mod type_names {
    pub const X_INTERFACE: &str = "com.sun.star.uno.XInterface";
    pub const X_COMPONENT_CONTEXT: &str = "com.sun.star.uno.XComponentContext";
    pub const X_MULTI_COMPONENT_FACTORY: &str = "com.sun.star.lang.XMultiComponentFactory";
    pub const X_COMPONENT_LOADER: &str = "com.sun.star.frame.XComponentLoader";
    pub const X_DESKTOP: &str = "com.sun.star.frame.XDesktop";
    pub const X_COMPONENT: &str = "com.sun.star.lang.XComponent";
    pub const X_STORABLE: &str = "com.sun.star.frame.XStorable";
    pub const X_CLOSEABLE: &str = "com.sun.star.util.XCloseable";
    pub const X_PROTOCOL_PROPERTIES: &str = "com.sun.star.bridge.XProtocolProperties";

    pub const PROPERTY_VALUE: &str = "com.sun.star.beans.PropertyValue";
    pub const PROTOCOL_PROPERTY: &str = "com.sun.star.bridge.ProtocolProperty";

    pub const SERVICE_DESKTOP: &str = "com.sun.star.frame.Desktop";
}
