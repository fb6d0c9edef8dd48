use serde::{Deserialize, Serialize};
use std::fmt;

/// The static type of a declaration or expression.
///
/// Signedness is not tracked, the abstract domain does not distinguish
/// between signed and unsigned integers.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Type {
    Void,
    Bool,
    Char,
    Short,
    Int,
    Long,
    LongLong,
    Float,
    Double,
    LongDouble,
    /// An enumeration, laid out as an `int`.
    Enum(String),
    Pointer(Box<Type>),
    /// An array with an element type, and a length when it is known
    /// statically.
    Array(Box<Type>, Option<u64>),
    Struct(String),
    Union(String),
    Function(Box<FunctionType>),
}

/// The signature of a function.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct FunctionType {
    return_type: Type,
    parameters: Vec<Type>,
    variadic: bool,
}

impl FunctionType {
    pub fn new(return_type: Type, parameters: Vec<Type>, variadic: bool) -> FunctionType {
        FunctionType {
            return_type,
            parameters,
            variadic,
        }
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    pub fn parameters(&self) -> &[Type] {
        &self.parameters
    }

    pub fn variadic(&self) -> bool {
        self.variadic
    }
}

impl Type {
    /// Create a pointer to this type.
    pub fn pointer_to(self) -> Type {
        Type::Pointer(Box::new(self))
    }

    /// Create an array of `length` elements of this type.
    pub fn array_of(self, length: Option<u64>) -> Type {
        Type::Array(Box::new(self), length)
    }

    /// Create a function type returning this type.
    pub fn function_returning(self, parameters: Vec<Type>) -> Type {
        Type::Function(Box::new(FunctionType::new(self, parameters, false)))
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Type::Bool
                | Type::Char
                | Type::Short
                | Type::Int
                | Type::Long
                | Type::LongLong
                | Type::Enum(_)
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, Type::Float | Type::Double | Type::LongDouble)
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || self.is_floating()
    }

    /// Pointers, and arrays which decay into pointers.
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_) | Type::Array(_, _))
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Struct(_) | Type::Union(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function(_))
    }

    /// A pointer to a function.
    pub fn is_function_pointer(&self) -> bool {
        match self {
            Type::Pointer(pointee) => pointee.is_function(),
            _ => false,
        }
    }

    /// The type a pointer or array refers to.
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(pointee) | Type::Array(pointee, _) => Some(pointee),
            _ => None,
        }
    }

    /// The type after array-to-pointer and function-to-pointer decay.
    pub fn decay(&self) -> Type {
        match self {
            Type::Array(element, _) => Type::Pointer(element.clone()),
            Type::Function(_) => self.clone().pointer_to(),
            _ => self.clone(),
        }
    }

    /// The signature of a function, or of a pointer to a function.
    pub fn signature(&self) -> Option<&FunctionType> {
        match self {
            Type::Function(signature) => Some(signature),
            Type::Pointer(pointee) => match pointee.as_ref() {
                Type::Function(signature) => Some(signature),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "_Bool"),
            Type::Char => write!(f, "char"),
            Type::Short => write!(f, "short"),
            Type::Int => write!(f, "int"),
            Type::Long => write!(f, "long"),
            Type::LongLong => write!(f, "long long"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::LongDouble => write!(f, "long double"),
            Type::Enum(name) => write!(f, "enum {}", name),
            Type::Pointer(pointee) => write!(f, "{}*", pointee),
            Type::Array(element, Some(length)) => write!(f, "{}[{}]", element, length),
            Type::Array(element, None) => write!(f, "{}[]", element),
            Type::Struct(name) => write!(f, "struct {}", name),
            Type::Union(name) => write!(f, "union {}", name),
            Type::Function(signature) => {
                write!(f, "{}(", signature.return_type())?;
                for (i, parameter) in signature.parameters().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", parameter)?;
                }
                write!(f, ")")
            }
        }
    }
}
