//! Operator immediate tables for the `BINARY`, `COMPARE`, and `UNARY`
//! instructions. Indices are bytecode immediates and must stay stable.

use core::fmt;

use crate::PanicReason;

macro_rules! op_table {
    ($(#[$doc:meta])* $name:ident { $($(#[$vdoc:meta])* $variant:ident = $idx:literal => $sym:literal),+ $(,)? }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vdoc])* $variant = $idx,)+
        }

        impl $name {
            /// Source-level spelling of the operator.
            pub const fn symbol(&self) -> &'static str {
                match self {
                    $(Self::$variant => $sym,)+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = PanicReason;

            fn try_from(byte: u8) -> Result<Self, Self::Error> {
                Ok(match byte {
                    $($idx => Self::$variant,)+
                    _ => return Err(PanicReason::InvalidInstruction),
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.symbol())
            }
        }
    };
}

op_table! {
    /// Sub-operations of [`Opcode::Binary`](crate::Opcode::Binary).
    ///
    /// `&&` and `||` are eager: both operands are already on the stack
    /// when the instruction executes. `@` is the dot product and `is`
    /// the identity test.
    BinaryOp {
        /// Addition, string and list concatenation.
        Add = 0 => "+",
        /// Subtraction.
        Sub = 1 => "-",
        /// Multiplication.
        Mul = 2 => "*",
        /// Division. Division by zero yields ±∞.
        Div = 3 => "/",
        /// Remainder.
        Mod = 4 => "%",
        /// Eager logical AND over truthiness.
        And = 5 => "&&",
        /// Eager logical OR over truthiness.
        Or = 6 => "||",
        /// Exponentiation, right-associative at the source level.
        Pow = 7 => "**",
        /// Bitwise AND on the truncated integer value.
        BitAnd = 8 => "&",
        /// Bitwise OR on the truncated integer value.
        BitOr = 9 => "|",
        /// Bitwise XOR on the truncated integer value.
        BitXor = 10 => "^",
        /// Left shift.
        Shl = 11 => "<<",
        /// Arithmetic right shift.
        Shr = 12 => ">>",
        /// Logical right shift on the unsigned bit pattern.
        UShr = 13 => ">>>",
        /// Dot product of numeric lists, matrix product of matrices.
        Dot = 14 => "@",
        /// Identity: same heap object, or equal primitive.
        Is = 15 => "is",
    }
}

op_table! {
    /// Sub-operations of [`Opcode::Compare`](crate::Opcode::Compare).
    CompareOp {
        /// Deep equality with numeric tolerance.
        Eq = 0 => "==",
        /// Negated deep equality.
        Ne = 1 => "!=",
        /// Greater than.
        Gt = 2 => ">",
        /// Less than.
        Lt = 3 => "<",
        /// Greater or equal.
        Ge = 4 => ">=",
        /// Less or equal.
        Le = 5 => "<=",
        /// Membership: list element, substring, map key, range bounds.
        In = 6 => "in",
    }
}

op_table! {
    /// Sub-operations of [`Opcode::Unary`](crate::Opcode::Unary).
    UnaryOp {
        /// Numeric identity (coerces to number).
        Plus = 0 => "+",
        /// Numeric negation.
        Neg = 1 => "-",
        /// Logical NOT over truthiness.
        Not = 2 => "!",
        /// Bitwise NOT on the truncated integer value.
        BitNot = 3 => "~",
        /// Length of a string, list, or map.
        Len = 4 => "#",
        /// Increment by one (the parser pairs it with a store).
        Incr = 5 => "++",
        /// Decrement by one (the parser pairs it with a store).
        Decr = 6 => "--",
        /// Push the type name of the operand.
        TypeOf = 7 => "typeof",
    }
}
