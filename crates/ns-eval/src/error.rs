//! `nseval.py`'s own functions raise when `get_type_size` hits something it
//! cannot compute: an unresolvable `RefType`, or an array whose size
//! expression is not already a literal (the source's `ExprSimplifier` never
//! folds anything beyond literals, so this is the one case real code ever
//! hits in practice).

use ns_common::span::Position;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("unknown type '{name}' at {at}")]
    UnknownType { name: String, at: Position },
    #[error("array size at {at} is not a constant integer literal")]
    NonLiteralArraySize { at: Position },
    #[error("cannot compute the size of void at {at}")]
    VoidHasNoSize { at: Position },
}
