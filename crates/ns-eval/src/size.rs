//! `get_type_size`: the one piece of `nseval.py` the checker and (out of
//! scope) code generator actually depend on for real, per §4.5.

use ns_common::config::Config;
use ns_parser::{NodeArena, NodeIndex, NodeKind};
use ns_symbols::{Namespace, ScopeId, SymbolKind, SymbolTable};

use crate::error::EvalError;

type EResult<T> = Result<T, EvalError>;

/// A type's size in words, per §4.5's per-category rules. `eval_array`
/// mirrors the source's own flag: when false, an array always costs one
/// pointer word (its own storage is elsewhere, e.g. a function parameter
/// decaying to a pointer); when true, a sized array's element count is
/// folded into the total.
pub fn get_type_size(arena: &NodeArena, symbols: &SymbolTable, scope: ScopeId, config: &Config, ty: NodeIndex, eval_array: bool) -> EResult<u32> {
    match arena.kind(ty) {
        NodeKind::VoidType { .. } => Err(EvalError::VoidHasNoSize { at: arena.span(ty).start }),
        NodeKind::RefType { name, .. } => {
            let sym = symbols
                .lookup(scope, Namespace::Types, name)
                .ok_or_else(|| EvalError::UnknownType { name: name.clone(), at: arena.span(ty).start })?;
            let underlying = match &symbols.symbol(sym).kind {
                SymbolKind::Type { ty, .. } => *ty,
                _ => return Err(EvalError::UnknownType { name: name.clone(), at: arena.span(ty).start }),
            };
            get_type_size(arena, symbols, scope, config, underlying, eval_array)
        }
        NodeKind::IntType { width, .. } => Ok(config.int_size(*width)),
        NodeKind::ArrayType { inner, size, .. } => {
            if eval_array {
                match size {
                    Some(size_expr) => {
                        let count = int_literal_value(arena, *size_expr)
                            .ok_or(EvalError::NonLiteralArraySize { at: arena.span(*size_expr).start })?;
                        let inner_size = get_type_size(arena, symbols, scope, config, *inner, true)?;
                        Ok(count as u32 * inner_size)
                    }
                    None => Ok(config.ptr_size),
                }
            } else {
                Ok(config.ptr_size)
            }
        }
        NodeKind::FuncType { .. } => Ok(config.ptr_size),
        NodeKind::StructType { members, .. } => struct_size(arena, symbols, scope, config, members),
        NodeKind::UnionType { members, .. } => {
            let mut max_size = 0u32;
            for member in members {
                let size = get_type_size(arena, symbols, scope, config, member.ty, true)?;
                max_size = max_size.max(size);
            }
            Ok(max_size)
        }
        other => panic!("get_type_size called on a non-type node: {other:?}"),
    }
}

/// Accumulates member sizes, packing consecutive bit-field members that
/// share the same underlying integer width into shared words. Mirrors the
/// source's running `int_bits`/`int_max` bookkeeping: a word is flushed to
/// `full_size` whenever a differently-widthed member arrives, a non-bitfield
/// member arrives, or the running word is already full.
fn struct_size(
    arena: &NodeArena,
    symbols: &SymbolTable,
    scope: ScopeId,
    config: &Config,
    members: &[ns_parser::MemberData],
) -> EResult<u32> {
    let mut full_size = 0u32;
    let mut packing: Option<(ns_common::config::IntWidth, u32)> = None; // (width, bits used so far)

    for member in members {
        let bitfield_width = match (member.bits, arena.kind(member.ty)) {
            (Some(_), NodeKind::IntType { width, .. }) => Some(*width),
            _ => None,
        };

        match (bitfield_width, member.bits) {
            (Some(width), Some(bits)) => {
                let word_bits = config.int_size(width) * config.bits_per_word;
                let bits = bits as u32;
                let fits_current_word = packing.is_some_and(|(w, used)| w == width && used + bits <= word_bits);
                if fits_current_word {
                    let (_, used) = packing.as_mut().unwrap();
                    *used += bits;
                } else {
                    if let Some((w, _)) = packing.take() {
                        full_size += config.int_size(w);
                    }
                    packing = Some((width, bits));
                }
            }
            _ => {
                if let Some((w, _)) = packing.take() {
                    full_size += config.int_size(w);
                }
                full_size += get_type_size(arena, symbols, scope, config, member.ty, true)?;
            }
        }
    }
    if let Some((w, _)) = packing.take() {
        full_size += config.int_size(w);
    }
    Ok(full_size)
}

fn int_literal_value(arena: &NodeArena, expr: NodeIndex) -> Option<u128> {
    match arena.kind(expr) {
        NodeKind::IntExpr { value, .. } => Some(*value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ns_common::config::IntWidth;
    use ns_common::span::Span;
    use ns_parser::MemberData;
    use ns_symbols::ScopeKind;

    fn int_type(arena: &mut NodeArena, width: IntWidth) -> NodeIndex {
        arena.push(NodeKind::IntType { is_volatile: false, width }, Span::dummy())
    }

    #[test]
    fn plain_int_sizes_match_config() {
        let mut arena = NodeArena::new();
        let symbols = SymbolTable::new();
        let config = Config::default();
        let ty = int_type(&mut arena, IntWidth::Quad);
        let mut table = SymbolTable::new();
        let scope = table.new_scope(ScopeKind::Module, None);
        assert_eq!(get_type_size(&arena, &symbols, scope, &config, ty, true).unwrap(), 4);
    }

    #[test]
    fn unsized_array_costs_one_pointer_word() {
        let mut arena = NodeArena::new();
        let config = Config::default();
        let inner = int_type(&mut arena, IntWidth::Int);
        let ty = arena.push(NodeKind::ArrayType { is_volatile: false, inner, size: None }, Span::dummy());
        let mut table = SymbolTable::new();
        let scope = table.new_scope(ScopeKind::Module, None);
        assert_eq!(get_type_size(&arena, &table, scope, &config, ty, true).unwrap(), config.ptr_size);
    }

    #[test]
    fn sized_array_multiplies_element_count() {
        let mut arena = NodeArena::new();
        let config = Config::default();
        let inner = int_type(&mut arena, IntWidth::Int);
        let size = arena.push(NodeKind::IntExpr { width: IntWidth::Int, value: 3 }, Span::dummy());
        let ty = arena.push(NodeKind::ArrayType { is_volatile: false, inner, size: Some(size) }, Span::dummy());
        let mut table = SymbolTable::new();
        let scope = table.new_scope(ScopeKind::Module, None);
        assert_eq!(get_type_size(&arena, &table, scope, &config, ty, true).unwrap(), 3);
    }

    #[test]
    fn bitfields_sharing_a_word_pack_together() {
        let mut arena = NodeArena::new();
        let config = Config::default();
        let int_a = int_type(&mut arena, IntWidth::Int);
        let int_b = int_type(&mut arena, IntWidth::Int);
        let members = vec![
            MemberData { name: "a".into(), ty: int_a, bits: Some(3) },
            MemberData { name: "b".into(), ty: int_b, bits: Some(5) },
        ];
        let mut table = SymbolTable::new();
        let scope = table.new_scope(ScopeKind::Module, None);
        assert_eq!(struct_size(&arena, &table, scope, &config, &members).unwrap(), config.int_size(IntWidth::Int));
    }

    #[test]
    fn union_size_is_the_maximum_member() {
        let mut arena = NodeArena::new();
        let config = Config::default();
        let a = int_type(&mut arena, IntWidth::Int);
        let b = int_type(&mut arena, IntWidth::Quad);
        let members = vec![MemberData { name: "a".into(), ty: a, bits: None }, MemberData { name: "b".into(), ty: b, bits: None }];
        let ty = arena.push(NodeKind::UnionType { is_volatile: false, members }, Span::dummy());
        let mut table = SymbolTable::new();
        let scope = table.new_scope(ScopeKind::Module, None);
        assert_eq!(get_type_size(&arena, &table, scope, &config, ty, true).unwrap(), config.int_size(IntWidth::Quad));
    }
}
