/*! Structurally shared type-sets.
 *
 * Every field of a node carries the set of types observed there. Sets are interned so that two
 * equal sets always share one id, which turns set equality into an integer compare and lets nodes
 * copy their field maps without cloning any set contents.
 */

use crate::types::Type;
use indexmap::IndexSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeSetId(u32);

impl TypeSetId {
    pub const EMPTY: TypeSetId = TypeSetId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "types#{}", self.0)
    }
}

/// Owns every `Type` and type-set handed out for one graph.
///
/// Sets are stored sorted and duplicate-free; ids are never invalidated.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInterner {
    types: IndexSet<Type>,
    sets: IndexSet<Box<[TypeId]>>,
}

impl TypeInterner {
    pub fn new() -> Self {
        let mut sets = IndexSet::new();
        sets.insert(Vec::new().into_boxed_slice());
        Self {
            types: IndexSet::new(),
            sets,
        }
    }

    pub fn intern_type(&mut self, ty: Type) -> TypeId {
        let (idx, _) = self.types.insert_full(ty);
        TypeId(idx as u32)
    }

    pub fn lookup_type(&self, ty: &Type) -> Option<TypeId> {
        self.types.get_index_of(ty).map(|idx| TypeId(idx as u32))
    }

    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn empty_set(&self) -> TypeSetId {
        TypeSetId::EMPTY
    }

    pub fn types(&self, set: TypeSetId) -> &[TypeId] {
        &self.sets[set.index()]
    }

    pub fn is_empty(&self, set: TypeSetId) -> bool {
        set == TypeSetId::EMPTY
    }

    pub fn contains(&self, set: TypeSetId, ty: TypeId) -> bool {
        self.types(set).binary_search(&ty).is_ok()
    }

    pub fn len(&self, set: TypeSetId) -> usize {
        self.types(set).len()
    }

    /// Returns the set `set ∪ {ty}`.
    pub fn insert(&mut self, set: TypeSetId, ty: TypeId) -> TypeSetId {
        let current = self.types(set);
        match current.binary_search(&ty) {
            Ok(_) => set,
            Err(pos) => {
                let mut members = Vec::with_capacity(current.len() + 1);
                members.extend_from_slice(&current[..pos]);
                members.push(ty);
                members.extend_from_slice(&current[pos..]);
                self.intern_sorted(members)
            }
        }
    }

    pub fn union(&mut self, a: TypeSetId, b: TypeSetId) -> TypeSetId {
        if a == b || self.is_empty(b) {
            return a;
        }
        if self.is_empty(a) {
            return b;
        }
        let mut members: Vec<TypeId> = self.types(a).to_vec();
        members.extend_from_slice(self.types(b));
        members.sort_unstable();
        members.dedup();
        self.intern_sorted(members)
    }

    pub fn set_of<I: IntoIterator<Item = TypeId>>(&mut self, types: I) -> TypeSetId {
        let mut members: Vec<TypeId> = types.into_iter().collect();
        members.sort_unstable();
        members.dedup();
        self.intern_sorted(members)
    }

    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    fn intern_sorted(&mut self, members: Vec<TypeId>) -> TypeSetId {
        if let Some(idx) = self.sets.get_index_of(members.as_slice()) {
            return TypeSetId(idx as u32);
        }
        let (idx, _) = self.sets.insert_full(members.into_boxed_slice());
        TypeSetId(idx as u32)
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_equal_sets_share_id() {
        let mut interner = TypeInterner::new();
        let i32_ty = interner.intern_type(Type::Int(32));
        let ptr = interner.intern_type(Type::Pointer);

        let a = interner.insert(TypeSetId::EMPTY, i32_ty);
        let a = interner.insert(a, ptr);
        let b = interner.insert(TypeSetId::EMPTY, ptr);
        let b = interner.insert(b, i32_ty);

        assert_eq!(a, b);
        assert_eq!(interner.len(a), 2);
    }

    #[test]
    fn test_insert_existing_is_identity() {
        let mut interner = TypeInterner::new();
        let i8_ty = interner.intern_type(Type::Int(8));
        let set = interner.insert(TypeSetId::EMPTY, i8_ty);
        assert_eq!(interner.insert(set, i8_ty), set);
        assert_eq!(interner.intern_type(Type::Int(8)), i8_ty);
    }

    #[test]
    fn test_reinterning_keeps_first_index() {
        let mut interner = TypeInterner::new();
        let ptr = interner.intern_type(Type::Pointer);
        let dbl = interner.intern_type(Type::Double);

        assert_eq!(interner.intern_type(Type::Pointer), ptr);
        assert_eq!(interner.intern_type(Type::Double), dbl);
        assert_eq!(interner.lookup_type(&Type::Pointer), Some(ptr));
        assert_eq!(interner.ty(dbl), &Type::Double);
        assert_eq!(interner.lookup_type(&Type::Float), None);
    }

    #[test]
    fn test_union() {
        let mut interner = TypeInterner::new();
        let t: Vec<TypeId> = [Type::Int(8), Type::Int(16), Type::Int(32)]
            .into_iter()
            .map(|ty| interner.intern_type(ty))
            .collect();

        let left = interner.set_of([t[0], t[1]]);
        let right = interner.set_of([t[1], t[2]]);
        let joined = interner.union(left, right);

        assert_eq!(interner.types(joined), &[t[0], t[1], t[2]][..]);
        assert_eq!(interner.union(joined, TypeSetId::EMPTY), joined);
        assert_eq!(interner.union(TypeSetId::EMPTY, left), left);
    }

    #[test]
    fn test_early_ids_stay_valid() {
        let mut interner = TypeInterner::new();
        let early_ty = interner.intern_type(Type::Float);
        let early = interner.insert(TypeSetId::EMPTY, early_ty);

        for bits in 1..64 {
            let ty = interner.intern_type(Type::Int(bits));
            interner.insert(early, ty);
        }

        assert_eq!(interner.types(early), &[early_ty][..]);
        assert_eq!(interner.set_of([early_ty]), early);
    }
}
