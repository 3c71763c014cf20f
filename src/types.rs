//! Type arena: the "type utilities" collaborator named in spec.md §1.
//!
//! `Type` nodes are arena-allocated in a `Vec<Type>` behind `TypeArena` and
//! referenced everywhere else by the newtype `TypeId`, per spec.md §9
//! REDESIGN FLAGS ("cyclic/self-referential type trees"). This also makes a
//! struct containing a pointer to itself trivial to represent: the pointee
//! `TypeId` is just an index that can be filled in after the struct's own
//! `TypeId` is known.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Type qualifiers. A bitset rather than two bools so additional
    /// qualifiers (e.g. `restrict` in C99) can be added without changing
    /// every call site.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Qualifiers: u8 {
        const CONST = 0b01;
        const VOLATILE = 0b10;
    }
}

/// Arena index for a `Type` node. See module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Void,
    Char,
    Signed,
    Unsigned,
    Float,
    Double,
    Pointer,
    Array,
    Function,
    Struct,
    Union,
}

/// A member of an aggregate (struct/union) or parameter list (function).
/// A function's vararg tail is represented as a member named `"..."` whose
/// `ty` is `None` — the "vararg sentinel" from the glossary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub ty: Option<TypeId>,
    pub offset: u32,
}

/// A node in the type tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    pub kind: TypeKind,
    pub qualifiers: Qualifiers,
    /// 0 means incomplete.
    pub size: u32,
    /// Pointee / element / return type.
    pub next: Option<TypeId>,
    /// Ordered member list for Struct/Union/Function; empty otherwise.
    pub members: Vec<Member>,
    /// Tag name, for a Struct/Union/Enum-as-int canonical definition; used
    /// to distinguish a canonical tagged type from a qualifier-bearing copy.
    pub tag: Option<String>,
    /// Set on a value returned by `type_tagged_copy`: the canonical `TypeId`
    /// this one is a qualifier-bearing handle onto.
    pub tagged_copy_of: Option<TypeId>,
}

impl Type {
    fn scalar(kind: TypeKind, size: u32) -> Self {
        Type {
            kind,
            qualifiers: Qualifiers::empty(),
            size,
            next: None,
            members: Vec::new(),
            tag: None,
            tagged_copy_of: None,
        }
    }
}

/// Owns every `Type` node created while translating one unit.
#[derive(Debug, Default)]
pub struct TypeArena {
    nodes: Vec<Type>,
}

impl TypeArena {
    pub fn new() -> Self {
        TypeArena { nodes: Vec::new() }
    }

    fn push(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.nodes.len() as u32);
        self.nodes.push(ty);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.nodes[id.0 as usize]
    }

    // ----- type_init: canonical basic-type constructors -----

    pub fn void(&mut self) -> TypeId {
        self.push(Type::scalar(TypeKind::Void, 0))
    }
    pub fn char_ty(&mut self) -> TypeId {
        self.push(Type::scalar(TypeKind::Char, 1))
    }
    pub fn signed_char(&mut self) -> TypeId {
        self.push(Type::scalar(TypeKind::Signed, 1))
    }
    pub fn unsigned_char(&mut self) -> TypeId {
        self.push(Type::scalar(TypeKind::Unsigned, 1))
    }
    pub fn short(&mut self) -> TypeId {
        self.push(Type::scalar(TypeKind::Signed, 2))
    }
    pub fn unsigned_short(&mut self) -> TypeId {
        self.push(Type::scalar(TypeKind::Unsigned, 2))
    }
    pub fn int(&mut self) -> TypeId {
        self.push(Type::scalar(TypeKind::Signed, 4))
    }
    pub fn unsigned_int(&mut self) -> TypeId {
        self.push(Type::scalar(TypeKind::Unsigned, 4))
    }
    pub fn long(&mut self) -> TypeId {
        self.push(Type::scalar(TypeKind::Signed, 8))
    }
    pub fn unsigned_long(&mut self) -> TypeId {
        self.push(Type::scalar(TypeKind::Unsigned, 8))
    }
    pub fn float(&mut self) -> TypeId {
        self.push(Type::scalar(TypeKind::Float, 4))
    }
    pub fn double(&mut self) -> TypeId {
        self.push(Type::scalar(TypeKind::Double, 8))
    }

    /// `type_init` for a pointer to `pointee`.
    pub fn pointer_to(&mut self, pointee: TypeId) -> TypeId {
        self.push(Type {
            kind: TypeKind::Pointer,
            qualifiers: Qualifiers::empty(),
            size: 8,
            next: Some(pointee),
            members: Vec::new(),
            tag: None,
            tagged_copy_of: None,
        })
    }

    /// `type_init` for an array of `count` elements of `element`. `count ==
    /// None` means an unspecified outer dimension (size stays 0, incomplete).
    pub fn array_of(&mut self, element: TypeId, count: Option<u32>) -> TypeId {
        let elem_size = self.get(element).size;
        let size = count.map(|c| c * elem_size).unwrap_or(0);
        self.push(Type {
            kind: TypeKind::Array,
            qualifiers: Qualifiers::empty(),
            size,
            next: Some(element),
            members: Vec::new(),
            tag: None,
            tagged_copy_of: None,
        })
    }

    /// `type_init` for a function type. `params` become the member list;
    /// `vararg` appends the `"..."` sentinel member.
    pub fn function(&mut self, ret: TypeId, params: Vec<(String, TypeId)>, vararg: bool) -> TypeId {
        let mut members: Vec<Member> = params
            .into_iter()
            .map(|(name, ty)| Member { name, ty: Some(ty), offset: 0 })
            .collect();
        if vararg {
            members.push(Member {
                name: "...".to_string(),
                ty: None,
                offset: 0,
            });
        }
        self.push(Type {
            kind: TypeKind::Function,
            qualifiers: Qualifiers::empty(),
            size: 0,
            next: Some(ret),
            members,
            tag: None,
            tagged_copy_of: None,
        })
    }

    /// `type_init` for a fresh, incomplete struct/union tag type.
    pub fn new_aggregate(&mut self, is_union: bool, tag: Option<String>) -> TypeId {
        self.push(Type {
            kind: if is_union { TypeKind::Union } else { TypeKind::Struct },
            qualifiers: Qualifiers::empty(),
            size: 0,
            next: None,
            members: Vec::new(),
            tag,
            tagged_copy_of: None,
        })
    }

    /// `type_add_member`: append a named, offset-placed member and grow the
    /// aggregate's size accordingly (struct: sequential offsets; union: all
    /// at offset 0, size is the max).
    pub fn type_add_member(&mut self, agg: TypeId, name: String, ty: TypeId) {
        let member_size = self.get(ty).size;
        let node = self.get_mut(agg);
        match node.kind {
            TypeKind::Struct => {
                let offset = node.size;
                node.members.push(Member { name, ty: Some(ty), offset });
                node.size += member_size;
            }
            TypeKind::Union => {
                node.members.push(Member { name, ty: Some(ty), offset: 0 });
                node.size = node.size.max(member_size);
            }
            _ => panic!("type_add_member on non-aggregate"),
        }
    }

    /// `type_tagged_copy`: a fresh handle referencing the canonical index,
    /// so caller-applied qualifiers never mutate the canonical tag type.
    pub fn type_tagged_copy(&mut self, canonical: TypeId) -> TypeId {
        let node = self.get(canonical).clone();
        let copy = Type {
            tagged_copy_of: Some(canonical),
            ..node
        };
        self.push(copy)
    }

    // ----- queries -----

    pub fn is_pointer(&self, id: TypeId) -> bool {
        self.get(id).kind == TypeKind::Pointer
    }
    pub fn is_function(&self, id: TypeId) -> bool {
        self.get(id).kind == TypeKind::Function
    }
    pub fn is_void(&self, id: TypeId) -> bool {
        self.get(id).kind == TypeKind::Void
    }
    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(self.get(id).kind, TypeKind::Char | TypeKind::Signed | TypeKind::Unsigned)
    }
    pub fn is_struct(&self, id: TypeId) -> bool {
        matches!(self.get(id).kind, TypeKind::Struct | TypeKind::Union)
    }
    pub fn is_array(&self, id: TypeId) -> bool {
        self.get(id).kind == TypeKind::Array
    }
    pub fn is_vararg(&self, id: TypeId) -> bool {
        self.get(id).members.last().is_some_and(|m| m.name == "..." && m.ty.is_none())
    }
    pub fn is_complete(&self, id: TypeId) -> bool {
        !matches!(self.get(id).kind, TypeKind::Struct | TypeKind::Union | TypeKind::Array) || self.get(id).size > 0
    }
    pub fn size_of(&self, id: TypeId) -> u32 {
        self.get(id).size
    }
    pub fn nmembers(&self, id: TypeId) -> usize {
        self.get(id)
            .members
            .iter()
            .filter(|m| !(m.name == "..." && m.ty.is_none()))
            .count()
    }
    pub fn get_member(&self, id: TypeId, index: usize) -> Option<&Member> {
        self.get(id).members.get(index)
    }
    pub fn find_type_member(&self, id: TypeId, name: &str) -> Option<&Member> {
        self.get(id).members.iter().find(|m| m.name == name)
    }

    /// `type_deref`: the pointee/element type of a pointer or array, panics
    /// (an internal-diagnostic situation upstream) on anything else.
    pub fn deref_of(&self, id: TypeId) -> Option<TypeId> {
        self.get(id).next
    }

    /// Follows `tagged_copy_of` links to the canonical definition, or
    /// returns `id` itself if it is already canonical. `unwrapped` in
    /// spec.md's type-utilities list.
    pub fn unwrapped(&self, id: TypeId) -> TypeId {
        match self.get(id).tagged_copy_of {
            Some(canonical) => canonical,
            None => id,
        }
    }

    /// Completes an array's outer dimension from a known element count,
    /// used both by array initializers and by string-literal completion.
    pub fn complete_array(&mut self, array: TypeId, count: u32) {
        let elem = self.get(array).next.expect("array type must have an element type");
        let elem_size = self.get(elem).size;
        let node = self.get_mut(array);
        debug_assert_eq!(node.kind, TypeKind::Array);
        node.size = count * elem_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_types_have_expected_sizes() {
        let mut arena = TypeArena::new();
        assert_eq!(arena.size_of(arena.int()), 4);
        assert_eq!(arena.size_of(arena.char_ty()), 1);
        assert_eq!(arena.size_of(arena.double()), 8);
    }

    #[test]
    fn pointer_and_deref_roundtrip() {
        let mut arena = TypeArena::new();
        let int_ty = arena.int();
        let ptr = arena.pointer_to(int_ty);
        assert!(arena.is_pointer(ptr));
        assert_eq!(arena.deref_of(ptr), Some(int_ty));
    }

    #[test]
    fn incomplete_array_then_completed() {
        let mut arena = TypeArena::new();
        let int_ty = arena.int();
        let arr = arena.array_of(int_ty, None);
        assert!(!arena.is_complete(arr));
        arena.complete_array(arr, 3);
        assert!(arena.is_complete(arr));
        assert_eq!(arena.size_of(arr), 12);
    }

    #[test]
    fn struct_members_get_sequential_offsets() {
        let mut arena = TypeArena::new();
        let int_ty = arena.int();
        let s = arena.new_aggregate(false, Some("S".to_string()));
        arena.type_add_member(s, "a".to_string(), int_ty);
        arena.type_add_member(s, "b".to_string(), int_ty);
        assert_eq!(arena.get_member(s, 0).unwrap().offset, 0);
        assert_eq!(arena.get_member(s, 1).unwrap().offset, 4);
        assert_eq!(arena.size_of(s), 8);
    }

    #[test]
    fn union_members_share_offset_zero() {
        let mut arena = TypeArena::new();
        let int_ty = arena.int();
        let long_ty = arena.long();
        let u = arena.new_aggregate(true, Some("U".to_string()));
        arena.type_add_member(u, "i".to_string(), int_ty);
        arena.type_add_member(u, "l".to_string(), long_ty);
        assert_eq!(arena.get_member(u, 0).unwrap().offset, 0);
        assert_eq!(arena.get_member(u, 1).unwrap().offset, 0);
        assert_eq!(arena.size_of(u), 8);
    }

    #[test]
    fn tagged_copy_does_not_alias_canonical_qualifiers() {
        let mut arena = TypeArena::new();
        let s = arena.new_aggregate(false, Some("S".to_string()));
        let copy = arena.type_tagged_copy(s);
        arena.get_mut(copy).qualifiers = Qualifiers::CONST;
        assert_eq!(arena.get(s).qualifiers, Qualifiers::empty());
        assert_eq!(arena.unwrapped(copy), s);
    }

    #[test]
    fn function_vararg_sentinel() {
        let mut arena = TypeArena::new();
        let int_ty = arena.int();
        let f = arena.function(int_ty, vec![("x".to_string(), int_ty)], true);
        assert!(arena.is_vararg(f));
        assert_eq!(arena.nmembers(f), 1);
    }
}
