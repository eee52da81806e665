//! Selection-set AST consumed by the graph store.
//!
//! This mirrors the relevant subset of a conventional executable-document AST
//! (field/fragment-spread/inline-fragment selections, argument values) with the
//! schema-bound pieces removed: schema awareness is a non-goal of this crate, so
//! there is no `FieldDefinition`, no type checking, and inline-fragment type
//! conditions are carried but never consulted (the store is untyped, §4.A).
//!
//! Parsing GraphQL text into these types is out of scope; callers already hold them.

use crate::node::Node;
use arcstr::ArcStr;
use ordered_float::OrderedFloat;
use std::collections::HashMap;

/// A GraphQL identifier (field name, argument name, fragment name, variable name).
pub type Name = ArcStr;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Value {
    Null,
    Enum(Name),
    Variable(Name),
    String(ArcStr),
    Int(i64),
    Float(OrderedFloat<f64>),
    Boolean(bool),
    List(Vec<Node<Value>>),
    Object(Vec<(Name, Node<Value>)>),
}

/// `(name, value)` argument pairs, in source order.
pub type Arguments = Vec<(Name, Node<Value>)>;

/// Variables in force for a given operation run: `name -> JSON value`.
pub type VariableValues = HashMap<Name, serde_json_bytes::Value>;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Directive {
    pub name: Name,
    pub arguments: Arguments,
}

pub type DirectiveList = Vec<Node<Directive>>;

#[derive(Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct SelectionSet {
    pub selections: Vec<Selection>,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Selection {
    Field(Node<Field>),
    FragmentSpread(Node<FragmentSpread>),
    InlineFragment(Node<InlineFragment>),
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Field {
    pub alias: Option<Name>,
    pub name: Name,
    pub arguments: Arguments,
    pub directives: DirectiveList,
    pub selection_set: SelectionSet,
}

impl Field {
    /// The output key this field occupies in a response object: its alias if
    /// present, otherwise its name.
    pub fn response_key(&self) -> &Name {
        self.alias.as_ref().unwrap_or(&self.name)
    }

    pub fn has_selections(&self) -> bool {
        !self.selection_set.selections.is_empty()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FragmentSpread {
    pub fragment_name: Name,
    pub directives: DirectiveList,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct InlineFragment {
    /// Carried for completeness; never consulted by the store (§4.A: "type-conditions
    /// are transparent here since the store is untyped").
    pub type_condition: Option<Name>,
    pub directives: DirectiveList,
    pub selection_set: SelectionSet,
}

/// A named fragment definition, as supplied via a fragment map to `walk_selections`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FragmentDefinition {
    pub name: Name,
    pub type_condition: Option<Name>,
    pub directives: DirectiveList,
    pub selection_set: SelectionSet,
}

/// `fragment name -> definition`, as supplied by callers alongside a selection set.
pub type FragmentMap = HashMap<Name, Node<FragmentDefinition>>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl OperationType {
    /// The conventional root entity id for this operation type (§3: "the root
    /// write, the caller-supplied root ID (conventionally `\"query\"`)").
    pub fn default_root_id(self) -> &'static str {
        match self {
            OperationType::Query => "query",
            OperationType::Mutation => "mutation",
            OperationType::Subscription => "subscription",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct VariableDefinition {
    pub name: Name,
    pub default_value: Option<Node<Value>>,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Operation {
    pub operation_type: OperationType,
    pub name: Option<Name>,
    pub variables: Vec<Node<VariableDefinition>>,
    pub selection_set: SelectionSet,
}
