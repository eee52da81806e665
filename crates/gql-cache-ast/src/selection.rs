//! Selection-set walking: flattens fragment spreads and inline fragments into a
//! flat, deduplicated list of fields, the way a GraphQL executor's `CollectFields`
//! step does, minus type-condition matching — this crate's selection sets are
//! untyped (§4.A).

use crate::ast::{DirectiveList, FragmentMap, Name, Selection, SelectionSet, Value, VariableValues};
use crate::error::MissingFragmentError;
use crate::node::Node;
use crate::storage_key::field_storage_key;
use indexmap::IndexMap;

/// A field selection after fragment flattening, directive evaluation, and
/// same-response-key merging, paired with the canonical key it reads/writes in
/// the graph store.
#[derive(Clone, Debug)]
pub struct EffectiveFieldSelection {
    pub response_key: Name,
    pub storage_key: String,
    /// One of the (possibly several) occurrences of this field in the document;
    /// arguments are taken from this occurrence. Well-formed documents require
    /// all occurrences under one response key to agree on arguments, a rule this
    /// crate does not validate (schema validation is a non-goal).
    pub field: Node<crate::ast::Field>,
    /// The union of every occurrence's sub-selections, in encounter order.
    pub merged_selection_set: SelectionSet,
}

/// Flattens `selection_set` (substituting fragment spreads from `fragments` and
/// evaluating `@skip`/`@include` against `variables`) into one effective
/// selection per response key, in first-encounter order.
pub fn walk_selections(
    selection_set: &SelectionSet,
    fragments: &FragmentMap,
    variables: &VariableValues,
) -> Result<Vec<EffectiveFieldSelection>, MissingFragmentError> {
    let mut groups: IndexMap<Name, Vec<Node<crate::ast::Field>>> = IndexMap::new();
    collect_fields(selection_set, fragments, variables, &mut groups)?;

    Ok(groups
        .into_iter()
        .map(|(response_key, fields)| {
            let representative = fields[0].clone();
            let storage_key = field_storage_key(&representative, variables);
            let merged_selection_set = merge_selection_sets(&fields);
            EffectiveFieldSelection {
                response_key,
                storage_key,
                field: representative,
                merged_selection_set,
            }
        })
        .collect())
}

fn collect_fields(
    selection_set: &SelectionSet,
    fragments: &FragmentMap,
    variables: &VariableValues,
    groups: &mut IndexMap<Name, Vec<Node<crate::ast::Field>>>,
) -> Result<(), MissingFragmentError> {
    for selection in &selection_set.selections {
        match selection {
            Selection::Field(field) => {
                if !is_included(&field.directives, variables) {
                    continue;
                }
                groups
                    .entry(field.response_key().clone())
                    .or_default()
                    .push(field.clone());
            }
            Selection::FragmentSpread(spread) => {
                if !is_included(&spread.directives, variables) {
                    continue;
                }
                let definition = fragments.get(&spread.fragment_name).ok_or_else(|| {
                    MissingFragmentError {
                        name: spread.fragment_name.clone(),
                    }
                })?;
                collect_fields(&definition.selection_set, fragments, variables, groups)?;
            }
            Selection::InlineFragment(inline) => {
                if !is_included(&inline.directives, variables) {
                    continue;
                }
                collect_fields(&inline.selection_set, fragments, variables, groups)?;
            }
        }
    }
    Ok(())
}

fn merge_selection_sets(fields: &[Node<crate::ast::Field>]) -> SelectionSet {
    let mut selections = Vec::new();
    for field in fields {
        selections.extend(field.selection_set.selections.iter().cloned());
    }
    SelectionSet { selections }
}

/// Evaluates `@skip(if:)` / `@include(if:)` the way a conforming executor does:
/// `@skip` wins if both are present, unknown directives are ignored since
/// directive definitions are out of scope here.
fn is_included(directives: &DirectiveList, variables: &VariableValues) -> bool {
    for directive in directives {
        let if_arg = directive
            .arguments
            .iter()
            .find(|(name, _)| name == "if")
            .map(|(_, value)| resolve_bool_arg(value, variables));

        match directive.name.as_str() {
            "skip" if if_arg.unwrap_or(false) => return false,
            "include" if !if_arg.unwrap_or(true) => return false,
            _ => {}
        }
    }
    true
}

fn resolve_bool_arg(value: &Value, variables: &VariableValues) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::Variable(name) => variables
            .get(name)
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Directive, Field};

    fn leaf_field(name: &str, directives: DirectiveList) -> Selection {
        Selection::Field(Node::new(Field {
            alias: None,
            name: Name::from(name),
            arguments: Vec::new(),
            directives,
            selection_set: SelectionSet::default(),
        }))
    }

    fn skip_directive(if_value: Value) -> DirectiveList {
        vec![Node::new(Directive {
            name: Name::from("skip"),
            arguments: vec![(Name::from("if"), Node::new(if_value))],
        })]
    }

    #[test]
    fn flattens_plain_fields_in_order() {
        let set = SelectionSet {
            selections: vec![leaf_field("id", vec![]), leaf_field("name", vec![])],
        };
        let effective =
            walk_selections(&set, &FragmentMap::new(), &VariableValues::new()).unwrap();
        let keys: Vec<&str> = effective.iter().map(|f| f.response_key.as_str()).collect();
        assert_eq!(keys, vec!["id", "name"]);
    }

    #[test]
    fn skip_directive_drops_the_field() {
        let set = SelectionSet {
            selections: vec![
                leaf_field("id", vec![]),
                leaf_field("secret", skip_directive(Value::Boolean(true))),
            ],
        };
        let effective =
            walk_selections(&set, &FragmentMap::new(), &VariableValues::new()).unwrap();
        assert_eq!(effective.len(), 1);
        assert_eq!(effective[0].response_key.as_str(), "id");
    }

    #[test]
    fn skip_directive_resolves_variables() {
        let set = SelectionSet {
            selections: vec![leaf_field(
                "secret",
                skip_directive(Value::Variable(Name::from("hide"))),
            )],
        };
        let mut variables = VariableValues::new();
        variables.insert(Name::from("hide"), serde_json_bytes::Value::from(true));
        let effective = walk_selections(&set, &FragmentMap::new(), &variables).unwrap();
        assert!(effective.is_empty());
    }

    #[test]
    fn missing_fragment_is_an_error() {
        let set = SelectionSet {
            selections: vec![Selection::FragmentSpread(Node::new(
                crate::ast::FragmentSpread {
                    fragment_name: Name::from("Missing"),
                    directives: Vec::new(),
                },
            ))],
        };
        let err = walk_selections(&set, &FragmentMap::new(), &VariableValues::new()).unwrap_err();
        assert_eq!(err.name.as_str(), "Missing");
    }

    #[test]
    fn same_response_key_selections_merge_sub_selections() {
        let inner_a = Selection::Field(Node::new(Field {
            alias: None,
            name: Name::from("id"),
            arguments: Vec::new(),
            directives: Vec::new(),
            selection_set: SelectionSet::default(),
        }));
        let inner_b = Selection::Field(Node::new(Field {
            alias: None,
            name: Name::from("name"),
            arguments: Vec::new(),
            directives: Vec::new(),
            selection_set: SelectionSet::default(),
        }));
        let occurrence = |inner: Selection| {
            Selection::Field(Node::new(Field {
                alias: None,
                name: Name::from("author"),
                arguments: Vec::new(),
                directives: Vec::new(),
                selection_set: SelectionSet {
                    selections: vec![inner],
                },
            }))
        };
        let set = SelectionSet {
            selections: vec![occurrence(inner_a), occurrence(inner_b)],
        };
        let effective =
            walk_selections(&set, &FragmentMap::new(), &VariableValues::new()).unwrap();
        assert_eq!(effective.len(), 1);
        assert_eq!(effective[0].merged_selection_set.selections.len(), 2);
    }
}
