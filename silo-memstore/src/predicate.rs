use silo_core::{
    CompareOp, EntityDef, OrderFlags, PropertyId, QueryError, Result, Row, StringOp, TypeTag,
};
use std::collections::HashMap;

/// One node of a builder's condition arena. Condition handles are
/// indices into the arena.
#[derive(Clone, Debug)]
pub(crate) enum Node {
    Leaf(Leaf),
    Combine { or: bool, left: usize, right: usize },
}

#[derive(Clone, Debug)]
pub(crate) struct Leaf {
    pub property: PropertyId,
    pub op: LeafOp,
}

#[derive(Clone, Debug)]
pub(crate) enum LeafOp {
    IsNull,
    NotNull,
    Long(CompareOp, i64),
    LongRange(i64, i64),
    LongSet(Vec<i64>, bool),
    Double(CompareOp, f64),
    DoubleRange(f64, f64),
    Str(StringOp, String, bool),
}

/// Accumulating state of one query under construction.
#[derive(Debug)]
pub(crate) struct BuilderState {
    pub entity: &'static EntityDef,
    nodes: Vec<Node>,
    /// Conditions not yet consumed by a combine; conjoined at compile.
    roots: Vec<usize>,
    orders: Vec<(PropertyId, OrderFlags)>,
    aliases: HashMap<String, usize>,
}

impl BuilderState {
    pub fn new(entity: &'static EntityDef) -> Self {
        Self {
            entity,
            nodes: Vec::new(),
            roots: Vec::new(),
            orders: Vec::new(),
            aliases: HashMap::new(),
        }
    }

    pub fn push_leaf(&mut self, leaf: Leaf) -> Result<usize> {
        if self.entity.property(leaf.property).is_none() {
            return Err(QueryError::invalid_argument(format!(
                "entity `{}` has no property {}",
                self.entity.name, leaf.property
            )));
        }
        let index = self.nodes.len();
        self.nodes.push(Node::Leaf(leaf));
        self.roots.push(index);
        Ok(index)
    }

    /// Combine with `second` under the explicit operator. The deferred
    /// conjunction of every other dangling condition materializes
    /// first, so an explicit operator always applies to the whole
    /// preceding group:
    /// `a, b, OR c` evaluates as `(a AND b) OR c`.
    pub fn combine(&mut self, first: usize, second: usize, or: bool) -> Result<usize> {
        if first == second
            || !self.roots.contains(&first)
            || !self.roots.contains(&second)
        {
            return Err(QueryError::illegal_state(
                "combine operands must be distinct, not yet combined conditions",
            ));
        }
        let mut left = None;
        for root in std::mem::take(&mut self.roots) {
            if root == second {
                continue;
            }
            left = Some(match left {
                None => root,
                Some(accumulated) => {
                    let index = self.nodes.len();
                    self.nodes.push(Node::Combine {
                        or: false,
                        left: accumulated,
                        right: root,
                    });
                    index
                }
            });
        }
        let Some(left) = left else {
            return Err(QueryError::illegal_state(
                "combine requires a prior condition",
            ));
        };
        let index = self.nodes.len();
        self.nodes.push(Node::Combine {
            or,
            left,
            right: second,
        });
        self.roots.push(index);
        Ok(index)
    }

    pub fn add_order(&mut self, property: PropertyId, flags: OrderFlags) -> Result<()> {
        if self.entity.property(property).is_none() {
            return Err(QueryError::invalid_argument(format!(
                "entity `{}` has no property {}",
                self.entity.name, property
            )));
        }
        self.orders.push((property, flags));
        Ok(())
    }

    pub fn set_alias(&mut self, condition: usize, alias: &str) -> Result<()> {
        match self.nodes.get(condition) {
            Some(Node::Leaf(..)) => {
                self.aliases.insert(alias.to_owned(), condition);
                Ok(())
            }
            Some(Node::Combine { .. }) => Err(QueryError::illegal_state(
                "an alias requires a property condition, not a combination",
            )),
            None => Err(QueryError::illegal_state("unknown condition handle")),
        }
    }

    /// Conjoin dangling conditions left to right and freeze.
    pub fn compile(mut self) -> CompiledQuery {
        let mut roots = std::mem::take(&mut self.roots).into_iter();
        let mut root = roots.next();
        if let Some(mut accumulated) = root {
            for next in roots {
                let index = self.nodes.len();
                self.nodes.push(Node::Combine {
                    or: false,
                    left: accumulated,
                    right: next,
                });
                accumulated = index;
            }
            root = Some(accumulated);
        }
        CompiledQuery {
            entity: self.entity,
            nodes: self.nodes,
            root,
            orders: self.orders,
            aliases: self.aliases,
        }
    }
}

/// A frozen predicate tree with its orderings and parameter aliases.
/// Parameter rebinding mutates leaf slots in place.
#[derive(Debug)]
pub(crate) struct CompiledQuery {
    pub entity: &'static EntityDef,
    nodes: Vec<Node>,
    root: Option<usize>,
    pub orders: Vec<(PropertyId, OrderFlags)>,
    aliases: HashMap<String, usize>,
}

impl CompiledQuery {
    /// Whether `row` satisfies the predicate. A query without
    /// conditions matches everything.
    pub fn matches(&self, row: &Row) -> bool {
        match self.root {
            Some(root) => self.eval(root, row),
            None => true,
        }
    }

    fn eval(&self, node: usize, row: &Row) -> bool {
        match &self.nodes[node] {
            Node::Combine { or, left, right } => {
                if *or {
                    self.eval(*left, row) || self.eval(*right, row)
                } else {
                    self.eval(*left, row) && self.eval(*right, row)
                }
            }
            Node::Leaf(leaf) => self.eval_leaf(leaf, row),
        }
    }

    fn eval_leaf(&self, leaf: &Leaf, row: &Row) -> bool {
        let Some(index) = self.entity.property_index(leaf.property) else {
            return false;
        };
        let Some(value) = row.get(index) else {
            return matches!(leaf.op, LeafOp::IsNull);
        };
        match &leaf.op {
            LeafOp::IsNull => value.is_null(),
            LeafOp::NotNull => !value.is_null(),
            // Value predicates never match null cells.
            LeafOp::Long(op, rhs) => value.as_long().is_some_and(|lhs| compare(*op, &lhs, rhs)),
            LeafOp::LongRange(from, to) => value
                .as_long()
                .is_some_and(|lhs| *from <= lhs && lhs <= *to),
            LeafOp::LongSet(values, negate) => value
                .as_long()
                .is_some_and(|lhs| values.contains(&lhs) != *negate),
            LeafOp::Double(op, rhs) => value.as_double().is_some_and(|lhs| compare(*op, &lhs, rhs)),
            LeafOp::DoubleRange(from, to) => value
                .as_double()
                .is_some_and(|lhs| *from <= lhs && lhs <= *to),
            LeafOp::Str(op, rhs, case_sensitive) => value
                .as_text()
                .is_some_and(|lhs| compare_text(*op, lhs, rhs, *case_sensitive)),
        }
    }

    /// Update the parameter slots of every leaf on `property`.
    pub fn rebind(
        &mut self,
        property: PropertyId,
        update: impl Fn(&mut LeafOp) -> bool,
    ) -> Result<()> {
        let mut hit = false;
        for node in &mut self.nodes {
            if let Node::Leaf(leaf) = node
                && leaf.property == property
            {
                hit |= update(&mut leaf.op);
            }
        }
        if hit {
            Ok(())
        } else {
            Err(QueryError::invalid_argument(format!(
                "no parameterized condition on property {property}"
            )))
        }
    }

    /// Update the parameter slot of the leaf tagged `alias`.
    pub fn rebind_alias(&mut self, alias: &str, update: impl Fn(&mut LeafOp) -> bool) -> Result<()> {
        let Some(&index) = self.aliases.get(alias) else {
            return Err(QueryError::invalid_argument(format!(
                "no condition aliased `{alias}`"
            )));
        };
        let hit = match &mut self.nodes[index] {
            Node::Leaf(leaf) => update(&mut leaf.op),
            Node::Combine { .. } => false,
        };
        if hit {
            Ok(())
        } else {
            Err(QueryError::invalid_argument(format!(
                "condition aliased `{alias}` takes no such parameter"
            )))
        }
    }

    /// Stable rendering of the predicate tree, parenthesized the way it
    /// will evaluate.
    pub fn describe(&self) -> String {
        match self.root {
            Some(root) => self.describe_node(root),
            None => "<all>".to_owned(),
        }
    }

    fn describe_node(&self, node: usize) -> String {
        match &self.nodes[node] {
            Node::Combine { or, left, right } => format!(
                "({} {} {})",
                self.describe_node(*left),
                if *or { "OR" } else { "AND" },
                self.describe_node(*right)
            ),
            Node::Leaf(leaf) => self.describe_leaf(leaf),
        }
    }

    fn describe_leaf(&self, leaf: &Leaf) -> String {
        let name = self
            .entity
            .property(leaf.property)
            .map_or("?", |property| property.name);
        match &leaf.op {
            LeafOp::IsNull => format!("{name} is null"),
            LeafOp::NotNull => format!("{name} is not null"),
            LeafOp::Long(op, value) => format!("{name} {} {value}", compare_symbol(*op)),
            LeafOp::LongRange(from, to) => format!("{name} between {from} and {to}"),
            LeafOp::LongSet(values, negate) => {
                let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
                format!(
                    "{name} {} [{}]",
                    if *negate { "not in" } else { "in" },
                    rendered.join(", ")
                )
            }
            LeafOp::Double(op, value) => format!("{name} {} {value}", compare_symbol(*op)),
            LeafOp::DoubleRange(from, to) => format!("{name} between {from} and {to}"),
            LeafOp::Str(op, value, _) => format!("{name} {} \"{value}\"", string_symbol(*op)),
        }
    }
}

fn compare<V: PartialOrd>(op: CompareOp, lhs: &V, rhs: &V) -> bool {
    match op {
        CompareOp::Equal => lhs == rhs,
        CompareOp::NotEqual => lhs != rhs,
        CompareOp::Less => lhs < rhs,
        CompareOp::Greater => lhs > rhs,
    }
}

fn compare_text(op: StringOp, lhs: &str, rhs: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        match op {
            StringOp::Equal => lhs == rhs,
            StringOp::NotEqual => lhs != rhs,
            StringOp::Contains => lhs.contains(rhs),
            StringOp::StartsWith => lhs.starts_with(rhs),
            StringOp::EndsWith => lhs.ends_with(rhs),
        }
    } else {
        let (lhs, rhs) = (lhs.to_ascii_lowercase(), rhs.to_ascii_lowercase());
        match op {
            StringOp::Equal => lhs == rhs,
            StringOp::NotEqual => lhs != rhs,
            StringOp::Contains => lhs.contains(&rhs),
            StringOp::StartsWith => lhs.starts_with(&rhs),
            StringOp::EndsWith => lhs.ends_with(&rhs),
        }
    }
}

fn compare_symbol(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Equal => "==",
        CompareOp::NotEqual => "!=",
        CompareOp::Less => "<",
        CompareOp::Greater => ">",
    }
}

fn string_symbol(op: StringOp) -> &'static str {
    match op {
        StringOp::Equal => "==",
        StringOp::NotEqual => "!=",
        StringOp::Contains => "contains",
        StringOp::StartsWith => "starts with",
        StringOp::EndsWith => "ends with",
    }
}

/// Null substitute matching the property's declared type, if one was
/// configured in the corresponding typed slot.
pub(crate) fn substitute_for(
    ty: TypeTag,
    params: &silo_core::PropertyParams,
) -> Option<silo_core::Value> {
    use silo_core::Value;
    match ty {
        TypeTag::String => params.null_string.clone().map(|v| Value::Text(Some(v))),
        TypeTag::Float => params.null_float.map(|v| Value::Float(Some(v))),
        TypeTag::Double => params.null_double.map(|v| Value::Double(Some(v))),
        TypeTag::Bool
        | TypeTag::Byte
        | TypeTag::Short
        | TypeTag::Char
        | TypeTag::Int
        | TypeTag::Long
        | TypeTag::Date => params.null_long.map(|v| Value::Long(Some(v))),
        TypeTag::ByteArray => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_core::{EntityDef, PropertyDef, Value};

    static PROPERTIES: [PropertyDef; 3] = [
        PropertyDef { id: 1, name: "id", ty: TypeTag::Long },
        PropertyDef { id: 2, name: "name", ty: TypeTag::String },
        PropertyDef { id: 3, name: "score", ty: TypeTag::Long },
    ];

    static DEF: EntityDef = EntityDef {
        name: "Probe",
        properties: &PROPERTIES,
        id_property: 1,
    };

    fn row(id: i64, name: Option<&str>, score: i64) -> Row {
        Row::new(vec![
            Value::Long(Some(id)),
            Value::Text(name.map(str::to_owned)),
            Value::Long(Some(score)),
        ])
    }

    fn leaf(property: PropertyId, op: LeafOp) -> Leaf {
        Leaf { property, op }
    }

    #[test]
    fn dangling_conditions_conjoin_left_to_right() {
        let mut builder = BuilderState::new(&DEF);
        builder.push_leaf(leaf(3, LeafOp::Long(CompareOp::Greater, 10))).unwrap();
        builder.push_leaf(leaf(3, LeafOp::Long(CompareOp::Less, 50))).unwrap();
        builder
            .push_leaf(leaf(2, LeafOp::Str(StringOp::Equal, "x".into(), false)))
            .unwrap();
        let compiled = builder.compile();
        assert_eq!(
            compiled.describe(),
            "((score > 10 AND score < 50) AND name == \"x\")"
        );
        assert!(compiled.matches(&row(1, Some("X"), 20)));
        assert!(!compiled.matches(&row(1, Some("X"), 60)));
    }

    #[test]
    fn combine_consumes_its_operands() {
        let mut builder = BuilderState::new(&DEF);
        let a = builder.push_leaf(leaf(3, LeafOp::Long(CompareOp::Equal, 1))).unwrap();
        let b = builder.push_leaf(leaf(3, LeafOp::Long(CompareOp::Equal, 2))).unwrap();
        let combined = builder.combine(a, b, true).unwrap();
        assert!(builder.combine(a, b, false).is_err(), "operands were consumed");
        assert!(builder.combine(combined, combined, false).is_err());
        let compiled = builder.compile();
        assert_eq!(compiled.describe(), "(score == 1 OR score == 2)");
    }

    #[test]
    fn an_explicit_operator_applies_to_the_whole_preceding_group() {
        let mut builder = BuilderState::new(&DEF);
        builder.push_leaf(leaf(3, LeafOp::Long(CompareOp::Greater, 10))).unwrap();
        let second = builder
            .push_leaf(leaf(3, LeafOp::Long(CompareOp::Less, 50)))
            .unwrap();
        let or_leaf = builder
            .push_leaf(leaf(2, LeafOp::Str(StringOp::Equal, "x".into(), false)))
            .unwrap();
        builder.combine(second, or_leaf, true).unwrap();
        let compiled = builder.compile();
        assert_eq!(
            compiled.describe(),
            "((score > 10 AND score < 50) OR name == \"x\")"
        );
    }

    #[test]
    fn an_empty_builder_matches_everything() {
        let compiled = BuilderState::new(&DEF).compile();
        assert_eq!(compiled.describe(), "<all>");
        assert!(compiled.matches(&row(1, None, 0)));
    }

    #[test]
    fn value_predicates_never_match_null_cells() {
        let mut builder = BuilderState::new(&DEF);
        builder
            .push_leaf(leaf(2, LeafOp::Str(StringOp::NotEqual, "x".into(), false)))
            .unwrap();
        let compiled = builder.compile();
        assert!(!compiled.matches(&row(1, None, 0)));
        assert!(compiled.matches(&row(1, Some("y"), 0)));
    }

    #[test]
    fn alias_requires_a_leaf() {
        let mut builder = BuilderState::new(&DEF);
        let a = builder.push_leaf(leaf(3, LeafOp::Long(CompareOp::Equal, 1))).unwrap();
        let b = builder.push_leaf(leaf(3, LeafOp::Long(CompareOp::Equal, 2))).unwrap();
        let combined = builder.combine(a, b, false).unwrap();
        assert!(builder.set_alias(combined, "pair").is_err());
        assert!(builder.set_alias(a, "first").is_ok());
    }

    #[test]
    fn rebind_misses_are_invalid_argument() {
        let mut builder = BuilderState::new(&DEF);
        builder.push_leaf(leaf(3, LeafOp::Long(CompareOp::Equal, 1))).unwrap();
        let mut compiled = builder.compile();
        assert!(compiled.rebind(3, |op| matches!(op, LeafOp::Long(..))).is_ok());
        assert!(compiled.rebind(2, |_| true).is_err(), "no leaf on that property");
        assert!(compiled.rebind_alias("missing", |_| true).is_err());
    }
}
