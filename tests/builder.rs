#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use silo::{Property, Store, StoreOptions, TypeTag};
    use silo_memstore::MemStore;
    use silo_tests::TShirt;

    fn store() -> Store<MemStore> {
        silo_tests::init_logs();
        Store::open(MemStore::new(), StoreOptions::default()).unwrap()
    }

    #[derive(Clone, Copy, Debug)]
    enum Step {
        Leaf(i64),
        And,
        Or,
    }

    /// Mirror of the combinator algebra: the builder-side sink plus the
    /// engine side, where an explicit operator first materializes the
    /// deferred conjunction of every dangling condition and dangling
    /// conditions are conjoined left to right at build time.
    #[derive(Default)]
    struct Model {
        roots: Vec<String>,
        pending: Option<bool>,
    }

    impl Model {
        fn fold_roots(&mut self) -> Option<String> {
            let mut roots = std::mem::take(&mut self.roots).into_iter();
            let mut folded = roots.next()?;
            for next in roots {
                folded = format!("({folded} AND {next})");
            }
            Some(folded)
        }

        fn leaf(&mut self, value: i64) {
            let description = format!("price == {value}");
            match self.pending.take() {
                None => self.roots.push(description),
                Some(or) => {
                    let group = self
                        .fold_roots()
                        .expect("operator without prior condition");
                    self.roots.push(format!(
                        "({group} {} {description})",
                        if or { "OR" } else { "AND" }
                    ));
                }
            }
        }

        fn operator(&mut self, or: bool) -> bool {
            if self.roots.is_empty() || self.pending.is_some() {
                return false;
            }
            self.pending = Some(or);
            true
        }

        fn describe(mut self) -> String {
            self.fold_roots().unwrap_or_else(|| "<all>".to_owned())
        }
    }

    fn run_model_and_builder(steps: &[Step]) -> (String, String) {
        let store = store();
        let mut builder = store.query::<TShirt>().unwrap();
        let mut model = Model::default();
        for step in steps {
            match *step {
                Step::Leaf(value) => {
                    builder.equal(&TShirt::PRICE, value).unwrap();
                    model.leaf(value);
                }
                Step::And => {
                    if model.operator(false) {
                        builder.and().unwrap();
                    } else {
                        assert!(builder.and().is_err(), "model rejected the operator");
                    }
                }
                Step::Or => {
                    if model.operator(true) {
                        builder.or().unwrap();
                    } else {
                        assert!(builder.or().is_err(), "model rejected the operator");
                    }
                }
            }
        }
        if model.pending.take().is_some() {
            // Consume the dangling operator so the build is legal.
            builder.equal(&TShirt::PRICE, 7).unwrap();
            model.leaf(7);
        }
        let query = builder.build().unwrap();
        (model.describe(), query.describe().unwrap())
    }

    proptest! {
        /// The compiled expression is the left-associative reduction of
        /// the predicate/operator sequence.
        #[test]
        fn combinator_algebra_matches_model(
            steps in prop::collection::vec(
                prop_oneof![
                    (0i64..50).prop_map(Step::Leaf),
                    Just(Step::And),
                    Just(Step::Or),
                ],
                0..24,
            )
        ) {
            let (expected, actual) = run_model_and_builder(&steps);
            prop_assert_eq!(expected, actual);
        }
    }

    #[test]
    fn implicit_and_groups_before_an_explicit_or() {
        let (expected, actual) = run_model_and_builder(&[
            Step::Leaf(1),
            Step::Leaf(2),
            Step::Or,
            Step::Leaf(3),
        ]);
        assert_eq!(actual, "((price == 1 AND price == 2) OR price == 3)");
        assert_eq!(expected, actual);
    }

    #[test]
    fn operators_apply_left_to_right() {
        let (expected, actual) = run_model_and_builder(&[
            Step::Leaf(1),
            Step::Or,
            Step::Leaf(2),
            Step::And,
            Step::Leaf(3),
            Step::Leaf(4),
        ]);
        assert_eq!(
            actual,
            "(((price == 1 OR price == 2) AND price == 3) AND price == 4)"
        );
        assert_eq!(expected, actual);
    }

    #[test]
    fn typed_property_handles_carry_their_declaration() {
        const PRICE: Property<i64> = Property::new(4, TypeTag::Long);
        assert_eq!(PRICE.id, TShirt::PRICE.id);
        assert_eq!(PRICE.ty, TShirt::PRICE.ty);
    }
}
