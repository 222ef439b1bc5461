//! Property tests for stack ordering and size tracking

use guardstack::{GuardedStack, StackConfig, StackError};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Push(f64),
    Pop,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (-1.0e6f64..1.0e6).prop_map(Op::Push),
        2 => Just(Op::Pop),
    ]
}

fn config_strategy() -> impl Strategy<Value = StackConfig> {
    (any::<bool>(), any::<bool>(), any::<bool>(), 1.25f64..3.0).prop_map(
        |(guards, checksums, poison, factor)| {
            StackConfig::default()
                .with_guards(guards)
                .with_checksums(checksums)
                .with_poison(poison)
                .with_growth_factor(factor)
        },
    )
}

proptest! {
    #[test]
    fn lifo_order(values in prop::collection::vec(-1.0e9f64..1.0e9, 0..200), capacity in 0usize..40) {
        let mut stack = GuardedStack::with_config(capacity, StackConfig::paranoid()).unwrap();
        for &v in &values {
            stack.push(v).unwrap();
        }
        for &v in values.iter().rev() {
            prop_assert_eq!(stack.pop().unwrap(), v);
        }
        prop_assert!(stack.is_empty());
    }

    #[test]
    fn size_tracks_pushes_and_pops(ops in prop::collection::vec(op_strategy(), 0..300), config in config_strategy()) {
        let mut stack = GuardedStack::with_config(4, config).unwrap();
        let mut model: Vec<f64> = Vec::new();

        for op in ops {
            match op {
                Op::Push(v) => {
                    stack.push(v).unwrap();
                    model.push(v);
                }
                Op::Pop => {
                    // empty pops dump to stderr; only non-empty pops are applied
                    if model.is_empty() {
                        continue;
                    }
                    prop_assert_eq!(stack.pop().unwrap(), model.pop().unwrap());
                }
            }
            prop_assert_eq!(stack.len(), model.len());
            prop_assert!(stack.len() <= stack.capacity());
            prop_assert_eq!(stack.verify(), Ok(()));
        }
    }

    #[test]
    fn growth_follows_factor(capacity in 1usize..64, factor in 1.25f64..3.0) {
        let config = StackConfig::paranoid().with_growth_factor(factor);
        let mut stack = GuardedStack::with_config(capacity, config).unwrap();
        for i in 0..=capacity {
            stack.push(i as f64).unwrap();
        }
        let expected = ((capacity as f64 * factor) as usize).max(capacity + 1);
        prop_assert_eq!(stack.capacity(), expected);
    }
}

#[test]
fn test_pop_on_fresh_stack_is_out_of_range() {
    let mut stack = GuardedStack::with_capacity(1).unwrap();
    assert_eq!(stack.pop(), Err(StackError::PopOutOfRange));
}
