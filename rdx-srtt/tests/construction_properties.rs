use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use srtt::components::builder::SequenceBuilder;
use srtt::components::matcher::find_successor;
use srtt::components::pair::{validate, PairPolicy, SequencePair};
use srtt::components::window::ContextWindow;
use srtt::common::Location;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn built_sequences_are_deterministic(seed in any::<u64>(), alphabet in 3usize..=6, order in 1usize..=3) {
        let mut rng = StdRng::seed_from_u64(seed);
        let seq = SequenceBuilder::new(alphabet, order).unwrap().build(&mut rng).unwrap();
        for i in 0..seq.len() {
            let window = seq.window(i);
            prop_assert_eq!(find_successor(&window, &seq), Some(seq.at(i + order)));
            for j in 0..seq.len() {
                if j != i && seq.window(j) == window {
                    prop_assert_eq!(seq.successor(j), seq.successor(i));
                }
            }
        }
    }

    #[test]
    fn generated_pairs_never_collide(seed in any::<u64>(), alphabet in 4usize..=5) {
        let mut rng = StdRng::seed_from_u64(seed);
        let builder = SequenceBuilder::new(alphabet, 2).unwrap();
        let pair = SequencePair::generate(&builder, &mut rng, PairPolicy::default()).unwrap();
        let (a, b) = (pair.regular(), pair.irregular());

        prop_assert_ne!(a.items(), b.items());
        prop_assert!(validate(a, b, 2));
        for i in 0..a.len() {
            for j in 0..b.len() {
                if a.window(i) == b.window(j) {
                    prop_assert_ne!(a.successor(i), b.successor(j));
                }
            }
        }
    }

    #[test]
    fn shift_append_keeps_the_newest_items(
        initial in prop::collection::vec(0u8..4, 1..5),
        value in 0u8..4,
    ) {
        let initial: Vec<Location> = initial.into_iter().map(Location).collect();
        let mut window = ContextWindow::new(initial.clone());
        window.shift_append(Location(value));

        let mut expected = initial[1..].to_vec();
        expected.push(Location(value));
        prop_assert_eq!(window.as_slice(), expected.as_slice());
    }
}
