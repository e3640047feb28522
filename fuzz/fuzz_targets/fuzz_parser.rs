#![no_main]

use std::cell::RefCell;

use arbitrary::{Arbitrary, Unstructured};
use haversine::{
    Arena, ParserOptions, StringMode,
    generator::{GeneratorOptions, Layout, generate_json},
    parse,
};
use libfuzzer_sys::{fuzz_mutator, fuzz_target, fuzzer_mutate};
use rand::{Rng, SeedableRng, rngs::SmallRng};

#[derive(Arbitrary, Debug, Clone, Copy)]
struct Flags {
    view: bool,
    tiny_objects: bool,
    shallow: bool,
    tiny_arena: bool,
}

impl Flags {
    fn options(self) -> ParserOptions {
        ParserOptions {
            string_mode: if self.view {
                StringMode::View
            } else {
                StringMode::Copy
            },
            object_capacity: if self.tiny_objects { 2 } else { 32 },
            max_depth: if self.shallow { 4 } else { 128 },
        }
    }
}

const FLAG_BYTES: usize = 4;

thread_local! {
    static RNG: RefCell<SmallRng> = RefCell::new(SmallRng::seed_from_u64(0));
}

// Most of the time defer to libFuzzer. Otherwise splice in a freshly generated
// pairs document, optionally truncated, so the corpus keeps realistic inputs.
fuzz_mutator!(|data: &mut [u8], size: usize, max_size: usize, seed: u32| {
    RNG.with(|rng| {
        let mut rng = rng.borrow_mut();
        *rng = SmallRng::seed_from_u64(u64::from(seed));

        if max_size <= FLAG_BYTES || rng.random_ratio(3, 4) {
            return fuzzer_mutate(data, size, max_size);
        }

        let Ok(generated) = generate_json(&GeneratorOptions {
            count: rng.random_range(0..8),
            seed: rng.random(),
            precision: rng.random_range(0..=6),
            layout: if rng.random() {
                Layout::PairsObject
            } else {
                Layout::BareArray
            },
            ..GeneratorOptions::default()
        }) else {
            return fuzzer_mutate(data, size, max_size);
        };

        for flag in &mut data[..FLAG_BYTES] {
            *flag = rng.random();
        }
        let json = generated.json.as_bytes();
        let mut len = json.len().min(max_size - FLAG_BYTES);
        if rng.random_ratio(1, 4) {
            len = rng.random_range(0..=len);
        }
        data[FLAG_BYTES..FLAG_BYTES + len].copy_from_slice(&json[..len]);
        FLAG_BYTES + len
    })
});

fuzz_target!(|data: &[u8]| check(data));

fn check(data: &[u8]) {
    let mut u = Unstructured::new(data);
    let Ok(flags) = Flags::arbitrary(&mut u) else {
        return;
    };
    let input = u.take_rest();
    let options = flags.options();
    let arena_capacity = if flags.tiny_arena { 16 } else { input.len() };

    let first_arena = Arena::with_capacity(arena_capacity);
    let second_arena = Arena::with_capacity(arena_capacity);
    let first = parse(input, &first_arena, options);
    let second = parse(input, &second_arena, options);

    let value = match (first, second) {
        (Ok(first), Ok(second)) => {
            assert_eq!(first, second);
            first
        }
        (Err(first), Err(second)) => {
            assert_eq!(first, second);
            assert!(first.offset <= input.len());
            return;
        }
        (first, second) => panic!("parse is not deterministic: {first:?} vs {second:?}"),
    };

    // Strings are raw byte slices, so only a UTF-8 input prints back verbatim.
    if std::str::from_utf8(input).is_err() {
        return;
    }
    let rendered = value.to_string();
    let view = ParserOptions {
        string_mode: StringMode::View,
        ..options
    };
    let empty = Arena::with_capacity(0);
    let reparsed = parse(rendered.as_bytes(), &empty, view)
        .unwrap_or_else(|err| panic!("{rendered:?} does not parse back: {err}"));
    assert_eq!(value, reparsed);
}
