//! Property-based tests for the optimizer
//!
//! These tests use proptest to generate random programs and verify that:
//! 1. Optimized and unoptimized programs print the same bytes
//! 2. Optimization is idempotent
//! 3. Address substitution resolves every operand to its running position
//! 4. Fully known programs materialize to exactly what they print

use proptest::prelude::*;
use tapec::compiler::optimizer::substitute_addresses;
use tapec::compiler::Interpreter;
use tapec::{tokenize, DilInstruction, Error, IrBuilder, Language, OperationSet, Optimizer};

const TAPE: usize = 256;
const STEP_LIMIT: u64 = 20_000;

// =============================================================================
// STRATEGY GENERATORS
// =============================================================================

/// Straight-line run of primitives, biased to the right so the pointer
/// mostly stays on the tape
fn straight_line() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            4 => Just('+'),
            3 => Just('-'),
            3 => Just('>'),
            2 => Just('<'),
            1 => Just('.'),
            1 => Just(','),
        ],
        0..12,
    )
    .prop_map(|chars| chars.into_iter().collect::<String>())
}

/// Balanced programs with nested loops
fn program() -> impl Strategy<Value = String> {
    straight_line()
        .prop_recursive(3, 48, 4, |inner| {
            prop::collection::vec(prop_oneof![inner.clone(), inner.prop_map(|body| format!("[{}]", body))], 1..4)
                .prop_map(|parts| parts.concat())
        })
        .prop_map(|body| format!(">>>>{}", body))
}

/// Loop-free programs over a handful of constant cells
fn constant_cells() -> impl Strategy<Value = Vec<(usize, i8, bool)>> {
    prop::collection::vec((0usize..6, any::<i8>(), any::<bool>()), 0..10)
}

fn build(source: &str) -> OperationSet {
    let stream = tokenize(source, Language::Brainfuck.table()).unwrap();
    IrBuilder::new().build(&stream).unwrap()
}

fn run(set: &OperationSet, input: &[u8], limit: u64) -> tapec::Result<Vec<u8>> {
    let mut machine = Interpreter::new(TAPE).with_input(input).with_step_limit(limit);
    machine.run(set)?;
    Ok(machine.into_output())
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Optimizing never changes what a terminating program prints
    #[test]
    fn optimized_output_matches(source in program(), input in prop::collection::vec(any::<u8>(), 0..8)) {
        let plain = build(&source);
        let expected = match run(&plain, &input, STEP_LIMIT) {
            Ok(output) => output,
            // Off-tape or non-terminating programs say nothing about the optimizer.
            Err(Error::TapeOverflow { .. } | Error::StepLimitExceeded { .. }) => return Ok(()),
            Err(other) => return Err(TestCaseError::fail(other.to_string())),
        };

        let mut fast = plain.clone();
        Optimizer::new(TAPE).optimize(&mut fast);
        let actual = run(&fast, &input, STEP_LIMIT * 4);
        prop_assert!(actual.is_ok(), "{}: {:?}", source, actual);
        prop_assert_eq!(actual.unwrap(), expected, "{}", source);
    }

    /// A second optimization is a single unchanged cycle
    #[test]
    fn optimization_is_idempotent(source in program()) {
        let mut set = build(&source);
        let optimizer = Optimizer::new(TAPE);
        optimizer.optimize(&mut set);
        let once = set.clone();

        let stats = optimizer.optimize(&mut set);
        prop_assert_eq!(&set, &once);
        prop_assert_eq!(stats.cycles, 1);
    }

    /// Resolved addresses are the running pointer plus the relative offset
    #[test]
    fn substitution_resolves_running_position(source in straight_line()) {
        let source = format!(">>>>>>>>>>>>{}", source);
        let original = build(&source);
        let mut set = original.clone();
        prop_assume!(substitute_addresses(&mut set, TAPE));

        let pointer_free = set.instructions.iter().all(|i| !matches!(i, DilInstruction::MovePtr { .. }));
        prop_assert!(pointer_free, "pointer moves left in {}", source);
        let mut running = 0i64;
        let mut resolved = set.instructions.iter();
        for instruction in &original.instructions {
            match instruction {
                DilInstruction::MovePtr { delta } => running += delta,
                DilInstruction::Add { offset, .. }
                | DilInstruction::Write { offset, .. }
                | DilInstruction::Read { offset, .. } => {
                    let address = match resolved.next() {
                        Some(DilInstruction::Add { address, .. })
                        | Some(DilInstruction::Write { address, .. })
                        | Some(DilInstruction::Read { address, .. }) => *address,
                        other => return Err(TestCaseError::fail(format!("unexpected {:?}", other))),
                    };
                    prop_assert_eq!(address.map(|a| a.0 as i64), Some(running + offset));
                }
                other => return Err(TestCaseError::fail(format!("unexpected {:?}", other))),
            }
        }
    }

    /// Known cells and writes collapse to one literal with the printed bytes
    #[test]
    fn literal_matches_printed_output(cells in constant_cells()) {
        let mut source = String::new();
        let mut pointer = 0usize;
        for (cell, amount, print) in &cells {
            let (step, count) = if *cell >= pointer { ('>', cell - pointer) } else { ('<', pointer - cell) };
            source.extend(std::iter::repeat(step).take(count));
            pointer = *cell;
            let sign = if *amount < 0 { '-' } else { '+' };
            source.extend(std::iter::repeat(sign).take(amount.unsigned_abs() as usize));
            if *print {
                source.push('.');
            }
        }

        let plain = build(&source);
        let expected = run(&plain, b"", u64::MAX).unwrap();
        let mut fast = plain;
        Optimizer::new(TAPE).optimize(&mut fast);

        if expected.is_empty() {
            prop_assert!(fast.is_empty());
        } else {
            prop_assert_eq!(fast.instructions, vec![DilInstruction::write_literal(expected)]);
        }
    }
}
