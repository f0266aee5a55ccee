//! Basic-block partitioning (component D): split a function's flat quadruple
//! stream on labels and jumps.

use crate::middle::tac::Quadruple;

/// Partition `code` into contiguous, non-overlapping basic blocks.
///
/// A block ends when the quadruple just appended is a jump, or when the next
/// quadruple (beyond the block's own first) carries a leading label. Both
/// rules are checked in the same scan so a block never has to be re-split.
pub fn split_blocks(code: &[Quadruple]) -> Vec<&[Quadruple]> {
    let mut blocks = Vec::new();
    let mut block_begin = 0;
    while block_begin < code.len() {
        let mut block_end = block_begin;
        while block_end < code.len() {
            if block_end != block_begin && code[block_end].label.is_some() {
                break;
            }
            if code[block_end].is_jump() {
                block_end += 1;
                break;
            }
            block_end += 1;
        }
        blocks.push(&code[block_begin..block_end]);
        block_begin = block_end;
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::id;
    use crate::middle::symbol::VarId;
    use crate::middle::tac::{Address, Op, Quadruple};

    fn q(op: Op, result: Address) -> Quadruple {
        Quadruple::new(op, result, Address::Empty, Address::Empty)
    }

    #[test]
    fn splits_on_jump_and_label() {
        let v = |n| Address::Var(VarId(n));
        let code = vec![
            q(Op::Assign, v(0)),
            q(Op::Add, v(1)),
            Quadruple::labeled(id("L1"), Op::Assign, v(2), Address::Empty, Address::Empty),
            Quadruple::new(Op::Jump, Address::Label(id("L2")), Address::Empty, Address::Empty),
            q(Op::Assign, v(3)),
        ];
        let blocks = split_blocks(&code);
        let lens: Vec<usize> = blocks.iter().map(|b| b.len()).collect();
        assert_eq!(lens, vec![2, 2, 1]);
    }

    #[test]
    fn empty_function_has_no_blocks() {
        assert!(split_blocks(&[]).is_empty());
    }

    #[test]
    fn single_quadruple_block_is_permitted() {
        let code = vec![Quadruple::new(
            Op::Return,
            Address::Empty,
            Address::Empty,
            Address::Empty,
        )];
        let blocks = split_blocks(&code);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].len(), 1);
    }
}
