use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::state::{Board, GameOutcome, Mark};

/// 引擎错误。均为本地同步错误，不会导致进程失败。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[display("cell index {index} is outside the 3x3 board")]
    IndexOutOfRange { index: usize },
    #[display("cell {index} is already occupied")]
    CellOccupied { index: usize },
    #[display("no empty cell left to move on")]
    NoLegalMove,
    #[display("the round is already over")]
    RoundOver,
    #[display("it is not this player's turn")]
    NotPlayerTurn,
}

/// 一次落子的结果，供前端渲染。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveResolution {
    pub board: Board,
    pub index: usize,
    pub mark: Mark,
    pub outcome: GameOutcome,
}

impl MoveResolution {
    pub fn new(board: Board, index: usize, mark: Mark) -> Self {
        Self {
            outcome: board.evaluate(),
            board,
            index,
            mark,
        }
    }
}

/// 新开一局，返回空棋盘。
pub fn new_round(starting: Mark) -> Board {
    Board::new(starting)
}

/// 在棋盘副本上落子并返回新棋盘，原棋盘不变。
#[instrument(level = "trace", skip(board))]
pub fn apply_move(board: &Board, index: usize, mark: Mark) -> Result<Board, RuleError> {
    let mut next = *board;
    next.place(index, mark)?;
    Ok(next)
}

pub fn evaluate(board: &Board) -> GameOutcome {
    board.evaluate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_move_returns_updated_copy() {
        let board = new_round(Mark::X);
        let next = apply_move(&board, 4, Mark::X).expect("center is empty");

        assert_eq!(board.move_count(), 0, "input board must not change");
        assert_eq!(next.move_count(), 1);
        assert_eq!(next.is_empty(4), Ok(false));
        assert_eq!(next.to_move(), Mark::O);
    }

    #[test]
    fn apply_move_surfaces_rule_errors() {
        let board = apply_move(&new_round(Mark::X), 0, Mark::X).expect("empty board");
        assert_eq!(
            apply_move(&board, 0, Mark::O),
            Err(RuleError::CellOccupied { index: 0 })
        );
        assert_eq!(
            apply_move(&board, 9, Mark::O),
            Err(RuleError::IndexOutOfRange { index: 9 })
        );
    }

    #[test]
    fn resolution_carries_outcome() {
        let board = Board::parse("XX.OO....", Mark::X).expect("valid layout");
        let next = apply_move(&board, 2, Mark::X).expect("cell 2 is empty");
        let resolution = MoveResolution::new(next, 2, Mark::X);

        assert_eq!(
            resolution.outcome,
            GameOutcome::Won {
                mark: Mark::X,
                line: [0, 1, 2]
            }
        );
        assert_eq!(evaluate(&resolution.board), resolution.outcome);
    }

    #[test]
    fn errors_serialize_with_type_tag() {
        let json = serde_json::to_string(&RuleError::CellOccupied { index: 3 })
            .expect("error should serialize");
        assert_eq!(json, r#"{"type":"CellOccupied","index":3}"#);
        assert_eq!(
            RuleError::NoLegalMove.to_string(),
            "no empty cell left to move on"
        );
    }
}
