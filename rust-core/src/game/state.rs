use std::fmt;
use std::str::FromStr;

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

use super::rules::RuleError;

/// 棋盘格子数量（3×3）。
pub const CELL_COUNT: usize = 9;

/// 一条获胜连线上的三个格子下标。
pub type WinLine = [usize; 3];

/// 固定的 8 条获胜连线：3 行、3 列、2 条对角线。顺序即平局裁决顺序。
pub const WIN_LINES: [WinLine; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// 玩家落子的符号。`X` 为一号玩家，`O` 为二号玩家或电脑。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Mark::X => 'X',
            Mark::O => 'O',
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Mark {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "X" | "A" => Ok(Mark::X),
            "O" | "B" => Ok(Mark::O),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type")]
pub enum Cell {
    Empty,
    Marked { mark: Mark },
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Empty
    }
}

impl Cell {
    pub fn mark(self) -> Option<Mark> {
        match self {
            Cell::Empty => None,
            Cell::Marked { mark } => Some(mark),
        }
    }
}

/// 对局结果。总是由棋盘推导得出，不单独存储。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameOutcome {
    InProgress,
    Won { mark: Mark, line: WinLine },
    Draw,
}

impl GameOutcome {
    pub fn is_over(&self) -> bool {
        !matches!(self, GameOutcome::InProgress)
    }

    pub fn winner(&self) -> Option<Mark> {
        match self {
            GameOutcome::Won { mark, .. } => Some(*mark),
            _ => None,
        }
    }
}

/// 外部传入的棋盘与其步数或先手不一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum BoardError {
    #[display("board claims {moves} moves but holds {marks} marks")]
    MoveCountMismatch { moves: u8, marks: u8 },
    #[display("{first} opened with {first_marks} marks against {other_marks}")]
    ImpossibleCounts {
        first: Mark,
        first_marks: u8,
        other_marks: u8,
    },
}

/// 反序列化时的原始形态，`moves` 可省略。
#[derive(Deserialize)]
struct BoardRepr {
    cells: [Cell; CELL_COUNT],
    #[serde(default)]
    moves: Option<u8>,
    first: Mark,
}

impl TryFrom<BoardRepr> for Board {
    type Error = BoardError;

    fn try_from(repr: BoardRepr) -> Result<Self, Self::Error> {
        let board = Board::from_cells(repr.cells, repr.first);
        if let Some(moves) = repr.moves {
            if moves != board.moves {
                return Err(BoardError::MoveCountMismatch {
                    moves,
                    marks: board.moves,
                });
            }
        }

        let count = |mark: Mark| {
            board
                .cells
                .iter()
                .filter(|cell| cell.mark() == Some(mark))
                .count() as u8
        };
        let first_marks = count(repr.first);
        let other_marks = count(repr.first.opponent());
        if first_marks != other_marks && first_marks != other_marks + 1 {
            return Err(BoardError::ImpossibleCounts {
                first: repr.first,
                first_marks,
                other_marks,
            });
        }
        Ok(board)
    }
}

/// 3×3 棋盘，按行优先存储：`index = row * 3 + col`。
///
/// 棋盘是 `Copy` 值，AI 模拟落子时直接复制，不会影响实际对局。
/// 外部 JSON 必须满足步数等于棋子数，且双方棋子数与先手相符。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "BoardRepr")]
pub struct Board {
    cells: [Cell; CELL_COUNT],
    moves: u8,
    first: Mark,
}

impl Board {
    pub fn new(first: Mark) -> Self {
        Self {
            cells: [Cell::Empty; CELL_COUNT],
            moves: 0,
            first,
        }
    }

    /// 用任意局面构造棋盘，步数取棋盘上已有的棋子数。
    pub fn from_cells(cells: [Cell; CELL_COUNT], first: Mark) -> Self {
        let moves = cells.iter().filter(|cell| **cell != Cell::Empty).count() as u8;
        Self {
            cells,
            moves,
            first,
        }
    }

    /// 测试与调试用的紧凑写法：`"XX.OO...."`，`.`、`_` 或空格表示空格子。
    pub fn parse(layout: &str, first: Mark) -> Option<Self> {
        let mut cells = [Cell::Empty; CELL_COUNT];
        let mut filled = 0;
        for ch in layout.chars().filter(|ch| !matches!(ch, '|' | '\n' | '/')) {
            if filled == CELL_COUNT {
                return None;
            }
            cells[filled] = match ch {
                '.' | '_' | ' ' => Cell::Empty,
                other => Cell::Marked {
                    mark: other.to_string().parse().ok()?,
                },
            };
            filled += 1;
        }
        (filled == CELL_COUNT).then(|| Self::from_cells(cells, first))
    }

    pub fn cells(&self) -> &[Cell; CELL_COUNT] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Result<Cell, RuleError> {
        self.cells
            .get(index)
            .copied()
            .ok_or(RuleError::IndexOutOfRange { index })
    }

    pub fn move_count(&self) -> u8 {
        self.moves
    }

    /// 本局先手的符号。
    pub fn first(&self) -> Mark {
        self.first
    }

    /// 下一步应落子的符号，由先手与步数的奇偶推导。
    pub fn to_move(&self) -> Mark {
        if self.moves % 2 == 0 {
            self.first
        } else {
            self.first.opponent()
        }
    }

    pub fn is_empty(&self, index: usize) -> Result<bool, RuleError> {
        Ok(self.cell(index)? == Cell::Empty)
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|cell| *cell != Cell::Empty)
    }

    /// 在空格子上落子。失败时棋盘保持不变。
    pub fn place(&mut self, index: usize, mark: Mark) -> Result<(), RuleError> {
        if !self.is_empty(index)? {
            return Err(RuleError::CellOccupied { index });
        }
        self.cells[index] = Cell::Marked { mark };
        self.moves += 1;
        Ok(())
    }

    /// 升序返回所有空格子下标。
    pub fn empty_indices(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell == Cell::Empty)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn evaluate(&self) -> GameOutcome {
        for line in WIN_LINES {
            let [a, b, c] = line;
            if let Some(mark) = self.cells[a].mark() {
                if self.cells[b] == self.cells[a] && self.cells[c] == self.cells[a] {
                    return GameOutcome::Won { mark, line };
                }
            }
        }

        if usize::from(self.moves) >= CELL_COUNT {
            GameOutcome::Draw
        } else {
            GameOutcome::InProgress
        }
    }

    /// 返回 `mark` 只差一步即可连成的连线上的空格子（按连线表顺序取第一条）。
    pub fn winning_move(&self, mark: Mark) -> Option<usize> {
        WIN_LINES.iter().find_map(|line| {
            let owned = line
                .iter()
                .filter(|&&index| self.cells[index].mark() == Some(mark))
                .count();
            let open = line
                .iter()
                .copied()
                .find(|&index| self.cells[index] == Cell::Empty);
            match (owned, open) {
                (2, Some(index)) => Some(index),
                _ => None,
            }
        })
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::new(Mark::X)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..3 {
            if row > 0 {
                writeln!(f)?;
            }
            for col in 0..3 {
                if col > 0 {
                    write!(f, "|")?;
                }
                let symbol = self.cells[row * 3 + col]
                    .mark()
                    .map(Mark::symbol)
                    .unwrap_or('.');
                write!(f, "{symbol}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(layout: &str) -> Board {
        Board::parse(layout, Mark::X).expect("layout should describe nine cells")
    }

    #[test]
    fn place_sets_only_the_target_cell() {
        let mut board = board("X...O....");
        let before = board;

        board.place(8, Mark::X).expect("cell 8 is empty");

        assert_eq!(board.cell(8), Ok(Cell::Marked { mark: Mark::X }));
        assert_eq!(board.move_count(), before.move_count() + 1);
        for index in 0..8 {
            assert_eq!(board.cell(index), before.cell(index), "cell {index} changed");
        }
    }

    #[test]
    fn place_on_occupied_cell_leaves_board_untouched() {
        let mut board = board("XO.......");
        let before = board;

        let result = board.place(1, Mark::X);

        assert_eq!(result, Err(RuleError::CellOccupied { index: 1 }));
        assert_eq!(board, before);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut board = Board::new(Mark::X);
        assert_eq!(board.is_empty(9), Err(RuleError::IndexOutOfRange { index: 9 }));
        assert_eq!(
            board.place(12, Mark::O),
            Err(RuleError::IndexOutOfRange { index: 12 })
        );
        assert_eq!(board.move_count(), 0);
    }

    #[test]
    fn empty_indices_are_ascending() {
        let board = board(".X.O.X.O.");
        assert_eq!(board.empty_indices(), vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn top_row_wins() {
        let board = board("XXX......");
        assert_eq!(
            board.evaluate(),
            GameOutcome::Won {
                mark: Mark::X,
                line: [0, 1, 2]
            }
        );
    }

    #[test]
    fn full_board_without_line_is_draw() {
        let board = board("XOXXOOOXX");
        assert_eq!(board.move_count(), 9);
        assert_eq!(board.evaluate(), GameOutcome::Draw);
    }

    #[test]
    fn evaluate_is_idempotent() {
        let board = board("OXX.O.X.O");
        assert_eq!(board.evaluate(), board.evaluate());
        assert_eq!(board.evaluate().winner(), Some(Mark::O));
    }

    #[test]
    fn table_order_breaks_simultaneous_lines() {
        // 非法局面：两条连线同时完成，取连线表中靠前的一条。
        let board = board("XXXOOO...");
        assert_eq!(
            board.evaluate(),
            GameOutcome::Won {
                mark: Mark::X,
                line: [0, 1, 2]
            }
        );
    }

    #[test]
    fn clone_is_independent() {
        let original = board("X........");
        let mut copy = original;
        copy.place(4, Mark::O).expect("center is empty");
        assert_eq!(original.is_empty(4), Ok(true));
        assert_eq!(copy.is_empty(4), Ok(false));
    }

    #[test]
    fn to_move_alternates_from_opener() {
        let mut board = Board::new(Mark::O);
        assert_eq!(board.to_move(), Mark::O);
        board.place(0, Mark::O).expect("empty board");
        assert_eq!(board.to_move(), Mark::X);
    }

    #[test]
    fn winning_move_follows_table_order() {
        let board = board("XX.OO....");
        assert_eq!(board.winning_move(Mark::X), Some(2));
        assert_eq!(board.winning_move(Mark::O), Some(5));
        assert_eq!(Board::new(Mark::X).winning_move(Mark::X), None);
    }

    #[test]
    fn json_board_must_match_its_marks() {
        let empty_cells = r#"[{"type":"Empty"},{"type":"Empty"},{"type":"Empty"},{"type":"Empty"},{"type":"Empty"},{"type":"Empty"},{"type":"Empty"},{"type":"Empty"},{"type":"Empty"}]"#;

        let claims_full = format!(r#"{{"cells":{empty_cells},"moves":9,"first":"X"}}"#);
        assert!(serde_json::from_str::<Board>(&claims_full).is_err());

        let overflowing = format!(r#"{{"cells":{empty_cells},"moves":255,"first":"X"}}"#);
        assert!(serde_json::from_str::<Board>(&overflowing).is_err());

        let without_moves = format!(r#"{{"cells":{empty_cells},"first":"O"}}"#);
        let board: Board = serde_json::from_str(&without_moves).expect("moves may be omitted");
        assert_eq!(board, Board::new(Mark::O));
    }

    #[test]
    fn json_board_rejects_impossible_counts() {
        let two_x = Board::parse("XX.......", Mark::X).expect("valid layout");
        let json = serde_json::to_string(&two_x).expect("board serializes");
        let error = serde_json::from_str::<Board>(&json).expect_err("X cannot have moved twice");
        assert!(error.to_string().contains("opened with 2 marks"));

        let o_opened = Board::parse("XO.......", Mark::O).expect("valid layout");
        let json = serde_json::to_string(&o_opened).expect("board serializes");
        assert_eq!(serde_json::from_str::<Board>(&json).ok(), Some(o_opened));
    }

    #[test]
    fn display_renders_rows() {
        let board = board("XO..X...O");
        assert_eq!(board.to_string(), "X|O|.\n.|X|.\n.|.|O");
    }
}
