//! 游戏核心逻辑模块（棋盘、规则、回合控制）。

pub mod round;
pub mod rules;
pub mod state;

pub use round::{
    GameMode,
    Players,
    RoundController,
    RoundSnapshot,
    RoundState,
    Scoreboard,
    COMPUTER_NAME,
    DEFAULT_PLAYER_ONE,
    DEFAULT_PLAYER_TWO,
    PLAYER_ONE_MARK,
    PLAYER_TWO_MARK,
};
pub use rules::{apply_move, evaluate, new_round, MoveResolution, RuleError};
pub use state::{Board, BoardError, Cell, GameOutcome, Mark, WinLine, CELL_COUNT, WIN_LINES};
