//! AI 算法模块（启发式难度与 minimax 搜索）。

pub mod minimax;

pub use minimax::{
    choose_ai_move, decide, minimax_scores, AiAgent, AiConfig, AiDecision, AiDifficulty,
    DecisionReason, UnknownDifficulty, DEFAULT_REPLY_DELAY_MS,
};
