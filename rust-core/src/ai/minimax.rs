use std::str::FromStr;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use derive_more::{Display, Error};
use tracing::{debug, instrument};

use crate::game::{Board, GameOutcome, Mark, RuleError};

/// 电脑落子前的默认停顿（毫秒），仅用于前端节奏。
pub const DEFAULT_REPLY_DELAY_MS: u32 = 400;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    /// 能赢就赢，否则随机。
    #[default]
    #[serde(alias = "normal")]
    Easy,
    /// 能赢就赢，其次封堵对手，否则随机。
    Medium,
    /// 完整 minimax 搜索，不会输。
    #[serde(alias = "unbeatable", alias = "expert")]
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("unknown difficulty: {label}")]
pub struct UnknownDifficulty {
    #[error(not(source))]
    pub label: String,
}

impl FromStr for AiDifficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" | "normal" => Ok(AiDifficulty::Easy),
            "medium" => Ok(AiDifficulty::Medium),
            "hard" | "unbeatable" | "expert" => Ok(AiDifficulty::Hard),
            _ => Err(UnknownDifficulty {
                label: s.to_string(),
            }),
        }
    }
}

impl AiDifficulty {
    /// 未提供时取 `fallback`；提供了但无法识别则报错。
    pub fn parse_or(
        value: Option<&str>,
        fallback: AiDifficulty,
    ) -> Result<Self, UnknownDifficulty> {
        value.map_or(Ok(fallback), str::parse::<AiDifficulty>)
    }
}

/// 决定落子所依据的规则。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecisionReason {
    Win,
    Block,
    Random,
    Search,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AiConfig {
    pub difficulty: AiDifficulty,
    pub reply_delay_ms: u32,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: AiDifficulty) -> Self {
        Self {
            difficulty,
            reply_delay_ms: DEFAULT_REPLY_DELAY_MS,
        }
    }

    pub fn with_reply_delay(mut self, reply_delay_ms: u32) -> Self {
        self.reply_delay_ms = reply_delay_ms;
        self
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_difficulty(AiDifficulty::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiDecision {
    pub index: usize,
    pub mark: Mark,
    pub difficulty: AiDifficulty,
    pub reason: DecisionReason,
    /// 仅搜索时给出：+1 必胜，0 平局，-1 必败。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<i8>,
    pub nodes: u64,
}

struct SearchStats {
    nodes: u64,
}

impl SearchStats {
    fn new() -> Self {
        Self { nodes: 0 }
    }
}

/// 为 `ai` 选择落子位置。`rng` 只在随机兜底时使用。
pub fn choose_ai_move<R: Rng + ?Sized>(
    board: &Board,
    difficulty: AiDifficulty,
    ai: Mark,
    human: Mark,
    rng: &mut R,
) -> Result<usize, RuleError> {
    decide(board, difficulty, ai, human, rng).map(|decision| decision.index)
}

#[instrument(level = "debug", skip(board, rng), fields(moves = board.move_count()))]
pub fn decide<R: Rng + ?Sized>(
    board: &Board,
    difficulty: AiDifficulty,
    ai: Mark,
    human: Mark,
    rng: &mut R,
) -> Result<AiDecision, RuleError> {
    let empty = board.empty_indices();
    if empty.is_empty() {
        return Err(RuleError::NoLegalMove);
    }
    if board.evaluate().is_over() {
        return Err(RuleError::RoundOver);
    }

    let decision = match difficulty {
        AiDifficulty::Easy => heuristic_decision(board, difficulty, ai, None, &empty, rng)?,
        AiDifficulty::Medium => {
            heuristic_decision(board, difficulty, ai, Some(human), &empty, rng)?
        }
        AiDifficulty::Hard => search_decision(board, ai, human)?,
    };

    debug!(
        index = decision.index,
        reason = ?decision.reason,
        nodes = decision.nodes,
        "ai move chosen"
    );
    Ok(decision)
}

fn heuristic_decision<R: Rng + ?Sized>(
    board: &Board,
    difficulty: AiDifficulty,
    ai: Mark,
    block: Option<Mark>,
    empty: &[usize],
    rng: &mut R,
) -> Result<AiDecision, RuleError> {
    let (index, reason) = if let Some(index) = board.winning_move(ai) {
        (index, DecisionReason::Win)
    } else if let Some(index) = block.and_then(|opponent| board.winning_move(opponent)) {
        (index, DecisionReason::Block)
    } else {
        let index = empty.choose(rng).copied().ok_or(RuleError::NoLegalMove)?;
        (index, DecisionReason::Random)
    };

    Ok(AiDecision {
        index,
        mark: ai,
        difficulty,
        reason,
        evaluation: None,
        nodes: 0,
    })
}

fn search_decision(board: &Board, ai: Mark, human: Mark) -> Result<AiDecision, RuleError> {
    let mut stats = SearchStats::new();
    let (score, best) = minimax(board, ai, ai, human, &mut stats);
    let index = best.ok_or(RuleError::NoLegalMove)?;

    Ok(AiDecision {
        index,
        mark: ai,
        difficulty: AiDifficulty::Hard,
        reason: DecisionReason::Search,
        evaluation: Some(score),
        nodes: stats.nodes,
    })
}

/// 每个空格子对 `ai` 的 minimax 得分，按下标升序。
pub fn minimax_scores(board: &Board, ai: Mark, human: Mark) -> Vec<(usize, i8)> {
    let mut stats = SearchStats::new();
    board
        .empty_indices()
        .into_iter()
        .filter_map(|index| {
            let mut child = *board;
            child.place(index, ai).ok()?;
            let (score, _) = minimax(&child, human, ai, human, &mut stats);
            Some((index, score))
        })
        .collect()
}

/// 穷举搜索，返回 (得分, 最佳下标)。得分相同时取下标最小者。
fn minimax(
    board: &Board,
    to_move: Mark,
    ai: Mark,
    human: Mark,
    stats: &mut SearchStats,
) -> (i8, Option<usize>) {
    stats.nodes += 1;

    match board.evaluate() {
        GameOutcome::Won { mark, .. } if mark == ai => return (1, None),
        GameOutcome::Won { .. } => return (-1, None),
        GameOutcome::Draw => return (0, None),
        GameOutcome::InProgress => {}
    }

    let maximizing = to_move == ai;
    let next = if maximizing { human } else { ai };
    let mut best: Option<(i8, usize)> = None;

    for index in board.empty_indices() {
        let mut child = *board;
        if child.place(index, to_move).is_err() {
            continue;
        }
        let (score, _) = minimax(&child, next, ai, human, stats);

        let improves = match best {
            None => true,
            Some((best_score, _)) if maximizing => score > best_score,
            Some((best_score, _)) => score < best_score,
        };
        if improves {
            best = Some((score, index));
        }
    }

    match best {
        Some((score, index)) => (score, Some(index)),
        None => (0, None),
    }
}

/// 持有配置与随机源的电脑玩家。
pub struct AiAgent {
    config: AiConfig,
    rng: SmallRng,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn set_difficulty(&mut self, difficulty: AiDifficulty) {
        self.config.difficulty = difficulty;
    }

    pub fn rng_mut(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    pub fn decide(
        &mut self,
        board: &Board,
        ai: Mark,
        human: Mark,
    ) -> Result<AiDecision, RuleError> {
        decide(board, self.config.difficulty, ai, human, &mut self.rng)
    }
}
