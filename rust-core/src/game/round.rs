use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::rules::{new_round, MoveResolution, RuleError};
use super::state::{Board, GameOutcome, Mark};
use crate::ai::{AiAgent, AiDecision};
use crate::config::SessionConfig;

/// 一号玩家固定执 X，二号玩家（或电脑）执 O。
pub const PLAYER_ONE_MARK: Mark = Mark::X;
pub const PLAYER_TWO_MARK: Mark = Mark::O;

pub const DEFAULT_PLAYER_ONE: &str = "Player 1";
pub const DEFAULT_PLAYER_TWO: &str = "Player 2";
pub const COMPUTER_NAME: &str = "Computer";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Multiplayer,
    #[serde(alias = "ai")]
    VsAi,
}

/// 回合状态机。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RoundState {
    AwaitingMove { turn: Mark },
    RoundOver { outcome: GameOutcome },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Scoreboard {
    pub player_one: u32,
    pub player_two: u32,
    pub rounds_played: u32,
}

impl Scoreboard {
    pub fn record(&mut self, outcome: &GameOutcome) {
        match outcome.winner() {
            Some(PLAYER_ONE_MARK) => self.player_one += 1,
            Some(_) => self.player_two += 1,
            None => {}
        }
        if outcome.is_over() {
            self.rounds_played += 1;
        }
    }

    pub fn draws(&self) -> u32 {
        self.rounds_played
            .saturating_sub(self.player_one + self.player_two)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Players {
    pub player_one: String,
    pub player_two: String,
}

impl Players {
    /// 去掉首尾空白，空名字回落到默认名。
    pub fn new(player_one: &str, player_two: &str) -> Self {
        Self {
            player_one: normalize_name(player_one, DEFAULT_PLAYER_ONE),
            player_two: normalize_name(player_two, DEFAULT_PLAYER_TWO),
        }
    }

    pub fn name_of(&self, mark: Mark) -> &str {
        if mark == PLAYER_ONE_MARK {
            &self.player_one
        } else {
            &self.player_two
        }
    }
}

impl Default for Players {
    fn default() -> Self {
        Players::new(DEFAULT_PLAYER_ONE, DEFAULT_PLAYER_TWO)
    }
}

fn normalize_name(name: &str, fallback: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// 前端渲染与本地存储用的快照。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundSnapshot {
    pub board: Board,
    pub state: RoundState,
    pub mode: GameMode,
    pub players: Players,
    pub scoreboard: Scoreboard,
    pub next_starter: Mark,
}

/// 独占持有当前棋盘，保证同一时刻只处理一步落子。
#[derive(Debug, Clone)]
pub struct RoundController {
    board: Board,
    state: RoundState,
    mode: GameMode,
    players: Players,
    scoreboard: Scoreboard,
    next_starter: Mark,
}

impl RoundController {
    pub fn new(mode: GameMode, players: Players, starter: Mark) -> Self {
        let mut controller = Self {
            board: new_round(starter),
            state: RoundState::AwaitingMove { turn: starter },
            mode,
            players,
            scoreboard: Scoreboard::default(),
            next_starter: starter,
        };
        if mode == GameMode::VsAi {
            controller.players.player_two = COMPUTER_NAME.to_string();
        }
        controller.start_round();
        controller
    }

    /// 人机模式下先手随机决定，之后逐局交替。
    pub fn from_config<R: Rng + ?Sized>(config: &SessionConfig, rng: &mut R) -> Self {
        let starter = match config.mode {
            GameMode::Multiplayer => PLAYER_ONE_MARK,
            GameMode::VsAi => random_mark(rng),
        };
        let players = Players::new(&config.player_one, &config.player_two);
        Self::new(config.mode, players, starter)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn players(&self) -> &Players {
        &self.players
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn next_starter(&self) -> Mark {
        self.next_starter
    }

    pub fn outcome(&self) -> GameOutcome {
        self.board.evaluate()
    }

    pub fn ai_mark(&self) -> Option<Mark> {
        match self.mode {
            GameMode::VsAi => Some(PLAYER_TWO_MARK),
            GameMode::Multiplayer => None,
        }
    }

    /// 当前是否轮到电脑落子。
    pub fn is_ai_turn(&self) -> bool {
        match (self.state, self.ai_mark()) {
            (RoundState::AwaitingMove { turn }, Some(ai)) => turn == ai,
            _ => false,
        }
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            board: self.board,
            state: self.state,
            mode: self.mode,
            players: self.players.clone(),
            scoreboard: self.scoreboard,
            next_starter: self.next_starter,
        }
    }

    /// 开新局：空棋盘，先手取自交替标记，随后翻转该标记。
    #[instrument(level = "debug", skip(self))]
    pub fn start_round(&mut self) -> &Board {
        let starter = self.next_starter;
        self.board = new_round(starter);
        self.state = RoundState::AwaitingMove { turn: starter };
        self.next_starter = starter.opponent();
        debug!(%starter, "round started");
        &self.board
    }

    #[instrument(level = "debug", skip(self, rng))]
    pub fn enable_ai<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.mode = GameMode::VsAi;
        self.players.player_two = COMPUTER_NAME.to_string();
        self.scoreboard = Scoreboard::default();
        self.next_starter = random_mark(rng);
        self.start_round();
    }

    #[instrument(level = "debug", skip(self))]
    pub fn disable_ai(&mut self, player_two: &str) {
        self.mode = GameMode::Multiplayer;
        self.players.player_two = normalize_name(player_two, DEFAULT_PLAYER_TWO);
        self.scoreboard = Scoreboard::default();
        self.next_starter = PLAYER_ONE_MARK;
        self.start_round();
    }

    /// 改名不影响比分。人机模式下二号玩家始终是电脑。
    pub fn rename(&mut self, player_one: &str, player_two: &str) {
        self.players.player_one = normalize_name(player_one, DEFAULT_PLAYER_ONE);
        self.players.player_two = match self.mode {
            GameMode::VsAi => COMPUTER_NAME.to_string(),
            GameMode::Multiplayer => normalize_name(player_two, DEFAULT_PLAYER_TWO),
        };
    }

    /// 人类玩家落子。人机模式下不能替电脑落子。
    pub fn play(&mut self, index: usize) -> Result<MoveResolution, RuleError> {
        if self.is_ai_turn() {
            return Err(RuleError::NotPlayerTurn);
        }
        self.place(index)
    }

    /// 由电脑决定并落子。棋盘以副本形式交给 AI。
    pub fn play_ai(
        &mut self,
        agent: &mut AiAgent,
    ) -> Result<(MoveResolution, AiDecision), RuleError> {
        if let RoundState::RoundOver { .. } = self.state {
            return Err(RuleError::RoundOver);
        }
        let ai = match self.ai_mark() {
            Some(ai) if self.is_ai_turn() => ai,
            _ => return Err(RuleError::NotPlayerTurn),
        };

        let snapshot = self.board;
        let decision = agent.decide(&snapshot, ai, ai.opponent())?;
        let resolution = self.place(decision.index)?;
        Ok((resolution, decision))
    }

    /// 落下事先算好的电脑决定（例如 `think_ai` 延时后给出的结果）。
    pub fn play_ai_at(&mut self, index: usize) -> Result<MoveResolution, RuleError> {
        if let RoundState::RoundOver { .. } = self.state {
            return Err(RuleError::RoundOver);
        }
        if !self.is_ai_turn() {
            return Err(RuleError::NotPlayerTurn);
        }
        self.place(index)
    }

    /// 点击入口：错误只记录日志，当作无操作。
    pub fn handle_click(&mut self, index: usize) -> Option<MoveResolution> {
        match self.play(index) {
            Ok(resolution) => Some(resolution),
            Err(error) => {
                warn!(index, %error, "click ignored");
                None
            }
        }
    }

    pub fn handle_ai_turn(&mut self, agent: &mut AiAgent) -> Option<(MoveResolution, AiDecision)> {
        match self.play_ai(agent) {
            Ok(result) => Some(result),
            Err(error) => {
                warn!(%error, "ai turn skipped");
                None
            }
        }
    }

    fn place(&mut self, index: usize) -> Result<MoveResolution, RuleError> {
        let turn = match self.state {
            RoundState::RoundOver { .. } => return Err(RuleError::RoundOver),
            RoundState::AwaitingMove { turn } => turn,
        };

        self.board.place(index, turn)?;
        let resolution = MoveResolution::new(self.board, index, turn);
        debug!(index, mark = %turn, "move placed");

        if resolution.outcome.is_over() {
            self.state = RoundState::RoundOver {
                outcome: resolution.outcome,
            };
            self.scoreboard.record(&resolution.outcome);
            match resolution.outcome.winner() {
                Some(mark) => info!(winner = self.players.name_of(mark), "round won"),
                None => info!("round drawn"),
            }
        } else {
            self.state = RoundState::AwaitingMove {
                turn: self.board.to_move(),
            };
        }

        Ok(resolution)
    }
}

fn random_mark<R: Rng + ?Sized>(rng: &mut R) -> Mark {
    if rng.gen_bool(0.5) {
        PLAYER_ONE_MARK
    } else {
        PLAYER_TWO_MARK
    }
}
