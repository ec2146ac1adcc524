pub mod ai;
pub mod config;
pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{
    choose_ai_move, decide, minimax_scores, AiAgent, AiConfig, AiDecision, AiDifficulty,
    DecisionReason, UnknownDifficulty,
};
pub use config::SessionConfig;
pub use game::{
    apply_move, evaluate, new_round, Board, BoardError, Cell, GameMode, GameOutcome, Mark, MoveResolution,
    Players, RoundController, RoundSnapshot, RoundState, RuleError, Scoreboard, WinLine,
    WIN_LINES,
};

use utils::{console_warn, init_tracing, serde_to_js_error, set_panic_hook, to_js_error, to_json};

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
    init_tracing();
}

fn parse_mark(value: &str) -> Result<Mark, JsValue> {
    Mark::from_str(value).map_err(|_| JsValue::from_str(&format!("unknown mark: {value}")))
}

fn parse_difficulty(value: Option<&str>, fallback: AiDifficulty) -> Result<AiDifficulty, JsValue> {
    AiDifficulty::parse_or(value, fallback).map_err(serde_to_js_error)
}

fn make_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    }
}

#[derive(Serialize)]
struct EngineView {
    #[serde(flatten)]
    round: RoundSnapshot,
    outcome: GameOutcome,
    ai: AiConfig,
    ai_turn: bool,
}

#[derive(Serialize)]
struct AiMoveResponse {
    decision: AiDecision,
    applied: MoveResolution,
}

/// 页面持有的有状态句柄：一个回合控制器加一个电脑玩家。
#[wasm_bindgen]
pub struct TicTacToeEngine {
    controller: RoundController,
    agent: AiAgent,
}

#[wasm_bindgen]
impl TicTacToeEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<TicTacToeEngine, JsValue> {
        let config = match config_json {
            Some(json) => SessionConfig::from_json(&json).map_err(serde_to_js_error)?,
            None => SessionConfig::default(),
        };
        let mut agent = match config.seed {
            Some(seed) => AiAgent::with_seed(config.ai, seed),
            None => AiAgent::new(config.ai),
        };
        let controller = RoundController::from_config(&config, agent.rng_mut());
        Ok(TicTacToeEngine { controller, agent })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        to_json(&EngineView {
            round: self.controller.snapshot(),
            outcome: self.controller.outcome(),
            ai: *self.agent.config(),
            ai_turn: self.controller.is_ai_turn(),
        })
    }

    pub fn scoreboard_json(&self) -> Result<String, JsValue> {
        to_json(self.controller.scoreboard())
    }

    pub fn is_ai_turn(&self) -> bool {
        self.controller.is_ai_turn()
    }

    pub fn reply_delay_ms(&self) -> u32 {
        self.agent.config().reply_delay_ms
    }

    /// 棋盘点击：非法点击不抛错，返回 `undefined`。
    pub fn click(&mut self, index: usize) -> Result<Option<String>, JsValue> {
        match self.controller.handle_click(index) {
            Some(resolution) => to_json(&resolution).map(Some),
            None => {
                console_warn(&format!("click on cell {index} ignored"));
                Ok(None)
            }
        }
    }

    pub fn play(&mut self, index: usize) -> Result<String, JsValue> {
        let resolution = self.controller.play(index).map_err(to_js_error)?;
        to_json(&resolution)
    }

    pub fn apply_ai_move(&mut self) -> Result<String, JsValue> {
        let (applied, decision) = self
            .controller
            .play_ai(&mut self.agent)
            .map_err(to_js_error)?;
        to_json(&AiMoveResponse { decision, applied })
    }

    /// 落下 `think_ai` 给出的决定。只在轮到电脑时可用。
    pub fn apply_ai_decision(&mut self, index: usize) -> Result<String, JsValue> {
        let resolution = self.controller.play_ai_at(index).map_err(to_js_error)?;
        to_json(&resolution)
    }

    /// 等待 `reply_delay_ms` 后给出电脑的决定，不修改当前对局。
    /// 前端拿到结果后再调用 `apply_ai_decision` 落子。
    pub fn think_ai(&mut self) -> Promise {
        let board = *self.controller.board();
        let ai = self
            .controller
            .ai_mark()
            .filter(|_| self.controller.is_ai_turn());
        let difficulty = self.agent.config().difficulty;
        let delay = self.agent.config().reply_delay_ms;
        let seed: u64 = self.agent.rng_mut().gen();

        future_to_promise(async move {
            let ai = ai.ok_or_else(|| to_js_error(RuleError::NotPlayerTurn))?;
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let mut rng = SmallRng::seed_from_u64(seed);
            let decision =
                decide(&board, difficulty, ai, ai.opponent(), &mut rng).map_err(to_js_error)?;
            let json = to_json(&decision)?;
            Ok(JsValue::from_str(&json))
        })
    }

    pub fn next_round(&mut self) -> Result<String, JsValue> {
        self.controller.start_round();
        self.state_json()
    }

    pub fn enable_ai(&mut self, difficulty: Option<String>) -> Result<String, JsValue> {
        let difficulty = parse_difficulty(difficulty.as_deref(), self.agent.config().difficulty)?;
        self.agent.set_difficulty(difficulty);
        self.controller.enable_ai(self.agent.rng_mut());
        self.state_json()
    }

    pub fn disable_ai(&mut self, player_two: Option<String>) -> Result<String, JsValue> {
        self.controller
            .disable_ai(player_two.as_deref().unwrap_or_default());
        self.state_json()
    }

    pub fn set_difficulty(&mut self, difficulty: &str) -> Result<(), JsValue> {
        let difficulty = AiDifficulty::from_str(difficulty).map_err(serde_to_js_error)?;
        self.agent.set_difficulty(difficulty);
        Ok(())
    }

    pub fn set_names(&mut self, player_one: &str, player_two: &str) -> Result<String, JsValue> {
        self.controller.rename(player_one, player_two);
        self.state_json()
    }
}

/// 以 `startingMark` 先手创建空棋盘。
#[wasm_bindgen(js_name = "newRound")]
pub fn new_round_board(starting_mark: Option<String>) -> Result<JsValue, JsValue> {
    let starting = match starting_mark.as_deref() {
        Some(value) => parse_mark(value)?,
        None => game::PLAYER_ONE_MARK,
    };
    to_value(&new_round(starting)).map_err(JsValue::from)
}

/// 返回落子后的新棋盘；非法落子抛出带标签的 `RuleError`。
#[wasm_bindgen(js_name = "applyMove")]
pub fn apply_board_move(board: JsValue, index: usize, mark: &str) -> Result<JsValue, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    let mark = parse_mark(mark)?;
    let next = apply_move(&board, index, mark).map_err(to_js_error)?;
    to_value(&next).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "evaluateBoard")]
pub fn evaluate_board(board: JsValue) -> Result<JsValue, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    to_value(&evaluate(&board)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "chooseAiMove")]
pub fn compute_ai_move(
    board: JsValue,
    difficulty: Option<String>,
    ai_mark: &str,
    human_mark: &str,
    seed: Option<u64>,
) -> Result<usize, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    let difficulty = parse_difficulty(difficulty.as_deref(), AiDifficulty::default())?;
    let ai = parse_mark(ai_mark)?;
    let human = parse_mark(human_mark)?;
    let mut rng = make_rng(seed);
    choose_ai_move(&board, difficulty, ai, human, &mut rng).map_err(to_js_error)
}
