//! 会话配置。前端以 JSON 字符串传入，缺省字段使用默认值。

use serde::{Deserialize, Serialize};

use crate::ai::AiConfig;
use crate::game::{GameMode, DEFAULT_PLAYER_ONE, DEFAULT_PLAYER_TWO};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: GameMode,
    pub player_one: String,
    pub player_two: String,
    pub ai: AiConfig,
    /// 固定随机种子，便于复现；缺省时取系统熵。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: GameMode::default(),
            player_one: DEFAULT_PLAYER_ONE.to_string(),
            player_two: DEFAULT_PLAYER_TWO.to_string(),
            ai: AiConfig::default(),
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiDifficulty, DEFAULT_REPLY_DELAY_MS};

    #[test]
    fn empty_object_uses_defaults() {
        let config = SessionConfig::from_json("{}").expect("empty object is valid");
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.ai.reply_delay_ms, DEFAULT_REPLY_DELAY_MS);
    }

    #[test]
    fn partial_ai_section_is_merged() {
        let config = SessionConfig::from_json(
            r#"{"mode":"ai","player_one":"Ada","ai":{"difficulty":"hard"},"seed":7}"#,
        )
        .expect("config should parse");

        assert_eq!(config.mode, GameMode::VsAi);
        assert_eq!(config.player_one, "Ada");
        assert_eq!(config.player_two, DEFAULT_PLAYER_TWO);
        assert_eq!(config.ai.difficulty, AiDifficulty::Hard);
        assert_eq!(config.ai.reply_delay_ms, DEFAULT_REPLY_DELAY_MS);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn unknown_difficulty_is_an_error() {
        assert!(SessionConfig::from_json(r#"{"ai":{"difficulty":"godlike"}}"#).is_err());
    }
}
