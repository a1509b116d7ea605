//! The persisted match record handed to the result sink.

use serde::{Deserialize, Serialize};

use rampart_protocol::{Phase, Side};

use crate::state::Battle;

/// Final scoreboard of one finished match, in the schema the external
/// persistence layer expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub player1_id: String,
    pub player2_id: String,
    pub player1_name: String,
    pub player2_name: String,
    pub player1_deck: Vec<String>,
    pub player2_deck: Vec<String>,
    /// 1 if player1 won, 2 if player2 won.
    pub winner_player_num: u8,
    pub player1_castle_hp: i32,
    pub player2_castle_hp: i32,
    pub player1_kills: u32,
    pub player2_kills: u32,
    /// Whole seconds of play, floored.
    pub battle_duration: u64,
    pub win_reason: String,
}

impl MatchRecord {
    /// Snapshots a finished battle. Returns `None` unless the battle is
    /// finished with both players still seated and a winner decided, so
    /// callers must build the record before unseating the loser.
    pub fn from_battle(battle: &Battle) -> Option<Self> {
        if battle.phase() != Phase::Finished {
            return None;
        }
        let p1 = battle.player_by_side(Side::Player1)?;
        let p2 = battle.player_by_side(Side::Player2)?;
        let winner = battle.winner()?;
        let win_reason = battle.win_reason()?;
        let winner_player_num = if winner == &p1.session_id { 1 } else { 2 };

        Some(Self {
            player1_id: p1.external_player_id.clone(),
            player2_id: p2.external_player_id.clone(),
            player1_name: p1.display_name.clone(),
            player2_name: p2.display_name.clone(),
            player1_deck: p1.deck.clone(),
            player2_deck: p2.deck.clone(),
            winner_player_num,
            player1_castle_hp: p1.castle_hp,
            player2_castle_hp: p2.castle_hp,
            player1_kills: p1.kills,
            player2_kills: p2.kills,
            battle_duration: (battle.game_time_ms() / 1000.0) as u64,
            win_reason: win_reason.to_string(),
        })
    }
}
