//! Deck construction limits and user-facing notices.
//!
//! These values mirror the rules enforced by the remote validator. The
//! client only applies them as structural caps while a deck is assembled;
//! the server stays authoritative for legality.

// Logging keys -------------------------------------------------------------
pub(crate) const DEBUG_ENV_VAR: &str = "DECKFORGE_DEBUG_LOGS";

// Composition limits -------------------------------------------------------
/// Number of distinct character cards a complete deck holds.
pub const MAX_CHARACTERS: usize = 3;
/// Number of action cards a complete deck holds.
pub const MAX_ACTION_CARDS: u32 = 30;
/// Copies of a single action card allowed in one deck.
pub const MAX_COPIES_PER_ACTION: u8 = 2;
/// Total cards of a complete deck.
pub const DECK_SIZE: u32 = 33;

// Catalog ------------------------------------------------------------------
/// Catalog type tag the card service uses for character cards.
pub const CHARACTER_CARD_TYPE: &str = "角色牌";
/// Catalog filter tag covering every non-character card.
pub const ACTION_CARD_TYPE: &str = "非角色牌";

// Notices ------------------------------------------------------------------
pub const NOTICE_CHARACTER_CAP: &str = "角色牌最多只能选择3张不同角色！";
pub const NOTICE_ACTION_TOTAL_CAP: &str = "行动牌已达到30张的上限！";
pub const NOTICE_ACTION_COPY_CAP: &str = "每张行动牌最多只能选择2张！";
pub const NOTICE_EMPTY_DECK: &str = "暂无卡牌";
pub const NOTICE_NO_TITLE: &str = "无称号";
pub const NOTICE_NAME_REQUIRED: &str = "请输入卡组名称";

#[cfg(debug_assertions)]
pub(crate) fn debug_log_enabled() -> bool {
    matches!(std::env::var(DEBUG_ENV_VAR), Ok(val) if val != "0")
}

#[cfg(not(debug_assertions))]
pub(crate) const fn debug_log_enabled() -> bool {
    false
}
