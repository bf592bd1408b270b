use thiserror::Error;
use tracing::info;

use crate::progress::PlayerProgress;
use crate::types::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopItemKind {
    Theme(Theme),
    Shield,
    PowerUpBoost,
    DoubleTapCard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShopItem {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub cost: u64,
    pub kind: ShopItemKind,
}

pub const SHOP_ITEMS: &[ShopItem] = &[
    ShopItem {
        id: "theme-sunset",
        name: "Sunset Theme",
        description: "Warm orange and purple gradient",
        cost: 2500,
        kind: ShopItemKind::Theme(Theme::Sunset),
    },
    ShopItem {
        id: "theme-ocean",
        name: "Ocean Theme",
        description: "Cool blue and turquoise vibes",
        cost: 2500,
        kind: ShopItemKind::Theme(Theme::Ocean),
    },
    ShopItem {
        id: "theme-forest",
        name: "Forest Theme",
        description: "Natural green and earthy tones",
        cost: 2500,
        kind: ShopItemKind::Theme(Theme::Forest),
    },
    ShopItem {
        id: "golden-theme",
        name: "Golden Theme",
        description: "Luxurious gold theme",
        cost: 10000,
        kind: ShopItemKind::Theme(Theme::Golden),
    },
    ShopItem {
        id: "shield-boost",
        name: "Shield Boost",
        description: "Start next game with a shield",
        cost: 200,
        kind: ShopItemKind::Shield,
    },
    ShopItem {
        id: "powerup-boost",
        name: "Power-Up Starter",
        description: "Start with a random power-up",
        cost: 250,
        kind: ShopItemKind::PowerUpBoost,
    },
    ShopItem {
        id: "double-tap-card",
        name: "Double Tap Card",
        description: "2x score for an entire game (1 use)",
        cost: 500,
        kind: ShopItemKind::DoubleTapCard,
    },
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PurchaseError {
    #[error("not enough coins: {name} costs {needed}, balance is {available}")]
    InsufficientCoins {
        name: &'static str,
        needed: u64,
        available: u64,
    },
    #[error("{0} is already owned")]
    AlreadyOwned(&'static str),
    #[error("no shop item with id {0:?}")]
    UnknownItem(String),
}

pub fn find_item(id: &str) -> Option<&'static ShopItem> {
    SHOP_ITEMS.iter().find(|item| item.id == id)
}

/// Whether the player already owns a one-time item
pub fn is_owned(progress: &PlayerProgress, item: &ShopItem) -> bool {
    match item.kind {
        ShopItemKind::Theme(theme) => progress.inventory.owns_theme(theme),
        _ => false,
    }
}

/// Debits the item's cost and grants it
pub fn purchase(
    progress: &mut PlayerProgress,
    item_id: &str,
) -> Result<&'static ShopItem, PurchaseError> {
    let item = find_item(item_id).ok_or_else(|| PurchaseError::UnknownItem(item_id.to_string()))?;
    if progress.coins < item.cost {
        return Err(PurchaseError::InsufficientCoins {
            name: item.name,
            needed: item.cost,
            available: progress.coins,
        });
    }
    if is_owned(progress, item) {
        return Err(PurchaseError::AlreadyOwned(item.name));
    }

    progress.coins -= item.cost;
    let inventory = &mut progress.inventory;
    match item.kind {
        ShopItemKind::Theme(theme) => inventory.unlocked_themes.push(theme),
        ShopItemKind::Shield => inventory.shields = inventory.shields.saturating_add(1),
        ShopItemKind::PowerUpBoost => {
            inventory.power_up_boosts = inventory.power_up_boosts.saturating_add(1)
        }
        ShopItemKind::DoubleTapCard => {
            inventory.double_tap_cards = inventory.double_tap_cards.saturating_add(1)
        }
    }
    info!(item = item.id, cost = item.cost, balance = progress.coins, "purchase");
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn rich(coins: u64) -> PlayerProgress {
        PlayerProgress {
            coins,
            ..PlayerProgress::default()
        }
    }

    #[test]
    fn buying_a_theme_debits_and_grants() {
        let mut progress = rich(3000);
        let item = purchase(&mut progress, "theme-ocean").unwrap();

        assert_eq!(item.cost, 2500);
        assert_eq!(progress.coins, 500);
        assert!(progress.inventory.owns_theme(Theme::Ocean));
    }

    #[test]
    fn owned_theme_is_refused_without_charge() {
        let mut progress = rich(6000);
        purchase(&mut progress, "theme-forest").unwrap();

        let err = purchase(&mut progress, "theme-forest").unwrap_err();
        assert_eq!(err, PurchaseError::AlreadyOwned("Forest Theme"));
        assert_eq!(progress.coins, 3500);
        assert_eq!(
            progress
                .inventory
                .unlocked_themes
                .iter()
                .filter(|t| **t == Theme::Forest)
                .count(),
            1
        );
    }

    #[test]
    fn consumables_stack() {
        let mut progress = rich(1000);
        purchase(&mut progress, "shield-boost").unwrap();
        purchase(&mut progress, "shield-boost").unwrap();
        purchase(&mut progress, "powerup-boost").unwrap();

        assert_eq!(progress.inventory.shields, 2);
        assert_eq!(progress.inventory.power_up_boosts, 1);
        assert_eq!(progress.coins, 350);
    }

    #[test]
    fn insufficient_coins_leaves_progress_untouched() {
        let mut progress = rich(499);
        let before = progress.clone();
        let err = purchase(&mut progress, "double-tap-card").unwrap_err();

        assert_matches!(err, PurchaseError::InsufficientCoins { needed: 500, available: 499, .. });
        assert_eq!(progress, before);
    }

    #[test]
    fn unknown_item() {
        let mut progress = rich(10);
        assert_matches!(
            purchase(&mut progress, "coin-multiplier"),
            Err(PurchaseError::UnknownItem(id)) if id == "coin-multiplier"
        );
    }
}
