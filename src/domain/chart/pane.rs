//! Pane occupancy.
//!
//! Pane 0 is the price pane and always exists. Every other pane holds at
//! least one indicator and panes stay contiguously indexed: emptying a pane
//! removes it and shifts the panes below it up by one.

use crate::domain::chart::series::Placement;
use crate::domain::error::StratifyError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneLayout {
    panes: Vec<Vec<String>>,
}

/// Outcome of taking an indicator off the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneRemoval {
    pub pane: usize,
    /// The pane emptied and was removed.
    pub pane_removed: bool,
}

impl Default for PaneLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl PaneLayout {
    pub fn new() -> Self {
        Self {
            panes: vec![Vec::new()],
        }
    }

    pub fn len(&self) -> usize {
        self.panes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panes.iter().all(Vec::is_empty)
    }

    pub fn occupants(&self, pane: usize) -> &[String] {
        self.panes.get(pane).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn pane_of(&self, indicator_id: &str) -> Option<usize> {
        self.panes
            .iter()
            .position(|ids| ids.iter().any(|id| id == indicator_id))
    }

    /// Records `indicator_id` and returns the pane it lands on.
    pub fn place(&mut self, indicator_id: &str, placement: Placement) -> usize {
        match placement {
            Placement::Overlay => {
                self.panes[0].push(indicator_id.to_string());
                0
            }
            Placement::NewPane => {
                self.panes.push(vec![indicator_id.to_string()]);
                self.panes.len() - 1
            }
        }
    }

    pub fn remove(&mut self, indicator_id: &str) -> Option<PaneRemoval> {
        let pane = self.pane_of(indicator_id)?;
        self.panes[pane].retain(|id| id != indicator_id);
        let pane_removed = pane > 0 && self.panes[pane].is_empty();
        if pane_removed {
            self.panes.remove(pane);
        }
        Some(PaneRemoval { pane, pane_removed })
    }

    pub fn can_move_up(&self, pane: usize) -> bool {
        pane >= 2 && pane < self.panes.len()
    }

    pub fn can_move_down(&self, pane: usize) -> bool {
        pane >= 1 && pane + 1 < self.panes.len()
    }

    /// Swaps `pane` with the one above it; returns the new index.
    pub fn move_up(&mut self, pane: usize) -> Result<usize, StratifyError> {
        if !self.can_move_up(pane) {
            return Err(StratifyError::validation("pane", format!("pane {pane} cannot move up")));
        }
        self.panes.swap(pane, pane - 1);
        Ok(pane - 1)
    }

    /// Swaps `pane` with the one below it; returns the new index.
    pub fn move_down(&mut self, pane: usize) -> Result<usize, StratifyError> {
        if !self.can_move_down(pane) {
            return Err(StratifyError::validation("pane", format!("pane {pane} cannot move down")));
        }
        self.panes.swap(pane, pane + 1);
        Ok(pane + 1)
    }

    pub fn clear(&mut self) {
        self.panes.truncate(1);
        self.panes[0].clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> PaneLayout {
        let mut layout = PaneLayout::new();
        layout.place("sma", Placement::Overlay);
        layout.place("rsi", Placement::NewPane);
        layout.place("macd", Placement::NewPane);
        layout.place("aroon", Placement::NewPane);
        layout
    }

    #[test]
    fn overlays_share_the_price_pane() {
        let mut layout = layout();
        assert_eq!(layout.place("ema", Placement::Overlay), 0);
        assert_eq!(layout.occupants(0), ["sma".to_string(), "ema".to_string()]);
        assert_eq!(layout.len(), 4);
    }

    #[test]
    fn removing_a_pane_shifts_later_panes_up() {
        let mut layout = layout();
        let removal = layout.remove("rsi").unwrap();
        assert_eq!(removal, PaneRemoval { pane: 1, pane_removed: true });
        assert_eq!(layout.len(), 3);
        assert_eq!(layout.pane_of("macd"), Some(1));
        assert_eq!(layout.pane_of("aroon"), Some(2));
    }

    #[test]
    fn removing_an_overlay_keeps_the_price_pane() {
        let mut layout = layout();
        let removal = layout.remove("sma").unwrap();
        assert!(!removal.pane_removed);
        assert_eq!(layout.len(), 4);
        assert!(layout.occupants(0).is_empty());
        assert_eq!(layout.remove("missing"), None);
    }

    #[test]
    fn panes_never_move_onto_the_price_pane() {
        let mut layout = layout();
        assert!(layout.move_up(1).is_err());
        assert!(layout.move_down(0).is_err());
        assert!(layout.move_down(3).is_err());
        assert_eq!(layout.move_up(3).unwrap(), 2);
        assert_eq!(layout.pane_of("aroon"), Some(2));
        assert_eq!(layout.pane_of("macd"), Some(3));
        assert_eq!(layout.move_down(1).unwrap(), 2);
        assert_eq!(layout.pane_of("rsi"), Some(2));
    }
}
