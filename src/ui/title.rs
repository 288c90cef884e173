//! Presentation title
//!
//! Consumes outbound `Title` events. Several titles arriving between reads
//! collapse to the most recent one.

use crate::core::channel::{Listener, Outbound, OutboundEvent};

pub struct TitleSlot {
    listener: Listener<OutboundEvent>,
    current: String,
}

impl TitleSlot {
    pub fn new(outbound: &Outbound) -> Self {
        Self {
            listener: outbound.subscribe_where(OutboundEvent::is_title),
            current: String::new(),
        }
    }

    /// Take pending title events. Returns the new title if one arrived.
    pub fn refresh(&mut self) -> Option<&str> {
        let latest = self.listener.drain().into_iter().rev().find_map(|event| match event {
            OutboundEvent::Title(title) => Some(title),
            _ => None,
        })?;
        self.current = latest;
        Some(&self.current)
    }

    pub fn current(&self) -> &str {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_title_wins() {
        let outbound = Outbound::new("outbound");
        let mut slot = TitleSlot::new(&outbound);
        assert_eq!(slot.refresh(), None);

        outbound.emit(OutboundEvent::Title("make".to_string()));
        outbound.emit(OutboundEvent::Data(b"x".to_vec()));
        outbound.emit(OutboundEvent::Title("make test".to_string()));

        assert_eq!(slot.refresh(), Some("make test"));
        assert_eq!(slot.refresh(), None);
        assert_eq!(slot.current(), "make test");
    }

    #[test]
    fn test_each_title_seen_once() {
        let outbound = Outbound::new("outbound");
        let mut slot = TitleSlot::new(&outbound);

        outbound.emit(OutboundEvent::Title("a".to_string()));
        assert_eq!(slot.refresh(), Some("a"));
        outbound.emit(OutboundEvent::Title("a".to_string()));
        assert_eq!(slot.refresh(), Some("a"));
        assert_eq!(slot.refresh(), None);
    }
}
