use serde::{Deserialize, Serialize};

use crate::{LinkId, SpaceId};

/// Fire-and-forget counter adjustments, published by the services and
/// consumed by the reconciler on its own task. Publishers never wait for
/// the write to land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CounterEvent {
    /// A member liked (+1) or unliked (-1) a link.
    LinkLike { link_id: LinkId, delta: i64 },

    /// A member viewed a space's detail page.
    SpaceView { space_id: SpaceId },

    /// A member scrapped a space into their own collection.
    SpaceScrap { space_id: SpaceId },
}

impl CounterEvent {
    /// Short name used in logs and dead-letter records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LinkLike { .. } => "link_like",
            Self::SpaceView { .. } => "space_view",
            Self::SpaceScrap { .. } => "space_scrap",
        }
    }

    pub fn target_id(&self) -> i64 {
        match self {
            Self::LinkLike { link_id, .. } => *link_id,
            Self::SpaceView { space_id } | Self::SpaceScrap { space_id } => *space_id,
        }
    }

    pub fn delta(&self) -> i64 {
        match self {
            Self::LinkLike { delta, .. } => *delta,
            Self::SpaceView { .. } | Self::SpaceScrap { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_tagged() {
        let event = CounterEvent::LinkLike {
            link_id: 7,
            delta: -1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "LinkLike");
        assert_eq!(json["data"]["delta"], -1);
    }

    #[test]
    fn view_and_scrap_are_plus_one() {
        assert_eq!(CounterEvent::SpaceView { space_id: 1 }.delta(), 1);
        assert_eq!(CounterEvent::SpaceScrap { space_id: 1 }.delta(), 1);
    }
}
