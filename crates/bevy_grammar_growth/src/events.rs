use bevy::prelude::*;
use crossbeam_channel::{Receiver, Sender};
use grammar_growth::prelude::{EventSink, GrowthEvent, GrowthEventKind};

/// Bevy message containing the entity of the growth job and the underlying [`GrowthEvent`].
#[derive(Message, Debug, Clone)]
pub struct GrowthMessage {
    pub job_entity: Entity,
    pub event: GrowthEvent,
}

/// Global bus for streaming growth events from running jobs into Bevy messages.
#[derive(Resource)]
pub struct GrowthBus {
    tx: Sender<GrowthMessage>,
    rx: Receiver<GrowthMessage>,
    kinds: Option<Vec<GrowthEventKind>>,
}

impl Default for GrowthBus {
    fn default() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx, kinds: None }
    }
}

impl GrowthBus {
    /// Only forward events of the listed kinds to jobs spawned afterwards.
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = GrowthEventKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn sender(&self) -> &Sender<GrowthMessage> {
        &self.tx
    }

    pub fn receiver(&self) -> &Receiver<GrowthMessage> {
        &self.rx
    }

    /// Sink forwarding events of one job onto this bus.
    pub fn sink_for(&self, job_entity: Entity) -> ChannelSink {
        ChannelSink {
            job_entity,
            tx: self.tx.clone(),
            kinds: self.kinds.clone(),
        }
    }
}

/// Event sink that forwards events to the global growth bus, tagging each event with the job entity.
pub struct ChannelSink {
    pub job_entity: Entity,
    pub tx: Sender<GrowthMessage>,
    pub kinds: Option<Vec<GrowthEventKind>>,
}

impl EventSink for ChannelSink {
    #[inline]
    fn send(&mut self, event: GrowthEvent) {
        let _ = self.tx.send(GrowthMessage {
            job_entity: self.job_entity,
            event,
        });
    }

    fn wants(&self, kind: GrowthEventKind) -> bool {
        self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }
}

pub(crate) fn drain_growth_messages(
    bus: Res<GrowthBus>,
    mut messages: ResMut<Messages<GrowthMessage>>,
) {
    while let Ok(message) = bus.receiver().try_recv() {
        messages.write(message);
    }
}
