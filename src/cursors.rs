// Copyright (c) 2023 Mike Tsao. All rights reserved.

use tickwalk_core::{
    sequence::{Sequence, TrackEvent},
    time::MidiTicks,
};

/// One read position per track. Positions only move forward, and every event
/// is handed out exactly once.
#[derive(Clone, Debug, Default)]
pub struct TrackCursorSet {
    positions: Vec<usize>,
    dispatched: usize,
}
impl TrackCursorSet {
    pub fn new_with(sequence: &Sequence) -> Self {
        Self {
            positions: vec![0; sequence.tracks().len()],
            dispatched: 0,
        }
    }

    /// Visits every not-yet-visited event at `current`, track by track in
    /// index order and in file order within a track. Returns the earliest
    /// later tick any track still has, or `None` once every track is done.
    ///
    /// If `visit` fails, the failing event still counts as visited, and the
    /// error comes back right away. Calling again with the same `current`
    /// picks up where this call left off.
    pub fn advance_all<E>(
        &mut self,
        sequence: &Sequence,
        current: MidiTicks,
        mut visit: impl FnMut(usize, &TrackEvent) -> Result<(), E>,
    ) -> Result<Option<MidiTicks>, E> {
        let mut next: Option<MidiTicks> = None;
        for (index, track) in sequence.tracks().iter().enumerate() {
            let events = track.events();
            let Some(position) = self.positions.get_mut(index) else {
                continue;
            };
            while let Some(event) = events.get(*position) {
                if event.tick > current {
                    next = Some(next.map_or(event.tick, |n| n.min(event.tick)));
                    break;
                }
                *position += 1;
                if event.tick < current {
                    debug_assert!(
                        false,
                        "track {index} event at {} is behind the cursor at {current}",
                        event.tick
                    );
                    log::error!(
                        "track {index}: skipping event at {} that was due before {current}",
                        event.tick
                    );
                    continue;
                }
                self.dispatched += 1;
                visit(index, event)?;
            }
        }
        Ok(next)
    }

    pub fn is_exhausted(&self, sequence: &Sequence) -> bool {
        sequence
            .tracks()
            .iter()
            .zip(self.positions.iter())
            .all(|(track, position)| *position >= track.len())
    }

    /// Index of the next unvisited event in the given track.
    pub fn position(&self, track: usize) -> Option<usize> {
        self.positions.get(track).copied()
    }

    /// How many events have been visited, failures included.
    pub fn dispatched_count(&self) -> usize {
        self.dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickwalk_core::{
        midi::Message,
        sequence::{Sequence, Track},
    };

    fn note(tick: u64, key: u8) -> TrackEvent {
        TrackEvent::new_with(tick, Message::note_on(0, key, 100))
    }

    fn key_of(event: &TrackEvent) -> u8 {
        match event.message {
            Message::Channel {
                message: tickwalk_core::midi::MidiMessage::NoteOn { key, .. },
                ..
            } => key.as_int(),
            _ => panic!("expected a note"),
        }
    }

    fn sequence() -> Sequence {
        Sequence::new_with(
            96,
            vec![
                Track::from(vec![note(0, 1), note(10, 2), note(10, 3)]),
                Track::from(vec![note(0, 4), note(5, 5), note(10, 6)]),
                Track::default(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn walks_ticks_in_order_with_stable_ties() {
        let sequence = sequence();
        let mut cursors = TrackCursorSet::new_with(&sequence);
        let mut seen = Vec::default();
        let mut current = MidiTicks(0);
        let mut ticks = vec![current];
        while let Some(next) = cursors
            .advance_all::<()>(&sequence, current, |track, event| {
                seen.push((track, key_of(event)));
                Ok(())
            })
            .unwrap()
        {
            current = next;
            ticks.push(current);
        }
        assert_eq!(ticks, vec![MidiTicks(0), MidiTicks(5), MidiTicks(10)]);
        assert_eq!(seen, vec![(0, 1), (1, 4), (1, 5), (0, 2), (0, 3), (1, 6)]);
        assert!(cursors.is_exhausted(&sequence));
        assert_eq!(cursors.dispatched_count(), sequence.event_count());
    }

    #[test]
    fn nothing_is_visited_twice() {
        let sequence = sequence();
        let mut cursors = TrackCursorSet::new_with(&sequence);
        let mut count = 0;
        for _ in 0..3 {
            let next = cursors
                .advance_all::<()>(&sequence, MidiTicks(0), |_, _| {
                    count += 1;
                    Ok(())
                })
                .unwrap();
            assert_eq!(next, Some(MidiTicks(5)));
        }
        assert_eq!(count, 2);
        assert_eq!(cursors.position(1), Some(1));
    }

    #[test]
    fn failure_resumes_at_the_next_event() {
        let sequence = sequence();
        let mut cursors = TrackCursorSet::new_with(&sequence);
        assert_eq!(
            cursors.advance_all(&sequence, MidiTicks(0), |track, _| {
                if track == 0 {
                    Err("boom")
                } else {
                    Ok(())
                }
            }),
            Err("boom")
        );
        assert_eq!(cursors.position(0), Some(1));
        assert_eq!(cursors.position(1), Some(0));

        let mut seen = Vec::default();
        let next = cursors
            .advance_all::<()>(&sequence, MidiTicks(0), |track, event| {
                seen.push((track, key_of(event)));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![(1, 4)]);
        assert_eq!(next, Some(MidiTicks(5)));
        assert_eq!(cursors.dispatched_count(), 2);
    }

    #[test]
    fn empty_sequence_is_exhausted_immediately() {
        let sequence = Sequence::new_with(96, vec![]).unwrap();
        let mut cursors = TrackCursorSet::new_with(&sequence);
        assert!(cursors.is_exhausted(&sequence));
        assert_eq!(
            cursors.advance_all::<()>(&sequence, MidiTicks(0), |_, _| Ok(())),
            Ok(None)
        );
    }
}
