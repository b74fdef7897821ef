use crate::error::AnalysisError;
use crate::model::analysis::NoteEvent;
use log::{debug, info};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::fs;
use std::path::Path;

pub const TICKS_PER_BEAT: u16 = 480;
const TRACK_NAME: &str = "Piano Roll";
const MICROSECONDS_PER_MINUTE: u32 = 60_000_000;

// midly stores deltas as u28 and tempo metas as u24; anything above these
// cannot be represented.
const MAX_TICK: u64 = (1 << 28) - 1;
const MAX_MICROSECONDS_PER_QUARTER: u32 = (1 << 24) - 1;

/// Builds a single-track, single-channel SMF from the note list.
///
/// Notes are emitted exactly as received: no merging, quantization, or
/// overlap resolution. Track name and tempo metas land at time 0 before any
/// note event.
pub fn encode_midi(notes: &[NoteEvent], tempo_bpm: u16) -> Result<Vec<u8>, AnalysisError> {
    let microseconds_per_quarter = MICROSECONDS_PER_MINUTE
        .checked_div(tempo_bpm as u32)
        .filter(|mpqn| *mpqn <= MAX_MICROSECONDS_PER_QUARTER)
        .ok_or_else(|| {
            AnalysisError::Encoding(format!("Tempo {tempo_bpm} BPM is not representable"))
        })?;

    let mut events: Vec<TrackEvent> = Vec::with_capacity(notes.len() * 2 + 3);

    events.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(TRACK_NAME.as_bytes())),
    });

    events.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(microseconds_per_quarter.into())),
    });

    for (i, note) in notes.iter().enumerate() {
        let (on_tick, off_tick) = note_ticks(i, note)?;
        debug!(
            "Adding note {}: pitch={} start={} duration={}",
            i + 1,
            note.midi_note,
            note.start_beat,
            note.duration_beats
        );

        events.push(TrackEvent {
            delta: (on_tick as u32).into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOn {
                    key: note.midi_note.into(),
                    vel: note.velocity.into(),
                },
            },
        });
        events.push(TrackEvent {
            delta: (off_tick as u32).into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOff {
                    key: note.midi_note.into(),
                    vel: 0.into(),
                },
            },
        });
    }

    // Deltas currently hold absolute ticks; SMF wants nondecreasing time, so
    // order by tick (stable, keeping received order within a tick) and
    // convert.
    events.sort_by_key(|e| e.delta.as_int());
    convert_to_delta_times(&mut events);

    events.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header {
            format: Format::SingleTrack,
            timing: Timing::Metrical(TICKS_PER_BEAT.into()),
        },
        tracks: vec![events],
    };

    let mut out = Vec::new();
    smf.write(&mut out)
        .map_err(|e| AnalysisError::Encoding(format!("Failed to write MIDI: {e}")))?;

    Ok(out)
}

/// Encodes the notes and writes the result to disk, overwriting any existing
/// file at `path`.
pub fn write_midi_file(
    notes: &[NoteEvent],
    path: &Path,
    tempo_bpm: u16,
) -> Result<(), AnalysisError> {
    info!(
        "Creating MIDI file with {} notes at {} BPM",
        notes.len(),
        tempo_bpm
    );

    let bytes = encode_midi(notes, tempo_bpm)?;

    info!("Writing MIDI file to: {}", path.display());
    fs::write(path, bytes).map_err(|e| {
        AnalysisError::Encoding(format!("Failed to write {}: {}", path.display(), e))
    })?;

    Ok(())
}

/// Defensive representability check. The parser already validated ranges,
/// but a tick overflow or a non-finite float must never reach the writer.
fn note_ticks(index: usize, note: &NoteEvent) -> Result<(u64, u64), AnalysisError> {
    let reject = |what: String| Err(AnalysisError::Encoding(format!("note {index}: {what}")));

    if !note.start_beat.is_finite() || note.start_beat < 0.0 {
        return reject(format!("unrepresentable start_beat {}", note.start_beat));
    }
    if !note.duration_beats.is_finite() || note.duration_beats <= 0.0 {
        return reject(format!(
            "unrepresentable duration_beats {}",
            note.duration_beats
        ));
    }

    let on_tick = (note.start_beat * TICKS_PER_BEAT as f64).round() as u64;
    let off_tick =
        ((note.start_beat + note.duration_beats) * TICKS_PER_BEAT as f64).round() as u64;

    if off_tick > MAX_TICK {
        return reject(format!("tick {off_tick} exceeds the SMF delta range"));
    }

    // Rounding may collapse a tiny duration to zero ticks; keep the pair
    // audible rather than emitting an instant on/off.
    Ok((on_tick, off_tick.max(on_tick + 1)))
}

fn convert_to_delta_times(events: &mut [TrackEvent]) {
    let mut prev_tick = 0u32;
    for event in events.iter_mut() {
        let current_tick = event.delta.as_int();
        event.delta = current_tick.saturating_sub(prev_tick).into();
        prev_tick = current_tick;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::analysis::NoteEvent;

    fn note(midi_note: u8, start_beat: f64, duration_beats: f64, velocity: u8) -> NoteEvent {
        NoteEvent {
            midi_note,
            start_beat,
            duration_beats,
            velocity,
        }
    }

    /// Replays the written file and collects (abs_tick, pitch, velocity) for
    /// every note-on, using the same reader the importer side of midly gives
    /// everyone else.
    fn note_ons(bytes: &[u8]) -> Vec<(u64, u8, u8)> {
        let smf = Smf::parse(bytes).unwrap();
        let mut result = Vec::new();
        for track in &smf.tracks {
            let mut abs: u64 = 0;
            for event in track {
                abs += event.delta.as_int() as u64;
                if let TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { key, vel },
                    ..
                } = &event.kind
                {
                    result.push((abs, key.as_int(), vel.as_int()));
                }
            }
        }
        result
    }

    #[test]
    fn empty_note_list_still_writes_a_valid_file() {
        env_logger::try_init().unwrap_or(());

        let bytes = encode_midi(&[], 120).unwrap();
        assert_eq!(&bytes[0..4], b"MThd");

        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.tracks.len(), 1);

        let mut saw_tempo = false;
        let mut saw_name = false;
        for event in &smf.tracks[0] {
            match &event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(mpqn)) => {
                    saw_tempo = true;
                    assert_eq!(mpqn.as_int(), 500_000);
                }
                TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                    saw_name = true;
                    assert_eq!(*name, b"Piano Roll");
                }
                TrackEventKind::Midi { .. } => panic!("unexpected note in empty encode"),
                _ => {}
            }
        }
        assert!(saw_tempo);
        assert!(saw_name);
    }

    #[test]
    fn round_trips_pitches_velocities_and_timing() {
        env_logger::try_init().unwrap_or(());

        // Deliberately out of time order and overlapping; the encoder must
        // not merge or drop anything.
        let notes = vec![
            note(64, 1.0, 1.0, 90),
            note(60, 0.0, 1.0, 100),
            note(60, 0.5, 2.0, 80),
            note(72, 3.25, 0.75, 127),
        ];

        let bytes = encode_midi(&notes, 120).unwrap();
        let ons = note_ons(&bytes);
        assert_eq!(ons.len(), 4);

        let mut expected: Vec<(u64, u8, u8)> = notes
            .iter()
            .map(|n| {
                (
                    (n.start_beat * TICKS_PER_BEAT as f64).round() as u64,
                    n.midi_note,
                    n.velocity,
                )
            })
            .collect();
        expected.sort_by_key(|(tick, _, _)| *tick);

        for ((tick, pitch, vel), (want_tick, want_pitch, want_vel)) in
            ons.iter().zip(expected.iter())
        {
            assert!(tick.abs_diff(*want_tick) <= 1);
            assert_eq!(pitch, want_pitch);
            assert_eq!(vel, want_vel);
        }
    }

    #[test]
    fn metas_precede_all_notes() {
        env_logger::try_init().unwrap_or(());

        let bytes = encode_midi(&[note(60, 0.0, 1.0, 100)], 90).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        let first_note = smf.tracks[0]
            .iter()
            .position(|e| matches!(e.kind, TrackEventKind::Midi { .. }))
            .unwrap();
        let name_pos = smf.tracks[0]
            .iter()
            .position(|e| matches!(e.kind, TrackEventKind::Meta(MetaMessage::TrackName(_))))
            .unwrap();
        let tempo_pos = smf.tracks[0]
            .iter()
            .position(|e| matches!(e.kind, TrackEventKind::Meta(MetaMessage::Tempo(_))))
            .unwrap();

        assert!(name_pos < first_note);
        assert!(tempo_pos < first_note);
    }

    #[test]
    fn unrepresentable_attributes_are_encoding_errors() {
        env_logger::try_init().unwrap_or(());

        let err = encode_midi(&[note(60, -1.0, 1.0, 100)], 120).unwrap_err();
        assert!(matches!(err, AnalysisError::Encoding(_)));

        let err = encode_midi(&[note(60, 0.0, f64::NAN, 100)], 120).unwrap_err();
        assert!(matches!(err, AnalysisError::Encoding(_)));

        let err = encode_midi(&[note(60, 1e9, 1.0, 100)], 120).unwrap_err();
        assert!(matches!(err, AnalysisError::Encoding(_)));

        // A tempo of 0 (or one whose tempo meta overflows) is rejected too.
        let err = encode_midi(&[], 0).unwrap_err();
        assert!(matches!(err, AnalysisError::Encoding(_)));
        let err = encode_midi(&[], 1).unwrap_err();
        assert!(matches!(err, AnalysisError::Encoding(_)));
    }

    #[test]
    fn writes_and_overwrites_the_output_file() {
        env_logger::try_init().unwrap_or(());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mid");

        write_midi_file(&[note(60, 0.0, 1.0, 100)], &path, 120).unwrap();
        let first = std::fs::read(&path).unwrap();
        assert_eq!(&first[0..4], b"MThd");

        write_midi_file(&[], &path, 120).unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_ne!(first, second);
    }
}
