//! The record composer: builds one structured document per event, serializes it into a
//! scratch buffer allocated once and reused across the process lifetime, and hands the
//! resulting bytes to the transport dispatcher.

use crate::event::{EventDescriptor, ExtraValue, GameObject};
use crate::logging::{self, Logger};
use crate::session::SessionId;
use serde_json::{json, Map, Value};

/// Scratch buffer size: one byte of headroom over `MAX_RECORD_LEN` for the stream-framed
/// transports' trailing `\n`.
pub const SCRATCH_BUFFER_SIZE: usize = 1024;
/// The hard cap on a serialized record, one below a conservative MTU.
pub const MAX_RECORD_LEN: usize = 1023;

/// The game-clock timestamp pair every record carries.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub millis: u64,
    pub tic: u64,
}

/// Builds and serializes records into a single reusable buffer. One `Composer` is created per
/// session and lives until `stop_telemetry`; it never allocates on the hot path except for the
/// transient `serde_json::Map` assembled per call (the composer must free that document, but
/// never the borrowed `extra` value it references).
pub struct Composer {
    scratch: Vec<u8>,
    log: Logger,
}

impl Composer {
    pub fn new(log: Logger) -> Composer {
        Composer {
            scratch: vec![0u8; SCRATCH_BUFFER_SIZE],
            log,
        }
    }

    /// Composes `event` into the scratch buffer and returns the serialized slice, or `None` if
    /// the record had to be dropped (serialization failure or oversize payload, both logged,
    /// neither fatal; telemetry stays enabled and the caller's sequence counter still advanced
    /// before this was called).
    ///
    /// An oversize payload here is genuinely a record schema problem rather than a transport
    /// or connectivity failure, so there's an argument for treating it the same as a setup
    /// failure. It's handled as a runtime drop instead: the payload shape is controlled by this
    /// crate's own call sites, so a single oversize event is far more likely to be one unusually
    /// large `extra` value than a sign the whole pipeline is misconfigured, and tearing down
    /// telemetry mid-run over one dropped record would cost more than it buys.
    pub fn compose(
        &mut self,
        event: &EventDescriptor<'_>,
        session: &SessionId,
        sequence: u32,
        frame: Frame,
        terminate_with_newline: bool,
    ) -> Option<&[u8]> {
        let mut doc = Map::new();

        doc.insert("counter".to_string(), json!(sequence));
        doc.insert("session".to_string(), json!(session.as_str()));
        doc.insert("type".to_string(), json!(event.kind.as_str()));
        doc.insert(
            "frame".to_string(),
            json!({ "millis": frame.millis, "tic": frame.tic }),
        );

        if let Some(actor) = event.actor {
            doc.insert("actor".to_string(), object_to_json(actor));
        }
        if let Some(target) = event.target {
            doc.insert("target".to_string(), object_to_json(target));
        }
        if let Some(extra) = &event.extra {
            doc.insert(extra.key.to_string(), extra_to_json(&extra.value));
        }

        let serialized = match serde_json::to_vec(&Value::Object(doc)) {
            Ok(bytes) => bytes,
            Err(err) => {
                logging::warn!(self.log, "failed to serialize telemetry record";
                    "error" => err.to_string());
                return None;
            }
        };

        if serialized.len() > MAX_RECORD_LEN {
            logging::warn!(self.log, "telemetry record exceeds maximum size, dropping";
                "size" => serialized.len(), "max" => MAX_RECORD_LEN);
            return None;
        }

        self.scratch[..serialized.len()].copy_from_slice(&serialized);
        let mut len = serialized.len();

        if terminate_with_newline {
            self.scratch[len] = b'\n';
            len += 1;
        }

        Some(&self.scratch[..len])
    }

    /// Zeroes the scratch buffer. Called by the dispatcher after every `write_record`.
    pub fn clear(&mut self) {
        for byte in self.scratch.iter_mut() {
            *byte = 0;
        }
    }
}

fn object_to_json(obj: &GameObject) -> Value {
    let mut map = Map::new();
    map.insert(
        "position".to_string(),
        json!({
            "x": obj.position.x,
            "y": obj.position.y,
            "z": obj.position.z,
            "angle": obj.position.angle,
            "subsector": obj.position.subsector,
        }),
    );
    map.insert("type".to_string(), json!(obj.kind.as_str()));
    map.insert("health".to_string(), json!(obj.health));
    if let Some(armor) = obj.armor {
        map.insert("armor".to_string(), json!(armor));
    }
    map.insert("id".to_string(), json!(obj.id));
    Value::Object(map)
}

fn extra_to_json(value: &ExtraValue<'_>) -> Value {
    match value {
        ExtraValue::Int(v) => json!(v),
        ExtraValue::Map(v) => (*v).clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EnemyKind, EventKind, Extra, ObjectKind, Position};
    use serde_json::json;

    fn player(id: u64) -> GameObject {
        GameObject {
            id,
            position: Position { x: 12.0, y: 13.0, z: 0.0, angle: 180.0, subsector: 7 },
            kind: ObjectKind::Player,
            health: 10,
            armor: Some(20),
        }
    }

    fn enemy(id: u64, kind: EnemyKind, health: i32) -> GameObject {
        GameObject {
            id,
            position: Position { x: 0.0, y: 0.0, z: 0.0, angle: 0.0, subsector: 3 },
            kind: ObjectKind::Enemy(kind),
            health,
            armor: None,
        }
    }

    #[test]
    fn start_level_record_has_exactly_the_expected_fields() {
        let mut composer = Composer::new(logging::discard());
        let session = SessionId::generate().unwrap();
        let actor = player(1);
        let level = json!({ "episode": 1, "level": 1, "difficulty": 2 });
        let extra = Extra { key: "level", value: ExtraValue::Map(&level) };

        let event = EventDescriptor::new(EventKind::StartLevel)
            .with_actor(&actor)
            .with_extra(extra);

        let bytes = composer
            .compose(&event, &session, 0, Frame { millis: 1000, tic: 0 }, false)
            .unwrap();
        let parsed: Value = serde_json::from_slice(bytes).unwrap();
        let obj = parsed.as_object().unwrap();

        assert_eq!(obj.len(), 6);
        assert_eq!(obj["counter"], 0);
        assert_eq!(obj["session"], session.as_str());
        assert_eq!(obj["type"], "start_level");
        assert_eq!(obj["frame"], json!({ "millis": 1000, "tic": 0 }));
        assert_eq!(obj["level"], level);
        assert_eq!(obj["actor"]["type"], "player");
        assert_eq!(obj["actor"]["health"], 10);
        assert_eq!(obj["actor"]["armor"], 20);
        assert_eq!(obj["actor"]["position"]["subsector"], 7);
    }

    #[test]
    fn kill_record_names_victim_type_and_health() {
        let mut composer = Composer::new(logging::discard());
        let session = SessionId::generate().unwrap();
        let actor = player(1);
        let target = enemy(2, EnemyKind::ShotgunSoldier, 25);

        let event = EventDescriptor::new(EventKind::Killed)
            .with_actor(&actor)
            .with_target(&target);

        let bytes = composer
            .compose(&event, &session, 1, Frame { millis: 2000, tic: 35 }, false)
            .unwrap();
        let parsed: Value = serde_json::from_slice(bytes).unwrap();

        assert_eq!(parsed["type"], "killed");
        assert_eq!(parsed["counter"], 1);
        assert_eq!(parsed["actor"]["type"], "player");
        assert_eq!(parsed["target"]["type"], "shotgun_soldier");
        assert_eq!(parsed["target"]["health"], 25);
        assert!(parsed["target"].get("armor").is_none());
    }

    #[test]
    fn hit_record_carries_top_level_extra_scalar() {
        let mut composer = Composer::new(logging::discard());
        let session = SessionId::generate().unwrap();
        let extra = Extra { key: "damage", value: ExtraValue::Int(17) };
        let event = EventDescriptor::new(EventKind::Hit).with_extra(extra);

        let bytes = composer
            .compose(&event, &session, 2, Frame { millis: 3000, tic: 70 }, false)
            .unwrap();
        let parsed: Value = serde_json::from_slice(bytes).unwrap();

        assert_eq!(parsed["type"], "hit");
        assert_eq!(parsed["damage"], 17);
    }

    #[test]
    fn stream_framed_records_get_a_trailing_newline() {
        let mut composer = Composer::new(logging::discard());
        let session = SessionId::generate().unwrap();
        let event = EventDescriptor::new(EventKind::Move);

        let bytes = composer
            .compose(&event, &session, 0, Frame { millis: 0, tic: 0 }, true)
            .unwrap()
            .to_vec();

        assert_eq!(*bytes.last().unwrap(), b'\n');
        serde_json::from_slice::<Value>(&bytes[..bytes.len() - 1]).unwrap();
    }

    #[test]
    fn sequence_increments_across_three_compositions() {
        let mut composer = Composer::new(logging::discard());
        let session = SessionId::generate().unwrap();

        for counter in 0..3u32 {
            let event = EventDescriptor::new(EventKind::Move);
            let bytes = composer
                .compose(&event, &session, counter, Frame { millis: 0, tic: counter as u64 }, false)
                .unwrap();
            let parsed: Value = serde_json::from_slice(bytes).unwrap();
            assert_eq!(parsed["counter"], counter);
        }
    }

    #[test]
    fn largest_fixture_record_stays_well_under_the_cap() {
        let mut composer = Composer::new(logging::discard());
        let session = SessionId::generate().unwrap();
        let actor = player(1);
        let target = enemy(2, EnemyKind::CacodemonFireball, 100);
        let level = json!({ "episode": 3, "level": 9, "difficulty": 4 });
        let extra = Extra { key: "level", value: ExtraValue::Map(&level) };

        let event = EventDescriptor::new(EventKind::Killed)
            .with_actor(&actor)
            .with_target(&target)
            .with_extra(extra);

        let bytes = composer
            .compose(&event, &session, u32::MAX, Frame { millis: u64::MAX, tic: u64::MAX }, true)
            .unwrap();

        assert!(bytes.len() <= 1020, "record of {} bytes exceeds the 1020-byte fixture budget", bytes.len());
    }

    #[test]
    fn clear_zeroes_the_scratch_buffer() {
        let mut composer = Composer::new(logging::discard());
        let session = SessionId::generate().unwrap();
        let event = EventDescriptor::new(EventKind::Move);

        composer
            .compose(&event, &session, 0, Frame { millis: 1, tic: 1 }, false)
            .unwrap();
        composer.clear();

        assert!(composer.scratch.iter().all(|&byte| byte == 0));
    }
}
