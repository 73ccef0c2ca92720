// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn interaction_serde_round_trip() {
    let interaction = Interaction {
        interaction_id: InteractionId::new("itx-1"),
        event: Event::typed("if_add", json!({"prompt_to_user": "add 200?"})),
        worker_key: "func_1".to_string(),
        automa_id: AutomaId::new("automa-3"),
        site_index: 2,
    };
    let json = serde_json::to_string(&interaction).unwrap();
    let parsed: Interaction = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, interaction);
}

#[test]
fn exception_carries_snapshot_and_interactions() {
    let interaction = Interaction {
        interaction_id: InteractionId::new("itx-1"),
        event: Event::typed("confirm", json!(null)),
        worker_key: "ask".to_string(),
        automa_id: AutomaId::new("automa-1"),
        site_index: 0,
    };
    let exception =
        InteractionException::new(vec![interaction], Snapshot::new(b"state".to_vec()));
    assert_eq!(exception.interactions.len(), 1);
    assert_eq!(
        exception.snapshot.serialization_version,
        crate::snapshot::SERIALIZATION_VERSION
    );
}
