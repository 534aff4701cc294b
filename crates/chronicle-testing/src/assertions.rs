use chronicle_types::{EventType, SessionEvent};

/// Assert the chain invariants: root is `session.start` at sequence 0 with
/// no parent; sequences are dense; every parent pointer names its
/// predecessor; all events share one session.
pub fn assert_valid_chain(chain: &[SessionEvent]) {
    let Some(root) = chain.first() else {
        return;
    };

    assert_eq!(
        root.event_type,
        EventType::SessionStart,
        "root must be session.start"
    );
    assert_eq!(root.sequence, 0, "root sequence must be 0");
    assert!(root.parent_id.is_none(), "root must have no parent");

    for (i, event) in chain.iter().enumerate().skip(1) {
        assert_eq!(
            event.sequence,
            chain[i - 1].sequence + 1,
            "sequence gap at {}",
            event.id
        );
        assert_eq!(
            event.parent_id.as_ref(),
            Some(&chain[i - 1].id),
            "broken parent chain at {}",
            event.id
        );
        assert_eq!(
            event.session_id, root.session_id,
            "chain crosses sessions at {}",
            event.id
        );
    }
}
