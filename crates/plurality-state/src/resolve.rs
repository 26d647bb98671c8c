//! Trust resolution - one value out of many authors' assertions
//!
//! Precedence, first match wins:
//! 1. The viewer's own assertion
//! 2. The owning author's assertion about their own entity
//! 3. The plurality value across every author

use serde_json::Value;

use plurality_core::comparable;

use crate::AggregateSnapshot;

/// Which rule picked the value
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution<'a> {
    /// The viewer assigned this value themselves
    Viewer(&'a Value),
    /// The entity's owner assigned it
    Owner(&'a Value),
    /// Most common comparable value
    Plurality(&'a str),
    Unresolved,
}

impl Resolution<'_> {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Resolution::Viewer(v) | Resolution::Owner(v) => Some(v.clone()),
            Resolution::Plurality(s) => Some(Value::String(s.to_owned())),
            Resolution::Unresolved => None,
        }
    }
}

/// Decide which rule applies for this viewer and owner
pub fn decide<'a>(snapshot: &'a AggregateSnapshot, viewer: &str, owner: Option<&str>) -> Resolution<'a> {
    if let Some(value) = snapshot.get(viewer) {
        return Resolution::Viewer(value);
    }

    if let Some(value) = owner.and_then(|owner| snapshot.get(owner)) {
        return Resolution::Owner(value);
    }

    match highest_rank(snapshot) {
        Some(value) => Resolution::Plurality(value),
        None => Resolution::Unresolved,
    }
}

/// Resolve a snapshot to one value
pub fn resolve(snapshot: &AggregateSnapshot, viewer: &str, owner: Option<&str>) -> Option<Value> {
    decide(snapshot, viewer, owner).into_value()
}

/// Most common comparable value in the snapshot.
///
/// Ties go to whichever value reached the winning count first while walking
/// the snapshot in insertion order; a later value must strictly exceed the
/// leader's count to take over.
pub fn highest_rank(snapshot: &AggregateSnapshot) -> Option<&str> {
    let mut tally: Vec<(&str, usize)> = Vec::new();
    let mut leader: Option<&str> = None;
    let mut leader_count = 0;

    for (_, value) in snapshot.iter() {
        let Some(candidate) = comparable(value) else {
            continue;
        };

        let count = match tally.iter_mut().find(|(v, _)| *v == candidate) {
            Some((_, count)) => {
                *count += 1;
                *count
            }
            None => {
                tally.push((candidate, 1));
                1
            }
        };

        if count > leader_count {
            leader = Some(candidate);
            leader_count = count;
        }
    }

    leader
}

#[cfg(test)]
mod tests {
    use super::*;
    use plurality_core::FeedId;
    use serde_json::json;

    fn feed(n: u8) -> FeedId {
        FeedId::from_public_key(&[n; 32])
    }

    fn snapshot(entries: &[(u8, Value)]) -> AggregateSnapshot {
        entries
            .iter()
            .map(|(n, v)| (feed(*n), v.clone()))
            .collect()
    }

    #[test]
    fn test_viewer_wins() {
        let s = snapshot(&[(1, json!("X")), (2, json!("Y")), (3, json!("X"))]);
        let viewer = feed(2);
        let owner = feed(1);

        assert_eq!(
            resolve(&s, viewer.as_str(), Some(owner.as_str())),
            Some(json!("Y"))
        );
        assert_eq!(decide(&s, viewer.as_str(), None), Resolution::Viewer(&json!("Y")));
    }

    #[test]
    fn test_owner_wins_over_plurality() {
        let s = snapshot(&[(1, json!("X")), (2, json!("Y")), (3, json!("X"))]);
        let viewer = feed(9);

        assert_eq!(
            resolve(&s, viewer.as_str(), Some(feed(2).as_str())),
            Some(json!("Y"))
        );
    }

    #[test]
    fn test_plurality_count() {
        let s = snapshot(&[(1, json!("X")), (2, json!("Y")), (3, json!("X"))]);
        assert_eq!(resolve(&s, feed(9).as_str(), None), Some(json!("X")));
    }

    #[test]
    fn test_plurality_tie_first_seen() {
        let s = snapshot(&[(1, json!("X")), (2, json!("Y"))]);
        assert_eq!(highest_rank(&s), Some("X"));

        let s = snapshot(&[(2, json!("Y")), (1, json!("X"))]);
        assert_eq!(highest_rank(&s), Some("Y"));
    }

    #[test]
    fn test_plurality_later_value_must_strictly_exceed() {
        // Y reaches 2 first, X only ties it at the end
        let s = snapshot(&[
            (1, json!("Y")),
            (2, json!("X")),
            (3, json!("Y")),
            (4, json!("X")),
        ]);
        assert_eq!(highest_rank(&s), Some("Y"));
    }

    #[test]
    fn test_links_vote_and_structures_do_not() {
        let target = feed(7);
        let s = snapshot(&[
            (1, json!({ "width": 200 })),
            (2, json!({ "link": target.as_str() })),
            (3, json!({ "link": "garbage" })),
            (4, json!(12)),
        ]);

        assert_eq!(highest_rank(&s), Some(target.as_str()));
        assert_eq!(
            resolve(&s, feed(9).as_str(), None),
            Some(json!(target.as_str()))
        );
    }

    #[test]
    fn test_unresolved() {
        assert_eq!(resolve(&AggregateSnapshot::new(), feed(1).as_str(), None), None);

        let s = snapshot(&[(1, json!({ "width": 200 }))]);
        assert_eq!(decide(&s, feed(9).as_str(), None), Resolution::Unresolved);
    }

    #[test]
    fn test_owner_literal_destination() {
        // An owner that never parsed as a feed simply never matches
        let s = snapshot(&[(1, json!("X"))]);
        assert_eq!(resolve(&s, feed(9).as_str(), Some("#rust")), Some(json!("X")));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn entries() -> impl Strategy<Value = Vec<(u8, u8)>> {
            prop::collection::vec((0u8..8, 0u8..3), 0..20)
        }

        fn build(entries: &[(u8, u8)]) -> AggregateSnapshot {
            let mut s = AggregateSnapshot::new();
            for (author, value) in entries {
                s.insert(feed(*author), json!(format!("v{value}")));
            }
            s
        }

        proptest! {
            #[test]
            fn prop_viewer_precedence(entries in entries(), viewer in 0u8..8, owner in 0u8..8) {
                let s = build(&entries);
                let viewer = feed(viewer);
                let owner = feed(owner);
                let resolved = resolve(&s, viewer.as_str(), Some(owner.as_str()));

                if let Some(own) = s.get(viewer.as_str()) {
                    prop_assert_eq!(resolved, Some(own.clone()));
                } else if let Some(theirs) = s.get(owner.as_str()) {
                    prop_assert_eq!(resolved, Some(theirs.clone()));
                } else {
                    prop_assert_eq!(resolved, highest_rank(&s).map(|v| json!(v)));
                }
            }

            #[test]
            fn prop_plurality_has_max_count(entries in entries()) {
                let s = build(&entries);
                let Some(winner) = highest_rank(&s) else {
                    prop_assert!(s.is_empty());
                    return Ok(());
                };

                let count = |needle: &str| s.iter().filter(|(_, v)| v.as_str() == Some(needle)).count();
                let best = count(winner);
                for (_, v) in s.iter() {
                    prop_assert!(count(v.as_str().unwrap_or_default()) <= best);
                }
            }
        }
    }
}
