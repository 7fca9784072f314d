//! Reconciliation of per-consumer downstream objects against subscriptions.

use std::collections::BTreeSet;

use tracing::debug;

/// A previously created downstream object and the consumer that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntity {
    /// Stable identifier, shared across consumers for the same symbol.
    pub id: String,
    /// Consumer that created the object.
    pub owner: String,
}

impl TrackedEntity {
    /// Creates a tracked entity.
    #[must_use]
    pub fn new(id: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
        }
    }
}

/// Actions to apply for one consumer, each list sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Ids to delete.
    pub remove: Vec<String>,
    /// Ids to create under this consumer.
    pub create: Vec<String>,
    /// Desired ids left alone because another consumer owns them.
    pub skip: Vec<String>,
}

/// Plans the object changes for one consumer.
///
/// An object owned by this consumer is removed only when it is absent from
/// the consumer's own desired set AND from the union across all consumers;
/// a symbol another consumer still relies on must survive this consumer's
/// departure. Desired ids already owned by a different consumer are skipped
/// rather than re-created, so the same symbol never yields duplicates.
#[must_use]
pub fn reconcile(
    consumer: &str,
    existing: &[TrackedEntity],
    desired: &BTreeSet<String>,
    union: &BTreeSet<String>,
) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    for entity in existing {
        if entity.owner == consumer && !desired.contains(&entity.id) && !union.contains(&entity.id)
        {
            plan.remove.push(entity.id.clone());
        }
    }

    for id in desired {
        match existing.iter().find(|e| e.id == *id) {
            None => plan.create.push(id.clone()),
            Some(entity) if entity.owner != consumer => plan.skip.push(entity.id.clone()),
            Some(_) => {}
        }
    }

    plan.remove.sort();
    debug!(
        consumer,
        remove = plan.remove.len(),
        create = plan.create.len(),
        skip = plan.skip.len(),
        "reconcile plan computed"
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_create_unowned_desired_ids() {
        let plan = reconcile("a", &[], &ids(&["btcusdt"]), &ids(&["btcusdt"]));
        assert_eq!(plan.create, vec!["btcusdt"]);
        assert!(plan.remove.is_empty());
        assert!(plan.skip.is_empty());
    }

    #[test]
    fn test_skip_ids_owned_by_other_consumer() {
        let existing = vec![TrackedEntity::new("btcusdt", "b")];
        let plan = reconcile("a", &existing, &ids(&["btcusdt"]), &ids(&["btcusdt"]));
        assert!(plan.create.is_empty());
        assert_eq!(plan.skip, vec!["btcusdt"]);
    }

    #[test]
    fn test_shared_symbol_survives_departure() {
        // A created btcusdt; A leaves while B still subscribes to it.
        let existing = vec![
            TrackedEntity::new("btcusdt", "a"),
            TrackedEntity::new("ethusdt", "a"),
        ];
        let desired = BTreeSet::new();
        let union = ids(&["btcusdt"]);

        let plan = reconcile("a", &existing, &desired, &union);
        assert_eq!(plan.remove, vec!["ethusdt"]);
    }

    #[test]
    fn test_does_not_remove_other_consumers_objects() {
        let existing = vec![TrackedEntity::new("btcusdt", "b")];
        let plan = reconcile("a", &existing, &BTreeSet::new(), &BTreeSet::new());
        assert!(plan.remove.is_empty());
    }

    #[test]
    fn test_outputs_sorted() {
        let existing = vec![
            TrackedEntity::new("solusdt", "a"),
            TrackedEntity::new("bnbusdt", "a"),
        ];
        let plan = reconcile(
            "a",
            &existing,
            &ids(&["ethusdt", "adausdt"]),
            &ids(&["ethusdt", "adausdt"]),
        );
        assert_eq!(plan.remove, vec!["bnbusdt", "solusdt"]);
        assert_eq!(plan.create, vec!["adausdt", "ethusdt"]);
    }
}
