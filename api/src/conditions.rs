//! Helpers for the `conditions` list carried in every database status.

use k8s_openapi::{
    apimachinery::pkg::apis::meta::v1::{Condition, Time},
    jiff::Timestamp,
};

/// The operator has started provisioning the database.
pub const PROVISIONING_STARTED: &str = "ProvisioningStarted";
/// Every replica is up.
pub const REPLICA_READY: &str = "ReplicaReady";
/// The database accepts client connections.
pub const ACCEPTING_CONNECTION: &str = "AcceptingConnection";
/// The database passed its health checks.
pub const READY: &str = "Ready";
/// The database finished provisioning.
pub const PROVISIONED: &str = "Provisioned";
/// A restore into the database has started.
pub const DATA_RESTORE_STARTED: &str = "DataRestoreStarted";
/// A restore into the database has finished.
pub const DATA_RESTORED: &str = "DataRestored";
/// Reconciliation of the database is paused.
pub const PAUSED: &str = "Paused";

/// Status value for a condition that holds.
pub const STATUS_TRUE: &str = "True";
/// Status value for a condition that does not hold.
pub const STATUS_FALSE: &str = "False";

/// Returns the condition of type `type_`.
pub fn get_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Reports whether a condition of type `type_` is present.
pub fn has_condition(conditions: &[Condition], type_: &str) -> bool {
    get_condition(conditions, type_).is_some()
}

/// Reports whether the condition of type `type_` is present and true.
pub fn is_condition_true(conditions: &[Condition], type_: &str) -> bool {
    get_condition(conditions, type_).is_some_and(|c| c.status == STATUS_TRUE)
}

/// Inserts or updates `cond`, keyed by its type.
///
/// The transition time of an existing condition only moves when its status changes.
pub fn set_condition(conditions: &mut Vec<Condition>, mut cond: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == cond.type_) {
        Some(existing) => {
            if existing.status == cond.status {
                cond.last_transition_time = existing.last_transition_time.clone();
            }
            *existing = cond;
        }
        None => conditions.push(cond),
    }
}

/// Removes the condition of type `type_`.
pub fn remove_condition(conditions: &mut Vec<Condition>, type_: &str) {
    conditions.retain(|c| c.type_ != type_);
}

/// Builds a condition stamped with the current time.
pub fn new_condition(
    type_: &str,
    status: bool,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
) -> Condition {
    Condition {
        type_: type_.to_string(),
        status: if status { STATUS_TRUE } else { STATUS_FALSE }.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        observed_generation,
        last_transition_time: Time(Timestamp::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_keeps_transition_time() {
        let mut conds = vec![new_condition(READY, true, "Ready", "", Some(1))];
        let first = conds[0].last_transition_time.clone();

        let mut again = new_condition(READY, true, "StillReady", "", Some(2));
        again.last_transition_time = Time(Timestamp::UNIX_EPOCH);
        set_condition(&mut conds, again);
        assert_eq!(conds.len(), 1);
        assert_eq!(conds[0].reason, "StillReady");
        assert_eq!(conds[0].last_transition_time, first);

        let mut flipped = new_condition(READY, false, "Down", "", Some(3));
        flipped.last_transition_time = Time(Timestamp::UNIX_EPOCH);
        set_condition(&mut conds, flipped);
        assert_eq!(conds[0].last_transition_time, Time(Timestamp::UNIX_EPOCH));
        assert!(!is_condition_true(&conds, READY));
    }

    #[test]
    fn presence() {
        let mut conds = Vec::new();
        set_condition(&mut conds, new_condition(PROVISIONED, true, "Done", "", None));
        assert!(has_condition(&conds, PROVISIONED));
        assert!(is_condition_true(&conds, PROVISIONED));
        assert!(!has_condition(&conds, PAUSED));
        remove_condition(&mut conds, PROVISIONED);
        assert!(conds.is_empty());
    }
}
